//! GSM-7 (3GPP TS 23.038) default alphabet classification and substitution.
//!
//! This is a text-level codec: it answers whether a string is representable
//! in the 7-bit SMS alphabet, and offers a pure, idempotent rewrite that
//! substitutes a closed set of visually similar non-GSM characters for their
//! GSM equivalents. It does not pack/unpack septets — that concern belongs to
//! a provider's own wire encoding, not to this shared text classifier.

/// Default alphabet, 128 code points, table position is the 7-bit value.
const DEFAULT_ALPHABET: &[char] = &[
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', 'Δ', '_',
    'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É', ' ', '!', '"', '#',
    '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', '0', '1', '2', '3', '4', '5', '6',
    '7', '8', '9', ':', ';', '<', '=', '>', '?', '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö',
    'Ñ', 'Ü', '§', '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Extension table, escaped by 0x1B in the wire encoding. Here we only need the
/// character side, to decide membership for `is_valid`.
const EXTENSION_CHARS: &[char] = &['\u{0c}', '^', '{', '}', '\\', '[', '~', ']', '|', '€'];

/// Closed substitution table: visually similar non-GSM characters rewritten to
/// their closest GSM-7 equivalent. Order matters only in that every entry is
/// applied exactly once per pass; the table itself contains no chained
/// mappings (no entry's replacement is itself a key), which is what makes
/// `replace_substitutions` idempotent.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('ê', "e"),
    ('ë', "e"),
    ('î', "i"),
    ('ï', "i"),
    ('â', "a"),
    ('ã', "a"),
    ('ā', "a"),
    ('ô', "o"),
    ('õ', "o"),
    ('û', "u"),
    ('ū', "u"),
    ('ý', "y"),
    ('ÿ', "y"),
    ('ç', "c"),
    ('Ê', "E"),
    ('Ë', "E"),
    ('Î', "I"),
    ('Ï', "I"),
    ('Â', "A"),
    ('Ã', "A"),
    ('Ô', "O"),
    ('Õ', "O"),
    ('Û', "U"),
    ('Ý', "Y"),
    ('\u{2018}', "'"), // left single quotation mark
    ('\u{2019}', "'"), // right single quotation mark
    ('\u{201c}', "\""), // left double quotation mark
    ('\u{201d}', "\""), // right double quotation mark
    ('\u{2013}', "-"), // en dash
    ('\u{2014}', "-"), // em dash
    ('\u{00a0}', " "), // non-breaking space
    ('\t', " "),       // horizontal tab
    ('\u{2026}', "..."), // horizontal ellipsis
];

/// Every code point is either in the default alphabet or the extension table.
pub fn is_valid(text: &str) -> bool {
    text.chars()
        .all(|c| DEFAULT_ALPHABET.contains(&c) || EXTENSION_CHARS.contains(&c))
}

/// Pure substitution pass. Idempotent: calling this twice is the same as
/// calling it once, because no replacement text is itself a substitution key.
pub fn replace_substitutions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match SUBSTITUTIONS.iter().find(|(k, _)| *k == c) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Selects the provider-facing encoding indicator for outbound text: GSM-7 if
/// representable after substitution, Unicode otherwise. Each provider's own
/// constant for "unicode" differs ("7", "5", "1", "unicode", ...); this
/// function only decides which bucket the text falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7,
    Unicode,
}

pub fn select_encoding(text: &str) -> (String, Encoding) {
    let substituted = replace_substitutions(text);
    if is_valid(&substituted) {
        (substituted, Encoding::Gsm7)
    } else {
        (substituted, Encoding::Unicode)
    }
}
