//! Produces the ordered list of HTTP send parts for one outbound message:
//! attachment placement followed by length-bounded, whitespace-preferring
//! text splitting.

use crate::model::Attachment;

/// Provider-declared composition rules.
#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    /// Maximum part length in characters. `0` means unbounded (no split).
    pub max_length: usize,
    /// Whether the provider has a dedicated media field on its send request.
    /// When false, attachment URLs are appended to the text body instead.
    pub channel_has_native_media: bool,
    /// How many attachment URLs the provider accepts per send when it does
    /// have native media fields (first N are kept, attached to part one).
    pub max_native_attachments: usize,
}

/// One HTTP-call's worth of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPart {
    pub text: String,
    pub attachment_urls: Vec<String>,
}

/// Composes `text` and `attachments` into an ordered, non-empty list of parts.
pub fn compose(text: &str, attachments: &[Attachment], opts: &ComposeOptions) -> Vec<SendPart> {
    let mut body = text.to_string();
    let mut native_urls: Vec<String> = Vec::new();

    if !attachments.is_empty() {
        if opts.channel_has_native_media {
            native_urls = attachments
                .iter()
                .take(opts.max_native_attachments.max(1))
                .map(|a| a.url.clone())
                .collect();
        } else {
            for attachment in attachments {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(&attachment.url);
            }
        }
    }

    let max_length = if opts.max_length == 0 {
        usize::MAX
    } else {
        opts.max_length
    };

    let mut parts: Vec<SendPart> = split_text(&body, max_length)
        .into_iter()
        .map(|text| SendPart {
            text,
            attachment_urls: Vec::new(),
        })
        .collect();

    if parts.is_empty() {
        parts.push(SendPart {
            text: String::new(),
            attachment_urls: Vec::new(),
        });
    }

    if !native_urls.is_empty() {
        parts[0].attachment_urls = native_urls;
    }

    parts
}

/// Splits `text` into chunks no longer than `max_length` characters each,
/// preferring to break on whitespace near the boundary. Order-preserving.
fn split_text(text: &str, max_length: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max_length).min(chars.len());
        if end < chars.len() {
            let mut split_at = end;
            let mut scanned = 0;
            while split_at > start && scanned < max_length {
                if chars[split_at - 1].is_whitespace() {
                    break;
                }
                split_at -= 1;
                scanned += 1;
            }
            if split_at > start {
                end = split_at;
            }
        }
        let chunk: String = chars[start..end].iter().collect();
        parts.push(chunk.trim_end().to_string());
        start = end;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max_length: usize, native: bool) -> ComposeOptions {
        ComposeOptions {
            max_length,
            channel_has_native_media: native,
            max_native_attachments: 4,
        }
    }

    #[test]
    fn short_text_is_a_single_part() {
        let parts = compose("hello", &[], &opts(160, false));
        assert_eq!(parts, vec![SendPart { text: "hello".into(), attachment_urls: vec![] }]);
    }

    #[test]
    fn splits_long_text_preferring_whitespace_boundary() {
        let text = "a".repeat(150) + " " + &"b".repeat(100);
        let parts = compose(&text, &[], &opts(160, false));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, "a".repeat(150));
        assert_eq!(parts[1].text, "b".repeat(100));
    }

    #[test]
    fn splits_are_order_preserving_and_reassemble() {
        let text = (0..500).map(|i| (b'a' + (i % 26) as u8) as char).collect::<String>();
        let parts = compose(&text, &[], &opts(160, false));
        let rejoined: String = parts.iter().map(|p| p.text.clone()).collect();
        assert_eq!(rejoined, text);
        assert!(parts.iter().all(|p| p.text.chars().count() <= 160));
    }

    #[test]
    fn attachments_appended_as_text_when_no_native_media() {
        let attachments = vec![
            Attachment { content_type: "image/jpeg".into(), url: "https://x/1.jpg".into() },
            Attachment { content_type: "image/jpeg".into(), url: "https://x/2.jpg".into() },
        ];
        let parts = compose("caption", &attachments, &opts(1000, false));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text, "caption\nhttps://x/1.jpg\nhttps://x/2.jpg");
        assert!(parts[0].attachment_urls.is_empty());
    }

    #[test]
    fn attachments_attach_to_first_part_only_when_native_media() {
        let attachments = vec![Attachment { content_type: "image/jpeg".into(), url: "https://x/1.jpg".into() }];
        let text = "a".repeat(200);
        let parts = compose(&text, &attachments, &opts(160, true));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].attachment_urls, vec!["https://x/1.jpg".to_string()]);
        assert!(parts[1].attachment_urls.is_empty());
    }

    #[test]
    fn never_returns_an_empty_list() {
        let parts = compose("", &[], &opts(160, false));
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn zero_max_length_means_unbounded() {
        let text = "x".repeat(500);
        let parts = compose(&text, &[], &opts(0, false));
        assert_eq!(parts.len(), 1);
    }
}
