//! Parses inbound identifiers into canonical URNs, with a default-country
//! hint for bare phone numbers.

use crate::error::ChannelError;
use crate::model::{Urn, UrnScheme};
use std::str::FromStr;

/// Parses `raw` into a canonical URN. `default_country` is the ISO-3166-1
/// alpha-2 hint used when `raw` is a bare phone number without a leading `+`
/// and no scheme prefix (ordinarily the channel's own country).
pub fn parse_urn(raw: &str, default_country: &str) -> Result<Urn, ChannelError> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("whatsapp:") {
        let path = rest.trim_start_matches('+');
        if path.is_empty() {
            return Err(ChannelError::UrnInvalid {
                reason: "empty whatsapp path".to_string(),
            });
        }
        return Ok(Urn::new(UrnScheme::Whatsapp, path));
    }
    if let Some(rest) = raw.strip_prefix("tel:") {
        return parse_phone(rest, default_country).map(Urn::tel);
    }
    parse_phone(raw, default_country).map(Urn::tel)
}

/// Strict phone parse: `raw` must parse as a possible number in
/// `default_country`, and is emitted in E.164 form.
fn parse_phone(raw: &str, default_country: &str) -> Result<String, ChannelError> {
    let country = phonenumber::country::Id::from_str(default_country).ok();
    let number = phonenumber::parse(country, raw).map_err(|e| ChannelError::UrnInvalid {
        reason: format!("unparseable phone number: {e}"),
    })?;

    if !phonenumber::is_possible(&number) {
        return Err(ChannelError::UrnInvalid {
            reason: format!("not a possible number for country {default_country}"),
        });
    }

    Ok(number
        .format()
        .mode(phonenumber::Mode::E164)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tel_urn_to_e164() {
        let urn = parse_urn("4133881111", "US").unwrap();
        assert_eq!(urn.scheme, UrnScheme::Tel);
        assert_eq!(urn.path, "+14133881111");
    }

    #[test]
    fn parses_already_plussed_number() {
        let urn = parse_urn("+14133881111", "US").unwrap();
        assert_eq!(urn.path, "+14133881111");
    }

    #[test]
    fn strips_whatsapp_prefix_and_leading_plus() {
        let urn = parse_urn("whatsapp:+14133881111", "US").unwrap();
        assert_eq!(urn.scheme, UrnScheme::Whatsapp);
        assert_eq!(urn.path, "14133881111");
    }

    #[test]
    fn rejects_unparseable_number() {
        let err = parse_urn("not-a-number", "US").unwrap_err();
        assert!(matches!(err, ChannelError::UrnInvalid { .. }));
    }

    #[test]
    fn rejects_number_invalid_for_country() {
        // Too short to be a possible US number.
        assert!(parse_urn("123", "US").is_err());
    }
}
