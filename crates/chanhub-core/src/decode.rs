//! One decoding API for query strings, URL-encoded form bodies, and JSON
//! bodies, with required-field validation declared by the caller rather than
//! baked into the target type.

use crate::error::ChannelError;
use serde::de::DeserializeOwned;

/// The raw webhook payload, tagged by the source the adapter declared at
/// registration time.
#[derive(Debug, Clone)]
pub enum RawRequest {
    Query(String),
    Form(String),
    Json(Vec<u8>),
}

impl RawRequest {
    fn to_value(&self) -> Result<serde_json::Value, ChannelError> {
        match self {
            RawRequest::Query(qs) | RawRequest::Form(qs) => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(qs)
                    .map_err(|e| ChannelError::RequestInvalid {
                        field: format!("malformed body: {e}"),
                    })?;
                let mut obj = serde_json::Map::new();
                for (key, value) in pairs {
                    obj.insert(key, serde_json::Value::String(value));
                }
                Ok(serde_json::Value::Object(obj))
            }
            RawRequest::Json(bytes) => {
                serde_json::from_slice(bytes).map_err(|e| ChannelError::RequestInvalid {
                    field: format!("malformed body: {e}"),
                })
            }
        }
    }
}

/// Flattens a query/form payload into a sorted key-value map, as needed by
/// `auth::sign`/`auth::verify`. Fails on a JSON body: Twilio-style signing
/// only applies to query/form requests.
pub fn to_param_map(raw: &RawRequest) -> Result<std::collections::BTreeMap<String, String>, ChannelError> {
    match raw {
        RawRequest::Query(qs) | RawRequest::Form(qs) => {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(qs).map_err(|e| ChannelError::RequestInvalid {
                    field: format!("malformed body: {e}"),
                })?;
            Ok(pairs.into_iter().collect())
        }
        RawRequest::Json(_) => Err(ChannelError::RequestInvalid {
            field: "signature requires a query/form body".to_string(),
        }),
    }
}

fn field_present(value: &serde_json::Value, field: &str) -> bool {
    match value.get(field) {
        None => false,
        Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Decodes `raw` into `T`, failing with `RequestInvalid` naming the first
/// missing required field. Fields present in the payload but absent from `T`
/// are silently ignored (serde's default behavior for unknown map keys).
pub fn decode<T: DeserializeOwned>(raw: &RawRequest, required: &[&str]) -> Result<T, ChannelError> {
    let value = raw.to_value()?;
    for field in required {
        if !field_present(&value, field) {
            return Err(ChannelError::RequestInvalid {
                field: field.to_string(),
            });
        }
    }
    serde_json::from_value(value).map_err(|e| ChannelError::RequestInvalid {
        field: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TwilioInbound {
        #[serde(rename = "From")]
        from: String,
        #[serde(rename = "To")]
        to: String,
        #[serde(rename = "Body")]
        body: String,
        #[serde(rename = "MessageSid")]
        message_sid: String,
    }

    #[test]
    fn decodes_a_well_formed_form_body() {
        let raw = RawRequest::Form(
            "From=%2B14133881111&To=%2B12028831111&Body=Msg&MessageSid=SMe287d7".to_string(),
        );
        let decoded: TwilioInbound = decode(&raw, &["From", "To", "Body", "MessageSid"]).unwrap();
        assert_eq!(decoded.from, "+14133881111");
        assert_eq!(decoded.body, "Msg");
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let raw = RawRequest::Form("To=%2B12028831111&Body=Msg".to_string());
        let err = decode::<TwilioInbound>(&raw, &["From", "To", "Body", "MessageSid"])
            .unwrap_err();
        assert_eq!(err.to_string(), "request invalid: From");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = RawRequest::Form(
            "From=%2B1&To=%2B2&Body=hi&MessageSid=SM1&Extra=ignored".to_string(),
        );
        let decoded: TwilioInbound = decode(&raw, &["From", "To", "Body", "MessageSid"]).unwrap();
        assert_eq!(decoded.message_sid, "SM1");
    }

    #[test]
    fn decodes_json_body() {
        #[derive(Debug, Deserialize)]
        struct Clickatell {
            #[serde(rename = "messageId")]
            message_id: String,
        }
        let raw = RawRequest::Json(br#"{"messageId":"1234"}"#.to_vec());
        let decoded: Clickatell = decode(&raw, &["messageId"]).unwrap();
        assert_eq!(decoded.message_id, "1234");
    }

    #[test]
    fn empty_string_required_field_is_treated_as_absent() {
        let raw = RawRequest::Form("From=&To=%2B2&Body=hi&MessageSid=SM1".to_string());
        let err = decode::<TwilioInbound>(&raw, &["From", "To", "Body", "MessageSid"])
            .unwrap_err();
        assert_eq!(err.to_string(), "request invalid: From");
    }
}
