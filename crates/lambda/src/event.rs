use crate::{Bindings, LambdaError, Property, TokenDecoder, TokenPolicy};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Event is the platform's invocation event, as delivered by an HTTP gateway.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    /// Remaining fields of the event, such as its path and query parameters.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Context is the platform's description of the current invocation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default)]
    pub aws_request_id: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Event {
    /// Look up a header by its case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the request body. Bodies which are missing, null, or empty
    /// parse as `null`, and structured bodies are passed through.
    pub fn parse_body(&self) -> Result<Value, LambdaError> {
        let text = match &self.body {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(Value::String(text)) => text,
            Some(structured) => return Ok(structured.clone()),
        };

        let decoded;
        let text = if self.is_base64_encoded {
            decoded = base64::decode(text.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| {
                    LambdaError::new(
                        "request body is not valid base64",
                        Some(StatusCode::BAD_REQUEST),
                    )
                })?;
            decoded.as_str()
        } else {
            text.as_str()
        };

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|err| {
            LambdaError::new(
                format!("request body is not valid JSON: {err}"),
                Some(StatusCode::BAD_REQUEST),
            )
        })
    }

    /// Decode the claims of the Authorization header, if there is one.
    pub fn decode_token(
        &self,
        tokens: &dyn TokenDecoder,
        policy: TokenPolicy,
    ) -> Result<Option<Value>, LambdaError> {
        let Some(credential) = self
            .header("Authorization")
            .filter(|credential| !credential.trim().is_empty())
        else {
            return Ok(None);
        };

        match (tokens.decode(credential), policy) {
            (Ok(claims), _) => Ok(Some(claims)),
            (Err(err), TokenPolicy::Ignore) => {
                tracing::warn!(
                    error = %format!("{err:#}"),
                    "ignoring undecodable authorization token"
                );
                Ok(None)
            }
            (Err(err), TokenPolicy::Reject) => Err(LambdaError::new(
                format!("{err:#}"),
                Some(StatusCode::UNAUTHORIZED),
            )),
        }
    }
}

/// Build the Bindings of an invocation: its event, context, parsed body, and token.
pub fn bind_invocation(
    event: Event,
    context: Context,
    tokens: &dyn TokenDecoder,
    policy: TokenPolicy,
) -> Result<Bindings, LambdaError> {
    let body = event.parse_body()?;
    let token = event.decode_token(tokens, policy)?;

    let mut bindings = Bindings::new();
    bindings.bind_constant(Property::Event, event);
    bindings.bind_constant(Property::Context, context);
    bindings.bind_constant(Property::EventBody, body);
    bindings.bind_constant(Property::Token, token);
    Ok(bindings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::test::encode;
    use crate::UnverifiedJwt;
    use serde_json::json;

    fn with_body(body: Value) -> Event {
        Event {
            body: Some(body),
            ..Default::default()
        }
    }

    fn with_authorization(name: &str, value: &str) -> Event {
        Event {
            headers: Some([(name.to_string(), value.to_string())].into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_parsing() {
        assert_eq!(
            with_body(json!(r#"{"id": 1}"#)).parse_body().unwrap(),
            json!({"id": 1})
        );
        assert_eq!(
            with_body(json!({"id": 1})).parse_body().unwrap(),
            json!({"id": 1})
        );
        assert_eq!(with_body(json!([1, 2])).parse_body().unwrap(), json!([1, 2]));

        for empty in [json!(null), json!(""), json!("  ")] {
            assert_eq!(with_body(empty).parse_body().unwrap(), Value::Null);
        }
        assert_eq!(Event::default().parse_body().unwrap(), Value::Null);
    }

    #[test]
    fn test_base64_bodies() {
        let mut event = with_body(json!(base64::encode(r#"{"id": 2}"#)));
        event.is_base64_encoded = true;
        assert_eq!(event.parse_body().unwrap(), json!({"id": 2}));

        event.body = Some(json!("!!not base64!!"));
        assert_eq!(
            event.parse_body().unwrap_err().status_code,
            Some(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn test_malformed_body_is_a_bad_request() {
        let err = with_body(json!("{not json")).parse_body().unwrap_err();
        assert_eq!(err.status_code, Some(StatusCode::BAD_REQUEST));
        assert!(err.message.starts_with("request body is not valid JSON"), "{}", err.message);
    }

    #[test]
    fn test_token_decoding() {
        let claims = json!({"sub": "user-1"});
        let token = encode(&claims);

        let event = with_authorization("authorization", &format!("Bearer {token}"));
        assert_eq!(event.header("Authorization"), Some(format!("Bearer {token}").as_str()));
        assert_eq!(
            event.decode_token(&UnverifiedJwt, TokenPolicy::Reject).unwrap(),
            Some(claims)
        );

        assert_eq!(
            Event::default()
                .decode_token(&UnverifiedJwt, TokenPolicy::Reject)
                .unwrap(),
            None
        );
        let empty = with_authorization("Authorization", "");
        assert_eq!(empty.decode_token(&UnverifiedJwt, TokenPolicy::Reject).unwrap(), None);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_undecodable_tokens_follow_policy() {
        let event = with_authorization("Authorization", "Bearer garbage");

        assert_eq!(
            event.decode_token(&UnverifiedJwt, TokenPolicy::Ignore).unwrap(),
            None
        );
        assert!(logs_contain("ignoring undecodable authorization token"));
        let err = event
            .decode_token(&UnverifiedJwt, TokenPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.status_code, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_events_round_trip_unknown_fields() {
        let raw = json!({
            "body": "{\"id\":1}",
            "headers": {"Host": "api.example.com"},
            "httpMethod": "POST",
            "path": "/users",
        });
        let event: Event = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(event.extra["httpMethod"], "POST");
        assert_eq!(event.header("host"), Some("api.example.com"));
        assert!(!event.is_base64_encoded);

        let bindings = bind_invocation(
            event,
            Context::default(),
            &UnverifiedJwt,
            TokenPolicy::Ignore,
        )
        .unwrap();
        assert_eq!(
            bindings.get::<Value>(&Property::EventBody).unwrap(),
            &json!({"id": 1})
        );
        assert_eq!(
            bindings.get::<Option<Value>>(&Property::Token).unwrap(),
            &None
        );
        assert_eq!(
            bindings.get::<Event>(&Property::Event).unwrap().extra["path"],
            "/users"
        );
    }
}
