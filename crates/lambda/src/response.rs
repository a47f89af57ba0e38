use crate::LambdaError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Response is the HTTP-style envelope returned by every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(with = "status_serde")]
    pub status_code: StatusCode,
    pub headers: Headers,
    /// JSON-encoded result or error.
    pub body: String,
    pub is_base64_encoded: bool,
}

/// CORS and content headers attached to every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headers {
    #[serde(rename = "Access-Control-Allow-Origin")]
    pub allow_origin: String,
    #[serde(rename = "Access-Control-Allow-Credentials")]
    pub allow_credentials: bool,
    #[serde(rename = "content-type")]
    pub content_type: String,
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_credentials: true,
            content_type: "application/json".to_string(),
        }
    }
}

impl Response {
    /// Build a Response having the JSON encoding of `body`.
    pub fn new<T: Serialize + ?Sized>(
        status_code: StatusCode,
        body: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            status_code,
            headers: Headers::default(),
            body: serde_json::to_string(body)?,
            is_base64_encoded: false,
        })
    }

    /// Build the Response rendering a normalized error.
    pub fn error(error: &LambdaError) -> Self {
        let status_code = error.response_status();

        match Self::new(status_code, error) {
            Ok(response) => response,
            // Unreachable in practice: LambdaError always encodes.
            Err(_) => Self {
                status_code,
                headers: Headers::default(),
                body: r#"{"message":"internal error","isFrameworkError":true}"#.to_string(),
                is_base64_encoded: false,
            },
        }
    }

    /// Parse the JSON body of this Response.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

/// Status codes are encoded as their integer value.
pub(crate) mod status_serde {
    use reqwest::StatusCode;
    use serde::{
        de::{self, Deserialize, Deserializer},
        ser::{Serialize, Serializer},
    };

    pub fn serialize<S: Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
        status.as_u16().serialize(s)
    }
    pub fn deserialize<'a, D: Deserializer<'a>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let int_val = <u16 as Deserialize>::deserialize(deserializer)?;
        StatusCode::from_u16(int_val).map_err(de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            status: &Option<StatusCode>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            status.map(|status| status.as_u16()).serialize(s)
        }
        pub fn deserialize<'a, D: Deserializer<'a>>(
            deserializer: D,
        ) -> Result<Option<StatusCode>, D::Error> {
            match <Option<u16> as Deserialize>::deserialize(deserializer)? {
                Some(int_val) => StatusCode::from_u16(int_val)
                    .map(Some)
                    .map_err(de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
