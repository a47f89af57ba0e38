//! Invocation of other functions through the platform's API.
//!
//! An [`Invoker`] is registered with the [`Container`](crate::Container) like
//! any other component, and forwards the [`Context`] of the calling
//! invocation to the function it invokes.
use crate::{Context, Invocation};
use anyhow::Context as _;
use aws_sdk_lambda::operation::invoke::InvokeOutput;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use serde_json::Value;

#[derive(Debug, Clone, clap::Parser)]
pub struct InvokerArgs {
    /// Region of the functions being invoked.
    #[clap(long = "region", env = "REGION")]
    pub region: String,
}

/// Invoker invokes other functions. Its client is built on first use.
#[derive(Debug)]
pub struct Invoker {
    region: String,
    client: tokio::sync::OnceCell<aws_sdk_lambda::Client>,
}

impl Invoker {
    /// Build an Invoker for the region of the `REGION` environment variable.
    pub fn from_env() -> anyhow::Result<Self> {
        let args = <InvokerArgs as clap::Parser>::try_parse_from(["lambda"])
            .context("missing region of the Invoker, which is set by REGION")?;
        Self::new(args.region)
    }

    pub fn new(region: impl Into<String>) -> anyhow::Result<Self> {
        let region = region.into();
        if region.trim().is_empty() {
            anyhow::bail!("region of the Invoker cannot be empty");
        }

        Ok(Self {
            region,
            client: tokio::sync::OnceCell::new(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Invoke `function_name` with `payload`, forwarding the Context of `invocation`.
    ///
    /// String payloads are sent as-is, `null` and empty strings send no payload,
    /// and any other value is sent as its JSON encoding.
    pub async fn invoke(
        &self,
        invocation: &Invocation,
        function_name: &str,
        payload: &Value,
        invocation_type: InvocationType,
    ) -> anyhow::Result<InvokeOutput> {
        let client_context = client_context(invocation.context()?)?;

        tracing::debug!(
            function_name,
            invocation_type = invocation_type.as_str(),
            "invoking function"
        );

        self.client()
            .await
            .invoke()
            .function_name(function_name)
            .set_payload(encode_payload(payload)?)
            .client_context(client_context)
            .invocation_type(invocation_type)
            .send()
            .await
            .with_context(|| format!("failed to invoke function {function_name}"))
    }

    async fn client(&self) -> &aws_sdk_lambda::Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_config::Region::new(self.region.clone()))
                    .load()
                    .await;

                aws_sdk_lambda::Client::new(&config)
            })
            .await
    }
}

fn encode_payload(payload: &Value) -> anyhow::Result<Option<Blob>> {
    let bytes = match payload {
        Value::Null => return Ok(None),
        Value::String(text) if text.is_empty() => return Ok(None),
        Value::String(text) => text.clone().into_bytes(),
        structured => serde_json::to_vec(structured).context("failed to encode payload")?,
    };
    Ok(Some(Blob::new(bytes)))
}

/// ClientContext is the base64 of the Context's JSON encoding.
fn client_context(context: &Context) -> anyhow::Result<String> {
    let json = serde_json::to_vec(context).context("failed to encode client context")?;
    Ok(base64::encode(json))
}
