use crate::{
    bind_invocation, init_logging, normalize, Container, Context, Event, Failure, Invocation,
    Lambda, LambdaError, Message, Notifier, Response, Sender, Settings, TokenDecoder,
    UnverifiedJwt,
};
use futures::FutureExt;
use lambda_sql::Environment;
use reqwest::StatusCode;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Handler drives each invocation of a Lambda through its lifecycle:
/// binding the invocation's constants, executing the Lambda, and then
/// rendering its outcome and tearing down the connections it used.
pub struct Handler<L, N = Sender> {
    lambda: L,
    container: Arc<Container>,
    notifier: N,
    tokens: Box<dyn TokenDecoder>,
    settings: Settings,
}

impl<L: Lambda> Handler<L, Sender> {
    /// Build a Handler from Settings of the environment, and install logging.
    /// Call once, when the process starts.
    pub fn from_env(lambda: L) -> Result<Self, clap::Error> {
        let settings = Settings::from_env()?;
        init_logging(&settings.log);
        tracing::debug!(?settings, "initialized handler");

        Ok(Self::new(lambda, settings))
    }

    /// Build a Handler over the process-wide Container, which notifies
    /// failures through the Sender of `settings`.
    pub fn new(lambda: L, settings: Settings) -> Self {
        Self {
            lambda,
            container: Container::global(),
            notifier: settings.sender(),
            tokens: Box::new(UnverifiedJwt),
            settings,
        }
    }
}

impl<L: Lambda, N: Notifier> Handler<L, N> {
    pub fn with_container(self, container: Arc<Container>) -> Self {
        Self { container, ..self }
    }

    pub fn with_notifier<M: Notifier>(self, notifier: M) -> Handler<L, M> {
        let Self {
            lambda,
            container,
            notifier: _,
            tokens,
            settings,
        } = self;

        Handler {
            lambda,
            container,
            notifier,
            tokens,
            settings,
        }
    }

    pub fn with_token_decoder(self, tokens: impl TokenDecoder + 'static) -> Self {
        Self {
            tokens: Box::new(tokens),
            ..self
        }
    }

    /// The Container from which invocations resolve their components.
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handle an invocation, always producing a Response.
    #[tracing::instrument(
        skip_all,
        fields(request_id = %context.aws_request_id, function = %context.function_name)
    )]
    pub async fn handle(&self, event: Event, context: Context) -> Response {
        let bindings = bind_invocation(
            event,
            context,
            self.tokens.as_ref(),
            self.settings.token_policy,
        );

        let invocation = match bindings {
            Ok(bindings) => Invocation::new(self.container.clone(), bindings),
            // Business logic doesn't run, and no connections were used.
            Err(err) => return self.finalize(Err(Failure::Normalized(err)), None).await,
        };

        let outcome = match AssertUnwindSafe(self.lambda.invoke(&invocation))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(Failure::Panic(panic_message(&*panic))),
        };

        self.finalize(outcome, Some(&invocation)).await
    }

    /// Handle an invocation given as untyped JSON, as read from the platform runtime.
    pub async fn handle_json(
        &self,
        event: serde_json::Value,
        context: serde_json::Value,
    ) -> Response {
        let context: Context = serde_json::from_value(context).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to parse invocation context");
            Context::default()
        });

        match serde_json::from_value::<Event>(event) {
            Ok(event) => self.handle(event, context).await,
            Err(err) => {
                let error = LambdaError::new(
                    format!("invalid invocation event: {err}"),
                    Some(StatusCode::BAD_REQUEST),
                );
                self.finalize(Err(Failure::Normalized(error)), None).await
            }
        }
    }

    async fn finalize(
        &self,
        outcome: Result<L::Output, Failure>,
        invocation: Option<&Invocation>,
    ) -> Response {
        let result: Result<Response, Failure> =
            match outcome.map(|output| Response::new(StatusCode::OK, &output)) {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(anyhow::Error::new(err)
                    .context("failed to serialize invocation result")
                    .into()),
                Err(failure) => Err(failure),
            };

        // Connections are ended on every path, before any failure is notified.
        if let Some(invocation) = invocation {
            teardown(invocation).await;
        }

        match result {
            Ok(response) => response,
            Err(failure) => self.fail(failure).await,
        }
    }

    async fn fail(&self, failure: Failure) -> Response {
        let error = normalize(failure);

        if self.settings.environment != Environment::Test {
            tracing::error!(
                error = %error.message,
                status_code = error.response_status().as_u16(),
                stack = error.stack.as_deref().unwrap_or_default(),
                "invocation failed"
            );
        }

        let message = if error.message.is_empty() {
            Message::Object(serde_json::to_value(&error).unwrap_or_default())
        } else {
            Message::Text(error.message.clone())
        };

        let notified = tokio::time::timeout(
            self.settings.notify_timeout,
            AssertUnwindSafe(self.notifier.notify(message)).catch_unwind(),
        );

        match notified.await {
            Ok(Ok(Ok(()))) => (),
            Ok(Ok(Err(err))) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to send failure notification")
            }
            Ok(Err(panic)) => tracing::warn!(
                panic = %panic_message(&*panic),
                "failure notification panicked"
            ),
            Err(_elapsed) => tracing::warn!(
                timeout = ?self.settings.notify_timeout,
                "failure notification timed out"
            ),
        }

        Response::error(&error)
    }
}

/// End every connection resolved by the invocation. Failures are logged.
async fn teardown(invocation: &Invocation) {
    for (name, connection) in invocation.take_connections() {
        match connection.end().await {
            Ok(()) => tracing::debug!(component = name, "ended connection"),
            Err(err) => tracing::warn!(
                component = name,
                error = ?err,
                "failed to end connection"
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
