//! Invocation lifecycle of serverless functions.
//!
//! A [`Handler`] receives each platform invocation, binds the invocation's
//! event, context, parsed body, and decoded token, and then runs a
//! user-provided [`Lambda`]. Whatever the outcome, it renders a uniform
//! [`Response`] envelope and ends every database connection the invocation
//! used. Failures are normalized into a [`LambdaError`], logged, and sent to a
//! [`Notifier`].
use serde::Serialize;

mod container;
mod error;
mod event;
mod handler;
mod invoker;
mod logging;
mod notifier;
mod response;
mod settings;
mod token;

pub use container::{Bindings, Container, Invocation, Property, RegistryError};
pub use error::{normalize, Failure, FailureExt, LambdaError};
pub use event::{bind_invocation, Context, Event};
pub use handler::Handler;
pub use invoker::{Invoker, InvokerArgs};
pub use logging::{init_logging, LogArgs, LogFormat, LogLevel};
pub use notifier::{Message, Notifier, Sender, SlackSender};
pub use response::{Headers, Response};
pub use settings::Settings;
pub use token::{TokenDecoder, TokenPolicy, UnverifiedJwt};

pub use aws_sdk_lambda::operation::invoke::InvokeOutput;
pub use aws_sdk_lambda::types::InvocationType;
pub use lambda_sql as sql;
pub use reqwest::StatusCode;

/// Lambda is the business logic of a function. It reads the state of its
/// invocation, and any components it needs, from the given Invocation.
pub trait Lambda: Send + Sync {
    type Output: Serialize + Send;

    fn invoke(
        &self,
        invocation: &Invocation,
    ) -> impl std::future::Future<Output = Result<Self::Output, Failure>> + Send;
}
