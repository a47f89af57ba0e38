use lambda::sql::Environment;
use lambda::{init_logging, Failure, Handler, Invocation, Lambda, LogArgs, LogFormat, LogLevel};

struct Noop;

impl Lambda for Noop {
    type Output = ();

    async fn invoke(&self, _invocation: &Invocation) -> Result<(), Failure> {
        Ok(())
    }
}

#[test]
fn test_handler_from_env_installs_logging() {
    std::env::set_var("LAMBDA_ENV", "development");
    std::env::set_var("LOG_FORMAT", "text");
    std::env::set_var("LOG_LEVEL", "debug");

    let handler = Handler::from_env(Noop);

    for var in ["LAMBDA_ENV", "LOG_FORMAT", "LOG_LEVEL"] {
        std::env::remove_var(var);
    }
    let handler = handler.unwrap();

    assert_eq!(handler.settings().environment, Environment::Development);
    assert_eq!(handler.settings().log.format, LogFormat::Text);
    assert_eq!(handler.settings().log.level, LogLevel::Debug);

    // Initializing again leaves the installed subscriber in place.
    init_logging(&LogArgs::default());
    tracing::info!("still logging");
}
