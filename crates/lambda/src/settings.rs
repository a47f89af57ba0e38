use crate::{LogArgs, Sender, TokenPolicy};
use derivative::Derivative;
use lambda_sql::Environment;

/// Settings of the invocation handler, read from the environment.
#[derive(Derivative, Clone, clap::Parser)]
#[derivative(Debug)]
#[clap(author, about, version)]
pub struct Settings {
    /// Environment in which the function runs.
    #[clap(
        long = "environment",
        env = "LAMBDA_ENV",
        value_enum,
        default_value = "production"
    )]
    pub environment: Environment,
    /// Handling of an Authorization header which cannot be decoded.
    #[clap(
        long = "token-policy",
        env = "TOKEN_POLICY",
        value_enum,
        default_value = "ignore"
    )]
    pub token_policy: TokenPolicy,
    /// Slack incoming webhook which is notified of failed invocations.
    #[derivative(Debug = "ignore")]
    #[clap(long = "slack-webhook-url", env = "SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: Option<url::Url>,
    /// Time allowed to send a failure notification before it's abandoned.
    #[clap(long = "notify-timeout", env = "NOTIFY_TIMEOUT", default_value = "5s")]
    #[arg(value_parser = humantime::parse_duration)]
    pub notify_timeout: std::time::Duration,
    #[clap(flatten)]
    pub log: LogArgs,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            token_policy: TokenPolicy::Ignore,
            slack_webhook_url: None,
            notify_timeout: std::time::Duration::from_secs(5),
            log: LogArgs::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, clap::Error> {
        <Self as clap::Parser>::try_parse_from(["lambda"])
    }

    /// Build the notification Sender, which is disabled when no webhook is configured.
    pub fn sender(&self) -> Sender {
        match &self.slack_webhook_url {
            Some(url) => Sender::slack(url.clone(), reqwest::Client::new()),
            None => Sender::Disabled,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::LogFormat;

    #[test]
    #[serial_test::serial]
    fn test_settings_from_env() {
        std::env::set_var("LAMBDA_ENV", "test");
        std::env::set_var("TOKEN_POLICY", "reject");
        std::env::set_var("SLACK_WEBHOOK_URL", "https://hooks.example.com/services/T0/B0/secret");
        std::env::set_var("LOG_FORMAT", "text");
        std::env::set_var("NOTIFY_TIMEOUT", "1500ms");

        let settings = Settings::from_env();

        for var in [
            "LAMBDA_ENV",
            "TOKEN_POLICY",
            "SLACK_WEBHOOK_URL",
            "LOG_FORMAT",
            "NOTIFY_TIMEOUT",
        ] {
            std::env::remove_var(var);
        }
        let settings = settings.unwrap();

        assert_eq!(settings.environment, Environment::Test);
        assert_eq!(settings.token_policy, TokenPolicy::Reject);
        assert_eq!(settings.log.format, LogFormat::Text);
        assert_eq!(settings.notify_timeout, std::time::Duration::from_millis(1500));
        assert!(matches!(settings.sender(), Sender::Slack(_)));
        assert!(!format!("{settings:?}").contains("secret"));
    }

    #[test]
    #[serial_test::serial]
    fn test_settings_defaults() {
        let settings = Settings::from_env().unwrap();

        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.token_policy, TokenPolicy::Ignore);
        assert_eq!(settings.notify_timeout, std::time::Duration::from_secs(5));
        assert!(matches!(settings.sender(), Sender::Disabled));
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_settings() {
        std::env::set_var("TOKEN_POLICY", "sometimes");
        let result = Settings::from_env();
        std::env::remove_var("TOKEN_POLICY");

        assert!(result.is_err());
    }
}
