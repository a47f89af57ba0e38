use anyhow::Context;

/// Message is the payload of a failure notification: the error message
/// when there is one, or else the whole normalized error.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Object(serde_json::Value),
}

impl Message {
    pub fn render(&self) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Object(value) => value.to_string(),
        }
    }
}

pub trait Notifier: std::fmt::Debug + Send + Sync + 'static {
    fn notify<'s>(
        &'s self,
        message: Message,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 's;
}

/// Posts notifications to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackSender {
    webhook_url: url::Url,
    http_client: reqwest::Client,
}

impl SlackSender {
    async fn send(&self, message: Message) -> anyhow::Result<()> {
        let Self {
            webhook_url,
            http_client,
        } = self;

        http_client
            .post(webhook_url.clone())
            .json(&serde_json::json!({ "text": message.render() }))
            .send()
            .await
            .context("calling Slack webhook")?
            .error_for_status()
            .context("Slack webhook rejected the notification")?;

        tracing::debug!("sent failure notification to Slack");
        Ok(())
    }
}

#[derive(Debug)]
pub enum Sender {
    Disabled,
    Slack(SlackSender),
}

impl Sender {
    pub fn slack(webhook_url: url::Url, http_client: reqwest::Client) -> Sender {
        Sender::Slack(SlackSender {
            webhook_url,
            http_client,
        })
    }
}

impl Notifier for Sender {
    async fn notify<'s>(&'s self, message: Message) -> anyhow::Result<()> {
        match self {
            Sender::Disabled => {
                tracing::warn!(
                    notification = %message.render(),
                    "skipping failure notification (disabled)"
                );
                Ok(())
            }
            Sender::Slack(slack) => slack.send(message).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_rendering() {
        assert_eq!(Message::Text("boom".to_string()).render(), "boom");
        assert_eq!(
            Message::Object(json!({"message": "", "statusCode": 500})).render(),
            r#"{"message":"","statusCode":500}"#
        );
    }

    #[tokio::test]
    async fn test_disabled_sender_succeeds() {
        Sender::Disabled
            .notify(Message::Text("boom".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        // Nothing listens on the discard port.
        let sender = Sender::slack(
            "http://127.0.0.1:9/hooks".parse().unwrap(),
            reqwest::Client::new(),
        );
        let err = sender
            .notify(Message::Text("boom".to_string()))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("calling Slack webhook"), "{err:#}");
    }
}
