use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
    url::Url,
};

use crate::{Error, Result};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// A channel webhook as returned by the Discord API. `token` is only
/// present on webhooks the bot is allowed to execute.
#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    pub id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<WebhookOwner>,
}

/// The identity that created a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookOwner {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
}

/// Parameters for executing a webhook post.
#[derive(Debug, Serialize)]
pub struct WebhookPost<'a> {
    pub content: &'a str,
    pub username: &'a str,
    pub avatar_url: &'a str,
}

#[derive(Deserialize)]
struct PostedMessage {
    id: String,
}

#[derive(Serialize)]
struct CreateWebhook<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct EditMessage<'a> {
    content: &'a str,
}

/// Minimal Discord REST client for the webhook lifecycle.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    base: Url,
    token: Secret<String>,
}

impl DiscordClient {
    #[allow(clippy::expect_used)]
    pub fn new(token: Secret<String>) -> Self {
        // The default base is a valid constant URL.
        let base = Url::parse(DEFAULT_API_BASE).expect("default api base parses");
        Self::with_base(base, token)
    }

    pub fn with_base(base: Url, token: Secret<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{path}", self.base.as_str().trim_end_matches('/'))
    }

    fn bot_auth(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Status { status, body })
    }

    /// The bot application's own user, used to recognize its webhooks.
    pub async fn current_user(&self) -> Result<CurrentUser> {
        let resp = self
            .http
            .get(self.api("users/@me"))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn channel_webhooks(&self, channel_id: &str) -> Result<Vec<Webhook>> {
        let resp = self
            .http
            .get(self.api(&format!("channels/{channel_id}/webhooks")))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn create_webhook(&self, channel_id: &str, name: &str) -> Result<Webhook> {
        debug!(channel_id, name, "creating webhook");
        let resp = self
            .http
            .post(self.api(&format!("channels/{channel_id}/webhooks")))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .json(&CreateWebhook { name })
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Fetch one webhook by id, including its execute token.
    pub async fn webhook(&self, webhook_id: &str) -> Result<Webhook> {
        let resp = self
            .http
            .get(self.api(&format!("webhooks/{webhook_id}")))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Post as the webhook and return the new message id (`wait=true`).
    pub async fn execute_webhook(
        &self,
        webhook_id: &str,
        token: &str,
        post: &WebhookPost<'_>,
    ) -> Result<String> {
        let resp = self
            .http
            .post(self.api(&format!("webhooks/{webhook_id}/{token}")))
            .query(&[("wait", "true")])
            .json(post)
            .send()
            .await?;
        let posted: PostedMessage = Self::check(resp).await?.json().await?;
        Ok(posted.id)
    }

    pub async fn edit_webhook_message(
        &self,
        webhook_id: &str,
        token: &str,
        message_id: &str,
        content: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .patch(self.api(&format!("webhooks/{webhook_id}/{token}/messages/{message_id}")))
            .json(&EditMessage { content })
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn delete_webhook_message(
        &self,
        webhook_id: &str,
        token: &str,
        message_id: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .delete(self.api(&format!("webhooks/{webhook_id}/{token}/messages/{message_id}")))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn client(server: &mockito::Server) -> DiscordClient {
        DiscordClient::with_base(
            Url::parse(&server.url()).unwrap(),
            Secret::new("bot-token".into()),
        )
    }

    #[tokio::test]
    async fn current_user_sends_bot_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/@me")
            .match_header("authorization", "Bot bot-token")
            .with_status(200)
            .with_body(r#"{"id": "999"}"#)
            .create_async()
            .await;

        assert_eq!(client(&server).current_user().await.unwrap().id, "999");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn execute_webhook_waits_and_returns_message_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhooks/wh1/tok")
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "content": "hi",
                "username": "ann",
            })))
            .with_status(200)
            .with_body(r#"{"id": "m1", "channel_id": "c1"}"#)
            .create_async()
            .await;

        let id = client(&server)
            .execute_webhook(
                "wh1",
                "tok",
                &WebhookPost {
                    content: "hi",
                    username: "ann",
                    avatar_url: "https://example.com/a.webp",
                },
            )
            .await
            .unwrap();
        assert_eq!(id, "m1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn edit_and_delete_hit_message_routes() {
        let mut server = mockito::Server::new_async().await;
        let edit = server
            .mock("PATCH", "/webhooks/wh1/tok/messages/m1")
            .with_status(200)
            .with_body(r#"{"id": "m1"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/webhooks/wh1/tok/messages/m1")
            .with_status(204)
            .create_async()
            .await;

        let client = client(&server);
        client
            .edit_webhook_message("wh1", "tok", "m1", "hi there")
            .await
            .unwrap();
        client
            .delete_webhook_message("wh1", "tok", "m1")
            .await
            .unwrap();
        edit.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn missing_webhook_is_a_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/webhooks/gone")
            .with_status(404)
            .with_body(r#"{"message": "Unknown Webhook"}"#)
            .create_async()
            .await;

        let err = client(&server).webhook("gone").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
    }
}
