//! Client for the external markup translation service, which converts
//! between Discord markdown and contentapi markup dialects. A failure here
//! aborts the enclosing mirror attempt for that one event.

use {thiserror::Error as ThisError, url::Url};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("markup service returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

const TO_CONTENTAPI_ROUTE: &str = "discord2contentapi";
const TO_DISCORD_ROUTE: &str = "contentapi2discord";

/// Plain request/response client for the translation endpoints.
#[derive(Clone)]
pub struct MarkupClient {
    http: reqwest::Client,
    base: Url,
}

impl MarkupClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// Build a client for `http://{domain}`.
    pub fn for_domain(domain: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(&format!("http://{domain}"))?))
    }

    async fn translate(&self, route: &str, query: &[(&str, &str)], text: &str) -> Result<String> {
        let url = format!("{}/{route}", self.base.as_str().trim_end_matches('/'));
        let resp = self
            .http
            .post(url)
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(text.to_string())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(resp.text().await?)
    }

    /// Discord markdown → contentapi markup.
    pub async fn to_contentapi(&self, text: &str) -> Result<String> {
        self.translate(TO_CONTENTAPI_ROUTE, &[], text).await
    }

    /// contentapi markup (in `lang`) → Discord markdown.
    pub async fn to_discord(&self, text: &str, lang: &str) -> Result<String> {
        self.translate(TO_DISCORD_ROUTE, &[("lang", lang)], text)
            .await
    }
}
