use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
    url::Url,
};

use crate::{Error, Result};

/// Size requested for rendered avatar images.
pub const DEFAULT_AVATAR_SIZE: u32 = 100;

/// Authenticated client for a contentapi instance.
///
/// `base` is the API root, e.g. `https://example.com/api`.
#[derive(Clone)]
pub struct ContentApiClient {
    http: reqwest::Client,
    base: Url,
    token: Secret<String>,
}

#[derive(Serialize)]
struct WritePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    text: &'a str,
    contentid: i64,
    values: WriteValues<'a>,
}

/// contentapi message auxiliary values: `n` nickname, `m` markup language,
/// `a` avatar hash.
#[derive(Serialize)]
struct WriteValues<'a> {
    n: &'a str,
    m: &'a str,
    a: &'a str,
}

#[derive(Deserialize)]
struct WrittenMessage {
    id: i64,
}

#[derive(Deserialize)]
struct CurrentUser {
    id: i64,
}

#[derive(Deserialize)]
struct UploadedFile {
    hash: String,
}

impl ContentApiClient {
    pub fn new(base: Url, token: Secret<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token,
        }
    }

    /// Build a client for `https://{domain}/api`.
    pub fn for_domain(domain: &str, token: Secret<String>) -> Result<Self> {
        let base = Url::parse(&format!("https://{domain}/api"))?;
        Ok(Self::new(base, token))
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{path}", self.base.as_str().trim_end_matches('/'))
    }

    /// Public URL of an uploaded file.
    pub fn file_url(&self, hash: &str) -> String {
        self.api(&format!("File/raw/{hash}"))
    }

    /// Public URL of a user avatar, cropped to `size`.
    pub fn avatar_url(&self, hash: &str, size: u32) -> String {
        format!("{}?size={size}&crop=true", self.file_url(hash))
    }

    /// Live event stream URL (`wss` for an `https` base).
    pub fn live_socket_url(&self) -> Result<String> {
        let mut url = self.base.clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(Error::message(format!("unsupported scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::message("cannot switch url scheme"))?;
        Ok(format!(
            "{}/live/ws?token={}",
            url.as_str().trim_end_matches('/'),
            self.token.expose_secret()
        ))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Status { status, body })
    }

    async fn post_message(&self, payload: &WritePayload<'_>) -> Result<i64> {
        let resp = self
            .http
            .post(self.api("Write/message"))
            .bearer_auth(self.token.expose_secret())
            .json(payload)
            .send()
            .await?;
        let written: WrittenMessage = Self::check(resp).await?.json().await?;
        Ok(written.id)
    }

    /// Post a new message to a room, returning its id.
    pub async fn write_message(
        &self,
        room_id: i64,
        text: &str,
        nickname: &str,
        avatar: &str,
        markup: &str,
    ) -> Result<i64> {
        debug!(room_id, "writing contentapi message");
        self.post_message(&WritePayload {
            id: None,
            text,
            contentid: room_id,
            values: WriteValues {
                n: nickname,
                m: markup,
                a: avatar,
            },
        })
        .await
    }

    /// Edit an existing message (a write with the id set).
    pub async fn edit_message(
        &self,
        message_id: i64,
        room_id: i64,
        text: &str,
        nickname: &str,
        avatar: &str,
        markup: &str,
    ) -> Result<i64> {
        debug!(message_id, room_id, "editing contentapi message");
        self.post_message(&WritePayload {
            id: Some(message_id),
            text,
            contentid: room_id,
            values: WriteValues {
                n: nickname,
                m: markup,
                a: avatar,
            },
        })
        .await
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<()> {
        debug!(message_id, "deleting contentapi message");
        let resp = self
            .http
            .post(self.api(&format!("Delete/message/{message_id}")))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// The relay account's own user id, used to filter reflected events.
    pub async fn current_user_id(&self) -> Result<i64> {
        let resp = self
            .http
            .get(self.api("User/me"))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        let user: CurrentUser = Self::check(resp).await?.json().await?;
        Ok(user.id)
    }

    /// Upload a file into `bucket`, returning its content hash.
    pub async fn upload_file(&self, bucket: &str, bytes: Vec<u8>, filename: &str) -> Result<String> {
        debug!(bucket, filename, size = bytes.len(), "uploading file");
        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
        );
        if !bucket.is_empty() {
            form = form
                .text("globalPerms", ".")
                .text("values[bucket]", bucket.to_string());
        }

        let resp = self
            .http
            .post(self.api("File"))
            .bearer_auth(self.token.expose_secret())
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadedFile = Self::check(resp).await?.json().await?;
        Ok(uploaded.hash)
    }
}
