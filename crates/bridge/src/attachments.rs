use {mirrorbot_contentapi::ContentApiClient, tracing::debug};

use crate::Result;

/// Bucket for re-hosted message attachments on contentapi.
const ATTACHMENT_BUCKET: &str = "bridge-attachments";

/// Upload ceiling enforced before downloading attachment bodies.
const MAX_ATTACHMENT_BYTES: u64 = 25_000_000;

/// Content types the contentapi file endpoint accepts.
const ACCEPTED_CONTENT_TYPES: [&str; 8] = [
    "image/bmp",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/tiff",
    "image/webp",
    "image/x-portable-bitmap",
    "image/tga",
];

/// Download `url` and return its raw bytes, failing on a non-2xx status.
pub(crate) async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let resp = http.get(url).send().await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Re-host a Discord attachment on contentapi, returning the public URL of
/// the uploaded copy. When screening rejects the attachment (too large,
/// unknown size, or a content type contentapi will not take), the original
/// URL is passed through unresolved instead of failing the mirror; only an
/// actual upload failure propagates.
pub(crate) async fn rehost_attachment(
    http: &reqwest::Client,
    contentapi: &ContentApiClient,
    url: &str,
) -> Result<String> {
    let (bytes, filename) = match screen(http, url).await {
        Ok(screened) => screened,
        Err(err) => {
            debug!(url, error = %err, "attachment not re-hostable, passing original url");
            return Ok(url.to_string());
        }
    };

    let hash = contentapi
        .upload_file(ATTACHMENT_BUCKET, bytes, &filename)
        .await?;
    Ok(contentapi.file_url(&hash))
}

async fn screen(http: &reqwest::Client, url: &str) -> Result<(Vec<u8>, String)> {
    let resp = http.get(url).send().await?.error_for_status()?;

    let length = resp
        .content_length()
        .ok_or_else(|| crate::Error::message("attachment has no content length"))?;
    if length > MAX_ATTACHMENT_BYTES {
        return Err(crate::Error::message(format!(
            "attachment is {length} bytes, over the {MAX_ATTACHMENT_BYTES} byte ceiling"
        )));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(crate::Error::message(format!(
            "content type {content_type:?} is not accepted"
        )));
    }

    let filename = filename_from_url(url);
    Ok((resp.bytes().await?.to_vec(), filename))
}

/// Last path segment of the attachment URL, without any query string.
fn filename_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

/// Inline reference line appended to mirrored message text, one per
/// attachment. Spoilered filenames get the masking annotation.
pub(crate) fn attachment_line(url: &str, filename: &str) -> String {
    if filename.starts_with("SPOILER_") {
        format!("{{#spoiler !{url}}}")
    } else {
        format!("!{url}")
    }
}
