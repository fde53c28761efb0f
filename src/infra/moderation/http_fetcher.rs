// HTTP attachment fetcher. Requests only the leading byte range of the
// file; that is all the sniffer ever looks at.

use crate::core::moderation::{AttachmentFetcher, FetchError, SNIFF_PREFIX_LEN};
use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};

pub struct HttpAttachmentFetcher {
    client: Client,
}

impl HttpAttachmentFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("FilemodBot/1.0")
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch_prefix(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes=0-{}", SNIFF_PREFIX_LEN - 1))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        // A server that ignores the range answers 200 with the full body;
        // that still counts as success.
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let mut bytes = body.to_vec();
        bytes.truncate(SNIFF_PREFIX_LEN);
        Ok(bytes)
    }
}
