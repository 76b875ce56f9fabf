use crate::error::{Error, Result};
use crate::models::{ApiErrorResponse, BatchDeleteRequest, ListMessagesResponse};
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::{debug, instrument};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page `messages.list` will return.
const PAGE_SIZE: &str = "500";

/// `messages.batchDelete` accepts at most this many ids per call.
pub const BATCH_DELETE_LIMIT: usize = 1000;

pub struct GmailClient {
    client: Client,
    token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: String, base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(TIMEOUT).build()?;

        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check_status(resp: Response, operation: &str) -> Result<Response> {
        let status = resp.status();
        match status.as_u16() {
            401 => return Err(Error::InvalidToken("Token expired or invalid".into())),
            429 => return Err(Error::RateLimited),
            500..=599 => return Err(Error::Server(format!("Server error: {}", status))),
            _ if status.is_success() => return Ok(resp),
            _ => {}
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or(body);

        Err(Error::Api {
            operation: operation.into(),
            status: status.as_u16(),
            message,
        })
    }

    /// Ids of every message matching `query`, following pagination.
    #[instrument(skip(self))]
    pub async fn list_message_ids(&self, query: &str) -> Result<Vec<String>> {
        let endpoint = format!("{}/messages", self.base_url);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = {
                let mut params = vec![
                    ("q", query),
                    ("maxResults", PAGE_SIZE),
                    ("includeSpamTrash", "true"),
                ];
                if let Some(token) = page_token.as_deref() {
                    params.push(("pageToken", token));
                }
                Url::parse_with_params(&endpoint, &params)
                    .map_err(|e| Error::Config(format!("invalid API URL {endpoint}: {e}")))?
            };

            debug!(page = ?page_token, "Listing messages");
            let resp = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let resp = Self::check_status(resp, "messages.list").await?;

            let page: ListMessagesResponse = resp.json().await?;
            debug!(
                returned = page.messages.len(),
                estimate = ?page.result_size_estimate,
                "Received page"
            );
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = ids.len(), "Listed messages");
        Ok(ids)
    }

    /// Permanently delete `ids`. Returns how many ids were sent.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn batch_delete(&self, ids: &[String]) -> Result<usize> {
        let url = format!("{}/messages/batchDelete", self.base_url);
        let mut deleted = 0;

        for chunk in ids.chunks(BATCH_DELETE_LIMIT) {
            debug!(chunk = chunk.len(), "Deleting messages");
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .json(&BatchDeleteRequest { ids: chunk })
                .send()
                .await?;
            Self::check_status(resp, "messages.batchDelete").await?;
            deleted += chunk.len();
        }

        Ok(deleted)
    }
}
