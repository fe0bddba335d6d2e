use crate::error::{BackendError, Result};
use crate::traits::ConversationBackend;
use crate::types::{ResponseEnvelope, Role, SessionId};
use async_trait::async_trait;
use serde::Deserialize;

/// Upper bound for one conversational turn, backend thinking time included.
const PER_TURN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PER_TURN_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let req = self.http.post(url);
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }

    async fn checked_body(resp: reqwest::Response, what: &str) -> Result<String> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::Http(format!(
                "{what} failed: status={status} body={body}"
            )));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: String,
}

#[async_trait]
impl ConversationBackend for BackendClient {
    #[tracing::instrument(level = "info", skip_all)]
    async fn create_session(&self) -> Result<SessionId> {
        let resp = self.request(self.api_url("/v1/sessions")).send().await?;
        let body = Self::checked_body(resp, "session create").await?;
        let created: CreatedSession = serde_json::from_str(&body)?;
        Ok(SessionId::new(created.id))
    }

    #[tracing::instrument(level = "info", skip_all, fields(session = %session))]
    async fn send_message(
        &self,
        session: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<ResponseEnvelope> {
        let url = self.api_url(&format!("/v1/sessions/{session}/messages"));
        let payload = serde_json::json!({ "role": role.as_str(), "content": content });
        let resp = self.request(url).json(&payload).send().await?;
        let body = Self::checked_body(resp, "message send").await?;
        let envelope: ResponseEnvelope = serde_json::from_str(&body)?;
        Ok(envelope)
    }
}
