// SPDX-License-Identifier: MIT

//! Thin HTTP client over `ashd`'s §6.1 surface. The daemon-client pattern
//! this generalizes from talks to a Unix socket; this one talks to a base
//! URL, but keeps the same shape: one struct, one error type, one method
//! per operation.

use ash_core::agent::Agent;
use ash_core::session::Session;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct AshClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AshClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), api_key }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => format!("request failed with status {status}"),
        };
        Err(ClientError::Api { status, message })
    }

    pub async fn deploy_agent(&self, name: &str, path: &str) -> Result<Agent, ClientError> {
        let resp = self
            .request(reqwest::Method::POST, "/api/agents")
            .json(&json!({ "name": name, "path": path }))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        let resp = self.request(reqwest::Method::GET, "/api/agents").send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete_agent(&self, name: &str) -> Result<(), ClientError> {
        let path = format!("/api/agents/{name}");
        let resp = self.request(reqwest::Method::DELETE, &path).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn create_session(&self, agent: &str) -> Result<Session, ClientError> {
        let resp =
            self.request(reqwest::Method::POST, "/api/sessions").json(&json!({ "agent": agent })).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn list_sessions(&self, agent: Option<&str>) -> Result<Vec<Session>, ClientError> {
        let mut path = "/api/sessions".to_string();
        if let Some(agent) = agent {
            path.push_str("?agent=");
            path.push_str(agent);
        }
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn get_session(&self, id: &str) -> Result<Session, ClientError> {
        let path = format!("/api/sessions/{id}");
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn pause_session(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/sessions/{id}/pause");
        let resp = self.request(reqwest::Method::POST, &path).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn resume_session(&self, id: &str) -> Result<Session, ClientError> {
        let path = format!("/api/sessions/{id}/resume");
        let resp = self.request(reqwest::Method::POST, &path).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn end_session(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/sessions/{id}");
        let resp = self.request(reqwest::Method::DELETE, &path).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Streams `event: <name>\n data: <json>\n\n` SSE records to `on_event`
    /// as they arrive, same framing `ash-backend`'s remote backend parses.
    pub async fn send_message(
        &self,
        id: &str,
        content: &str,
        mut on_event: impl FnMut(&str, &str),
    ) -> Result<(), ClientError> {
        let path = format!("/api/sessions/{id}/messages");
        let resp = self
            .request(reqwest::Method::POST, &path)
            .json(&json!({ "content": content }))
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let mut byte_stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(idx) = buf.find("\n\n") {
                let record = buf[..idx].to_string();
                buf.drain(..idx + 2);
                let (event_name, data) = parse_sse_record(&record);
                on_event(event_name, data);
            }
        }
        Ok(())
    }
}

/// Splits one `event: <name>\n data: <json>` record into its name and data
/// fields, defaulting the name to `"message"` when the server omits it.
fn parse_sse_record(record: &str) -> (&str, &str) {
    let mut event_name = "message";
    let mut data = "";
    for line in record.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = rest.trim();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data = rest.trim();
        }
    }
    (event_name, data)
}
