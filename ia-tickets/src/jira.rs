use crate::traits::RemoteTicketSink;
use crate::types::{RemoteTicket, TicketSystem};
use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Clone)]
pub struct JiraIssueSink {
    http: reqwest::Client,
    base_url: String,
    email: String,
    token: String,
    project: String,
}

impl JiraIssueSink {
    pub fn new(base_url: &str, email: &str, token: &str, project: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow!("jira url must start with http:// or https://"));
        }
        let (email, token, project) = (email.trim(), token.trim(), project.trim());
        if email.is_empty() || token.is_empty() || project.is_empty() {
            return Err(anyhow!("jira email, token and project are required"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            email: email.to_string(),
            token: token.to_string(),
            project: project.to_string(),
        })
    }

    fn issue_url(&self) -> String {
        format!("{}/rest/api/3/issue", self.base_url)
    }

    fn auth_header(&self) -> String {
        let raw = format!("{}:{}", self.email, self.token);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

#[async_trait::async_trait]
impl RemoteTicketSink for JiraIssueSink {
    fn system(&self) -> TicketSystem {
        TicketSystem::Jira
    }

    #[tracing::instrument(level = "info", skip_all, fields(project = %self.project))]
    async fn create_ticket(&self, title: &str, description: &str) -> Result<Option<RemoteTicket>> {
        let resp = self
            .http
            .post(self.issue_url())
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(&issue_payload(&self.project, title, description))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "jira issue not created");
            return Ok(None);
        }

        let body: Value = resp.json().await?;
        let issue = parse_issue(&body);
        if issue.is_none() {
            tracing::warn!("jira issue response missing key");
        }
        Ok(issue)
    }
}

/// Jira Cloud wants descriptions as Atlassian Document Format.
fn issue_payload(project: &str, title: &str, description: &str) -> Value {
    json!({
        "fields": {
            "project": { "key": project },
            "summary": title,
            "description": {
                "type": "doc",
                "version": 1,
                "content": [{
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": description }],
                }],
            },
            "issuetype": { "name": "Task" },
        }
    })
}

fn parse_issue(body: &Value) -> Option<RemoteTicket> {
    let key = body.get("key").and_then(Value::as_str)?;
    Some(RemoteTicket {
        external_id: key.to_string(),
        external_url: body.get("self").and_then(Value::as_str).map(str::to_string),
    })
}
