use crate::traits::RemoteTicketSink;
use crate::types::{RemoteTicket, TicketSystem};
use anyhow::{Result, anyhow};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

const GITHUB_API_BASE: &str = "https://api.github.com";
const SUPPORT_LABEL: &str = "support-ticket";

#[derive(Clone)]
pub struct GithubIssueSink {
    http: reqwest::Client,
    token: String,
    repo: String,
}

impl GithubIssueSink {
    /// `repo` is `owner/name`.
    pub fn new(token: &str, repo: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("github token is required"));
        }
        let repo = repo.trim().trim_matches('/');
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => return Err(anyhow!("github repo must look like owner/name, got {repo:?}")),
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("insight-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: token.to_string(),
            repo: repo.to_string(),
        })
    }

    fn issues_url(&self) -> String {
        format!("{GITHUB_API_BASE}/repos/{}/issues", self.repo)
    }
}

#[async_trait::async_trait]
impl RemoteTicketSink for GithubIssueSink {
    fn system(&self) -> TicketSystem {
        TicketSystem::Github
    }

    #[tracing::instrument(level = "info", skip_all, fields(repo = %self.repo))]
    async fn create_ticket(&self, title: &str, description: &str) -> Result<Option<RemoteTicket>> {
        let resp = self
            .http
            .post(self.issues_url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&issue_payload(title, description))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "github issue not created");
            return Ok(None);
        }

        let body: Value = resp.json().await?;
        let ticket = parse_issue(&body);
        if ticket.is_none() {
            tracing::warn!("github issue response missing number");
        }
        Ok(ticket)
    }
}

fn issue_payload(title: &str, description: &str) -> Value {
    json!({
        "title": title,
        "body": description,
        "labels": [SUPPORT_LABEL],
    })
}

fn parse_issue(body: &Value) -> Option<RemoteTicket> {
    let number = body.get("number").and_then(Value::as_i64)?;
    Some(RemoteTicket {
        external_id: number.to_string(),
        external_url: body
            .get("html_url")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
