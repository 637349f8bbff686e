use crate::traits::RemoteTicketSink;
use crate::types::{RemoteTicket, TicketSystem};
use anyhow::{Result, anyhow};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const TRELLO_CARDS_URL: &str = "https://api.trello.com/1/cards";

#[derive(Clone)]
pub struct TrelloCardSink {
    http: reqwest::Client,
    api_key: String,
    token: String,
    list_id: String,
}

impl TrelloCardSink {
    pub fn new(api_key: &str, token: &str, list_id: &str) -> Result<Self> {
        let api_key = api_key.trim();
        let token = token.trim();
        let list_id = list_id.trim();
        if api_key.is_empty() || token.is_empty() || list_id.is_empty() {
            return Err(anyhow!("trello api key, token and list id are required"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            token: token.to_string(),
            list_id: list_id.to_string(),
        })
    }

    fn query<'a>(&'a self, title: &'a str, description: &'a str) -> [(&'static str, &'a str); 5] {
        [
            ("key", self.api_key.as_str()),
            ("token", self.token.as_str()),
            ("idList", self.list_id.as_str()),
            ("name", title),
            ("desc", description),
        ]
    }
}

#[async_trait::async_trait]
impl RemoteTicketSink for TrelloCardSink {
    fn system(&self) -> TicketSystem {
        TicketSystem::Trello
    }

    #[tracing::instrument(level = "info", skip_all, fields(list_id = %self.list_id))]
    async fn create_ticket(&self, title: &str, description: &str) -> Result<Option<RemoteTicket>> {
        let resp = self
            .http
            .post(TRELLO_CARDS_URL)
            .query(&self.query(title, description))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "trello card not created");
            return Ok(None);
        }

        let body: Value = resp.json().await?;
        let card = parse_card(&body);
        if card.is_none() {
            tracing::warn!("trello card response missing id");
        }
        Ok(card)
    }
}

fn parse_card(body: &Value) -> Option<RemoteTicket> {
    let id = body.get("id").and_then(Value::as_str)?;
    Some(RemoteTicket {
        external_id: id.to_string(),
        external_url: body.get("url").and_then(Value::as_str).map(str::to_string),
    })
}
