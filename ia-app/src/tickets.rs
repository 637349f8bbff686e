//! Support tickets stored next to the sales tables.
//!
//! Tickets are always saved locally first. When an external system is
//! requested and configured, the ticket is pushed there best-effort and the
//! remote id and URL are recorded on success.

use ia_tickets::{TicketIntegrations, TicketSystem};
use ia_tools::{SalesDb, ToolError};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: String,
    pub updated_at: String,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub integrate_with: Option<TicketSystem>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

const SELECT_TICKET: &str = "SELECT id, title, description, status, priority, created_at, updated_at, external_id, external_url FROM support_tickets";

#[derive(Debug, Clone)]
pub struct TicketStore {
    db: SalesDb,
    integrations: TicketIntegrations,
}

impl TicketStore {
    pub fn new(db: SalesDb, integrations: TicketIntegrations) -> Self {
        Self { db, integrations }
    }

    pub fn integrations(&self) -> &TicketIntegrations {
        &self.integrations
    }

    #[tracing::instrument(level = "info", skip_all, fields(integrate_with = ?ticket.integrate_with))]
    pub async fn create(&self, ticket: NewTicket) -> ia_tools::Result<Ticket> {
        let (title, description, priority) = (
            ticket.title.clone(),
            ticket.description.clone(),
            ticket.priority,
        );
        let id = self
            .db
            .write(move |conn| {
                conn.execute(
                    "INSERT INTO support_tickets (title, description, priority) VALUES (?1, ?2, ?3)",
                    params![title, description, priority.as_str()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        tracing::info!(ticket_id = id, priority = priority.as_str(), "support ticket stored");

        let remote = match ticket.integrate_with {
            Some(system) => {
                self.integrations
                    .push(system, &ticket.title, &ticket.description)
                    .await
            }
            None => None,
        };
        if let Some(remote) = remote {
            self.db
                .write(move |conn| {
                    conn.execute(
                        "UPDATE support_tickets SET external_id = ?1, external_url = ?2 WHERE id = ?3",
                        params![remote.external_id, remote.external_url, id],
                    )?;
                    Ok(())
                })
                .await?;
        }

        self.get(id)
            .await?
            .ok_or_else(|| ToolError::ExecutionFailed(format!("ticket {id} vanished after insert")))
    }

    pub async fn list(&self, status: Option<TicketStatus>, limit: i64) -> ia_tools::Result<Vec<Ticket>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.db
            .read(move |conn| {
                let sql = format!(
                    "{SELECT_TICKET} WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.map(TicketStatus::as_str), limit], ticket_row)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> ia_tools::Result<Option<Ticket>> {
        self.db
            .read(move |conn| {
                let sql = format!("{SELECT_TICKET} WHERE id = ?1");
                Ok(conn.query_row(&sql, params![id], ticket_row).optional()?)
            })
            .await
    }

    /// `None` when no ticket has this id.
    pub async fn update(&self, id: i64, update: TicketUpdate) -> ia_tools::Result<Option<Ticket>> {
        let changed = self
            .db
            .write(move |conn| {
                Ok(conn.execute(
                    r#"
UPDATE support_tickets
SET status = COALESCE(?1, status),
    priority = COALESCE(?2, priority),
    updated_at = strftime('%Y-%m-%d %H:%M:%S', 'now')
WHERE id = ?3
"#,
                    params![
                        update.status.map(TicketStatus::as_str),
                        update.priority.map(TicketPriority::as_str),
                        id
                    ],
                )?)
            })
            .await?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(id).await
    }
}

fn ticket_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status: String = row.get(3)?;
    let priority: String = row.get(4)?;
    Ok(Ticket {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: TicketStatus::parse(&status).unwrap_or_else(|| {
            tracing::warn!(%status, "unknown ticket status in database; reading as open");
            TicketStatus::Open
        }),
        priority: TicketPriority::parse(&priority).unwrap_or_default(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        external_id: row.get(7)?,
        external_url: row.get(8)?,
    })
}
