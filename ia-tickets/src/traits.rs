use crate::types::{RemoteTicket, TicketSystem};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RemoteTicketSink: Send + Sync {
    fn system(&self) -> TicketSystem;

    /// Create the remote item. `Ok(None)` means the remote answered with an
    /// unexpected status; the caller keeps the ticket local-only.
    async fn create_ticket(&self, title: &str, description: &str) -> Result<Option<RemoteTicket>>;
}
