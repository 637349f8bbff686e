//! External ticket systems for support tickets.
//!
//! Sinks are pure I/O: they push a locally stored ticket to GitHub, Trello or
//! Jira and report the remote id and URL. A failed push never fails the local
//! ticket.

mod github;
mod jira;
mod registry;
mod traits;
mod trello;
mod types;

pub use github::GithubIssueSink;
pub use jira::JiraIssueSink;
pub use registry::TicketIntegrations;
pub use traits::RemoteTicketSink;
pub use trello::TrelloCardSink;
pub use types::{RemoteTicket, TicketSystem};
