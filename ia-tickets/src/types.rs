use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSystem {
    Github,
    Trello,
    Jira,
}

impl TicketSystem {
    pub const ALL: [TicketSystem; 3] = [Self::Github, Self::Trello, Self::Jira];

    /// Case-insensitive; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "trello" => Some(Self::Trello),
            "jira" => Some(Self::Jira),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Trello => "trello",
            Self::Jira => "jira",
        }
    }
}

impl fmt::Display for TicketSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTicket {
    pub external_id: String,
    pub external_url: Option<String>,
}
