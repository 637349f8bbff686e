use crate::error::{Result, ToolError};

pub const ALLOWED_TABLES: [&str; 3] = ["users", "orders", "sales"];

/// Tables the analytics layer may read. Table names only ever reach SQL
/// through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Orders,
    Sales,
}

impl Table {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "users" => Ok(Self::Users),
            "orders" => Ok(Self::Orders),
            "sales" => Ok(Self::Sales),
            _ => Err(ToolError::InvalidTable {
                table: raw.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Orders => "orders",
            Self::Sales => "sales",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_match_case_insensitively() {
        assert_eq!(Table::parse("Orders").ok(), Some(Table::Orders));
        assert_eq!(Table::parse("SALES").ok(), Some(Table::Sales));
        assert!(Table::parse("support_tickets").is_err());
        assert!(Table::parse("users; DROP TABLE users").is_err());
    }

    #[test]
    fn every_allowed_name_round_trips() {
        for name in ALLOWED_TABLES {
            assert_eq!(Table::parse(name).map(Table::as_str).ok(), Some(name));
        }
    }
}
