//! Sales analytics operations.
//!
//! The catalog is the whole surface the assistant can reach: a fixed set of
//! named, parameterised read-only queries over the `users`, `orders` and
//! `sales` tables. Raw SQL never crosses this boundary.

mod analytics;
mod catalog;
mod dates;
mod db;
mod error;
mod invocation;
mod schema;
mod table;

pub use analytics::{DateRange, OrderSearch};
pub use catalog::{
    OperationKind, OperationSpec, ParamKind, ParamSpec, ShapeCategory, catalog, lookup,
    operation_names, tool_definitions,
};
pub use dates::{ParsedDate, parse_permissive};
pub use db::SalesDb;
pub use error::{Result, ToolError};
pub use invocation::{ToolInvocation, validate_arguments};
pub use table::{ALLOWED_TABLES, Table};
