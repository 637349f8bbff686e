//! Static registry of the analytics operations the model may call.
//!
//! Each [`OperationSpec`] is the single source of truth for the tool list sent
//! to the model, for argument validation, and for the `/tools` listing.

use crate::table::ALLOWED_TABLES;
use ia_llm::ToolDefinition;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Closed set of operations; dispatch matches on this, never on a name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RowCount,
    RecentRecords,
    SalesStats,
    OrderStats,
    SearchOrders,
    TopProducts,
    TopCustomers,
    UserDetails,
    RevenueByPeriod,
    DailyRevenue,
    AverageOrderValue,
}

impl OperationKind {
    pub fn spec(self) -> &'static OperationSpec {
        // Every kind is registered exactly once in CATALOG.
        CATALOG
            .iter()
            .find(|spec| spec.kind == self)
            .unwrap_or(&CATALOG[0])
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

/// How a result is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeCategory {
    /// A single number.
    Stat,
    /// A list of uniform records.
    Table,
    /// A mapping of named figures.
    Chart,
    /// One record, or nothing.
    Record,
}

#[derive(Debug, Clone)]
pub enum ParamKind {
    /// One of [`ALLOWED_TABLES`], matched case-insensitively.
    Table,
    /// Integer clamped into `min..=max`.
    Integer {
        default: Option<i64>,
        min: i64,
        max: i64,
    },
    /// Integer record identifier. Never clamped: an id outside the stored range
    /// simply matches nothing.
    Key,
    Number,
    Text,
    /// Date or timestamp, parsed permissively at execution time.
    Date,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    fn table(description: &'static str) -> Self {
        Self {
            name: "table",
            kind: ParamKind::Table,
            required: true,
            description,
        }
    }

    fn limit(default: i64, max: i64) -> Self {
        Self {
            name: "limit",
            kind: ParamKind::Integer {
                default: Some(default),
                min: 1,
                max,
            },
            required: false,
            description: "Number of rows to return",
        }
    }

    fn days(default: i64, max: i64, description: &'static str) -> Self {
        Self {
            name: "days",
            kind: ParamKind::Integer {
                default: Some(default),
                min: 1,
                max,
            },
            required: false,
            description,
        }
    }

    fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }

    pub fn json_type(&self) -> &'static str {
        match self.kind {
            ParamKind::Table | ParamKind::Text | ParamKind::Date => "string",
            ParamKind::Integer { .. } | ParamKind::Key => "integer",
            ParamKind::Number => "number",
        }
    }

    /// JSON-schema fragment advertised to the model.
    fn schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.json_type()));
        out.insert("description".to_string(), json!(self.description));
        match &self.kind {
            ParamKind::Table => {
                out.insert("enum".to_string(), json!(ALLOWED_TABLES));
            }
            ParamKind::Integer { default, min, max } => {
                if let Some(default) = default {
                    out.insert("default".to_string(), json!(default));
                }
                out.insert("minimum".to_string(), json!(min));
                out.insert("maximum".to_string(), json!(max));
            }
            ParamKind::Date => {
                out.insert(
                    "description".to_string(),
                    json!(format!("{} (YYYY-MM-DD or ISO 8601 timestamp)", self.description)),
                );
            }
            ParamKind::Key | ParamKind::Number | ParamKind::Text => {}
        }
        Value::Object(out)
    }

    /// Flat description used by the `/tools` listing.
    fn describe(&self) -> Value {
        let mut out = match self.schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        out.insert("required".to_string(), json!(self.required));
        Value::Object(out)
    }
}

#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub shape: ShapeCategory,
    pub returns: &'static str,
}

impl OperationSpec {
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(p.name.to_string(), p.schema());
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters_schema(),
        }
    }

    pub fn describe(&self) -> Value {
        let mut parameters = Map::new();
        for p in &self.params {
            parameters.insert(p.name.to_string(), p.describe());
        }
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": parameters,
            "shape": self.shape,
            "returns": self.returns,
        })
    }
}

static CATALOG: LazyLock<Vec<OperationSpec>> = LazyLock::new(build_catalog);

fn build_catalog() -> Vec<OperationSpec> {
    vec![
        OperationSpec {
            kind: OperationKind::RowCount,
            name: "get_row_count",
            description: "Get total number of rows from a table",
            params: vec![ParamSpec::table("Name of the table to count rows")],
            shape: ShapeCategory::Stat,
            returns: "integer - Total number of rows",
        },
        OperationSpec {
            kind: OperationKind::RecentRecords,
            name: "get_recent_records",
            description: "Get most recent records from a table, newest first",
            params: vec![ParamSpec::table("Name of the table"), ParamSpec::limit(5, 100)],
            shape: ShapeCategory::Table,
            returns: "array - List of recent records",
        },
        OperationSpec {
            kind: OperationKind::SalesStats,
            name: "get_sales_stats",
            description: "Get aggregated sales statistics: total, average, largest and smallest sale revenue and the number of sales",
            params: vec![],
            shape: ShapeCategory::Chart,
            returns: "object - Sales statistics (total_sales, avg_sales, max_sale, min_sale, sale_count)",
        },
        OperationSpec {
            kind: OperationKind::OrderStats,
            name: "get_order_stats",
            description: "Get aggregated order amount statistics, optionally restricted to a date range",
            params: vec![
                ParamSpec::optional("start_date", ParamKind::Date, "Only orders created on or after this date"),
                ParamSpec::optional("end_date", ParamKind::Date, "Only orders created on or before this date"),
            ],
            shape: ShapeCategory::Chart,
            returns: "object - Order statistics (total_amount, avg_amount, max_amount, min_amount, order_count)",
        },
        OperationSpec {
            kind: OperationKind::SearchOrders,
            name: "search_orders",
            description: "Search orders by product name, amount range and date range, newest first",
            params: vec![
                ParamSpec::optional("product", ParamKind::Text, "Case-insensitive substring of the product name"),
                ParamSpec::optional("min_amount", ParamKind::Number, "Minimum order amount"),
                ParamSpec::optional("max_amount", ParamKind::Number, "Maximum order amount"),
                ParamSpec::optional("start_date", ParamKind::Date, "Only orders created on or after this date"),
                ParamSpec::optional("end_date", ParamKind::Date, "Only orders created on or before this date"),
                ParamSpec::limit(20, 100),
            ],
            shape: ShapeCategory::Table,
            returns: "array - Matching orders (id, user_id, product, amount, created_at)",
        },
        OperationSpec {
            kind: OperationKind::TopProducts,
            name: "get_top_products",
            description: "Rank products by number of orders",
            params: vec![ParamSpec::limit(5, 50)],
            shape: ShapeCategory::Table,
            returns: "array - Products with order_count and total_amount, most ordered first",
        },
        OperationSpec {
            kind: OperationKind::TopCustomers,
            name: "get_top_customers",
            description: "Rank customers by number of orders placed",
            params: vec![ParamSpec::limit(5, 50)],
            shape: ShapeCategory::Table,
            returns: "array - Customers with order_count and total_spent, most active first",
        },
        OperationSpec {
            kind: OperationKind::UserDetails,
            name: "get_user_details",
            description: "Look up one user by id, including their order count and total spend",
            params: vec![ParamSpec {
                name: "user_id",
                kind: ParamKind::Key,
                required: true,
                description: "Identifier of the user",
            }],
            shape: ShapeCategory::Record,
            returns: "object or null - User with order_count, total_spent and last_order_at",
        },
        OperationSpec {
            kind: OperationKind::RevenueByPeriod,
            name: "get_revenue_by_period",
            description: "Get sales revenue totals for the last N days",
            params: vec![ParamSpec::days(30, 365, "Size of the window in days, ending now")],
            shape: ShapeCategory::Chart,
            returns: "object - Revenue figures (total_revenue, sale_count, avg_revenue, max_sale)",
        },
        OperationSpec {
            kind: OperationKind::DailyRevenue,
            name: "get_daily_revenue",
            description: "Get revenue per day for the last N days, newest day first",
            params: vec![ParamSpec::days(7, 90, "Number of days to include, ending today")],
            shape: ShapeCategory::Table,
            returns: "array - One row per day with sales (day, revenue, sale_count)",
        },
        OperationSpec {
            kind: OperationKind::AverageOrderValue,
            name: "get_average_order_value",
            description: "Get the average order amount across all orders",
            params: vec![],
            shape: ShapeCategory::Stat,
            returns: "object - average_order_value",
        },
    ]
}

pub fn catalog() -> &'static [OperationSpec] {
    &CATALOG
}

pub fn lookup(name: &str) -> Option<&'static OperationSpec> {
    let name = name.trim();
    CATALOG.iter().find(|spec| spec.name == name)
}

pub fn operation_names() -> Vec<&'static str> {
    CATALOG.iter().map(|spec| spec.name).collect()
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    CATALOG.iter().map(OperationSpec::to_tool_definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_valid_for_providers() {
        let mut seen = HashSet::new();
        for spec in catalog() {
            assert!(seen.insert(spec.name), "duplicate name {}", spec.name);
            ia_llm::validate_tool_name(spec.name).expect("provider-safe tool name");
        }
    }

    #[test]
    fn every_kind_resolves_to_its_own_spec() {
        for spec in catalog() {
            assert_eq!(spec.kind.spec().name, spec.name);
            assert_eq!(lookup(spec.name).map(|s| s.kind), Some(spec.kind));
        }
        assert!(lookup("drop_everything").is_none());
    }

    #[test]
    fn row_count_schema_requires_table_enum() {
        let schema = OperationKind::RowCount.spec().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["table"]));
        assert_eq!(
            schema["properties"]["table"]["enum"],
            json!(["users", "orders", "sales"])
        );
    }

    #[test]
    fn limit_schema_carries_default_and_bounds() {
        let schema = OperationKind::RecentRecords.spec().parameters_schema();
        let limit = &schema["properties"]["limit"];
        assert_eq!(limit["type"], "integer");
        assert_eq!(limit["default"], 5);
        assert_eq!(limit["minimum"], 1);
        assert_eq!(limit["maximum"], 100);
    }

    #[test]
    fn tool_definitions_follow_catalog_order() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, operation_names());
        assert_eq!(names.first(), Some(&"get_row_count"));
    }

    #[test]
    fn describe_marks_required_parameters() {
        let described = OperationKind::RecentRecords.spec().describe();
        assert_eq!(described["parameters"]["table"]["required"], true);
        assert_eq!(described["parameters"]["limit"]["required"], false);
        assert_eq!(described["shape"], "table");
        assert_eq!(described["returns"], "array - List of recent records");
    }
}
