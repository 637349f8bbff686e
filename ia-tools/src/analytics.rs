//! Read-only analytics queries.
//!
//! Every function takes validated arguments and returns plain JSON: a scalar,
//! one object, or an array of flat objects with a fixed key order. Aggregates
//! over zero rows come back as `0`, never `null`.

use crate::catalog::OperationKind;
use crate::dates;
use crate::error::Result;
use crate::invocation::ToolInvocation;
use crate::table::Table;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use serde_json::{Value, json};

pub fn execute(conn: &Connection, invocation: &ToolInvocation, now: NaiveDateTime) -> Result<Value> {
    match invocation.kind {
        OperationKind::RowCount => row_count(conn, invocation.table()?).map(Value::from),
        OperationKind::RecentRecords => {
            recent_records(conn, invocation.table()?, invocation.integer("limit")?)
                .map(Value::Array)
        }
        OperationKind::SalesStats => sales_stats(conn),
        OperationKind::OrderStats => order_stats(conn, &DateRange::from_invocation(invocation)),
        OperationKind::SearchOrders => {
            search_orders(conn, &OrderSearch::from_invocation(invocation)?).map(Value::Array)
        }
        OperationKind::TopProducts => {
            top_products(conn, invocation.integer("limit")?).map(Value::Array)
        }
        OperationKind::TopCustomers => {
            top_customers(conn, invocation.integer("limit")?).map(Value::Array)
        }
        OperationKind::UserDetails => Ok(user_details(conn, invocation.integer("user_id")?)?
            .unwrap_or(Value::Null)),
        OperationKind::RevenueByPeriod => {
            revenue_by_period(conn, invocation.integer("days")?, now)
        }
        OperationKind::DailyRevenue => {
            daily_revenue(conn, invocation.integer("days")?, now).map(Value::Array)
        }
        OperationKind::AverageOrderValue => average_order_value(conn),
    }
}

pub fn row_count(conn: &Connection, table: Table) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

pub fn recent_records(conn: &Connection, table: Table, limit: i64) -> Result<Vec<Value>> {
    match table {
        Table::Users => collect(
            conn,
            "SELECT id, name, email, created_at FROM users ORDER BY created_at DESC, id DESC LIMIT ?1",
            params![limit],
            user_row,
        ),
        Table::Orders => collect(
            conn,
            "SELECT id, user_id, product, amount, created_at FROM orders ORDER BY created_at DESC, id DESC LIMIT ?1",
            params![limit],
            order_row,
        ),
        Table::Sales => collect(
            conn,
            "SELECT id, order_id, revenue, created_at FROM sales ORDER BY created_at DESC, id DESC LIMIT ?1",
            params![limit],
            sale_row,
        ),
    }
}

pub fn sales_stats(conn: &Connection) -> Result<Value> {
    let (total, avg, max, min, count): (f64, f64, f64, f64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(revenue), 0.0), COALESCE(AVG(revenue), 0.0), COALESCE(MAX(revenue), 0.0), COALESCE(MIN(revenue), 0.0), COUNT(*) FROM sales",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;
    Ok(json!({
        "total_sales": money(total),
        "avg_sales": money(avg),
        "max_sale": money(max),
        "min_sale": money(min),
        "sale_count": count,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive, storage format.
    pub start: Option<String>,
    /// Exclusive, storage format.
    pub end: Option<String>,
}

impl DateRange {
    fn from_invocation(invocation: &ToolInvocation) -> Self {
        Self {
            start: dates::lower_bound("start_date", invocation.optional_str("start_date")),
            end: dates::upper_bound_exclusive("end_date", invocation.optional_str("end_date")),
        }
    }
}

pub fn order_stats(conn: &Connection, range: &DateRange) -> Result<Value> {
    let (total, avg, max, min, count): (f64, f64, f64, f64, i64) = conn.query_row(
        r#"
SELECT
  COALESCE(SUM(amount), 0.0),
  COALESCE(AVG(amount), 0.0),
  COALESCE(MAX(amount), 0.0),
  COALESCE(MIN(amount), 0.0),
  COUNT(*)
FROM orders
WHERE (?1 IS NULL OR created_at >= ?1)
  AND (?2 IS NULL OR created_at < ?2)
"#,
        params![range.start.as_deref(), range.end.as_deref()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;
    Ok(json!({
        "total_amount": money(total),
        "avg_amount": money(avg),
        "max_amount": money(max),
        "min_amount": money(min),
        "order_count": count,
    }))
}

#[derive(Debug, Clone, Default)]
pub struct OrderSearch {
    pub product: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub range: DateRange,
    pub limit: i64,
}

impl OrderSearch {
    fn from_invocation(invocation: &ToolInvocation) -> Result<Self> {
        Ok(Self {
            product: invocation.optional_str("product").map(str::to_string),
            min_amount: invocation.optional_f64("min_amount"),
            max_amount: invocation.optional_f64("max_amount"),
            range: DateRange::from_invocation(invocation),
            limit: invocation.integer("limit")?,
        })
    }
}

pub fn search_orders(conn: &Connection, search: &OrderSearch) -> Result<Vec<Value>> {
    let pattern = search.product.as_deref().map(like_pattern);
    collect(
        conn,
        r#"
SELECT id, user_id, product, amount, created_at
FROM orders
WHERE (?1 IS NULL OR product LIKE ?1 ESCAPE '\')
  AND (?2 IS NULL OR amount >= ?2)
  AND (?3 IS NULL OR amount <= ?3)
  AND (?4 IS NULL OR created_at >= ?4)
  AND (?5 IS NULL OR created_at < ?5)
ORDER BY created_at DESC, id DESC
LIMIT ?6
"#,
        params![
            pattern,
            search.min_amount,
            search.max_amount,
            search.range.start.as_deref(),
            search.range.end.as_deref(),
            search.limit,
        ],
        order_row,
    )
}

pub fn top_products(conn: &Connection, limit: i64) -> Result<Vec<Value>> {
    collect(
        conn,
        r#"
SELECT product, COUNT(*) AS order_count, COALESCE(SUM(amount), 0.0) AS total_amount
FROM orders
GROUP BY product
ORDER BY order_count DESC, total_amount DESC, product ASC
LIMIT ?1
"#,
        params![limit],
        |row| {
            Ok(json!({
                "product": row.get::<_, String>(0)?,
                "order_count": row.get::<_, i64>(1)?,
                "total_amount": money(row.get(2)?),
            }))
        },
    )
}

pub fn top_customers(conn: &Connection, limit: i64) -> Result<Vec<Value>> {
    collect(
        conn,
        r#"
SELECT u.id, u.name, u.email, COUNT(o.id) AS order_count, COALESCE(SUM(o.amount), 0.0) AS total_spent
FROM users u
JOIN orders o ON o.user_id = u.id
GROUP BY u.id, u.name, u.email
ORDER BY order_count DESC, total_spent DESC, u.id ASC
LIMIT ?1
"#,
        params![limit],
        |row| {
            Ok(json!({
                "user_id": row.get::<_, i64>(0)?,
                "name": row.get::<_, String>(1)?,
                "email": row.get::<_, String>(2)?,
                "order_count": row.get::<_, i64>(3)?,
                "total_spent": money(row.get(4)?),
            }))
        },
    )
}

/// `None` when no user has this id.
pub fn user_details(conn: &Connection, user_id: i64) -> Result<Option<Value>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, created_at FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((id, name, email, created_at)) = user else {
        return Ok(None);
    };

    let (order_count, total_spent, last_order_at): (i64, f64, Option<String>) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0.0), MAX(created_at) FROM orders WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(Some(json!({
        "id": id,
        "name": name,
        "email": email,
        "created_at": created_at,
        "order_count": order_count,
        "total_spent": money(total_spent),
        "last_order_at": last_order_at,
    })))
}

pub fn revenue_by_period(conn: &Connection, days: i64, now: NaiveDateTime) -> Result<Value> {
    let cutoff = dates::format_timestamp(now - Duration::days(days.max(1)));
    let (total, count, avg, max): (f64, i64, f64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(revenue), 0.0), COUNT(*), COALESCE(AVG(revenue), 0.0), COALESCE(MAX(revenue), 0.0) FROM sales WHERE created_at >= ?1",
        params![cutoff],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    Ok(json!({
        "total_revenue": money(total),
        "sale_count": count,
        "avg_revenue": money(avg),
        "max_sale": money(max),
    }))
}

/// One row per day that has sales, newest day first. `days` counts today.
pub fn daily_revenue(conn: &Connection, days: i64, now: NaiveDateTime) -> Result<Vec<Value>> {
    let first_day = now.date() - Duration::days(days.max(1) - 1);
    let cutoff = dates::format_timestamp(first_day.and_time(NaiveTime::MIN));
    collect(
        conn,
        r#"
SELECT substr(created_at, 1, 10) AS day, COALESCE(SUM(revenue), 0.0), COUNT(*)
FROM sales
WHERE created_at >= ?1
GROUP BY day
ORDER BY day DESC
"#,
        params![cutoff],
        |row| {
            Ok(json!({
                "day": row.get::<_, String>(0)?,
                "revenue": money(row.get(1)?),
                "sale_count": row.get::<_, i64>(2)?,
            }))
        },
    )
}

pub fn average_order_value(conn: &Connection) -> Result<Value> {
    let avg: f64 = conn.query_row("SELECT COALESCE(AVG(amount), 0.0) FROM orders", [], |row| {
        row.get(0)
    })?;
    Ok(json!({ "average_order_value": money(avg) }))
}

/// Table counts and headline figures for the dashboard.
pub fn data_summary(conn: &Connection) -> Result<Value> {
    let users = row_count(conn, Table::Users)?;
    let orders = row_count(conn, Table::Orders)?;
    let sales = row_count(conn, Table::Sales)?;
    let avg_order_amount: f64 =
        conn.query_row("SELECT COALESCE(AVG(amount), 0.0) FROM orders", [], |row| {
            row.get(0)
        })?;
    let (total_revenue, avg_revenue): (f64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(revenue), 0.0), COALESCE(AVG(revenue), 0.0) FROM sales",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(json!({
        "tables": {
            "users": { "count": users },
            "orders": { "count": orders, "avg_amount": money(avg_order_amount) },
            "sales": {
                "count": sales,
                "total_revenue": money(total_revenue),
                "avg_revenue": money(avg_revenue),
            },
        },
        "summary": {
            "total_users": users,
            "total_orders": orders,
            "total_sales": sales,
            "total_revenue": money(total_revenue),
        },
    }))
}

fn collect<P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<Value>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<Value>,
{
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, map)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "name": row.get::<_, String>(1)?,
        "email": row.get::<_, String>(2)?,
        "created_at": row.get::<_, String>(3)?,
    }))
}

fn order_row(row: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "user_id": row.get::<_, i64>(1)?,
        "product": row.get::<_, String>(2)?,
        "amount": row.get::<_, f64>(3)?,
        "created_at": row.get::<_, String>(4)?,
    }))
}

fn sale_row(row: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "order_id": row.get::<_, i64>(1)?,
        "revenue": money(row.get(2)?),
        "created_at": row.get::<_, String>(3)?,
    }))
}

fn money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
