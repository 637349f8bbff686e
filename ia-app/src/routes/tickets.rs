use crate::error::ApiError;
use crate::server::AppState;
use crate::tickets::{DEFAULT_LIST_LIMIT, NewTicket, TicketPriority, TicketStatus, TicketUpdate};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Extension, Json};
use ia_tickets::TicketSystem;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateTicketRequest {
    title: String,
    description: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    integrate_with: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListTicketsQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UpdateTicketRequest {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/ticket/create", post(create_ticket))
        .route("/ticket/list", get(list_tickets))
        .route("/ticket/{id}", get(get_ticket).patch(update_ticket))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_ticket(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|e| {
        ApiError::bad_request(format!("invalid ticket request: {}", e.body_text()))
    })?;
    let title = req.title.trim();
    let description = req.description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(ApiError::bad_request("title and description are required"));
    }

    let priority = match req.priority.as_deref() {
        None => TicketPriority::default(),
        Some(raw) => TicketPriority::parse(raw).unwrap_or_else(|| {
            tracing::debug!(priority = raw, "unknown ticket priority; using medium");
            TicketPriority::default()
        }),
    };
    let integrate_with = req
        .integrate_with
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| {
            let system = TicketSystem::parse(raw);
            if system.is_none() {
                tracing::debug!(integrate_with = raw, "unknown ticket integration ignored");
            }
            system
        });

    let ticket = state
        .tickets
        .create(NewTicket {
            title: title.to_string(),
            description: description.to_string(),
            priority,
            integrate_with,
        })
        .await?;
    let message = match (&ticket.external_id, integrate_with) {
        (Some(_), Some(system)) => format!("Ticket created and synced to {system}"),
        (None, Some(system)) => format!("Ticket created locally; {system} sync did not complete"),
        _ => "Ticket created successfully".to_string(),
    };

    Ok(Json(json!({
        "success": true,
        "ticket": ticket,
        "message": message,
    })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn list_tickets(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(
            TicketStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown ticket status {raw:?}")))?,
        ),
    };
    let tickets = state
        .tickets
        .list(status, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": tickets.len(),
        "tickets": tickets,
    })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn get_ticket(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let ticket = state
        .tickets
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ticket {id} not found")))?;
    Ok(Json(json!({ "success": true, "ticket": ticket })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn update_ticket(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|e| {
        ApiError::bad_request(format!("invalid ticket update: {}", e.body_text()))
    })?;
    let update = TicketUpdate {
        status: req
            .status
            .as_deref()
            .map(|raw| {
                TicketStatus::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown ticket status {raw:?}")))
            })
            .transpose()?,
        priority: req
            .priority
            .as_deref()
            .map(|raw| {
                TicketPriority::parse(raw).ok_or_else(|| {
                    ApiError::bad_request(format!("unknown ticket priority {raw:?}"))
                })
            })
            .transpose()?,
    };

    let ticket = state
        .tickets
        .update(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("ticket {id} not found")))?;
    Ok(Json(json!({ "success": true, "ticket": ticket })))
}
