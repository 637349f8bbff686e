pub mod chat;
pub mod data;
pub mod health;
pub mod tickets;
pub mod tools;

use axum::Router;

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())
        .merge(tools::router())
        .merge(data::router())
        .merge(tickets::router())
}
