use axum::{
    routing::{get, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    buy_tickets, cancel_event, cancel_purchase, create_event, get_event, health_check,
    list_events, list_purchases, treasury_view, AppState,
};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(create_event).get(list_events))
        .route("/events/:event_id", get(get_event))
        .route(
            "/events/:event_id/purchases",
            post(buy_tickets).get(list_purchases),
        )
        .route("/events/:event_id/refunds", post(cancel_purchase))
        .route("/events/:event_id/cancellation", post(cancel_event))
        .route("/treasury", get(treasury_view))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
