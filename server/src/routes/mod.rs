use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{
    events, health_check, organizers, tickets, tiers, transactions, users,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.cors_allowed_origins))
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/tickets", get(users::list_user_tickets))
        .route(
            "/organizers",
            get(organizers::list_organizers).post(organizers::create_organizer),
        )
        .route("/organizers/featured", get(organizers::featured_organizers))
        .route(
            "/organizers/:id",
            get(organizers::get_organizer)
                .put(organizers::update_organizer)
                .delete(organizers::delete_organizer),
        )
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:id/tiers",
            get(events::list_event_tiers).post(events::create_event_tier),
        )
        .route(
            "/tiers/:id",
            get(tiers::get_tier)
                .put(tiers::update_tier)
                .delete(tiers::delete_tier),
        )
        .route("/tiers/:id/purchase", post(tiers::purchase_ticket))
        .route("/tiers/:id/purchases", post(tiers::purchase_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/:id/cancel", post(tickets::cancel_ticket))
        .route("/tickets/:id/check-in", post(tickets::check_in_ticket))
        .route("/tickets/:id/transfer", post(tickets::transfer_ticket))
        .route("/transactions/:id", get(transactions::get_transaction))
        .route(
            "/transactions/:id/confirm",
            post(transactions::confirm_transaction),
        )
        .route("/transactions/:id/fail", post(transactions::fail_transaction))
}
