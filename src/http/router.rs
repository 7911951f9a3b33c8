//! Route table and middleware.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, auth, blocked_dates, bookings, customers, rooms};
use super::state::AppState;
use crate::observability::{status_class, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Request count and latency, labelled by the matched route template so
/// ids do not explode the label set.
async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".into());
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = status_class(response.status().as_u16());
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
    response
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(handlers::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password/{token}", post(auth::reset_password))
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/rooms/{id}",
            get(rooms::get_room).put(rooms::update_room).delete(rooms::delete_room),
        )
        .route("/rooms/{id}/availability", get(rooms::room_calendar))
        // Bookings
        .route("/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/bookings/check-availability", post(bookings::check_availability))
        .route(
            "/bookings/{id}",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::cancel_booking),
        )
        // Blocked dates
        .route(
            "/blocked-dates",
            get(blocked_dates::list_blocked_dates).post(blocked_dates::create_blocked_date),
        )
        .route("/blocked-dates/room/{id}", get(blocked_dates::blocked_dates_for_room))
        .route(
            "/blocked-dates/{id}",
            axum::routing::put(blocked_dates::update_blocked_date).delete(blocked_dates::delete_blocked_date),
        )
        // Customers
        .route("/customers", get(customers::list_customers))
        .route(
            "/customers/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/customers/{id}/bookings", get(customers::customer_bookings))
        .route_layer(middleware::from_fn(track_metrics));

    Router::new()
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
