use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::{
    AllocationService, AssignmentLedger, CascadeCoordinator, EnrollmentGate, IngestionService,
    MockNotificationDispatcher, NotificationDispatcher, ReversalService,
};
use domain::store::AllocationStore;
use persistence::PgAllocationStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{
    assignments, audit, enrollment, gift_cards, health, invitations, links, participants,
};

/// Shared handler state. Every service works against the same store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn AllocationStore>,
    /// Present when the store is PostgreSQL; used for pool gauges.
    pub pool: Option<PgPool>,
    pub enrollment: EnrollmentGate,
    pub allocation: AllocationService,
    pub ledger: AssignmentLedger,
    pub reversal: ReversalService,
    pub cascade: CascadeCoordinator,
    pub ingestion: IngestionService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn AllocationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        pool: Option<PgPool>,
    ) -> Self {
        let allocation_config = &config.allocation;
        Self {
            enrollment: EnrollmentGate::new(store.clone()),
            allocation: AllocationService::new(store.clone(), dispatcher)
                .with_max_batch_size(allocation_config.max_batch_size),
            ledger: AssignmentLedger::new(store.clone()),
            reversal: ReversalService::new(store.clone()),
            cascade: CascadeCoordinator::new(store.clone()),
            ingestion: IngestionService::new(store.clone()).with_limits(
                allocation_config.max_upload_lines,
                &allocation_config.default_redemption_url,
            ),
            config: Arc::new(config),
            store,
            pool,
        }
    }
}

/// Builds the app on PostgreSQL.
pub fn create_app(config: Config, pool: PgPool) -> Router {
    let store = Arc::new(PgAllocationStore::new(pool.clone()));
    create_app_with_store(config, store, Some(pool))
}

/// Builds the app on any store, with the logging dispatcher.
pub fn create_app_with_store(
    config: Config,
    store: Arc<dyn AllocationStore>,
    pool: Option<PgPool>,
) -> Router {
    let dispatcher = Arc::new(MockNotificationDispatcher::new());
    router(AppState::new(config, store, dispatcher, pool))
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        // Enrollment
        .route(
            "/enrollment",
            get(enrollment::get_status).put(enrollment::update_config),
        )
        .route("/enrollment/check", get(enrollment::check))
        // Participants
        .route(
            "/participants",
            post(participants::register).get(participants::list),
        )
        .route(
            "/participants/:id",
            get(participants::get_participant).delete(participants::delete_participant),
        )
        .route(
            "/participants/:id/assignments",
            get(participants::list_assignments),
        )
        .route("/participants/:id/invitation", post(participants::send_invitation))
        .route("/participants/:id/gift-card", post(participants::send_gift_card))
        // Survey link pool
        .route("/links", post(links::add_link).get(links::list_links))
        .route("/links/upload", post(links::upload_links))
        .route("/links/status", get(links::pool_status))
        .route("/links/:id", axum::routing::delete(links::delete_link))
        // Gift card pool
        .route(
            "/gift-cards",
            post(gift_cards::add_gift_card).get(gift_cards::list_gift_cards),
        )
        .route("/gift-cards/upload", post(gift_cards::upload_gift_cards))
        .route("/gift-cards/status", get(gift_cards::pool_status))
        .route("/gift-cards/batch-send", post(gift_cards::batch_send))
        .route("/gift-cards/eligible", get(gift_cards::list_eligible))
        .route(
            "/gift-cards/:id",
            put(gift_cards::update_code).delete(gift_cards::delete_gift_card),
        )
        .route("/gift-cards/:id/expire", post(gift_cards::expire))
        .route("/gift-cards/:id/invalidate", post(gift_cards::invalidate))
        // Ledger
        .route("/invitations/:id/complete", post(invitations::complete))
        .route("/invitations/:id/uncomplete", post(invitations::uncomplete))
        .route(
            "/invitations/:id/message-status",
            post(invitations::report_message_status),
        )
        .route("/assignments", get(assignments::list_assignments))
        .route("/assignments/:id/delivered", post(assignments::mark_delivered))
        .route("/assignments/:id/redeemed", post(assignments::mark_redeemed))
        .route("/assignments/:id/resend", post(assignments::resend))
        .route("/assignments/:id/unsend", post(assignments::unsend))
        .route("/assignments/:id/notes", put(assignments::update_notes))
        .route(
            "/assignments/:id/delivery-status",
            post(assignments::report_delivery_status),
        )
        .route("/assignments/:id/logs", get(assignments::distribution_log))
        // Audit
        .route("/audit/unsent", get(audit::list_unsent));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
