use std::net::SocketAddr;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod error;
mod oracle;
mod prompts;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Maieutic API",
        version = "0.1.0",
        description = "Socratic tutoring sessions between students and an LLM oracle, \
                       with mechanical enforcement of the dialogue protocol."
    ),
    paths(
        routes::health::health_check,
        routes::rooms::create_room,
        routes::rooms::room_status,
        routes::rooms::join_room,
        routes::rooms::monitor_room,
        routes::turns::submit_turn,
        routes::score::score_session,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::health::OracleHealth,
        routes::rooms::CreateRoomRequest,
        routes::rooms::JoinRoomRequest,
        routes::rooms::RoomMonitorResponse,
        routes::turns::TurnRequest,
        routes::turns::TurnResponse,
        maieutic_core::error::ApiError,
        maieutic_core::metadata::Phase,
        maieutic_core::metadata::EngagementLevel,
        maieutic_core::metadata::ScaffoldingLevel,
        maieutic_core::metadata::ScaffoldingType,
        maieutic_core::metadata::AuthenticityFlag,
        maieutic_core::metadata::StudentBehavior,
        maieutic_core::metadata::TurnMetadata,
        maieutic_core::metadata::FinalScoreBlock,
        maieutic_core::metadata::ScoreBlock,
        maieutic_core::metadata::FinalScore,
        maieutic_core::phase::Diagnostic,
        maieutic_core::phase::DiagnosticKind,
        maieutic_core::projection::StudentView,
        maieutic_core::session::Session,
        maieutic_core::session::SessionStatus,
        maieutic_core::session::StudentSession,
        maieutic_core::session::StudentStatus,
        maieutic_core::session::TurnRole,
        maieutic_core::signals::InputMethod,
        maieutic_core::signals::InputSignals,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maieutic_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        db: pool,
        oracle: oracle::OracleClient::from_env(),
        turn_gate: state::TurnGate::default(),
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::rooms::router())
        .merge(routes::turns::router())
        .merge(routes::score::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Maieutic API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
