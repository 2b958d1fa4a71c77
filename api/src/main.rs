use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod extract;
mod middleware;
mod oracle;
mod reflection;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TeamInsight API",
        version = "0.1.0",
        description = "Course-monitoring backend: guided weekly team reflections driven by an LLM analyst/facilitator pair."
    ),
    paths(
        routes::health::health_check,
        routes::reflection::start,
        routes::reflection::turn,
        routes::reflection::finish,
        routes::reflection::confirm,
        routes::reflection::reset,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::reflection::StartResponse,
        routes::reflection::TurnRequest,
        routes::reflection::TurnResponse,
        routes::reflection::FinishResponse,
        routes::reflection::ConfirmResponse,
        routes::reflection::ResetResponse,
        teaminsight_core::error::ApiError,
        teaminsight_core::session::SessionStatus,
        teaminsight_core::session::ChatRole,
        teaminsight_core::session::ChatMessage,
        teaminsight_core::session::TopicAnswer,
        teaminsight_core::evaluation::TuckmanStage,
        teaminsight_core::evaluation::AnomalyFlag,
        teaminsight_core::evaluation::ComponentScore,
        teaminsight_core::evaluation::HealthComponents,
        teaminsight_core::evaluation::EvaluationResult,
        teaminsight_core::scoring::StatusColor,
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
                .unwrap_or_else(|_| "teaminsight_api=debug,tower_http=debug".into()),
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

    let oracle = oracle::CompletionClient::from_env().expect("Oracle client must be configurable");

    let app_state = state::AppState {
        db: pool,
        oracle: Arc::new(oracle),
    };

    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::reflection::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("TeamInsight API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
