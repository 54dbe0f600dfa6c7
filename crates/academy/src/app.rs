use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::controllers::AppState;
use crate::migrations::Migrator;
use crate::routing;
use crate::view::{TemplateRenderer, ViewRenderer};

/// The academy admin application.
pub struct App {
    pub config: Config,
    pub db: DatabaseConnection,
    views: Arc<dyn ViewRenderer>,
}

impl App {
    /// Create the application from environment configuration.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    /// Connect, migrate and bootstrap the first account.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let db = crate::db::connect(&config).await?;

        tracing::info!("Running pending database migrations...");
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations complete.");

        crate::db::bootstrap_admin(&db, &config.bootstrap_admin).await?;
        // Computed up front so the first unknown-user login is not slower.
        crate::auth::password::dummy_hash();

        let views: Arc<dyn ViewRenderer> = Arc::new(TemplateRenderer::new(&config.template_dir));
        Ok(App { config, db, views })
    }

    /// Swap the page renderer.
    pub fn with_renderer(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = views;
        self
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            config: Arc::new(self.config.clone()),
            sessions: SessionStore::from_config(&self.config),
            views: self.views.clone(),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = routing::build_routes(self.state());

        // Request tracing only in development mode.
        if self.config.is_dev() {
            use tower_http::LatencyUnit;
            use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse};

            let x_request_id = axum::http::HeaderName::from_static("x-request-id");
            router = router
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                        .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                );
        }

        router
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(
            environment = %self.config.environment,
            single_session = self.config.enforce_single_session,
            "academy admin listening on http://{}",
            addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down academy admin...");
}
