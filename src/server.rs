use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result, eyre};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ReplicationConfig, ServerConfig};
use crate::server::handlers::{health_check, start_tidy, tidy_status};
use crate::tidy::TidyManager;

pub mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub tidy: TidyManager,
    pub replication: ReplicationConfig,
}

pub struct Server {
    router: Router,
}

impl Server {
    /// Assemble the HTTP surface of the tidy subsystem.
    pub fn new(state: AppState) -> Self {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([Method::GET, Method::POST]);

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/tidy", post(start_tidy))
            .route("/tidy-status", get(tidy_status))
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        Self { router }
    }

    /// Bind and serve, returning the bound port and the serving task.
    pub async fn run_with_port(
        self,
        config: &ServerConfig,
    ) -> Result<(u16, tokio::task::JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
            .await
            .context("Binding TCP listener")?;
        let port = listener
            .local_addr()
            .context("Getting local address")?
            .port();

        tracing::info!("Server listening on http://{}:{}", config.host, port);

        let server = axum::serve(listener, self.router.into_make_service());
        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::error!("Server error: {e:?}");
            }
        });

        Ok((port, handle))
    }

    /// Runs the HTTP server until it exits.
    pub async fn run(self, config: &ServerConfig) -> Result<()> {
        let (_, handle) = self.run_with_port(config).await?;
        handle
            .await
            .map_err(|e| eyre!("Server task failed: {e:?}"))
            .context("Running server task")?;
        Ok(())
    }
}
