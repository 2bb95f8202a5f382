use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use aula_core::PipelineContext;
use aula_core::config::GatewayConfig;
use aula_llm::LlmProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::{RouterConfig, build_router};

/// Shared state handed to every handler.
pub struct AppState<P> {
    pub ctx: Arc<PipelineContext<P>>,
    pub started_at: Instant,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            started_at: self.started_at,
        }
    }
}

impl<P> AppState<P> {
    #[must_use]
    pub fn new(ctx: Arc<PipelineContext<P>>) -> Self {
        Self {
            ctx,
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer<P> {
    addr: SocketAddr,
    router: RouterConfig,
    ctx: Arc<PipelineContext<P>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<P: LlmProvider + 'static> GatewayServer<P> {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        ctx: Arc<PipelineContext<P>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            router: RouterConfig::default(),
            ctx,
            shutdown_rx,
        }
    }

    /// Server with every setting taken from `[gateway]`.
    #[must_use]
    pub fn from_config(
        config: &GatewayConfig,
        ctx: Arc<PipelineContext<P>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self::new(&config.bind, config.port, ctx, shutdown_rx)
            .with_auth(config.auth_token.clone())
            .with_rate_limit(config.rate_limit)
            .with_max_body_size(config.max_body_size)
            .with_cors_origins(config.cors_origins.clone())
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.router.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.router.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.router.max_body_size = size;
        self
    }

    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.router.cors_origins = origins;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let auth = self.router.auth_token.is_some();
        let router = build_router(AppState::new(self.ctx), self.router);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!(addr = %self.addr, auth, "gateway listening");

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
