use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    http::{HeaderValue, Method, header},
    routing::{get, patch, post},
};
use medgrid_api::ApiError;
use medgrid_auth::{AuthService, JwtService};
use medgrid_db_memory::create_storage;
use medgrid_notifications::{NotificationHub, Publisher};
use medgrid_occupancy::{BillingService, OccupancyManager, WardService};
use medgrid_storage::DynStorage;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::AppConfig, handlers, middleware as app_middleware, ws};

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: DynStorage,
    pub hub: NotificationHub,
    pub occupancy: OccupancyManager,
    pub ward: WardService,
    pub billing: BillingService,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = create_storage(&config.storage);
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: AppConfig, storage: DynStorage) -> Self {
        let hub = NotificationHub::new(config.notifications.session_buffer);
        let publisher: Arc<dyn Publisher> = Arc::new(hub.clone());
        let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.token_ttl_secs);

        Self {
            occupancy: OccupancyManager::new(storage.clone(), publisher.clone()),
            ward: WardService::new(storage.clone(), publisher, &config.hospital.default_id),
            billing: BillingService::new(storage.clone()),
            auth: AuthService::new(storage.clone(), jwt),
            hub,
            storage,
            config: Arc::new(config),
        }
    }

    /// Creates the configured administrator account if it is missing.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        if let Some(admin) = &self.config.auth.bootstrap_admin {
            self.auth
                .ensure_bootstrap_admin(&admin.email, &admin.password, &admin.full_name)
                .await
                .map_err(|e| anyhow::anyhow!("bootstrap admin: {e}"))?;
        }
        Ok(())
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = cors_layer(&state.config.server.cors_origins);

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/departments",
            get(handlers::departments::list).post(handlers::departments::create),
        )
        .route("/departments/{id}", get(handlers::departments::get))
        .route("/departments/{id}/beds", get(handlers::departments::beds))
        .route(
            "/beds",
            get(handlers::beds::list).post(handlers::beds::create),
        )
        .route("/beds/{id}/status", patch(handlers::beds::update_status))
        .route("/patients", get(handlers::patients::list))
        .route("/patients/admit", post(handlers::patients::admit))
        .route("/patients/{id}", get(handlers::patients::get))
        .route("/patients/{id}/discharge", post(handlers::patients::discharge))
        .route("/patients/{id}/transfer", post(handlers::patients::transfer))
        .route("/billing", get(handlers::billing::list))
        .route("/billing/{id}", get(handlers::billing::get))
        .route("/billing/{id}/status", patch(handlers::billing::update_status))
        .route("/ws", get(ws::upgrade));

    Router::new()
        .nest("/api", api)
        .fallback(route_not_found)
        .with_state(state)
        // Outermost last: request id is assigned before the trace span opens.
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get(app_middleware::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

pub struct MedgridServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    storage: Option<DynStorage>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            storage: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn with_storage(mut self, storage: DynStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn build(self) -> anyhow::Result<MedgridServer> {
        let state = match self.storage {
            Some(storage) => AppState::with_storage(self.config, storage),
            None => AppState::new(self.config),
        };
        state.bootstrap().await?;
        tracing::info!(
            backend = state.storage.backend_name(),
            default_hospital = %state.ward.default_hospital_id(),
            "application state ready"
        );

        Ok(MedgridServer {
            addr: self.addr,
            app: build_app(state),
        })
    }
}

impl MedgridServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_JWT_SECRET_LEN;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "k".repeat(MIN_JWT_SECRET_LEN);
        build_app(AppState::new(config))
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/patients/admit")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "k".repeat(MIN_JWT_SECRET_LEN);
        config.server.body_limit_bytes = 16;
        let app = build_app(AppState::new(config));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"email":"{}"}}"#, "a".repeat(64))))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unknown_api_route_falls_through_to_404() {
        let req = Request::builder()
            .uri("/api/wards")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().contains_key(app_middleware::REQUEST_ID_HEADER));
    }
}
