//! Purpose: Local development store exposing the REST endpoints the client consumes.
//! Exports: `ServeConfig`, `serve`, `validate_config`.
//! Role: Axum server over a `MemoryStore`, optionally loaded from and saved to a JSON file.
//! Invariants: Bodies are bare JSON records; errors use `{ "error": { kind, message } }`.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: Every successful mutation rewrites the database file when one is configured.
//! Invariants: A mutation whose save fails is rolled back before the error is returned.

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stockroom::api::{
    Error, ErrorKind, MemoryStore, Product, ProductDraft, ProductStore, Snapshot,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub db: Option<PathBuf>,
    pub allow_non_loopback: bool,
}

struct AppState {
    store: MemoryStore,
    db: Option<PathBuf>,
    writes: Mutex<()>,
}

impl AppState {
    fn new(store: MemoryStore, db: Option<PathBuf>) -> Self {
        Self {
            store,
            db,
            writes: Mutex::new(()),
        }
    }

    /// Run one mutation and save it; the in-memory state is restored if the save fails.
    fn mutate<T>(&self, apply: impl FnOnce(&MemoryStore) -> Result<T, Error>) -> Result<T, Error> {
        let _guard = self
            .writes
            .lock()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("write lock poisoned"))?;
        let Some(path) = &self.db else {
            return apply(&self.store);
        };
        let before = self.store.snapshot()?;
        let value = apply(&self.store)?;
        if let Err(err) = persist(path, &self.store) {
            tracing::warn!(db = %path.display(), "save failed; rolling back mutation");
            self.store.restore(before)?;
            return Err(err);
        }
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct ProductsQuery {
    barcode: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let snapshot = match &config.db {
        Some(path) => load_snapshot(path)?,
        None => Snapshot::default(),
    };
    tracing::info!(
        products = snapshot.products.len(),
        warehousemen = snapshot.warehousemans.len(),
        "store loaded"
    );
    let state = Arc::new(AppState::new(
        MemoryStore::from_snapshot(snapshot),
        config.db.clone(),
    ));

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Network)
                .with_message(format!("failed to bind {}", config.bind))
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "serving inventory store");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Network)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Network)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Network).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(replace_product).delete(delete_product),
        )
        .route("/warehousemans", get(list_warehousemen))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if let Some(db) = &config.db {
        if db.is_dir() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("--db must be a file, got directory {}", db.display())));
        }
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn load_snapshot(path: &Path) -> Result<Snapshot, Error> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(db = %path.display(), "database file missing; starting empty");
            return Ok(Snapshot::default());
        }
        Err(err) => {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!("failed to read {}", path.display()))
                .with_source(err));
        }
    };
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid database file {}", path.display()))
            .with_hint("Expected { \"products\": [...], \"warehousemans\": [...] }.")
            .with_source(err)
    })
}

fn persist(path: &Path, store: &MemoryStore) -> Result<(), Error> {
    let snapshot = store.snapshot()?;
    let json = serde_json::to_vec_pretty(&snapshot).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode database")
            .with_source(err)
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to write {}", path.display()))
                .with_source(err)
        })
}

async fn healthz() -> Response {
    json_response(StatusCode::OK, json!({ "ok": true }))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductsQuery>,
) -> Response {
    let result = match query.barcode.as_deref() {
        Some(barcode) => state.store.products_by_barcode(barcode),
        None => state.store.list_products(),
    };
    match result {
        Ok(products) => json_response(StatusCode::OK, json!(products)),
        Err(err) => error_response(err),
    }
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ProductDraft>,
) -> Response {
    let result = state.mutate(|store| store.create_product(&draft));
    match result {
        Ok(product) => json_response(StatusCode::CREATED, json!(product)),
        Err(err) => error_response(err),
    }
}

async fn get_product(State(state): State<Arc<AppState>>, AxumPath(id): AxumPath<u64>) -> Response {
    match state.store.get_product(id) {
        Ok(product) => json_response(StatusCode::OK, json!(product)),
        Err(err) => error_response(err),
    }
}

async fn replace_product(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<u64>,
    Json(mut product): Json<Product>,
) -> Response {
    product.id = id;
    let result = state.mutate(|store| store.replace_product(&product));
    match result {
        Ok(product) => json_response(StatusCode::OK, json!(product)),
        Err(err) => error_response(err),
    }
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<u64>,
) -> Response {
    match state.mutate(|store| store.delete_product(id)) {
        Ok(()) => json_response(StatusCode::OK, json!({})),
        Err(err) => error_response(err),
    }
}

async fn list_warehousemen(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_warehousemen() {
        Ok(users) => json_response(StatusCode::OK, json!(users)),
        Err(err) => error_response(err),
    }
}

fn json_response(status: StatusCode, payload: serde_json::Value) -> Response {
    let mut response = (status, Json(payload)).into_response();
    response
        .headers_mut()
        .insert("stockroom-version", HeaderValue::from_static("0"));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InsufficientQuantity => StatusCode::BAD_REQUEST,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::Network | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("stockroom-version", HeaderValue::from_static("0"));
    response
}
