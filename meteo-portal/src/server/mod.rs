//! Surface HTTP
//!
//! Le routeur des zones est reconstruit entièrement à chaque mutation du
//! store puis installé dans le [`Dispatcher`]. Chaque requête clone le
//! routeur courant et s'exécute dessus jusqu'au bout : une requête en cours
//! n'observe jamais un remplacement.

pub mod template;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use axum::extract::{Path, Request};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::content::status::status_text;
use crate::content::Zone;
pub use template::{render_page, RenderContext};

const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
const NO_CACHE: &str = "no-cache";
const SVG: &str = "image/svg+xml";
const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// Chemins occupés par les routes communes
const RESERVED: [&str; 2] = ["pictos", "statusse"];

/// Pictos publiés, partagés par le routeur courant
pub type PictoMap = Arc<HashMap<String, Bytes>>;

/// Routeur remplaçable atomiquement
#[derive(Default)]
pub struct Dispatcher {
    current: RwLock<Router>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remplace le routeur courant
    pub fn install(&self, router: Router) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = router;
    }

    /// Copie du routeur courant
    pub fn current(&self) -> Router {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sert une requête avec le routeur courant
    pub async fn dispatch(&self, req: Request) -> Response {
        let router = self.current();
        match router.oneshot(req).await {
            Ok(resp) => resp,
            Err(e) => match e {},
        }
    }
}

/// Application complète : routeur courant plus traces d'accès
pub fn app(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(move |req: Request| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.dispatch(req).await }
        })
        .layer(TraceLayer::new_for_http())
}

/// Un chemin de zone est publiable s'il forme un seul segment d'URL simple
fn routable(path: &str) -> bool {
    !path.is_empty()
        && !RESERVED.contains(&path)
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Construit le routeur de l'état courant du store
pub fn build_router(zones: Vec<Arc<Zone>>, pictos: PictoMap, ctx: &RenderContext) -> Router {
    let mut router = Router::new()
        .route(
            "/",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(LOCATION, "/france")]) }),
        )
        .route(
            "/pictos/{name}",
            get(move |Path(name): Path<String>| {
                let pictos = Arc::clone(&pictos);
                async move { picto_response(&pictos, &name) }
            }),
        );

    for zone in &zones {
        if !routable(zone.path()) {
            warn!(path = %zone.path(), "Zone path cannot be routed, skipped");
            continue;
        }
        let base = format!("/{}", zone.path());

        let (z, c) = (Arc::clone(zone), ctx.clone());
        router = router.route(
            &base,
            get(move || {
                let body = render_page(z.name(), z.path(), &c);
                async move { page_response(body) }
            }),
        );

        let z = Arc::clone(zone);
        router = router.route(
            &format!("{base}/data"),
            get(move |uri: Uri| {
                let z = Arc::clone(&z);
                async move { data_response(&z, &uri) }
            }),
        );

        let svg = zone.svg();
        router = router.route(
            &format!("{base}/svg"),
            get(move || {
                let svg = svg.clone();
                async move { svg_response(svg) }
            }),
        );
    }

    debug!(zones = zones.len(), "Router built");
    router.route(
        "/statusse",
        get(move || {
            let body = status_text(&zones, Utc::now());
            async move { status_response(body) }
        }),
    )
}

fn page_response(body: String) -> Response {
    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, NO_CACHE),
        ],
        body,
    )
        .into_response()
}

/// JSON de la zone ; une lecture réussie compte comme une consultation
fn data_response(zone: &Zone, uri: &Uri) -> Response {
    let now = Utc::now();
    match zone.render_json(now) {
        Ok(body) => {
            zone.stats().record_hit(now);
            (
                [(CONTENT_TYPE, "application/json"), (CACHE_CONTROL, NO_CACHE)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(url = %uri, error = %e, "Zone JSON rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn svg_response(svg: Bytes) -> Response {
    if svg.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(CONTENT_TYPE, SVG), (CACHE_CONTROL, NO_CACHE)], svg).into_response()
}

fn picto_response(pictos: &HashMap<String, Bytes>, name: &str) -> Response {
    match pictos.get(name) {
        Some(img) => (
            [(CONTENT_TYPE, SVG), (CACHE_CONTROL, CACHE_IMMUTABLE)],
            img.clone(),
        )
            .into_response(),
        None => {
            debug!(picto = name, "Unknown picto");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn status_response(body: String) -> Response {
    (
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_ROBOTS_TAG, "noindex, nofollow"),
        ],
        body,
    )
        .into_response()
}

/// Adresse d'écoute : `:1051` écoute sur toutes les interfaces
pub fn bind_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

/// Ouvre l'adresse d'écoute
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr = bind_addr(addr);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to listen on {addr}"))
}

/// Sert l'application jusqu'au signal d'arrêt
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Portal listening");
    axum::serve(listener, app(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
