//! Serveur amont de test : pages, fonds, géographies, prévision et pictos

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, SET_COOKIE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum::body::{to_bytes, Body};
use meteo_portal::{CacheId, Content, Crawler, PortalConfig, RenderContext, VueBuild};
use tokio::net::TcpListener;

/// Jeton en clair ; le cookie le porte encodé en ROT-13
pub const TOKEN: &str = "Session-42";
pub const TOKEN_COOKIE: &str = "Frffvba-42";

const ASSETS: &str = "/modules/custom/mf_map_layers_v2/maps/desktop";
const PICTOS: &str = "/modules/custom/mf_tools_common_theme_public/svg/weather";

pub const REGION_PATH: &str = "/previsions-meteo-france/auvergne-rhone-alpes/10";

struct Resource {
    body: &'static [u8],
    content_type: &'static str,
}

#[derive(Clone)]
struct Fixtures {
    resources: Arc<HashMap<String, Resource>>,
    requests: Arc<Mutex<HashMap<String, usize>>>,
}

/// Serveur amont lancé sur un port libre
pub struct Upstream {
    pub base: String,
    requests: Arc<Mutex<HashMap<String, usize>>>,
}

impl Upstream {
    /// Nombre de requêtes reçues pour `path` (sans la query)
    pub fn requests(&self, path: &str) -> usize {
        self.requests.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn config(&self) -> PortalConfig {
        PortalConfig {
            upstream: self.base.clone(),
            api: Some(self.base.clone()),
            ..PortalConfig::default()
        }
    }

    pub fn crawler(&self) -> Crawler {
        Crawler::new(&self.config()).unwrap()
    }
}

pub fn content() -> Arc<Content> {
    let ctx = RenderContext::new(CacheId::from_millis(0), VueBuild::Prod);
    Arc::new(Content::new(ctx, -3, 11))
}

fn resources() -> HashMap<String, Resource> {
    let html = "text/html; charset=utf-8";
    let svg = "image/svg+xml";
    let json = "application/json";

    let mut map = HashMap::new();
    let mut add = |path: String, body: &'static [u8], content_type: &'static str| {
        map.insert(path, Resource { body, content_type });
    };
    add("/".into(), include_bytes!("../fixtures/france.html"), html);
    add(REGION_PATH.into(), include_bytes!("../fixtures/region.html"), html);
    add(format!("{ASSETS}/METROPOLE/pays007.svg"), include_bytes!("../fixtures/pays007.svg"), svg);
    add(
        format!("{ASSETS}/METROPOLE/geo_json/pays007-aggrege.json"),
        include_bytes!("../fixtures/pays007-aggrege.json"),
        json,
    );
    add(format!("{ASSETS}/REGIN10/regin10.svg"), include_bytes!("../fixtures/regin10.svg"), svg);
    add(
        format!("{ASSETS}/REGIN10/geo_json/regin10-aggrege.json"),
        include_bytes!("../fixtures/regin10-aggrege.json"),
        json,
    );
    add("/multiforecast".into(), include_bytes!("../fixtures/multiforecast.json"), json);
    add(format!("{PICTOS}/p1j.svg"), include_bytes!("../fixtures/p1j.svg"), svg);
    add(format!("{PICTOS}/p4n.svg"), include_bytes!("../fixtures/p4n.svg"), svg);
    add("/nocookie".into(), b"no session here", "text/plain");
    map
}

async fn serve_fixture(State(fx): State<Fixtures>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    *fx.requests.lock().unwrap().entry(path.clone()).or_default() += 1;

    let Some(res) = fx.resources.get(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // L'API exige le jeton de session ; elle ne pose pas de cookie
    if path == "/multiforecast" {
        let expected = format!("Bearer {TOKEN}");
        let auth = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if auth != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        return ([(CONTENT_TYPE, res.content_type)], res.body).into_response();
    }
    if path == "/nocookie" {
        return ([(CONTENT_TYPE, res.content_type)], res.body).into_response();
    }

    let cookie = format!("mfsession={TOKEN_COOKIE}; Path=/; Secure; HttpOnly");
    (
        [(CONTENT_TYPE, res.content_type.to_string()), (SET_COOKIE, cookie)],
        res.body,
    )
        .into_response()
}

pub async fn spawn_upstream() -> Upstream {
    let requests = Arc::new(Mutex::new(HashMap::new()));
    let fixtures = Fixtures {
        resources: Arc::new(resources()),
        requests: Arc::clone(&requests),
    };
    let app = Router::new().fallback(serve_fixture).with_state(fixtures);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream {
        base: format!("http://{addr}"),
        requests,
    }
}

pub fn get(uri: &str) -> Request {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}
