//! Client HTTP de l'amont
//!
//! Un client cible un seul hôte. Chaque réponse 200 renouvelle le jeton de
//! session (cookie `mfsession`, encodé ROT-13) renvoyé ensuite en
//! `Authorization: Bearer`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

use super::cache::{BodyStream, ByteCache, CacheUpdater};
use super::rot13::rot13;
use super::UpstreamError;

const SESSION_COOKIE: &str = "mfsession";

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Usage du cache pour une requête
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cache d'abord, sinon requête et mise en cache
    #[default]
    Default,
    /// Requête systématique, réponse mise en cache
    Update,
    /// Requête systématique, cache ignoré
    Disabled,
    /// Cache seulement, erreur si absent
    CacheOnly,
}

/// Corps de réponse, depuis le cache ou le réseau
pub enum Body {
    Cached(Option<Bytes>),
    Direct(Option<BodyStream>),
    Updating(CacheUpdater),
}

impl Body {
    /// Lit le morceau suivant ; `None` en fin de corps
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, UpstreamError> {
        match self {
            Body::Cached(bytes) => Ok(bytes.take()),
            Body::Direct(None) => Ok(None),
            Body::Direct(Some(stream)) => stream.next().await.transpose(),
            Body::Updating(up) => up.chunk().await,
        }
    }

    /// Lit tout le corps puis le ferme
    pub async fn bytes(mut self) -> Result<Bytes, UpstreamError> {
        if let Body::Cached(bytes) = &mut self {
            return Ok(bytes.take().unwrap_or_default());
        }
        let mut buf = BytesMut::new();
        let read = loop {
            match self.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.close();
        read.map(|_| buf.freeze())
    }

    /// Libère le corps amont ; pour un corps en cours de mise en cache,
    /// enregistre les octets lus si la lecture est complète
    pub fn close(&mut self) {
        match self {
            Body::Cached(bytes) => *bytes = None,
            Body::Direct(stream) => *stream = None,
            Body::Updating(up) => up.close(),
        }
    }
}

/// Client d'un hôte amont
#[derive(Clone)]
pub struct MfClient {
    http: reqwest::Client,
    base: String,
    token: Arc<Mutex<Option<String>>>,
    cache: ByteCache,
    session_cookie: bool,
}

impl MfClient {
    /// Client de l'hôte `base` (`https://meteofrance.com`), cookie de session
    /// attendu sur chaque réponse
    pub fn new(base: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token: Arc::new(Mutex::new(None)),
            cache: ByteCache::new(),
            session_cookie: true,
        })
    }

    /// Client de l'API de prévision : partage le jeton et le cache, sans
    /// exiger de cookie de session
    pub fn api_client(&self, base: impl Into<String>) -> MfClient {
        MfClient {
            http: self.http.clone(),
            base: base.into().trim_end_matches('/').to_string(),
            token: Arc::clone(&self.token),
            cache: self.cache.clone(),
            session_cookie: false,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn cache(&self) -> &ByteCache {
        &self.cache
    }

    /// Jeton de session courant
    pub fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: String) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// URL complète d'un chemin ; une URL déjà complète est rendue telle quelle
    pub fn add_base(&self, path: &str) -> Result<String, UpstreamError> {
        if path.starts_with(&self.base) {
            return Ok(path.to_string());
        }
        if path.starts_with('/') {
            return Ok(format!("{}{}", self.base, path));
        }
        Err(UpstreamError::InvalidPath(path.to_string()))
    }

    /// GET sur l'hôte selon la politique de cache
    ///
    /// # Errors
    ///
    /// `NotInCache` en `CacheOnly` sans entrée, `InvalidPath`, `Status` pour
    /// toute réponse autre que 200, `MissingSessionCookie`, `Transport`.
    pub async fn get(&self, path: &str, policy: CachePolicy) -> Result<Body, UpstreamError> {
        if matches!(policy, CachePolicy::Default | CachePolicy::CacheOnly) {
            if let Some(bytes) = self.cache.lookup(path) {
                debug!(path, "Upstream cache hit");
                return Ok(Body::Cached(Some(bytes)));
            }
            if policy == CachePolicy::CacheOnly {
                return Err(UpstreamError::NotInCache(path.to_string()));
            }
        }

        let url = self.add_base(path)?;
        let mut req = self.http.get(&url).header(USER_AGENT, BROWSER_USER_AGENT);
        if let Some(token) = self.token() {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        debug!(url = %url, ?policy, "GET upstream");
        let resp = req.send().await?;
        if resp.status() != StatusCode::OK {
            return Err(UpstreamError::Status {
                url,
                status: resp.status(),
            });
        }

        let session = resp
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| rot13(c.value()));
        match session {
            Some(token) => self.set_token(token),
            None if self.session_cookie => return Err(UpstreamError::MissingSessionCookie(url)),
            None => {}
        }

        let stream: BodyStream = resp
            .bytes_stream()
            .map(|r| r.map_err(UpstreamError::from))
            .boxed();

        Ok(match policy {
            CachePolicy::Default | CachePolicy::Update => {
                Body::Updating(self.cache.new_updater(path, stream))
            }
            CachePolicy::Disabled | CachePolicy::CacheOnly => Body::Direct(Some(stream)),
        })
    }
}
