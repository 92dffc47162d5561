//! Cache d'octets des réponses amont
//!
//! Une entrée associe un chemin amont aux octets exacts de la dernière
//! réponse complète. Le `CacheUpdater` enveloppe un corps de réponse : chaque
//! lecture est transmise à l'appelant et accumulée, et la fermeture après une
//! fin de flux propre remplace l'entrée du cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::trace;

use super::UpstreamError;

/// Flux d'octets d'un corps de réponse
pub type BodyStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Cache partagé, clonable à faible coût
#[derive(Clone, Default)]
pub struct ByteCache {
    entries: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl ByteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Octets stockés pour `path`, s'il y en a
    pub fn lookup(&self, path: &str) -> Option<Bytes> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Remplace l'entrée de `path`
    pub fn update(&self, path: &str, bytes: Bytes) {
        trace!(path, len = bytes.len(), "Byte cache entry stored");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), bytes);
    }

    /// Enveloppe un corps de réponse pour alimenter l'entrée de `path`
    pub fn new_updater(&self, path: &str, body: BodyStream) -> CacheUpdater {
        CacheUpdater {
            cache: self.clone(),
            path: path.to_string(),
            body: Some(body),
            buf: BytesMut::new(),
            complete: false,
            failed: false,
        }
    }
}

/// Lecteur qui recopie le flux amont dans le cache
///
/// N'est pas partagé entre tâches.
pub struct CacheUpdater {
    cache: ByteCache,
    path: String,
    body: Option<BodyStream>,
    buf: BytesMut,
    complete: bool,
    failed: bool,
}

impl CacheUpdater {
    /// Lit le morceau suivant ; `None` en fin de flux
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, UpstreamError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };
        match body.next().await {
            Some(Ok(chunk)) => {
                self.buf.extend_from_slice(&chunk);
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.failed = true;
                Err(e)
            }
            None => {
                self.complete = true;
                Ok(None)
            }
        }
    }

    /// Enregistre le tampon si le flux a été lu jusqu'au bout sans erreur,
    /// puis libère le corps amont. Les appels suivants sont sans effet.
    pub fn close(&mut self) {
        if self.body.take().is_none() {
            return;
        }
        if self.complete && !self.failed {
            let bytes = std::mem::take(&mut self.buf).freeze();
            self.cache.update(&self.path, bytes);
        }
    }
}
