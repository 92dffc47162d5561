//! Accès au site amont : client HTTP à jeton de session et cache d'octets

pub mod cache;
pub mod client;
pub mod rot13;

pub use cache::{ByteCache, CacheUpdater};
pub use client::{Body, CachePolicy, MfClient};

use thiserror::Error;

/// Erreurs d'accès à l'amont
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Politique `CacheOnly` sans entrée en cache
    #[error("{0} not in cache")]
    NotInCache(String),

    /// Chemin vide ou relatif
    #[error("Invalid upstream path '{0}'")]
    InvalidPath(String),

    /// Réponse autre que 200
    #[error("GET {url}: unexpected status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Réponse sans cookie de session alors qu'il est attendu
    #[error("GET {0}: missing mfsession cookie")]
    MissingSessionCookie(String),

    /// DNS, connexion, lecture...
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
