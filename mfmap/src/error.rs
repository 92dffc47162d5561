//! Types d'erreurs pour le crate mfmap

use thiserror::Error;

/// Erreurs pouvant survenir lors du décodage d'une zone
#[derive(Debug, Error)]
pub enum MfError {
    /// Page HTML sans bloc de configuration exploitable
    #[error("Invalid HTML page: {0}")]
    Html(String),

    /// JSON amont illisible
    #[error("Invalid {what} JSON: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Donnée amont lisible mais hors des valeurs attendues
    #[error("Validation failed for {what}: {reason}")]
    Validation { what: String, reason: String },

    /// Fond de carte SVG inexploitable
    #[error("Invalid SVG: {0}")]
    Svg(String),

    /// Contenu non UTF-8
    #[error("Invalid UTF-8 in {0}")]
    Utf8(&'static str),
}

impl MfError {
    /// Crée une erreur de validation avec contexte
    pub fn validation(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Enveloppe une erreur serde_json en précisant la source
    pub fn json(what: &'static str, source: serde_json::Error) -> Self {
        Self::Json { what, source }
    }
}
