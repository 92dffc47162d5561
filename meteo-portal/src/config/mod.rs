//! Configuration du portail

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_UPSTREAM: &str = "https://meteofrance.com";

/// Jours de prévision conservés lors d'une fusion, relatifs à aujourd'hui
pub const DEFAULT_DAY_MIN: i64 = -3;
pub const DEFAULT_DAY_MAX: i64 = 11;

const CACHE_ID_MASK: u32 = 0x5A5A_A5A5;

/// Variante du bundle Vue.js servie dans les pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VueBuild {
    #[default]
    Prod,
    Dev,
}

impl VueBuild {
    /// Nom du fichier JavaScript
    pub fn script(&self) -> &'static str {
        match self {
            VueBuild::Prod => "vue.esm-browser.prod.js",
            VueBuild::Dev => "vue.esm-browser.js",
        }
    }
}

impl std::str::FromStr for VueBuild {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Ok(VueBuild::Prod),
            "dev" | "debug" => Ok(VueBuild::Dev),
            _ => Err(format!("Invalid vue build: {}. Use: prod, dev", s)),
        }
    }
}

/// Identifiant du processus inséré dans les URLs des ressources statiques
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheId(String);

impl CacheId {
    /// Calculé à partir de l'heure courante en millisecondes
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::from_millis(millis as u64)
    }

    pub fn from_millis(millis: u64) -> Self {
        let id = (millis as u32) ^ CACHE_ID_MASK;
        CacheId(hex::encode(id.to_be_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hôtes amont et fenêtre de rétention
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Hôte des pages de zone, SVG, géographies et pictos
    pub upstream: String,

    /// Hôte de l'API de prévision ; à défaut, celui annoncé par chaque page
    pub api: Option<String>,

    pub day_min: i64,
    pub day_max: i64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            upstream: DEFAULT_UPSTREAM.into(),
            api: None,
            day_min: DEFAULT_DAY_MIN,
            day_max: DEFAULT_DAY_MAX,
        }
    }
}

impl PortalConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self {
            upstream: std::env::var("METEO_UPSTREAM").unwrap_or_else(|_| DEFAULT_UPSTREAM.into()),
            api: std::env::var("METEO_API").ok().filter(|s| !s.is_empty()),
            day_min: std::env::var("METEO_DAY_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DAY_MIN),
            day_max: std::env::var("METEO_DAY_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DAY_MAX),
        }
    }
}
