//! # meteo-portal
//!
//! Portail météo personnel : miroir des pages de zone de meteofrance.com,
//! servi depuis un cache mémoire rafraîchi selon la fréquentation.
//!
//! ## Features
//!
//! - Client amont à jeton de session (cookie `mfsession`) et cache d'octets
//! - Store des zones et des pictos, routeur remplacé atomiquement
//! - Rafraîchissement adaptatif : 30 min pour les zones consultées, 4 h sinon
//! - Fusion de l'historique des prévisions sur une fenêtre glissante
//! - Blob de développement pour redémarrer sans crawl
//!
//! ## Usage CLI
//!
//! ```bash
//! # Crawl complet puis service sur :1051
//! meteo-portal
//!
//! # Dix zones, service local, blob de développement
//! meteo-portal --addr 127.0.0.1:8080 --limit 10 --blob ./content.blob --vue dev
//!
//! # Crawl seul
//! meteo-portal --oneshot
//! ```

pub mod config;
pub mod content;
pub mod crawl;
pub mod portal;
pub mod server;
pub mod upstream;

pub use config::{CacheId, PortalConfig, VueBuild};
pub use content::{Content, Picto, Zone};
pub use crawl::{Crawler, Scheduler};
pub use portal::{run, RunOptions};
pub use server::{Dispatcher, RenderContext};
pub use upstream::{CachePolicy, MfClient, UpstreamError};
