//! # mfmap
//!
//! Décodage et mise en forme des pages de zone de meteofrance.com.
//!
//! ## Features
//!
//! - Extraction du bloc de configuration Drupal des pages HTML (`memchr`)
//! - Décodeurs validants pour la prévision multi-points et la géographie
//! - Pivot des prévisions par jour et par moment (`PrevList`)
//! - Chroniques pour les graphiques (`Graphdata`) et fusion avec l'historique
//! - Rognage des fonds de carte SVG
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mfmap::{parse_html, ZoneData, ZoneSources};
//!
//! let map = parse_html(&html)?;
//! let zone = ZoneData::assemble("/", &map, ZoneSources {
//!     svg: &svg,
//!     geography: &geography,
//!     multiforecast: &forecast,
//! }, chrono::Utc::now())?;
//!
//! println!("{}: {} jours de prévision", zone.path, zone.prevs.len());
//! let body = zone.to_json(&breadcrumb, chrono::Utc::now())?;
//! ```

pub mod chroniques;
pub mod echeance;
pub mod error;
pub mod geography;
pub mod json;
pub mod map;
pub mod multiforecast;
pub mod prevlist;
pub mod svg;
pub mod types;
pub mod zone;

pub use chroniques::{Graphdata, Serie};
pub use echeance::{Echeance, Moment};
pub use error::MfError;
pub use geography::{Bbox, GeoCollection};
pub use map::{parse_html, picto_path, MapData};
pub use multiforecast::{Forecast, PointFeature};
pub use prevlist::PrevList;
pub use types::{Breadcrumb, BreadcrumbItem, MapInfo, Subzone, Taxonomy, ROOT_PATH};
pub use zone::{ZoneData, ZoneSources};
