//! Zone assemblée à partir des quatre ressources amont

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chroniques::Graphdata;
use crate::geography::{parse_geography, GeoCollection};
use crate::map::MapData;
use crate::multiforecast::{parse_multiforecast, picto_names};
use crate::prevlist::PrevList;
use crate::svg::crop_svg;
use crate::types::{MapInfo, Subzone, Taxonomy};
use crate::MfError;

/// Contenu décodé d'une zone, indépendant de son cycle de vie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    /// Chemin canonique ("france", "isere"...)
    pub path: String,

    /// Chemin amont de la page de la zone
    pub original_path: String,

    pub info: MapInfo,

    /// Sous-zones retenues, indexées par identifiant technique
    pub subzones: BTreeMap<String, Subzone>,

    pub geography: GeoCollection,

    /// Fond de carte rogné
    pub svg: Vec<u8>,

    pub prevs: PrevList,

    pub graphdata: Graphdata,

    /// Pictogrammes référencés par les prévisions
    pub pictos: BTreeSet<String>,
}

/// Ressources brutes d'une zone
pub struct ZoneSources<'a> {
    pub svg: &'a [u8],
    pub geography: &'a [u8],
    pub multiforecast: &'a [u8],
}

impl ZoneData {
    /// Décode et assemble une zone
    ///
    /// # Arguments
    ///
    /// * `original_path` - Chemin amont de la page HTML
    /// * `map` - Configuration extraite de la page (voir [`crate::parse_html`])
    /// * `sources` - Fond SVG, géographie et prévision multi-points
    /// * `now` - Référence pour l'horizon des chroniques
    ///
    /// # Errors
    ///
    /// Retourne la première erreur de décodage rencontrée.
    pub fn assemble(
        original_path: &str,
        map: &MapData,
        sources: ZoneSources<'_>,
        now: DateTime<Utc>,
    ) -> Result<ZoneData, MfError> {
        let path = map.canonical_path()?;
        let subzones = map.filtered_subzones();
        let geography = parse_geography(sources.geography, &subzones)?;
        let svg = crop_svg(sources.svg)?;
        let features = parse_multiforecast(sources.multiforecast)?;

        let prevs = PrevList::build(&features);
        let graphdata = Graphdata::build(&features, now);
        let pictos = picto_names(&features);

        debug!(
            path = %path,
            points = features.len(),
            days = prevs.len(),
            subzones = subzones.len(),
            pictos = pictos.len(),
            "Zone assembled"
        );

        Ok(ZoneData {
            path,
            original_path: original_path.to_string(),
            info: map.info.clone(),
            subzones,
            geography,
            svg,
            prevs,
            graphdata,
            pictos,
        })
    }

    /// Reprend l'historique de la version précédente de la zone
    pub fn merge(&mut self, old: &ZoneData, day_min: i64, day_max: i64, now: DateTime<Utc>) {
        self.prevs.merge(&old.prevs, day_min, day_max, now.date_naive());
        self.graphdata.merge(&old.graphdata, day_min, day_max, now);
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.info.taxonomy
    }

    /// Chemins amont des sous-zones, à parcourir lors du crawl
    pub fn subzone_paths(&self) -> impl Iterator<Item = &str> {
        self.subzones.values().map(|sz| sz.path.as_str())
    }
}
