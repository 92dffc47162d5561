//! Configuration de carte embarquée dans une page de zone
//!
//! Chaque page amont porte un bloc
//! `<script type="application/json" data-drupal-selector="drupal-settings-json">`
//! dont le JSON décrit la carte : métadonnées, points enfants, sous-zones et
//! domaine de l'API de prévision. Ce module extrait ce bloc et dérive les
//! chemins amont des autres ressources de la zone.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use memchr::memmem;
use regex::Regex;
use serde::{de, Deserialize, Deserializer};

use crate::types::{MapInfo, Subzone, Taxonomy, ROOT_ID_TECHNIQUE, ROOT_PATH};
use crate::MfError;

const SCRIPT_SELECTOR: &[u8] = b"data-drupal-selector=\"drupal-settings-json\"";
const SCRIPT_TYPE: &[u8] = b"type=\"application/json\"";
const SCRIPT_OPEN: &[u8] = b"<script";
const SCRIPT_CLOSE: &[u8] = b"</script>";

const ASSETS_PREFIX: &str = "/modules/custom/mf_map_layers_v2/maps/desktop";
const PICTOS_PREFIX: &str = "/modules/custom/mf_tools_common_theme_public/svg/weather";

/// Configuration complète d'une page de zone
#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    #[serde(rename = "mf_map_layers_v2")]
    pub info: MapInfo,

    /// Points de prévision de la zone
    #[serde(rename = "mf_map_layers_v2_children_poi", default)]
    pub children: Vec<Poi>,

    /// Sous-zones indexées par identifiant technique
    #[serde(
        rename = "mf_map_layers_v2_sub_zone",
        default,
        deserialize_with = "subzones_or_empty_array"
    )]
    pub subzones: BTreeMap<String, Subzone>,

    #[serde(rename = "mf_tools_common")]
    pub tools: MapTools,
}

/// Point de prévision enfant d'une zone
#[derive(Debug, Clone, Deserialize)]
pub struct Poi {
    pub title: String,
    #[serde(deserialize_with = "string_float")]
    pub lat: f64,
    #[serde(deserialize_with = "string_float")]
    pub lng: f64,
    #[serde(default)]
    pub path: String,
    pub insee: String,
    #[serde(default)]
    pub taxonomy: String,
    #[serde(default)]
    pub code_postal: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapTools {
    #[serde(default)]
    pub alias: String,
    pub config: SiteConfig,
}

/// Domaine du site amont, utilisé pour joindre l'API de prévision
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub base_url: String,
    pub site: String,
    #[serde(default)]
    pub domain: String,
}

/// Extrait et décode le bloc de configuration d'une page HTML
///
/// # Errors
///
/// Retourne `MfError::Html` si le bloc est absent, `MfError::Json` si son
/// contenu ne correspond pas au schéma attendu.
pub fn parse_html(html: &[u8]) -> Result<MapData, MfError> {
    let json = settings_json(html)?;
    serde_json::from_slice(json).map_err(|e| MfError::json("drupal settings", e))
}

/// Localise le corps JSON du script de configuration
fn settings_json(html: &[u8]) -> Result<&[u8], MfError> {
    let selector = memmem::Finder::new(SCRIPT_SELECTOR);
    let close = memmem::Finder::new(SCRIPT_CLOSE);

    for pos in selector.find_iter(html) {
        // Remonter jusqu'à l'ouverture de la balise
        let Some(tag_start) = memchr::memrchr(b'<', &html[..pos]) else {
            continue;
        };
        let Some(tag_len) = memchr::memchr(b'>', &html[tag_start..]) else {
            continue;
        };
        let tag = &html[tag_start..tag_start + tag_len];
        if !tag.starts_with(SCRIPT_OPEN) || memmem::find(tag, SCRIPT_TYPE).is_none() {
            continue;
        }

        let body_start = tag_start + tag_len + 1;
        let Some(body_len) = close.find(&html[body_start..]) else {
            return Err(MfError::Html("unterminated settings script".into()));
        };
        let body = &html[body_start..body_start + body_len];
        simdutf8::basic::from_utf8(body).map_err(|_| MfError::Utf8("settings script"))?;
        return Ok(body);
    }

    Err(MfError::Html("drupal-settings-json script not found".into()))
}

impl MapData {
    /// Chemin canonique sous lequel la zone est servie
    pub fn canonical_path(&self) -> Result<String, MfError> {
        if self.info.id_technique == ROOT_ID_TECHNIQUE {
            return Ok(ROOT_PATH.to_string());
        }
        extract_path(&self.info.path)
    }

    /// Sous-zones retenues selon la taxonomie de la zone
    pub fn filtered_subzones(&self) -> BTreeMap<String, Subzone> {
        filter_subzones(self.info.taxonomy, &self.subzones)
    }

    fn assets_dir(&self) -> String {
        format!("{}/{}", ASSETS_PREFIX, self.info.path_assets)
    }

    /// Chemin amont du fond de carte SVG
    pub fn svg_path(&self) -> String {
        format!(
            "{}/{}.svg",
            self.assets_dir(),
            self.info.id_technique.to_lowercase()
        )
    }

    /// Chemin amont des polygones des sous-zones
    pub fn geography_path(&self) -> String {
        format!(
            "{}/geo_json/{}-aggrege.json",
            self.assets_dir(),
            self.info.id_technique.to_lowercase()
        )
    }

    /// Hôte de l'API de prévision multi-points
    pub fn api_base(&self) -> String {
        format!(
            "https://{}.{}",
            self.tools.config.site, self.tools.config.base_url
        )
    }

    /// Chemin (relatif à `api_base`) de la prévision multi-points
    pub fn forecast_path(&self) -> String {
        let ids = self
            .children
            .iter()
            .map(|poi| poi.insee.as_str())
            .collect::<Vec<_>>()
            .join("%2C");
        format!(
            "/multiforecast?bbox=&begin_time=&end_time=&instants=morning%2Cafternoon%2Cevening%2Cnight&liste_id={}&time=",
            ids
        )
    }
}

/// Chemin amont d'un pictogramme météo
pub fn picto_path(name: &str) -> String {
    format!("{}/{}.svg", PICTOS_PREFIX, name)
}

/// Extrait le chemin canonique depuis un chemin amont
/// `/previsions-meteo-france/isere/38` → `isere`
pub fn extract_path(upstream: &str) -> Result<String, MfError> {
    static PATH_RE: OnceLock<Regex> = OnceLock::new();
    let re = PATH_RE.get_or_init(|| {
        Regex::new(r"^/previsions-meteo-france/(.+)/").expect("zone path regex compiles")
    });
    re.captures(upstream)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| MfError::validation("zone path", format!("cannot extract from '{upstream}'")))
}

/// Filtre les sous-zones : un pays expose ses régions, une région ses
/// départements, les autres niveaux rien.
pub fn filter_subzones(
    taxonomy: Taxonomy,
    subzones: &BTreeMap<String, Subzone>,
) -> BTreeMap<String, Subzone> {
    static REGION_RE: OnceLock<Regex> = OnceLock::new();
    static DEPT_RE: OnceLock<Regex> = OnceLock::new();

    let re = match taxonomy {
        Taxonomy::Pays => REGION_RE
            .get_or_init(|| Regex::new(r"^REGIN[0-9][0-9]$").expect("region id regex compiles")),
        Taxonomy::Region => DEPT_RE
            .get_or_init(|| Regex::new(r"^DEPT[0-9][0-9AB]$").expect("dept id regex compiles")),
        _ => return BTreeMap::new(),
    };

    subzones
        .iter()
        .filter(|(id, _)| re.is_match(id))
        .map(|(id, sz)| (id.clone(), sz.clone()))
        .collect()
}

/// Les sous-zones arrivent en objet, ou en tableau vide quand il n'y en a pas
fn subzones_or_empty_array<'de, D>(deserializer: D) -> Result<BTreeMap<String, Subzone>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, Subzone>),
        List(Vec<serde_json::Value>),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Map(m) => Ok(m),
        Raw::List(l) if l.is_empty() => Ok(BTreeMap::new()),
        Raw::List(_) => Err(de::Error::custom("sub_zone must be an object or an empty array")),
    }
}

/// Latitude/longitude transmises en nombre ou en chaîne
fn string_float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(f) => Ok(f),
        Raw::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("'{s}' is not a float"))),
    }
}
