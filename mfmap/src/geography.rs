//! Polygones des sous-zones (`geo_json/*-aggrege.json`)

use std::collections::BTreeMap;

use geo::{coord, Coord, Intersects, Rect};
use serde::{Deserialize, Serialize};

use crate::map::extract_path;
use crate::types::Subzone;
use crate::MfError;

/// Fenêtre de validité des coordonnées (métropole et pays limitrophes)
const MIN_LAT: f64 = 35.0;
const MAX_LAT: f64 = 55.0;
const MIN_LNG: f64 = -12.0;
const MAX_LNG: f64 = 15.0;

/// Rognage appliqué à l'emprise, identique à celui du fond SVG
pub const CROP_LEFT: f64 = 0.20;
pub const CROP_RIGHT: f64 = 0.08;
pub const CROP_TOP: f64 = 0.08;
pub const CROP_BOTTOM: f64 = 0.08;

/// Emprise géographique
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub w: f64,
    pub e: f64,
    pub n: f64,
    pub s: f64,
}

/// Polygones des sous-zones d'une carte
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCollection {
    pub bbox: Bbox,
    pub features: Vec<GeoFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    pub bbox: Option<Bbox>,
    pub prop0: Prop0,
    /// Chemin canonique de la sous-zone, pour la navigation
    pub custom_path: String,
    /// Anneaux du polygone, x = longitude, y = latitude
    pub rings: Vec<Vec<Coord<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prop0 {
    pub nom: String,
    pub cible: String,
    #[serde(default)]
    pub paths: Paths,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    #[serde(default)]
    pub fr: String,
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub es: String,
}

impl Bbox {
    /// Réduit l'emprise de chaque côté d'une fraction de sa largeur/hauteur
    pub fn crop(&self, left: f64, right: f64, top: f64, bottom: f64) -> Bbox {
        let width = self.e - self.w;
        let height = self.n - self.s;
        Bbox {
            w: self.w + left * width,
            e: self.e - right * width,
            n: self.n - top * height,
            s: self.s + bottom * height,
        }
    }

    /// Emprise rognée servie au navigateur
    pub fn cropped(&self) -> Bbox {
        self.crop(CROP_LEFT, CROP_RIGHT, CROP_TOP, CROP_BOTTOM)
    }

    /// Emprise amont : tableau `[ouest, nord, est, sud]`
    fn from_upstream(a: [f64; 4]) -> Result<Bbox, MfError> {
        check_coord(a[0], a[1])?;
        check_coord(a[2], a[3])?;
        Ok(Bbox {
            w: a[0],
            n: a[1],
            e: a[2],
            s: a[3],
        })
    }
}

/// Vérifie qu'un point est dans la fenêtre attendue
pub(crate) fn check_coord(lng: f64, lat: f64) -> Result<Coord<f64>, MfError> {
    let window = Rect::new(
        coord! { x: MIN_LNG, y: MIN_LAT },
        coord! { x: MAX_LNG, y: MAX_LAT },
    );
    let c = coord! { x: lng, y: lat };
    if !window.intersects(&c) {
        return Err(MfError::validation(
            "coordinates",
            format!(
                "({lng}, {lat}) outside lng [{MIN_LNG}, {MAX_LNG}] lat [{MIN_LAT}, {MAX_LAT}]"
            ),
        ));
    }
    Ok(c)
}

/// Vérifie le discriminant `type` d'un objet GeoJSON
pub(crate) fn expect_type(what: &str, got: &str, want: &str) -> Result<(), MfError> {
    if got != want {
        return Err(MfError::validation(what, format!("type is '{got}', want '{want}'")));
    }
    Ok(())
}

/// Décode les polygones et ne garde que ceux des sous-zones retenues
pub fn parse_geography(
    json: &[u8],
    subzones: &BTreeMap<String, Subzone>,
) -> Result<GeoCollection, MfError> {
    let raw: RawCollection =
        serde_json::from_slice(json).map_err(|e| MfError::json("geography", e))?;
    expect_type("geography collection", &raw.kind, "FeatureCollection")?;
    let bbox = Bbox::from_upstream(raw.bbox)?;

    let mut features = Vec::with_capacity(subzones.len());
    for feat in raw.features {
        let Some(sz) = subzones.get(&feat.properties.prop0.cible) else {
            continue;
        };
        expect_type("geography feature", &feat.kind, "Feature")?;
        expect_type("geography geometry", &feat.geometry.kind, "Polygon")?;

        let rings = feat
            .geometry
            .coordinates
            .iter()
            .map(|ring| {
                ring.iter()
                    .map(|&[lng, lat]| check_coord(lng, lat))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        features.push(GeoFeature {
            bbox: feat.bbox.map(Bbox::from_upstream).transpose()?,
            prop0: feat.properties.prop0,
            custom_path: extract_path(&sz.path)?,
            rings,
        });
    }

    Ok(GeoCollection { bbox, features })
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    bbox: [f64; 4],
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    bbox: Option<[f64; 4]>,
    properties: RawProperties,
    geometry: RawGeometry,
}

#[derive(Deserialize)]
struct RawProperties {
    prop0: Prop0,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<[f64; 2]>>,
}
