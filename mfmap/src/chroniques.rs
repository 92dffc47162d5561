//! Séries temporelles ("chroniques") pour les graphiques

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::multiforecast::{Daily, Forecast, PointFeature};
use crate::types::CodeInsee;

/// Au-delà de cet horizon, les valeurs ne sont pas tracées
pub const CHRONIQUE_MAX_DAYS: i64 = 11;

/// Décalage des min/max journaliers par rapport à minuit
const DAILY_OFFSET_HOURS: i64 = 8;

/// Catalogue des séries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Serie {
    T,
    Ress,
    WindSpeed,
    WindSpeedGust,
    Iso0,
    Cloud,
    Hrel,
    Psea,
    Trange,
    Hrange,
    Uv,
}

impl Serie {
    /// Séries extraites des prévisions courtes
    pub const FORECAST: [Serie; 8] = [
        Serie::T,
        Serie::Ress,
        Serie::WindSpeed,
        Serie::WindSpeedGust,
        Serie::Iso0,
        Serie::Cloud,
        Serie::Hrel,
        Serie::Psea,
    ];

    /// Séries extraites des prévisions journalières
    pub const DAILY: [Serie; 3] = [Serie::Trange, Serie::Hrange, Serie::Uv];

    pub fn name(&self) -> &'static str {
        match self {
            Serie::T => "T",
            Serie::Ress => "Ress",
            Serie::WindSpeed => "WindSpeed",
            Serie::WindSpeedGust => "WindSpeedGust",
            Serie::Iso0 => "Iso0",
            Serie::Cloud => "Cloud",
            Serie::Hrel => "Hrel",
            Serie::Psea => "Psea",
            Serie::Trange => "Trange",
            Serie::Hrange => "Hrange",
            Serie::Uv => "Uv",
        }
    }

    /// Décalage d'affichage des points de la série
    pub fn offset(&self) -> Duration {
        match self {
            Serie::Trange | Serie::Hrange => Duration::hours(DAILY_OFFSET_HOURS),
            _ => Duration::zero(),
        }
    }
}

/// Valeur d'un point de série
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f64),
    Int(i64),
    FloatRange(f64, f64),
    IntRange(i64, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub value: Value,
}

pub type Chronique = Vec<Sample>;

/// Chroniques indexées par série puis par point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graphdata(pub BTreeMap<Serie, BTreeMap<CodeInsee, Chronique>>);

fn forecast_sample(f: &Forecast, serie: Serie) -> Option<Sample> {
    // Les tendances n'ont pas de valeurs horaires
    let Forecast::Court(f) = f else {
        return None;
    };
    let value = match serie {
        Serie::T => Value::Float(f.t),
        Serie::Ress => Value::Float(f.t_windchill),
        Serie::WindSpeed => Value::Int(f.wind_speed),
        Serie::WindSpeedGust => Value::Int(f.wind_speed_gust),
        Serie::Iso0 => Value::Int(f.iso0),
        Serie::Cloud => Value::Int(f.cloud_cover),
        Serie::Hrel => Value::Int(f.relative_humidity),
        Serie::Psea => Value::Float(f.p_sea),
        Serie::Trange | Serie::Hrange | Serie::Uv => return None,
    };
    Some(Sample { ts: f.time, value })
}

fn daily_sample(d: &Daily, serie: Serie) -> Option<Sample> {
    let value = match serie {
        Serie::Trange => Value::FloatRange(d.t_min, d.t_max),
        Serie::Hrange => Value::IntRange(d.humidity_min, d.humidity_max),
        Serie::Uv => Value::Int(d.uv_index),
        _ => return None,
    };
    Some(Sample { ts: d.time, value })
}

impl Graphdata {
    /// Extrait les chroniques de chaque point, jusqu'à
    /// `CHRONIQUE_MAX_DAYS` jours après `now`
    pub fn build(features: &[PointFeature], now: DateTime<Utc>) -> Graphdata {
        let horizon = Duration::days(CHRONIQUE_MAX_DAYS);
        let keep = |s: &Sample| s.ts.signed_duration_since(now) <= horizon;

        let mut g = Graphdata::default();
        for feat in features {
            for serie in Serie::FORECAST {
                let chro = feat
                    .forecasts
                    .iter()
                    .filter_map(|f| forecast_sample(f, serie))
                    .filter(keep)
                    .collect();
                g.0.entry(serie).or_default().insert(feat.insee.clone(), chro);
            }
            for serie in Serie::DAILY {
                let chro = feat
                    .dailies
                    .iter()
                    .filter_map(|d| daily_sample(d, serie))
                    .filter(keep)
                    .collect();
                g.0.entry(serie).or_default().insert(feat.insee.clone(), chro);
            }
        }
        g
    }

    /// Fusionne l'historique de `old` : union dédoublonnée à la seconde près,
    /// les nouvelles valeurs l'emportent, les anciennes hors fenêtre
    /// `[24·day_min, 24·day_max]` heures d'âge sont écartées.
    pub fn merge(&mut self, old: &Graphdata, day_min: i64, day_max: i64, now: DateTime<Utc>) {
        for (serie, chroniques) in self.0.iter_mut() {
            let Some(old_serie) = old.0.get(serie) else {
                continue;
            };
            for (insee, chro) in chroniques.iter_mut() {
                let Some(old_chro) = old_serie.get(insee) else {
                    continue;
                };
                *chro = merge_chronique(chro, old_chro, day_min, day_max, now);
            }
        }
    }

    pub fn serie(&self, serie: Serie) -> Option<&BTreeMap<CodeInsee, Chronique>> {
        self.0.get(&serie)
    }
}

fn merge_chronique(
    new: &[Sample],
    old: &[Sample],
    day_min: i64,
    day_max: i64,
    now: DateTime<Utc>,
) -> Chronique {
    let mut merged: BTreeMap<i64, Sample> = BTreeMap::new();

    for s in old {
        let age = now.signed_duration_since(s.ts).num_hours();
        if age < 24 * day_min || age > 24 * day_max {
            continue;
        }
        merged.insert(s.ts.timestamp(), *s);
    }
    for s in new {
        merged.insert(s.ts.timestamp(), *s);
    }

    merged.into_values().collect()
}
