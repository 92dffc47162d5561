//! Décodeur de la prévision multi-points (`/multiforecast`)
//!
//! Le flux amont est une `FeatureCollection` GeoJSON : un `Feature` par point,
//! avec ses prévisions courtes (`forecast`) et journalières
//! (`daily_forecast`). Une prévision courte dont la température ou le vent
//! est nul (ou absent) est une prévision de tendance, décodée en
//! `Forecast::Long`.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use geo::Coord;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::echeance::{Echeance, Moment};
use crate::geography::{check_coord, expect_type};
use crate::types::CodeInsee;
use crate::MfError;

const CODE_INSEE_MIN_LEN: usize = 6;

/// Un point de prévision et toutes ses échéances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub insee: CodeInsee,
    pub name: String,
    /// x = longitude, y = latitude
    pub coords: Coord<f64>,
    pub update_time: DateTime<Utc>,
    pub forecasts: Vec<Forecast>,
    pub dailies: Vec<Daily>,
}

/// Prévision à un moment donné
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Forecast {
    /// Prévision détaillée (jusqu'à J+3 environ)
    Court(ShortForecast),
    /// Tendance : seules les valeurs journalières sont significatives
    Long(LongForecast),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortForecast {
    pub moment: Moment,
    pub time: DateTime<Utc>,
    pub t: f64,
    pub t_windchill: f64,
    pub wind_speed: i64,
    pub wind_speed_gust: i64,
    pub wind_direction: i64,
    pub wind_icon: String,
    pub iso0: i64,
    pub cloud_cover: i64,
    pub weather_icon: String,
    pub weather_description: String,
    pub relative_humidity: i64,
    pub p_sea: f64,
    pub confidence: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongForecast {
    pub moment: Moment,
    pub time: DateTime<Utc>,
}

/// Prévision journalière d'un point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Daily {
    /// Minuit UTC du jour concerné
    pub time: DateTime<Utc>,
    pub t_min: f64,
    pub t_max: f64,
    pub humidity_min: i64,
    pub humidity_max: i64,
    pub uv_index: i64,
    pub weather_icon: String,
    pub weather_description: String,
}

impl Forecast {
    pub fn moment(&self) -> Moment {
        match self {
            Forecast::Court(f) => f.moment,
            Forecast::Long(f) => f.moment,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Forecast::Court(f) => f.time,
            Forecast::Long(f) => f.time,
        }
    }

    pub fn is_long_term(&self) -> bool {
        matches!(self, Forecast::Long(_))
    }

    pub fn echeance(&self) -> Echeance {
        Echeance::of_forecast(self.moment(), self.time())
    }
}

impl PointFeature {
    /// Prévision journalière correspondant à la date d'une échéance
    pub fn daily_at(&self, e: &Echeance) -> Option<&Daily> {
        self.dailies.iter().find(|d| d.time.date_naive() == e.date)
    }
}

/// Noms des pictogrammes référencés par un ensemble de points
pub fn picto_names(features: &[PointFeature]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for feat in features {
        for f in &feat.forecasts {
            if let Forecast::Court(f) = f {
                names.insert(f.weather_icon.clone());
                names.insert(f.wind_icon.clone());
            }
        }
        for d in &feat.dailies {
            names.insert(d.weather_icon.clone());
        }
    }
    names.remove("");
    names
}

/// Décode et valide une prévision multi-points
pub fn parse_multiforecast(json: &[u8]) -> Result<Vec<PointFeature>, MfError> {
    let raw: RawCollection =
        serde_json::from_slice(json).map_err(|e| MfError::json("multiforecast", e))?;
    expect_type("multiforecast collection", &raw.kind, "FeatureCollection")?;

    raw.features.into_iter().map(RawFeature::validate).collect()
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    update_time: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: String,
    geometry: RawPoint,
    properties: RawProperties,
}

#[derive(Deserialize)]
struct RawPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

#[derive(Deserialize)]
struct RawProperties {
    name: String,
    country: String,
    #[serde(default, rename = "french_department")]
    _department: Option<String>,
    timezone: String,
    insee: String,
    #[serde(default, rename = "altitude")]
    _altitude: Option<i64>,
    #[serde(default)]
    forecast: Vec<RawForecast>,
    #[serde(default)]
    daily_forecast: Vec<RawDaily>,
}

#[derive(Deserialize)]
struct RawForecast {
    moment_day: String,
    time: DateTime<Utc>,
    #[serde(default, rename = "T")]
    t: Option<f64>,
    #[serde(default, rename = "T_windchill")]
    t_windchill: Option<f64>,
    #[serde(default)]
    wind_speed: Option<i64>,
    #[serde(default)]
    wind_speed_gust: Option<i64>,
    #[serde(default)]
    wind_direction: Option<i64>,
    #[serde(default)]
    wind_icon: Option<String>,
    #[serde(default)]
    iso0: Option<i64>,
    #[serde(default)]
    total_cloud_cover: Option<i64>,
    #[serde(default)]
    weather_icon: Option<String>,
    #[serde(default)]
    weather_description: Option<String>,
    #[serde(default)]
    relative_humidity: Option<i64>,
    #[serde(default, rename = "P_sea")]
    p_sea: Option<f64>,
    #[serde(default)]
    weather_confidence_index: Option<i64>,
}

#[derive(Deserialize)]
struct RawDaily {
    time: DateTime<Utc>,
    #[serde(default, rename = "T_min")]
    t_min: Option<f64>,
    #[serde(default, rename = "T_max")]
    t_max: Option<f64>,
    #[serde(default)]
    relative_humidity_min: Option<i64>,
    #[serde(default)]
    relative_humidity_max: Option<i64>,
    #[serde(default)]
    uv_index: Option<i64>,
    #[serde(default)]
    daily_weather_icon: Option<String>,
    #[serde(default)]
    daily_weather_description: Option<String>,
}

impl RawFeature {
    fn validate(self) -> Result<PointFeature, MfError> {
        static TZ_RE: OnceLock<Regex> = OnceLock::new();
        static COUNTRY_RE: OnceLock<Regex> = OnceLock::new();
        let tz_re = TZ_RE.get_or_init(|| {
            Regex::new(r"Europe/(Paris)|(Rome)|(Zurich)|(Madrid)|(Brussels)")
                .expect("timezone regex compiles")
        });
        let country_re =
            COUNTRY_RE.get_or_init(|| Regex::new(r"FR - France").expect("country regex compiles"));

        expect_type("multiforecast feature", &self.kind, "Feature")?;
        expect_type("multiforecast geometry", &self.geometry.kind, "Point")?;

        let props = self.properties;
        if props.insee.len() < CODE_INSEE_MIN_LEN {
            return Err(MfError::validation(
                "insee",
                format!("'{}' shorter than {} chars", props.insee, CODE_INSEE_MIN_LEN),
            ));
        }
        if !tz_re.is_match(&props.timezone) {
            return Err(MfError::validation(
                "timezone",
                format!("'{}' is not a supported timezone", props.timezone),
            ));
        }
        if !country_re.is_match(&props.country) {
            return Err(MfError::validation(
                "country",
                format!("'{}' is not 'FR - France'", props.country),
            ));
        }

        let [lng, lat] = self.geometry.coordinates;
        let coords = check_coord(lng, lat)?;

        let forecasts = props
            .forecast
            .into_iter()
            .map(RawForecast::into_forecast)
            .collect::<Result<Vec<_>, _>>()?;
        let dailies = props.daily_forecast.into_iter().map(RawDaily::into_daily).collect();

        Ok(PointFeature {
            insee: props.insee,
            name: props.name,
            coords,
            update_time: self.update_time,
            forecasts,
            dailies,
        })
    }
}

impl RawForecast {
    fn into_forecast(self) -> Result<Forecast, MfError> {
        let moment = Moment::from_upstream(&self.moment_day).ok_or_else(|| {
            MfError::validation("moment_day", format!("unknown moment '{}'", self.moment_day))
        })?;

        // Température ou vent nul : prévision de tendance
        let (Some(t), Some(wind_speed)) = (self.t, self.wind_speed) else {
            return Ok(Forecast::Long(LongForecast {
                moment,
                time: self.time,
            }));
        };

        Ok(Forecast::Court(ShortForecast {
            moment,
            time: self.time,
            t,
            t_windchill: self.t_windchill.unwrap_or_default(),
            wind_speed,
            wind_speed_gust: self.wind_speed_gust.unwrap_or_default(),
            wind_direction: self.wind_direction.unwrap_or_default(),
            wind_icon: self.wind_icon.unwrap_or_default(),
            iso0: self.iso0.unwrap_or_default(),
            cloud_cover: self.total_cloud_cover.unwrap_or_default(),
            weather_icon: self.weather_icon.unwrap_or_default(),
            weather_description: self.weather_description.unwrap_or_default(),
            relative_humidity: self.relative_humidity.unwrap_or_default(),
            p_sea: self.p_sea.unwrap_or_default(),
            confidence: self.weather_confidence_index.unwrap_or_default(),
        }))
    }
}

impl RawDaily {
    fn into_daily(self) -> Daily {
        Daily {
            time: self.time,
            t_min: self.t_min.unwrap_or_default(),
            t_max: self.t_max.unwrap_or_default(),
            humidity_min: self.relative_humidity_min.unwrap_or_default(),
            humidity_max: self.relative_humidity_max.unwrap_or_default(),
            uv_index: self.uv_index.unwrap_or_default(),
            weather_icon: self.daily_weather_icon.unwrap_or_default(),
            weather_description: self.daily_weather_description.unwrap_or_default(),
        }
    }
}
