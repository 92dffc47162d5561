//! Charge utile JSON d'une zone (`/<zone>/data`)
//!
//! Vues en lecture seule sur `ZoneData` : la forme émise diffère de la forme
//! stockée (jours relatifs, moments en tableau ordonné, points sans code
//! INSEE, valeurs de séries en tableaux `[ms, v]`).

use chrono::{DateTime, NaiveDate, Utc};
use geo::Coord;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::chroniques::{Chronique, Graphdata, Sample, Serie, Value};
use crate::echeance::{days_between, Moment};
use crate::geography::{Bbox, GeoFeature, Prop0};
use crate::multiforecast::Forecast;
use crate::prevlist::{PrevAtPoi, PrevList, PrevsAtDay, PrevsAtMoment};
use crate::types::{BreadcrumbItem, Taxonomy};
use crate::zone::ZoneData;
use crate::MfError;

/// Zone telle qu'envoyée au navigateur
#[derive(Serialize)]
pub struct ZoneJson<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub breadcrumb: &'a [BreadcrumbItem],
    pub idtech: &'a str,
    pub taxonomy: Taxonomy,
    pub bbox: Bbox,
    pub subzones: Vec<GeoFeatureJson<'a>>,
    pub prevs: PrevListJson<'a>,
    /// Pas de graphiques pour le pays
    pub chroniques: Option<GraphdataJson<'a>>,
}

impl ZoneData {
    /// Vue JSON de la zone ; `now` fixe le jour de référence des `prevs`
    pub fn json_view<'a>(
        &'a self,
        breadcrumb: &'a [BreadcrumbItem],
        now: DateTime<Utc>,
    ) -> ZoneJson<'a> {
        let chroniques = match self.info.taxonomy {
            Taxonomy::Pays => None,
            _ => Some(GraphdataJson(&self.graphdata)),
        };
        ZoneJson {
            name: &self.info.name,
            path: &self.path,
            breadcrumb,
            idtech: &self.info.id_technique,
            taxonomy: self.info.taxonomy,
            bbox: self.geography.bbox.cropped(),
            subzones: self.geography.features.iter().map(GeoFeatureJson).collect(),
            prevs: PrevListJson {
                prevs: &self.prevs,
                today: now.date_naive(),
            },
            chroniques,
        }
    }

    /// Sérialise la vue JSON de la zone
    pub fn to_json(
        &self,
        breadcrumb: &[BreadcrumbItem],
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, MfError> {
        serde_json::to_vec(&self.json_view(breadcrumb, now)).map_err(|e| MfError::json("zone", e))
    }
}

struct LngLat(Coord<f64>);

impl Serialize for LngLat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.0.x, self.0.y].serialize(serializer)
    }
}

/// Polygone de sous-zone au format GeoJSON
pub struct GeoFeatureJson<'a>(&'a GeoFeature);

impl Serialize for GeoFeatureJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Properties<'a> {
            prop0: &'a Prop0,
            #[serde(rename = "customPath")]
            custom_path: &'a str,
        }

        #[derive(Serialize)]
        struct Geometry {
            #[serde(rename = "type")]
            kind: &'static str,
            coordinates: Vec<Vec<LngLat>>,
        }

        #[derive(Serialize)]
        struct Feature<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            bbox: Option<Bbox>,
            #[serde(rename = "type")]
            kind: &'static str,
            properties: Properties<'a>,
            geometry: Geometry,
        }

        let f = self.0;
        Feature {
            bbox: f.bbox,
            kind: "Feature",
            properties: Properties {
                prop0: &f.prop0,
                custom_path: &f.custom_path,
            },
            geometry: Geometry {
                kind: "Polygon",
                coordinates: f
                    .rings
                    .iter()
                    .map(|ring| ring.iter().copied().map(LngLat).collect())
                    .collect(),
            },
        }
        .serialize(serializer)
    }
}

/// Jours indexés par leur écart en jours avec `today`
pub struct PrevListJson<'a> {
    prevs: &'a PrevList,
    today: NaiveDate,
}

impl Serialize for PrevListJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.prevs.len()))?;
        for (date, pad) in &self.prevs.0 {
            map.serialize_entry(&days_between(*date, self.today), &DayJson(pad))?;
        }
        map.end()
    }
}

/// Une ligne : quatre cartes ordonnées, ou une seule carte de tendance
struct DayJson<'a>(&'a PrevsAtDay);

impl Serialize for DayJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Row<'a> {
            long_terme: bool,
            maps: Vec<Option<MomentJson<'a>>>,
        }

        let pad = self.0;
        let row = if pad.is_long_term() {
            Row {
                long_terme: true,
                maps: vec![pad.get(Moment::Journalier).map(MomentJson)],
            }
        } else {
            Row {
                long_terme: false,
                maps: Moment::COURTS
                    .iter()
                    .map(|m| pad.get(*m).map(MomentJson))
                    .collect(),
            }
        };
        row.serialize(serializer)
    }
}

struct MomentJson<'a>(&'a PrevsAtMoment);

impl Serialize for MomentJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Map<'a> {
            echeance: DateTime<Utc>,
            updated: DateTime<Utc>,
            prevs: Vec<PoiJson<'a>>,
        }

        let pam = self.0;
        Map {
            echeance: pam.echeance,
            updated: pam.updated,
            prevs: pam.prevs.values().map(PoiJson).collect(),
        }
        .serialize(serializer)
    }
}

struct PoiJson<'a>(&'a PrevAtPoi);

impl Serialize for PoiJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Poi<'a> {
            titre: &'a str,
            coords: LngLat,
            prev: PrevFields<'a>,
        }

        let p = self.0;
        Poi {
            titre: &p.titre,
            coords: LngLat(p.coords),
            prev: PrevFields::new(p),
        }
        .serialize(serializer)
    }
}

/// Champs plats d'une prévision : valeurs journalières, complétées par la
/// prévision courte quand elle existe
#[derive(Serialize, Default)]
struct PrevFields<'a> {
    moment_day: Option<Moment>,
    time: Option<DateTime<Utc>>,
    #[serde(rename = "T")]
    t: f64,
    #[serde(rename = "T_windchill")]
    t_windchill: f64,
    wind_speed: i64,
    wind_speed_gust: i64,
    wind_direction: i64,
    wind_icon: &'a str,
    total_cloud_cover: i64,
    weather_icon: &'a str,
    weather_description: &'a str,
    relative_humidity: i64,
    #[serde(rename = "P_sea")]
    p_sea: f64,
    weather_confidence_index: i64,
    #[serde(rename = "T_min")]
    t_min: f64,
    #[serde(rename = "T_max")]
    t_max: f64,
    relative_humidity_min: i64,
    relative_humidity_max: i64,
    uv_index: i64,
    long_terme: bool,
}

impl<'a> PrevFields<'a> {
    fn new(p: &'a PrevAtPoi) -> Self {
        let mut fields = PrevFields {
            long_terme: true,
            ..Default::default()
        };

        if let Some(d) = &p.daily {
            fields.time = Some(d.time);
            fields.t_min = d.t_min;
            fields.t_max = d.t_max;
            fields.relative_humidity_min = d.humidity_min;
            fields.relative_humidity_max = d.humidity_max;
            fields.uv_index = d.uv_index;
            fields.weather_icon = &d.weather_icon;
            fields.weather_description = &d.weather_description;
        }

        match &p.forecast {
            Some(Forecast::Court(f)) => {
                fields.long_terme = false;
                fields.moment_day = Some(f.moment);
                fields.time = Some(f.time);
                fields.t = f.t;
                fields.t_windchill = f.t_windchill;
                fields.wind_speed = f.wind_speed;
                fields.wind_speed_gust = f.wind_speed_gust;
                fields.wind_direction = f.wind_direction;
                fields.wind_icon = &f.wind_icon;
                fields.total_cloud_cover = f.cloud_cover;
                fields.weather_icon = &f.weather_icon;
                fields.weather_description = &f.weather_description;
                fields.relative_humidity = f.relative_humidity;
                fields.p_sea = f.p_sea;
                fields.weather_confidence_index = f.confidence;
            }
            Some(Forecast::Long(f)) if p.daily.is_none() => {
                fields.time = Some(f.time);
            }
            _ => {}
        }
        fields
    }
}

/// Séries indexées par nom ; le code INSEE des points n'est pas transmis
pub struct GraphdataJson<'a>(&'a Graphdata);

impl Serialize for GraphdataJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0 .0.len()))?;
        for (serie, chroniques) in &self.0 .0 {
            let list: Vec<ChroniqueJson> = chroniques
                .values()
                .map(|c| ChroniqueJson { serie: *serie, chro: c })
                .collect();
            map.serialize_entry(serie.name(), &list)?;
        }
        map.end()
    }
}

struct ChroniqueJson<'a> {
    serie: Serie,
    chro: &'a Chronique,
}

impl Serialize for ChroniqueJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.chro.len()))?;
        for s in self.chro {
            seq.serialize_element(&SampleJson {
                serie: self.serie,
                sample: s,
            })?;
        }
        seq.end()
    }
}

/// `[ms, v]` ou `[ms, min, max]`
struct SampleJson<'a> {
    serie: Serie,
    sample: &'a Sample,
}

impl Serialize for SampleJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = (self.sample.ts + self.serie.offset()).timestamp_millis();
        match self.sample.value {
            Value::Float(v) => (ms, v).serialize(serializer),
            Value::Int(v) => (ms, v).serialize(serializer),
            Value::FloatRange(min, max) => (ms, min, max).serialize(serializer),
            Value::IntRange(min, max) => (ms, min, max).serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiforecast::{Daily, LongForecast, PointFeature, ShortForecast};
    use chrono::TimeZone;
    use geo::coord;
    use serde_json::json;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
    }

    fn daily(d: u32) -> Daily {
        Daily {
            time: at(d, 0),
            t_min: -1.0,
            t_max: 6.5,
            humidity_min: 45,
            humidity_max: 95,
            uv_index: 1,
            weather_icon: "p3j".into(),
            weather_description: "Nuageux".into(),
        }
    }

    fn feature(forecasts: Vec<Forecast>) -> PointFeature {
        PointFeature {
            insee: "381850".into(),
            name: "Grenoble".into(),
            coords: coord! { x: 5.72, y: 45.17 },
            update_time: at(1, 18),
            forecasts,
            dailies: vec![daily(2), daily(9)],
        }
    }

    #[test]
    fn test_day_shapes() {
        let f = feature(vec![
            Forecast::Court(ShortForecast {
                moment: Moment::ApresMidi,
                time: at(2, 12),
                t: 4.5,
                t_windchill: 2.0,
                wind_speed: 15,
                wind_speed_gust: 30,
                wind_direction: 270,
                wind_icon: "O".into(),
                iso0: 900,
                cloud_cover: 80,
                weather_icon: "p5j".into(),
                weather_description: "Averses".into(),
                relative_humidity: 85,
                p_sea: 1008.0,
                confidence: 2,
            }),
            Forecast::Long(LongForecast {
                moment: Moment::Matin,
                time: at(9, 6),
            }),
        ]);
        let prevs = PrevList::build(&[f]);
        let view = PrevListJson {
            prevs: &prevs,
            today: at(2, 0).date_naive(),
        };
        let v = serde_json::to_value(&view).unwrap();

        let today = &v["0"];
        assert_eq!(today["long_terme"], json!(false));
        let maps = today["maps"].as_array().unwrap();
        assert_eq!(maps.len(), 4);
        assert!(maps[0].is_null());
        assert!(maps[2].is_null() && maps[3].is_null());
        let prev = &maps[1]["prevs"][0];
        assert_eq!(prev["titre"], json!("Grenoble"));
        assert_eq!(prev["coords"], json!([5.72, 45.17]));
        assert_eq!(prev["prev"]["T"], json!(4.5));
        assert_eq!(prev["prev"]["T_max"], json!(6.5));
        assert_eq!(prev["prev"]["moment_day"], json!("après-midi"));
        assert_eq!(prev["prev"]["weather_icon"], json!("p5j"));

        let later = &v["7"];
        assert_eq!(later["long_terme"], json!(true));
        let maps = later["maps"].as_array().unwrap();
        assert_eq!(maps.len(), 1);
        let prev = &maps[0]["prevs"][0]["prev"];
        assert_eq!(prev["long_terme"], json!(true));
        assert_eq!(prev["weather_icon"], json!("p3j"));
    }

    #[test]
    fn test_sample_shapes() {
        let mut g = Graphdata::default();
        g.0.entry(Serie::T).or_default().insert(
            "381850".into(),
            vec![Sample {
                ts: at(2, 6),
                value: Value::Float(3.5),
            }],
        );
        g.0.entry(Serie::Hrange).or_default().insert(
            "381850".into(),
            vec![Sample {
                ts: at(2, 0),
                value: Value::IntRange(40, 90),
            }],
        );

        let v = serde_json::to_value(GraphdataJson(&g)).unwrap();
        let ms = at(2, 6).timestamp_millis();
        assert_eq!(v["T"], json!([[[ms, 3.5]]]));
        let ms = at(2, 8).timestamp_millis();
        assert_eq!(v["Hrange"], json!([[[ms, 40, 90]]]));
    }
}
