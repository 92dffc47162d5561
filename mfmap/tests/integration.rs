//! Tests d'intégration sur une zone complète (pays)

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mfmap::{parse_html, BreadcrumbItem, Moment, Serie, Taxonomy, ZoneData, ZoneSources};

const HTML: &[u8] = include_bytes!("fixtures/france.html");
const SVG: &[u8] = include_bytes!("fixtures/pays007.svg");
const GEOGRAPHY: &[u8] = include_bytes!("fixtures/pays007-aggrege.json");
const MULTIFORECAST: &[u8] = include_bytes!("fixtures/multiforecast.json");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap()
}

fn assemble() -> ZoneData {
    let map = parse_html(HTML).expect("settings block");
    ZoneData::assemble(
        "/",
        &map,
        ZoneSources {
            svg: SVG,
            geography: GEOGRAPHY,
            multiforecast: MULTIFORECAST,
        },
        now(),
    )
    .expect("zone assembles")
}

#[test]
fn test_assemble_country_zone() {
    let zone = assemble();

    assert_eq!(zone.path, "france");
    assert_eq!(zone.original_path, "/");
    assert_eq!(zone.name(), "France");
    assert_eq!(zone.taxonomy(), Taxonomy::Pays);

    // Un pays n'expose que ses régions
    assert_eq!(zone.subzones.keys().collect::<Vec<_>>(), vec!["REGIN10"]);
    assert_eq!(
        zone.subzone_paths().collect::<Vec<_>>(),
        vec!["/previsions-meteo-france/auvergne-rhone-alpes/10"]
    );
    assert_eq!(zone.geography.features.len(), 1);
    assert_eq!(zone.geography.features[0].custom_path, "auvergne-rhone-alpes");

    assert_eq!(
        zone.pictos.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["p1j", "p2j", "p4n"]
    );

    let svg = String::from_utf8(zone.svg.clone()).unwrap();
    assert!(svg.contains(r#"viewBox="144 52 518 554""#), "{svg}");
}

#[test]
fn test_prevs_by_day() {
    let zone = assemble();
    let jan = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();

    assert_eq!(
        zone.prevs.0.keys().copied().collect::<Vec<_>>(),
        vec![jan(1), jan(2), jan(8)]
    );

    // La nuit du 2 à 1h est affichée avec le 1er
    let day1 = zone.prevs.get(&jan(1)).unwrap();
    assert_eq!(day1.get(Moment::Nuit).unwrap().prevs.len(), 2);
    assert!(day1.get(Moment::Journalier).is_some());

    let day8 = zone.prevs.get(&jan(8)).unwrap();
    assert!(day8.is_long_term());
}

#[test]
fn test_zone_json() {
    let zone = assemble();
    let breadcrumb = vec![BreadcrumbItem::new("France", "france")];
    let body = zone.to_json(&breadcrumb, now()).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(v["name"], "France");
    assert_eq!(v["path"], "france");
    assert_eq!(v["idtech"], "PAYS007");
    assert_eq!(v["taxonomy"], "PAYS");
    assert_eq!(v["breadcrumb"], serde_json::json!([{"nom": "France", "path": "france"}]));
    assert!(v["chroniques"].is_null());

    let bbox = &v["bbox"];
    assert!((bbox["w"].as_f64().unwrap() - (-5.5 + 0.2 * 15.5)).abs() < 1e-9);

    let subzones = v["subzones"].as_array().unwrap();
    assert_eq!(subzones.len(), 1);
    assert_eq!(subzones[0]["properties"]["customPath"], "auvergne-rhone-alpes");
    assert_eq!(subzones[0]["geometry"]["type"], "Polygon");

    let prevs = v["prevs"].as_object().unwrap();
    let mut days: Vec<i64> = prevs.keys().map(|k| k.parse().unwrap()).collect();
    days.sort();
    assert_eq!(days, vec![-1, 0, 6]);
    assert_eq!(prevs["0"]["maps"].as_array().unwrap().len(), 4);
    assert_eq!(prevs["6"]["long_terme"], true);
    assert_eq!(prevs["6"]["maps"].as_array().unwrap().len(), 1);
}

#[test]
fn test_region_has_chroniques() {
    let mut zone = assemble();
    zone.info.taxonomy = Taxonomy::Region;
    let body = zone.to_json(&[], now()).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let t = v["chroniques"]["T"].as_array().unwrap();
    assert_eq!(t.len(), 2);
    assert_eq!(t[0].as_array().unwrap().len(), 4);
    assert!(v["chroniques"]["Trange"].is_array());
}

#[test]
fn test_merge_with_previous_version() {
    let old = assemble();
    let mut new = assemble();

    // La nouvelle version ne porte plus la veille
    let yesterday = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    new.prevs.0.remove(&yesterday);
    for chroniques in new.graphdata.0.values_mut() {
        for chro in chroniques.values_mut() {
            chro.retain(|s| s.ts >= now());
        }
    }

    new.merge(&old, -3, 11, now());
    assert!(new.prevs.get(&yesterday).is_some());
    assert_eq!(new.prevs, old.prevs);

    let t = &new.graphdata.serie(Serie::T).unwrap()["751010"];
    assert_eq!(t.len(), 4);
    assert!(t.windows(2).all(|w| w[0].ts < w[1].ts));
}
