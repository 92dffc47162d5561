//! Page texte `/statusse`

use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use super::Zone;

fn stamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".into())
}

/// Ligne de statistiques d'une zone
pub fn status_line(zone: &Zone, now: DateTime<Utc>) -> String {
    let stats = zone.stats();
    format!(
        "{} {:?} mode:{} lastUpdate:{} lastHit:{} nextUpdate:{}s hitCount:{}",
        zone.path(),
        zone.name(),
        zone.update_mode(now),
        stamp(stats.last_update()),
        stamp(stats.last_hit()),
        zone.remaining_delay(now).num_seconds(),
        stats.hits(),
    )
}

/// Une ligne par zone, par chemin croissant
pub fn status_text(zones: &[Arc<Zone>], now: DateTime<Utc>) -> String {
    let mut sorted: Vec<&Arc<Zone>> = zones.iter().collect();
    sorted.sort_by(|a, b| a.path().cmp(b.path()));

    let mut out = String::new();
    for zone in sorted {
        let _ = writeln!(out, "{}", status_line(zone, now));
    }
    out
}
