//! Politique de rafraîchissement des zones
//!
//! Une zone consultée dans les trois derniers jours est rafraîchie toutes
//! les 30 minutes (mode rapide), les autres toutes les 4 heures.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Durée du mode rapide après la dernière consultation
pub const FAST_MODE_WINDOW: Duration = Duration::days(3);

pub const FAST_MAX_AGE: Duration = Duration::minutes(30);
pub const SLOW_MAX_AGE: Duration = Duration::hours(4);

/// Mise à l'écart d'une zone après un rafraîchissement en échec
pub const FAILED_BACKOFF: Duration = Duration::minutes(5);

/// Cadence de rafraîchissement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Fast,
    Slow,
}

impl UpdateMode {
    /// Mode d'une zone selon sa dernière consultation (`None` si jamais)
    pub fn of(last_hit: Option<DateTime<Utc>>, now: DateTime<Utc>) -> UpdateMode {
        match last_hit {
            Some(hit) if now - hit < FAST_MODE_WINDOW => UpdateMode::Fast,
            _ => UpdateMode::Slow,
        }
    }

    /// Âge maximal d'une zone avant rafraîchissement
    pub fn max_age(&self) -> Duration {
        match self {
            UpdateMode::Fast => FAST_MAX_AGE,
            UpdateMode::Slow => SLOW_MAX_AGE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Fast => "fast",
            UpdateMode::Slow => "slow",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Délai restant avant le prochain rafraîchissement, négatif si la zone est
/// en retard. Une zone jamais mise à jour est en retard depuis l'epoch.
pub fn remaining_delay(
    last_hit: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Duration {
    let mode = UpdateMode::of(last_hit, now);
    let updated = last_update.unwrap_or(DateTime::UNIX_EPOCH);
    mode.max_age() - (now - updated)
}
