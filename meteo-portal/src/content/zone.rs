//! Zone vivante : contenu décodé, parent, fil d'Ariane et statistiques

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use mfmap::{Breadcrumb, ZoneData};
use serde::{Deserialize, Serialize};

use super::policy::{remaining_delay, UpdateMode};

/// Compteurs d'une zone, modifiables sans verrou
///
/// Les horodatages sont en secondes Unix, `0` signifiant « jamais ».
#[derive(Debug, Default)]
pub struct ZoneStats {
    hits: AtomicU64,
    last_hit: AtomicI64,
    last_update: AtomicI64,
    /// Pas de nouvelle tentative avant cette date ; non conservé dans le blob
    retry_after: AtomicI64,
}

/// Copie figée des compteurs, pour l'affichage et le blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub hits: u64,
    pub last_hit: i64,
    pub last_update: i64,
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

impl ZoneStats {
    pub fn record_hit(&self, now: DateTime<Utc>) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.last_hit.store(now.timestamp(), Ordering::Relaxed);
    }

    /// Date d'insertion ; lève une éventuelle mise à l'écart
    pub fn stamp_update(&self, now: DateTime<Utc>) {
        self.last_update.store(now.timestamp(), Ordering::Relaxed);
        self.retry_after.store(0, Ordering::Relaxed);
    }

    /// Écarte la zone de la sélection jusqu'à `until`
    pub fn defer_retry(&self, until: DateTime<Utc>) {
        self.retry_after.store(until.timestamp(), Ordering::Relaxed);
    }

    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        from_unix(self.retry_after.load(Ordering::Relaxed))
    }

    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.retry_after().is_some_and(|t| t > now)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn last_hit(&self) -> Option<DateTime<Utc>> {
        from_unix(self.last_hit.load(Ordering::Relaxed))
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        from_unix(self.last_update.load(Ordering::Relaxed))
    }

    pub fn record(&self) -> StatsRecord {
        StatsRecord {
            hits: self.hits(),
            last_hit: self.last_hit.load(Ordering::Relaxed),
            last_update: self.last_update.load(Ordering::Relaxed),
        }
    }

    pub fn from_record(r: StatsRecord) -> Self {
        Self {
            hits: AtomicU64::new(r.hits),
            last_hit: AtomicI64::new(r.last_hit),
            last_update: AtomicI64::new(r.last_update),
            retry_after: AtomicI64::new(0),
        }
    }
}

/// Zone telle que détenue par le store et servie par le routeur
pub struct Zone {
    pub data: ZoneData,

    /// Chemin canonique de la zone parente, absent pour la racine
    pub parent: Option<String>,

    svg: Bytes,

    /// Partagées entre les versions successives d'une même zone
    stats: Arc<ZoneStats>,

    breadcrumb: RwLock<Breadcrumb>,
}

impl Zone {
    pub fn new(data: ZoneData, parent: Option<String>) -> Self {
        Self::with_stats(data, parent, ZoneStats::default())
    }

    pub(crate) fn with_stats(data: ZoneData, parent: Option<String>, stats: ZoneStats) -> Self {
        let svg = Bytes::from(data.svg.clone());
        Self {
            data,
            parent,
            svg,
            stats: Arc::new(stats),
            breadcrumb: RwLock::new(Breadcrumb::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.data.path
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn svg(&self) -> Bytes {
        self.svg.clone()
    }

    pub fn stats(&self) -> &ZoneStats {
        &self.stats
    }

    /// Reprend les statistiques et, à défaut, le parent de la version
    /// précédente
    pub(crate) fn inherit(&mut self, old: &Zone) {
        self.stats = Arc::clone(&old.stats);
        if self.parent.is_none() {
            self.parent = old.parent.clone();
        }
    }

    pub fn breadcrumb(&self) -> Breadcrumb {
        self.breadcrumb
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_breadcrumb(&self, bc: Breadcrumb) {
        *self.breadcrumb.write().unwrap_or_else(PoisonError::into_inner) = bc;
    }

    pub fn update_mode(&self, now: DateTime<Utc>) -> UpdateMode {
        UpdateMode::of(self.stats.last_hit(), now)
    }

    pub fn remaining_delay(&self, now: DateTime<Utc>) -> Duration {
        remaining_delay(self.stats.last_hit(), self.stats.last_update(), now)
    }

    /// Délai avant la prochaine sélection possible : délai restant, allongé
    /// jusqu'à la fin d'une mise à l'écart
    pub fn due_in(&self, now: DateTime<Utc>) -> Duration {
        let delay = self.remaining_delay(now);
        match self.stats.retry_after() {
            Some(t) if t > now => delay.max(t - now),
            _ => delay,
        }
    }

    /// Corps JSON de `/data`
    pub fn render_json(&self, now: DateTime<Utc>) -> Result<Vec<u8>, mfmap::MfError> {
        self.data.to_json(&self.breadcrumb(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stats_record() {
        let stats = ZoneStats::default();
        assert_eq!(stats.hits(), 0);
        assert!(stats.last_hit().is_none());
        assert!(stats.last_update().is_none());

        let t = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        stats.record_hit(t);
        stats.record_hit(t);
        stats.stamp_update(t - Duration::hours(1));

        let rec = stats.record();
        assert_eq!(rec.hits, 2);
        assert_eq!(rec.last_hit, t.timestamp());

        stats.defer_retry(t + Duration::minutes(5));
        assert!(stats.is_deferred(t));
        assert!(!stats.is_deferred(t + Duration::minutes(5)));
        assert_eq!(stats.record(), rec);

        let restored = ZoneStats::from_record(rec);
        assert!(restored.retry_after().is_none());
        assert_eq!(restored.hits(), 2);
        assert_eq!(restored.last_hit(), Some(t));
        assert_eq!(restored.last_update(), Some(t - Duration::hours(1)));

        // Une insertion réussie lève la mise à l'écart
        stats.stamp_update(t);
        assert!(stats.retry_after().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_hits() {
        const N: usize = 10_000;

        let stats = Arc::new(ZoneStats::default());
        let barrier = Arc::new(tokio::sync::Barrier::new(N));
        let now = Utc::now();

        let tasks: Vec<_> = (0..N)
            .map(|_| {
                let stats = Arc::clone(&stats);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    stats.record_hit(now);
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(stats.hits(), N as u64);
        assert_eq!(stats.last_hit().map(|t| t.timestamp()), Some(now.timestamp()));
    }
}
