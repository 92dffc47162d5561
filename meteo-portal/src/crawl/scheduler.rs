//! Boucle de rafraîchissement
//!
//! Un seul worker choisit la zone la plus en retard, la télécharge à nouveau
//! et la transmet au store. Les zones sont rafraîchies une par une. Une zone
//! en échec reste servie telle quelle et n'est plus candidate pendant
//! `FAILED_BACKOFF`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::Crawler;
use crate::content::policy::FAILED_BACKOFF;
use crate::content::{submit, Content, PictoUpdate, ZoneUpdate};
use crate::upstream::CachePolicy;

/// Pause après un rafraîchissement en échec
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Attente maximale quand aucune zone n'est en retard
pub const IDLE_POLL: Duration = Duration::from_secs(60);

const MIN_WAIT: Duration = Duration::from_secs(1);

/// Issue d'un tour de boucle
#[derive(Debug, PartialEq, Eq)]
pub enum Refresh {
    /// Zone rafraîchie et insérée
    Updated(String),
    /// Aucune zone en retard ; attente conseillée
    Idle(Duration),
    /// Téléchargement ou décodage en échec, zone inchangée et écartée
    Failed(String),
    /// Le store ne reçoit plus
    Closed,
}

/// Attend le signal d'arrêt, ou la disparition de son émetteur
pub async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|s| *s).await;
}

pub struct Scheduler {
    crawler: Arc<Crawler>,
    content: Arc<Content>,
    zones: mpsc::Sender<ZoneUpdate>,
    pictos: mpsc::Sender<PictoUpdate>,
}

impl Scheduler {
    pub fn new(
        crawler: Arc<Crawler>,
        content: Arc<Content>,
        zones: mpsc::Sender<ZoneUpdate>,
        pictos: mpsc::Sender<PictoUpdate>,
    ) -> Self {
        Self {
            crawler,
            content,
            zones,
            pictos,
        }
    }

    /// Rafraîchit la zone la plus en retard, s'il y en a une
    pub async fn refresh_once(&self) -> Refresh {
        let now = Utc::now();
        let Some(path) = self.content.updatable(now) else {
            let wait = self
                .content
                .next_deadline(now)
                .and_then(|d| d.to_std().ok())
                .map_or(IDLE_POLL, |d| d.clamp(MIN_WAIT, IDLE_POLL));
            return Refresh::Idle(wait);
        };
        let Some(current) = self.content.zone(&path) else {
            return Refresh::Failed(path);
        };

        info!(
            path = %path,
            mode = %current.update_mode(now),
            delay = current.remaining_delay(now).num_seconds(),
            "Refreshing zone"
        );
        let fetched = self
            .crawler
            .get_zone(
                &current.data.original_path,
                current.parent.as_deref(),
                CachePolicy::Update,
            )
            .await;
        let zone = match fetched {
            Ok(zone) => zone,
            Err(e) => {
                let until = Utc::now() + FAILED_BACKOFF;
                current.stats().defer_retry(until);
                warn!(
                    path = %path,
                    retry_after = %until.to_rfc3339(),
                    error = %format!("{e:#}"),
                    "Zone refresh failed"
                );
                return Refresh::Failed(path);
            }
        };

        self.crawler
            .fetch_pictos(&zone, &self.content, &self.pictos)
            .await;
        if !submit(&self.zones, zone).await {
            return Refresh::Closed;
        }
        Refresh::Updated(path)
    }

    /// Boucle jusqu'au signal d'arrêt ; une requête amont en cours est
    /// abandonnée à l'arrêt
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!("Refresh scheduler started");
        loop {
            let outcome = tokio::select! {
                _ = stopped(&mut stop) => break,
                outcome = self.refresh_once() => outcome,
            };
            let wait = match outcome {
                Refresh::Updated(_) => continue,
                Refresh::Idle(wait) => wait,
                Refresh::Failed(_) => RETRY_DELAY,
                Refresh::Closed => break,
            };
            debug!(wait_secs = wait.as_secs(), "Scheduler waiting");
            tokio::select! {
                _ = stopped(&mut stop) => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("Refresh scheduler stopped");
    }
}
