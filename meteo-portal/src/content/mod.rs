//! Store des zones et des pictos
//!
//! Le store possède les zones (par chemin canonique) et les pictos (par
//! nom), chacun derrière son propre mutex. Toute mutation reconstruit le
//! routeur et l'installe dans le [`Dispatcher`]. Les fils d'Ariane sont
//! recalculés pour toutes les zones sous le mutex des zones.

pub mod policy;
pub mod snapshot;
pub mod status;
pub mod zone;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use mfmap::{Breadcrumb, BreadcrumbItem};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::server::{build_router, Dispatcher, RenderContext};
pub use policy::UpdateMode;
pub use zone::{StatsRecord, Zone, ZoneStats};

/// Picto transmis au store
#[derive(Debug, Clone)]
pub struct Picto {
    pub name: String,
    pub img: Bytes,
}

/// Zone transmise au store, avec accusé d'insertion facultatif
pub struct ZoneUpdate {
    pub zone: Zone,
    pub committed: Option<oneshot::Sender<()>>,
}

impl From<Zone> for ZoneUpdate {
    fn from(zone: Zone) -> Self {
        Self {
            zone,
            committed: None,
        }
    }
}

/// Picto transmis au store, avec accusé d'insertion facultatif
pub struct PictoUpdate {
    pub picto: Picto,
    pub committed: Option<oneshot::Sender<()>>,
}

impl From<Picto> for PictoUpdate {
    fn from(picto: Picto) -> Self {
        Self {
            picto,
            committed: None,
        }
    }
}

/// Signal de fin d'un worker de réception
pub type Done = oneshot::Receiver<()>;

/// Envoie une zone et attend son insertion dans le store
///
/// Retourne `false` si le store ne reçoit plus.
pub async fn submit(tx: &mpsc::Sender<ZoneUpdate>, zone: Zone) -> bool {
    let (committed, ack) = oneshot::channel();
    let update = ZoneUpdate {
        zone,
        committed: Some(committed),
    };
    if tx.send(update).await.is_err() {
        return false;
    }
    ack.await.is_ok()
}

/// Envoie un picto et attend son insertion dans le store
///
/// Retourne `false` si le store ne reçoit plus.
pub async fn submit_picto(tx: &mpsc::Sender<PictoUpdate>, picto: Picto) -> bool {
    let (committed, ack) = oneshot::channel();
    let update = PictoUpdate {
        picto,
        committed: Some(committed),
    };
    if tx.send(update).await.is_err() {
        return false;
    }
    ack.await.is_ok()
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Contenu servi par le portail
pub struct Content {
    zones: Mutex<HashMap<String, Arc<Zone>>>,
    pictos: Mutex<HashMap<String, Bytes>>,

    /// Sérialise les reconstructions pour que la dernière installée soit la
    /// plus récente
    rebuild: Mutex<()>,

    dispatcher: Arc<Dispatcher>,
    ctx: RenderContext,
    day_min: i64,
    day_max: i64,
}

impl Content {
    /// Store vide ; `day_min`/`day_max` bornent l'historique conservé lors
    /// des fusions
    pub fn new(ctx: RenderContext, day_min: i64, day_max: i64) -> Self {
        let content = Self {
            zones: Mutex::new(HashMap::new()),
            pictos: Mutex::new(HashMap::new()),
            rebuild: Mutex::new(()),
            dispatcher: Arc::new(Dispatcher::new()),
            ctx,
            day_min,
            day_max,
        };
        content.rebuild_router();
        content
    }

    /// Routeur partagé avec le serveur HTTP
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn update_zone(&self, zone: Zone) {
        self.update_zone_at(zone, Utc::now());
    }

    /// Insère ou remplace une zone
    ///
    /// Une version précédente est fusionnée dans la nouvelle et lui transmet
    /// ses statistiques. La date de mise à jour est celle de l'insertion.
    pub fn update_zone_at(&self, mut zone: Zone, now: DateTime<Utc>) {
        {
            let mut zones = lock(&self.zones);
            if let Some(old) = zones.get(zone.path()) {
                zone.data.merge(&old.data, self.day_min, self.day_max, now);
                zone.inherit(old);
            }
            zone.stats().stamp_update(now);
            info!(
                path = %zone.path(),
                name = %zone.name(),
                days = zone.data.prevs.len(),
                "Zone updated"
            );
            zones.insert(zone.path().to_string(), Arc::new(zone));
            rebuild_breadcrumbs(&zones);
        }
        self.rebuild_router();
    }

    /// Insère ou remplace un picto
    pub fn update_picto(&self, picto: Picto) {
        debug!(name = %picto.name, len = picto.img.len(), "Picto updated");
        lock(&self.pictos).insert(picto.name, picto.img);
        self.rebuild_router();
    }

    /// Applique les zones reçues jusqu'à fermeture du canal
    pub fn receive_zones(self: &Arc<Self>, mut rx: mpsc::Receiver<ZoneUpdate>) -> Done {
        let (done, signal) = oneshot::channel();
        let content = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                content.update_zone(update.zone);
                if let Some(committed) = update.committed {
                    let _ = committed.send(());
                }
            }
            debug!("Zone channel closed");
            let _ = done.send(());
        });
        signal
    }

    /// Applique les pictos reçus jusqu'à fermeture du canal
    pub fn receive_pictos(self: &Arc<Self>, mut rx: mpsc::Receiver<PictoUpdate>) -> Done {
        let (done, signal) = oneshot::channel();
        let content = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                content.update_picto(update.picto);
                if let Some(committed) = update.committed {
                    let _ = committed.send(());
                }
            }
            debug!("Picto channel closed");
            let _ = done.send(());
        });
        signal
    }

    /// Les deux réceptions en parallèle ; le signal arrive quand les deux
    /// canaux sont vidés et fermés
    pub fn receive(
        self: &Arc<Self>,
        zones: mpsc::Receiver<ZoneUpdate>,
        pictos: mpsc::Receiver<PictoUpdate>,
    ) -> Done {
        let zones_done = self.receive_zones(zones);
        let pictos_done = self.receive_pictos(pictos);
        let (done, signal) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tokio::join!(zones_done, pictos_done);
            let _ = done.send(());
        });
        signal
    }

    /// Chemin de la zone la plus en retard, s'il y en a une ; les zones
    /// écartées après un échec sont ignorées
    pub fn updatable(&self, now: DateTime<Utc>) -> Option<String> {
        let zones = lock(&self.zones);
        zones
            .values()
            .filter(|z| !z.stats().is_deferred(now))
            .map(|z| (z.remaining_delay(now), z.path()))
            .filter(|(delay, _)| *delay < Duration::zero())
            .min()
            .map(|(_, path)| path.to_string())
    }

    /// Plus petit délai avant qu'une zone soit sélectionnable
    pub fn next_deadline(&self, now: DateTime<Utc>) -> Option<Duration> {
        lock(&self.zones)
            .values()
            .map(|z| z.due_in(now))
            .min()
    }

    pub fn zone(&self, path: &str) -> Option<Arc<Zone>> {
        lock(&self.zones).get(path).cloned()
    }

    /// Zones vivantes, par chemin croissant
    pub fn zones(&self) -> Vec<Arc<Zone>> {
        let mut zones: Vec<_> = lock(&self.zones).values().cloned().collect();
        zones.sort_by(|a, b| a.path().cmp(b.path()));
        zones
    }

    pub fn len(&self) -> usize {
        lock(&self.zones).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_picto(&self, name: &str) -> bool {
        lock(&self.pictos).contains_key(name)
    }

    pub fn picto(&self, name: &str) -> Option<Bytes> {
        lock(&self.pictos).get(name).cloned()
    }

    pub fn picto_count(&self) -> usize {
        lock(&self.pictos).len()
    }

    /// Texte de `/statusse`
    pub fn status(&self, now: DateTime<Utc>) -> String {
        status::status_text(&self.zones(), now)
    }

    /// Vide le store puis insère zones et pictos tels quels, sans fusion ni
    /// horodatage ; le routeur n'est reconstruit qu'une fois
    pub(crate) fn replace_all(&self, zones: Vec<Zone>, pictos: Vec<Picto>) {
        {
            let mut map = lock(&self.zones);
            map.clear();
            for zone in zones {
                map.insert(zone.path().to_string(), Arc::new(zone));
            }
            rebuild_breadcrumbs(&map);
        }
        {
            let mut map = lock(&self.pictos);
            map.clear();
            for p in pictos {
                map.insert(p.name, p.img);
            }
        }
        self.rebuild_router();
    }

    pub(crate) fn picto_entries(&self) -> Vec<Picto> {
        let mut pictos: Vec<Picto> = lock(&self.pictos)
            .iter()
            .map(|(name, img)| Picto {
                name: name.clone(),
                img: img.clone(),
            })
            .collect();
        pictos.sort_by(|a, b| a.name.cmp(&b.name));
        pictos
    }

    fn rebuild_router(&self) {
        let _guard = lock(&self.rebuild);
        let zones = self.zones();
        let pictos = Arc::new(lock(&self.pictos).clone());
        let router = build_router(zones, pictos, &self.ctx);
        self.dispatcher.install(router);
    }
}

/// Recalcule le fil d'Ariane de chaque zone en remontant ses parents
fn rebuild_breadcrumbs(zones: &HashMap<String, Arc<Zone>>) {
    for zone in zones.values() {
        let mut bc = Breadcrumb::new();
        let mut seen = HashSet::new();
        let mut cur = Some(zone);
        while let Some(z) = cur {
            if !seen.insert(z.path()) {
                warn!(path = %zone.path(), "Parent cycle in zone tree");
                break;
            }
            bc.push(BreadcrumbItem::new(z.name(), z.path()));
            cur = z.parent.as_deref().and_then(|p| zones.get(p));
        }
        bc.reverse();
        zone.set_breadcrumb(bc);
    }
}
