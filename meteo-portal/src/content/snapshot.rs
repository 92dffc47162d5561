//! Blob du store : toutes les zones et tous les pictos, encodés en bincode
//!
//! Sert uniquement au développement, pour redémarrer sans refaire le crawl.
//! Aucune compatibilité entre versions n'est garantie.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use mfmap::ZoneData;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Content, Picto, StatsRecord, Zone, ZoneStats};

#[derive(Serialize, Deserialize)]
struct ZoneRecord {
    data: ZoneData,
    parent: Option<String>,
    stats: StatsRecord,
}

#[derive(Serialize, Deserialize)]
struct PictoRecord {
    name: String,
    img: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct Blob {
    zones: Vec<ZoneRecord>,
    pictos: Vec<PictoRecord>,
}

impl Content {
    /// Encode le contenu courant
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let zones = self
            .zones()
            .iter()
            .map(|z| ZoneRecord {
                data: z.data.clone(),
                parent: z.parent.clone(),
                stats: z.stats().record(),
            })
            .collect();
        let pictos = self
            .picto_entries()
            .into_iter()
            .map(|p| PictoRecord {
                name: p.name,
                img: p.img.to_vec(),
            })
            .collect();

        bincode::serialize(&Blob { zones, pictos }).context("Failed to encode content blob")
    }

    /// Remplace le contenu par celui du blob
    ///
    /// Un blob illisible laisse le store intact.
    pub fn load_snapshot(&self, blob: &[u8]) -> Result<usize> {
        let blob: Blob = bincode::deserialize(blob).context("Failed to decode content blob")?;

        let zones: Vec<Zone> = blob
            .zones
            .into_iter()
            .map(|r| Zone::with_stats(r.data, r.parent, ZoneStats::from_record(r.stats)))
            .collect();
        let pictos = blob
            .pictos
            .into_iter()
            .map(|p| Picto {
                name: p.name,
                img: Bytes::from(p.img),
            })
            .collect();

        let count = zones.len();
        self.replace_all(zones, pictos);
        Ok(count)
    }

    /// Écrit le blob dans `path`
    pub fn save_blob(&self, path: &Path) -> Result<()> {
        let blob = self.snapshot()?;
        std::fs::write(path, &blob)
            .with_context(|| format!("Failed to write blob: {}", path.display()))?;
        info!(
            path = %path.display(),
            zones = self.len(),
            pictos = self.picto_count(),
            bytes = blob.len(),
            "Content stored"
        );
        Ok(())
    }

    /// Charge le blob de `path`, retourne le nombre de zones chargées
    pub fn load_blob(&self, path: &Path) -> Result<usize> {
        let blob = std::fs::read(path)
            .with_context(|| format!("Failed to read blob: {}", path.display()))?;
        let count = self.load_snapshot(&blob)?;
        info!(path = %path.display(), zones = count, "Content loaded");
        Ok(count)
    }
}
