//! Téléchargement des zones et parcours de l'arbre des zones
//!
//! Une zone se construit à partir de quatre ressources amont : la page HTML,
//! le fond SVG, la géographie des sous-zones (toutes deux sur l'hôte
//! principal) et la prévision multi-points (sur l'hôte de l'API).

pub mod scheduler;

pub use scheduler::{Refresh, Scheduler};

use anyhow::{Context, Result};
use chrono::Utc;
use mfmap::{parse_html, picto_path, ZoneData, ZoneSources};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::content::{submit, submit_picto, Content, Picto, PictoUpdate, Zone, ZoneUpdate};
use crate::upstream::{CachePolicy, MfClient, UpstreamError};

/// Chemin amont de la page racine (France)
pub const ROOT_UPSTREAM_PATH: &str = "/";

pub struct Crawler {
    client: MfClient,
    api_base: Option<String>,
}

impl Crawler {
    pub fn new(config: &PortalConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: MfClient::new(config.upstream.as_str())?,
            api_base: config.api.clone(),
        })
    }

    pub fn client(&self) -> &MfClient {
        &self.client
    }

    /// Télécharge et assemble la zone de la page amont `path`
    ///
    /// `html_policy` ne s'applique qu'à la page : fond SVG et géographie
    /// passent par le cache, la prévision jamais.
    pub async fn get_zone(
        &self,
        path: &str,
        parent: Option<&str>,
        html_policy: CachePolicy,
    ) -> Result<Zone> {
        debug!(path, ?parent, "Fetching zone");

        let html = self.client.get(path, html_policy).await?.bytes().await?;
        let map = parse_html(&html).with_context(|| format!("Zone page {path}"))?;

        let svg_path = map.svg_path();
        let svg = self
            .client
            .get(&svg_path, CachePolicy::Default)
            .await?
            .bytes()
            .await?;

        let geography_path = map.geography_path();
        let geography = self
            .client
            .get(&geography_path, CachePolicy::Default)
            .await?
            .bytes()
            .await?;

        let api_base = self.api_base.clone().unwrap_or_else(|| map.api_base());
        let api = self.client.api_client(api_base);
        let forecast = api
            .get(&map.forecast_path(), CachePolicy::Disabled)
            .await?
            .bytes()
            .await?;

        let sources = ZoneSources {
            svg: &svg,
            geography: &geography,
            multiforecast: &forecast,
        };
        let data = ZoneData::assemble(path, &map, sources, Utc::now())
            .with_context(|| format!("Zone {path}"))?;

        Ok(Zone::new(data, parent.map(str::to_string)))
    }

    /// Télécharge les pictos de la zone absents du store
    ///
    /// Chaque picto est inséré avant le suivant, donc avant la zone. Un picto
    /// en échec est journalisé puis ignoré. Retourne le nombre de pictos
    /// insérés.
    pub async fn fetch_pictos(
        &self,
        zone: &Zone,
        content: &Content,
        tx: &mpsc::Sender<PictoUpdate>,
    ) -> usize {
        let mut sent = 0;
        for name in &zone.data.pictos {
            if content.has_picto(name) {
                continue;
            }
            let img = match self.fetch_picto(name).await {
                Ok(img) => img,
                Err(e) => {
                    warn!(picto = %name, error = %e, "Picto download failed");
                    continue;
                }
            };
            if !img.starts_with(b"<") {
                warn!(picto = %name, len = img.len(), "Picto is not an SVG document");
                continue;
            }
            let picto = Picto {
                name: name.clone(),
                img,
            };
            if !submit_picto(tx, picto).await {
                break;
            }
            sent += 1;
        }
        sent
    }

    async fn fetch_picto(&self, name: &str) -> Result<bytes::Bytes, UpstreamError> {
        self.client
            .get(&picto_path(name), CachePolicy::Default)
            .await?
            .bytes()
            .await
    }

    /// Parcours en profondeur de l'arbre des zones depuis `seed`
    ///
    /// Chaque zone est transmise au store après ses pictos. Le parcours
    /// s'arrête après `limit` zones (`0` : sans limite). L'échec de la zone
    /// de départ est fatal, celui d'une sous-zone est journalisé.
    pub async fn crawl_tree(
        &self,
        seed: &str,
        limit: usize,
        content: &Content,
        zones: &mpsc::Sender<ZoneUpdate>,
        pictos: &mpsc::Sender<PictoUpdate>,
    ) -> Result<usize> {
        let mut count = 0;
        let mut stack: Vec<(String, Option<String>)> = vec![(seed.to_string(), None)];

        while let Some((path, parent)) = stack.pop() {
            if limit > 0 && count >= limit {
                info!(limit, pending = stack.len() + 1, "Zone limit reached");
                break;
            }

            let zone = match self.get_zone(&path, parent.as_deref(), CachePolicy::Disabled).await {
                Ok(zone) => zone,
                Err(e) if parent.is_none() => {
                    return Err(e.context(format!("Root zone {path}")));
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Zone skipped");
                    continue;
                }
            };

            let children: Vec<String> = zone.data.subzone_paths().map(str::to_string).collect();
            for child in children.into_iter().rev() {
                stack.push((child, Some(zone.path().to_string())));
            }

            self.fetch_pictos(&zone, content, pictos).await;
            info!(path = %zone.path(), name = %zone.name(), "Zone crawled");
            if !submit(zones, zone).await {
                anyhow::bail!("Content store stopped receiving zones");
            }
            count += 1;
        }

        Ok(count)
    }
}
