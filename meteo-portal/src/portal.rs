//! Orchestration : crawl initial, service HTTP et rafraîchissement

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::{CacheId, PortalConfig, VueBuild};
use crate::content::Content;
use crate::crawl::scheduler::stopped;
use crate::crawl::{Crawler, Scheduler, ROOT_UPSTREAM_PATH};
use crate::server::{self, RenderContext};

/// Options de lancement
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Adresse d'écoute (`:1051`, `127.0.0.1:8080`...)
    pub addr: String,

    /// Nombre maximal de zones du crawl initial, `0` sans limite
    pub limit: usize,

    /// Quitter après le crawl initial
    pub oneshot: bool,

    pub vue: VueBuild,

    /// Blob chargé à la place du crawl s'il est lisible, écrit après le
    /// crawl et à l'arrêt
    pub blob: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            addr: ":1051".into(),
            limit: 0,
            oneshot: false,
            vue: VueBuild::default(),
            blob: None,
        }
    }
}

fn save_blob(content: &Content, opts: &RunOptions) {
    if let Some(path) = &opts.blob {
        if let Err(e) = content.save_blob(path) {
            warn!(error = %format!("{e:#}"), "Content blob not saved");
        }
    }
}

fn load_blob(content: &Content, opts: &RunOptions) -> bool {
    let Some(path) = &opts.blob else {
        return false;
    };
    if !path.exists() {
        return false;
    }
    match content.load_blob(path) {
        Ok(count) => count > 0,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Content blob ignored");
            false
        }
    }
}

/// Lance le portail jusqu'à Ctrl-C (ou jusqu'à la fin du crawl en mode
/// `oneshot`)
pub async fn run(opts: RunOptions, config: PortalConfig) -> Result<()> {
    let ctx = RenderContext::new(CacheId::generate(), opts.vue);
    info!(cache_id = %ctx.cache_id, upstream = %config.upstream, "Starting portal");

    let content = Arc::new(Content::new(ctx, config.day_min, config.day_max));
    let crawler = Arc::new(Crawler::new(&config).context("Failed to build upstream client")?);

    let (zones_tx, zones_rx) = mpsc::channel(1);
    let (pictos_tx, pictos_rx) = mpsc::channel(1);
    let done = content.receive(zones_rx, pictos_rx);

    let (stop_tx, stop_rx) = watch::channel(false);
    let server = if opts.oneshot {
        None
    } else {
        let listener = server::bind(&opts.addr).await?;
        let mut stop = stop_rx.clone();
        let dispatcher = content.dispatcher();
        Some(tokio::spawn(async move {
            server::serve(listener, dispatcher, async move { stopped(&mut stop).await }).await
        }))
    };

    if load_blob(&content, &opts) {
        info!(zones = content.len(), "Initial crawl replaced by blob");
    } else {
        let count = crawler
            .crawl_tree(ROOT_UPSTREAM_PATH, opts.limit, &content, &zones_tx, &pictos_tx)
            .await?;
        info!(zones = count, pictos = content.picto_count(), "Initial crawl done");
        save_blob(&content, &opts);
    }

    if opts.oneshot {
        drop(zones_tx);
        drop(pictos_tx);
        let _ = done.await;
        return Ok(());
    }

    let scheduler = Scheduler::new(Arc::clone(&crawler), Arc::clone(&content), zones_tx, pictos_tx);
    let scheduler = tokio::spawn(scheduler.run(stop_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    let _ = stop_tx.send(true);

    // Le scheduler libère les canaux en s'arrêtant
    let _ = scheduler.await;
    let _ = done.await;
    if let Some(server) = server {
        server.await.context("HTTP server task failed")??;
    }
    save_blob(&content, &opts);
    Ok(())
}
