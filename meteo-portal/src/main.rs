//! Point d'entrée CLI pour meteo-portal

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::{fmt, EnvFilter};

use meteo_portal::{PortalConfig, RunOptions, VueBuild};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Portail météo personnel, miroir de meteofrance.com
#[derive(Parser)]
#[command(name = "meteo-portal")]
#[command(author, version)]
#[command(about = "Portail météo personnel, miroir des pages de zone de meteofrance.com")]
struct Cli {
    /// Adresse d'écoute (":1051" écoute sur toutes les interfaces)
    #[arg(long, default_value = ":1051")]
    addr: String,

    /// Nombre maximal de zones du crawl initial (0 : sans limite)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Quitter après le crawl initial
    #[arg(long)]
    oneshot: bool,

    /// Bundle Vue.js servi dans les pages (prod, dev)
    #[arg(long, default_value = "prod")]
    vue: VueBuild,

    /// Blob de contenu : chargé à la place du crawl, écrit ensuite
    #[arg(long)]
    blob: Option<PathBuf>,

    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let opts = RunOptions {
        addr: cli.addr,
        limit: cli.limit,
        oneshot: cli.oneshot,
        vue: cli.vue,
        blob: cli.blob,
    };

    match meteo_portal::run(opts, PortalConfig::from_env()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Portal failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
