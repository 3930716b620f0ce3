//! The prediction server. Loads the models written by the `train` binary, then serves the
//! prediction form. Models aren't retrained here.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};

use cgas_aid::{
    config::{Config, DEFAULT_CONFIG_PATH},
    infer::Predictor,
    init_logging,
    server::{AppState, serve},
    train::ReportSummary,
};

#[derive(Parser, Debug)]
#[command(name = "cgas_aid", about = "Serve bioactivity predictions from trained models")]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:8501
    #[arg(long)]
    bind: Option<String>,

    /// Directory containing trained models
    #[arg(long)]
    model_dir: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load(&cli.config)?;
    if let Some(b) = cli.bind {
        cfg.server.bind = b;
    }
    if let Some(d) = cli.model_dir {
        cfg.training.model_dir = d.to_string_lossy().into_owned();
    }

    let model_dir = Path::new(&cfg.training.model_dir);
    let predictor = Predictor::load(model_dir)?;

    let report = match ReportSummary::load(model_dir) {
        Ok(r) => {
            info!("Loaded training report for {}", r.target_id);
            Some(r)
        }
        Err(e) => {
            warn!("No training report in {}: {e}", model_dir.display());
            None
        }
    };

    let state = AppState::new(predictor, report, &cfg.server.title);
    serve(state, &cfg.server.bind).await?;

    Ok(())
}
