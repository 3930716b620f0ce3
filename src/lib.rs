#![allow(clippy::needless_range_loop)]

//! Bioactivity prediction against a ChEMBL target: fetch measured activities, compute
//! physicochemical descriptors from SMILES, train random forest and SVR regressors, and serve
//! predictions through a web form.
//!
//! Training runs offline (the `train` binary) and persists models; the server (`cgas_aid`)
//! loads them once at startup.

pub mod chembl;
pub mod config;
pub mod dataset;
pub mod element;
pub mod error;
pub mod infer;
pub mod model_eval;
pub mod mol_characterization;
pub mod molecules;
pub mod regression;
pub mod server;
pub mod smiles;
pub mod train;

#[cfg(test)]
mod tests;

use log::LevelFilter;

/// Set up `env_logger`. Each `-v` raises the level from the default of warnings; `RUST_LOG`,
/// if set, takes precedence.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
