pub mod cli;
pub mod columns;
pub mod concat;
pub mod data;
pub mod error;
pub mod expr;
pub mod histogram;
pub mod ingest;
pub mod io_utils;
pub mod join;
pub mod plan;
pub mod process;
pub mod render;
pub mod resolve;
pub mod stats;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabpipe", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => {
            debug!(
                "Process over {} input(s), output delimiter '{}'",
                args.inputs.len(),
                printable_delimiter(args.render.render_options().delimiter)
            );
            process::execute(&args)
        }
        Commands::Join(args) => join::execute(&args),
        Commands::Columns(args) => columns::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
