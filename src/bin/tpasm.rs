use std::{
    error::Error,
    io,
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use tpasm::{asm, config::Config};
use tracing::Level;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source files, with or without the source extension
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Output directory (default: next to each source)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = main_real(args) {
        tracing::error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_real(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut failed = 0;
    for source in &args.sources {
        match asm::assemble_file(source, &config, args.output.as_deref()) {
            Ok(0) => tracing::info!("{}: assembled", source.display()),
            Ok(errors) => {
                tracing::error!("{}: {errors} errors", source.display());
                failed += 1;
            }
            // fatal for this file only
            Err(e) => {
                tracing::error!("{}: {e}", source.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Err(format!("{failed} of {} files failed", args.sources.len()))?;
    }
    Ok(())
}
