//! # labelpress CLI
//!
//! Usage:
//!   labelpress labels.json
//!
//! Output paths, font paths and post-process commands are relative to the
//! directory of the document. Set `RUST_LOG=debug` for placement details.

use std::path::PathBuf;
use std::process;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "labelpress", version, about = "Render text labels from a JSON document to PDF")]
struct Cli {
    /// JSON document describing the files to render
    input: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = labelpress::run(&cli.input) {
        eprintln!("{}", e);
        process::exit(1);
    }
}
