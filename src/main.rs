mod args;
mod survey;

use clap::Parser;
use log::{debug, error, LevelFilter};

use crate::args::Args;

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    debug!("args: {:?}", args);

    if let Err(e) = survey::run(&args) {
        error!("survex failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
