mod args;
mod runner;

use clap::Parser;
use log::{debug, error, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let mut logs = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        logs.filter_level(LevelFilter::Debug);
    }
    logs.init();
    debug!("args: {:?}", args);

    if let Err(e) = runner::run(&args).await {
        error!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        let mut cause = std::error::Error::source(e.as_ref());
        while let Some(c) = cause {
            eprintln!("  caused by: {}", c);
            cause = c.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(e.as_ref()) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
