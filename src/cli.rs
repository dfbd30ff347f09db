use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "idlewarden",
    version = env!("CARGO_PKG_VERSION"),
    about = "Idle-activity daemon for a Wayland session"
)]
pub struct Args {
    /// Increase verbosity (debug-level logging)
    #[arg(short = 'v', long, action)]
    pub verbose: bool,

    /// Suppress all but warnings and errors
    #[arg(short = 'q', long, action)]
    pub quiet: bool,

    /// Path to the config file (overrides the default search path)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
