mod cli;
mod config;
mod daemon;
mod dbus;
mod inhibit;
mod log;
mod scopes;
mod sleep;
mod spawn;
mod wayland;

use clap::Parser;

use crate::scopes::Scope;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Args::parse();

    if args.verbose {
        log::set_verbose(true);
    }
    if args.quiet {
        log::set_quiet(true);
    }

    let cfg = match config::load(args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            serror!(Scope::Config.to_string(), "{e}");
            std::process::exit(1);
        }
    };

    daemon::run(cfg).await
}
