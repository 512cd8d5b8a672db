use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgMatches;
use irf_cli::commands::{self, settings, App};
use irf_cli::config::{self, AppConfig};
use irf_cli::logging::{self, LogFormat};
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = irf_cli::cli::build().get_matches();

    let format = matches
        .get_one::<String>("log-format")
        .and_then(|f| f.parse().ok())
        .unwrap_or(LogFormat::Text);
    logging::init(matches.get_flag("verbose"), format);

    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let data_dir = config::resolve_data_dir(matches.get_one::<PathBuf>("data-dir").map(PathBuf::as_path));
    let mut stdout = std::io::stdout().lock();

    // config commands must work even when the store cannot be opened
    if let Some(("config", sub)) = matches.subcommand() {
        return settings::config(&data_dir, sub, &mut stdout);
    }

    let config = config::init_global(AppConfig::load(&data_dir)?).clone();
    let app = App::open(config)?;

    let token = app.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight generation");
            token.cancel();
        }
    });

    commands::dispatch(&app, matches, &mut stdout).await
}
