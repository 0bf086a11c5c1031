use anyhow::Result;
use clap::Parser;

use flashcopy_runner::cli::commands::{
    exit_code, exit_code_for_error, show_how_to_run, Command, ProbeCommand, RunCommand,
    ValidateCommand,
};
use flashcopy_runner::cli::{Cli, Commands};
use flashcopy_runner::{init_telemetry, shutdown_telemetry, FlashcopyConfig, ShutdownCoordinator};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = tokio::runtime::Runtime::new()?.block_on(async { dispatch(cli).await });
    std::process::exit(code)
}

async fn dispatch(cli: Cli) -> i32 {
    let Some(command) = cli.command else {
        return show_how_to_run().unwrap_or(exit_code::FAILURE);
    };

    if let Err(e) = FlashcopyConfig::load_env_file() {
        eprintln!("⚠️  Ignoring unreadable .env file: {e}");
    }

    let config = match FlashcopyConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return exit_code::CONFIG_ERROR;
        }
    };

    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("⚠️  Logging disabled: {e}");
    }

    let result = match command {
        Commands::Run {
            format,
            dry_run,
            verbose,
        } => {
            let shutdown = ShutdownCoordinator::new();
            shutdown.install_signal_handlers();
            RunCommand::new(config)
                .with_format(format)
                .with_dry_run(dry_run)
                .with_verbose(verbose)
                .with_cancellation(shutdown.token())
                .execute()
                .await
        }
        Commands::Validate => ValidateCommand::new(config).execute().await,
        Commands::Probe { phase } => ProbeCommand::new(config, phase).execute().await,
    };

    shutdown_telemetry();
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            exit_code_for_error(&e)
        }
    }
}
