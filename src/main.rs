use clap::Parser;
use formbridge::core::export::bundle_zip;
use formbridge::core::session::parse_session_id;
use formbridge::utils::error::ErrorSeverity;
use formbridge::utils::{logger, validation::Validate};
use formbridge::{server, AppConfig, AppState, Cli, Command, ExportEngine, ExportPipeline, FormError};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let level = Some(config.logging.level.as_str());
    if config.logging.json {
        logger::init_json_logger(cli.verbose, level);
    } else {
        logger::init_cli_logger(cli.verbose, level);
    }

    tracing::info!("Starting formbridge {}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, config).await {
        fail(e);
    }
    Ok(())
}

async fn run(cli: &Cli, config: AppConfig) -> formbridge::Result<()> {
    match &cli.command {
        Command::CheckConfig => {
            AppState::from_config(config)?;
            println!("✅ Configuration {} is valid", cli.config);
        }
        Command::Serve { .. } => {
            let state = Arc::new(AppState::from_config(config)?);
            server::serve(state).await?;
        }
        Command::Export { session, output } => {
            let id = parse_session_id(session)?;
            let state = AppState::from_config(config)?;
            let pipeline = ExportPipeline::new(
                state.catalog.clone(),
                state.sessions.clone(),
                state.translator.clone(),
                id,
            );
            let bundle = ExportEngine::new(pipeline).run().await?;

            let bytes = if output.ends_with(".zip") {
                bundle_zip(&bundle)?
            } else {
                bundle.pdf
            };
            tokio::fs::write(output, &bytes).await?;
            tracing::info!("📁 Output saved to: {}", output);
            println!("✅ Exported session {} to {}", id, output);
        }
    }
    Ok(())
}

fn fail(e: FormError) -> ! {
    tracing::error!(
        "❌ formbridge failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
