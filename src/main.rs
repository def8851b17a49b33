use clap::Parser;
use model_sim::utils::error::ErrorSeverity;
use model_sim::utils::{logger, validation::Validate};
use model_sim::{BatchPipeline, CliConfig, LocalStorage, PipelineRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose, cli.log_json);

    tracing::info!("Starting model-sim");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.resolve().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration validation failed: {}", e);
            tracing::error!("Suggestion: {}", e.recovery_suggestion());
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let monitor_enabled = cli.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("System monitoring enabled");
    }

    let storage = LocalStorage::new(".");
    let pipeline = BatchPipeline::new(storage, config);
    let runner = PipelineRunner::new_with_monitoring(pipeline, monitor_enabled);

    match runner.run().await {
        Ok(outcome) => {
            print!("{}", outcome.table);
            if !outcome.ingest.is_clean() {
                eprintln!(
                    "{} record(s) rejected while loading; see the log for details",
                    outcome.ingest.errors.len()
                );
            }
            tracing::info!("Results written to: {}", outcome.output_path);
        }
        Err(e) => {
            tracing::error!(
                "Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
