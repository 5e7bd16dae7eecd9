use clap::Parser;
use deal_assess::cli::{show_status, Cli, Commands};
use deal_assess::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = deal_assess::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting daily run");
            args.execute(config).await?;
        }
        Commands::Resolve(args) => {
            tracing::info!("Resolving open predictions");
            args.execute(config).await?;
        }
        Commands::Calibrate(args) => {
            tracing::info!("Recomputing calibration");
            args.execute(config).await?;
        }
        Commands::Review(args) => {
            args.execute(config).await?;
        }
        Commands::Export(args) => {
            tracing::info!("Exporting history");
            args.execute(config).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Fingerprint: price={} spread={}bps prob={}pp",
                config.fingerprint.price_tolerance,
                config.fingerprint.spread_tolerance_bps,
                config.fingerprint.probability_band_pp
            );
            println!(
                "  Reasoner: {} (key from {}), timeout {}s",
                config.reasoner.model,
                config.reasoner.api_key_env,
                config.orchestrator.reasoner_timeout_secs
            );
            println!("  Features: {:?}", config.features);
            println!(
                "  Calibration: {} bins, min {} samples",
                config.calibration.bins, config.calibration.min_total_samples
            );
            println!("  Context dir: {}", config.collector.context_dir.display());
            println!("  Store: {}", config.store.path.display());
        }
    }

    Ok(())
}
