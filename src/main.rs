use clap::Parser;
use std::sync::Arc;
use tee_times::core::report;
use tee_times::core::Storage;
use tee_times::utils::error::{ErrorSeverity, ScoutError};
use tee_times::utils::{logger, validation::Validate};
use tee_times::{
    load_sources, select_sources, Aggregator, CliConfig, HttpFetcher, LocalStorage,
    StaticSessionFactory,
};

async fn run(config: &CliConfig) -> Result<String, ScoutError> {
    let (sources, timeouts) = load_sources(config.sources.as_deref())?;
    let sources = select_sources(sources, &config.only)?;
    let query = config.query()?.with_timeouts(timeouts);

    tracing::info!(
        "📅 {} | {}+ players | before {} | {} sources",
        query.date,
        query.min_players,
        query.latest_label(),
        sources.len()
    );

    let mut fetcher = HttpFetcher::new(timeouts.page_load)?;
    if let Some(dir) = config.snapshot_dir() {
        tracing::info!("📁 Saving page snapshots to {}", dir);
        fetcher = fetcher.with_snapshots(LocalStorage::new(dir.as_str()));
    }
    let fetcher = Arc::new(fetcher);
    let sessions = Arc::new(StaticSessionFactory::new(fetcher.clone(), timeouts.page_load));

    let aggregator = Aggregator::standard(fetcher, sessions).with_monitoring(config.monitor);
    let result = aggregator.run(&query, &sources).await;

    tracing::info!(
        "✅ {} slots found, {} sources failed",
        result.slots.len(),
        result.failures.len()
    );

    let rendered = report::render(config.format, &result, &query)?;

    if config.writes_to_stdout() {
        println!("{}", rendered);
        return Ok("stdout".to_string());
    }

    // 相對路徑以目前目錄為基準
    let storage = LocalStorage::new(".");
    storage.write_file(&config.output, rendered.as_bytes()).await?;
    Ok(storage.full_path(&config.output).display().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting tee-times");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&config).await {
        Ok(output) => {
            tracing::info!("📁 Report written to: {}", output);
            if !config.writes_to_stdout() {
                println!("✅ Tee time report saved to: {}", output);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Lookup failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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
