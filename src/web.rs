#![cfg(not(tarpaulin_include))]

use clap::Parser;
use daily_report::app;
use daily_report::config::ServerConfig;

/// Main entry point for the report server
///
/// Settings come from command line flags or their `REPORT_*` environment
/// variables; logging follows `RUST_LOG` and defaults to `info`.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    log::info!(
        "starting report server (bet rule {:?}, upload limit {} MB, {} stored reports)",
        config.bet_rule,
        config.max_upload_mb,
        config.max_reports
    );

    app::run(config).await
}
