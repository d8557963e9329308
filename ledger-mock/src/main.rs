/// Ledger Mock Server
///
/// A lightweight JSON-RPC node hosting the notes contract in memory.
/// Designed for local development and end-to-end tests of the notes client.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use ledger_mock::{run_server, MockConfig, MockLedger};

#[derive(Debug)]
struct Config {
    // Chain
    mock: MockConfig,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let mut mock = MockConfig::default();

        if let Ok(accounts) = env::var("MOCK_ACCOUNTS") {
            mock.accounts = accounts
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
        }

        if let Ok(address) = env::var("MOCK_CONTRACT_ADDRESS") {
            mock.contract_address = address.trim().to_string();
        }

        if let Ok(polls) = env::var("MOCK_PENDING_POLLS") {
            mock.pending_polls = polls.trim().parse().context("Invalid MOCK_PENDING_POLLS")?;
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8545".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            mock,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Ledger Mock Server...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    log::info!("Pending polls per write: {}", config.mock.pending_polls);
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let ledger = Arc::new(MockLedger::new(config.mock));

    run_server(ledger, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
