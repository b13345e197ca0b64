pub mod cli;
pub mod console;
pub mod error;
pub mod gateway;
pub mod models;
pub mod session;
pub mod status;
pub mod store;
pub mod sync;

use cli::{ Args, Command };
use gateway::{ GatewayConfig, HttpGateway };
use log::info;
use session::StaticSession;
use status::{ SimulatedTelemetry, StatusPoller };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use store::initialize_store;
use sync::ConversationSynchronizer;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Client Configuration ---");
    info!("Command: {:?}", args.command());
    info!("Gateway URL: {}", args.gateway_url);
    info!("Gateway Timeout: {}s", args.gateway_timeout_secs);
    info!("Store Type: {}", args.store_type);
    info!("Store Host: {}", args.store_host);
    info!("User: {}", args.user_id.as_deref().unwrap_or("<not signed in>"));
    info!("Status Interval: {}ms", args.status_interval_ms);
    info!("----------------------------");

    let gateway = Arc::new(HttpGateway::from_config(&GatewayConfig::from_args(&args))?);

    match args.command() {
        Command::Chat => {
            let store = initialize_store(&args)?;
            let session = Arc::new(StaticSession::from_args(&args));
            let sync = Arc::new(ConversationSynchronizer::start(store, gateway, session).await);
            console::run_chat(sync).await
        }
        Command::Status => {
            let poller = StatusPoller::start(
                gateway,
                Arc::new(SimulatedTelemetry),
                Duration::from_millis(args.status_interval_ms)
            );
            console::run_status(poller).await
        }
    }
}
