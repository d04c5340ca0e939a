// ABOUTME: Example application demonstrating the transceiver-gateway engine end to end
// ABOUTME: Loads a GatewayConfig from TOML, runs a TransportService, and prints bus traffic

use argh::FromArgs;
use smpp::gateway::{
    ChannelBus, GatewayConfig, MemoryStash, SystemClock, TransportService,
};
use std::error::Error;
use std::fs;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Run the SMPP transceiver gateway against one configured SMSC connection
#[derive(FromArgs)]
struct CliArgs {
    /// path to a gateway configuration TOML file
    #[argh(option, short = 'c')]
    config: String,

    /// whether or not to enable debug-level logging
    #[argh(switch, short = 'd')]
    debugging: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let toml_text = fs::read_to_string(&cli_args.config)?;
    let config = GatewayConfig::from_toml_str(&toml_text)?;

    let clock = Arc::new(SystemClock);
    let stash = Arc::new(MemoryStash::new(clock.clone()));
    let (bus, mut downstream) = ChannelBus::new();
    let bus = Arc::new(bus);

    info!(transport = %config.transport_name, host = %config.host, port = config.port, "starting gateway");

    let service = TransportService::new(config, clock, stash, bus, Default::default());

    tokio::spawn(async move {
        while let Some(record) = downstream.recv().await {
            info!(?record, "downstream bus record");
        }
    });

    service.run().await;
    Ok(())
}
