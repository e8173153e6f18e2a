use anyhow::{Context, Result};
use log::info;

use ibus_bridge::{uart, Bridge, BridgeConfig, StatusPage, TcpAcceptor};

const DEFAULT_PORT: &str = "/dev/ttyACM0";
const DEFAULT_LISTEN: &str = "0.0.0.0:80";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| DEFAULT_PORT.to_string());
    let listen = args.next().unwrap_or_else(|| DEFAULT_LISTEN.to_string());

    let serial =
        uart::open(&port).with_context(|| format!("Failed to open serial port {}", port))?;
    let listener =
        TcpAcceptor::bind(&listen).with_context(|| format!("Failed to listen on {}", listen))?;
    info!(
        "Bridging {} at {} baud, serving on http://{}",
        port,
        uart::BAUD_RATE,
        listener.local_addr()?
    );

    let mut bridge = Bridge::new(serial, listener, StatusPage, BridgeConfig::default());
    bridge.run()
}
