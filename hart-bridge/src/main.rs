use std::path::PathBuf;

use clap::Parser;
use hart_bridge::{Config, DeviceSession, MqttPublisher, MqttSettings, Outcome, bridge};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "hart-bridge")]
#[command(about = "Poll a HART transmitter over serial and publish its readings to MQTT")]
struct Cli {
    /// Serial port address
    #[arg(long, default_value = "/dev/pts/1")]
    port: String,

    /// mqtt-broker username
    #[arg(long)]
    username: String,

    /// mqtt-broker user password (prompted for when omitted)
    #[arg(long)]
    password: Option<String>,

    /// mqtt-broker address
    #[arg(long)]
    broker: String,

    /// mqtt-broker port
    #[arg(long = "broker_port")]
    broker_port: u16,

    /// Path to the configuration file
    #[arg(short, long, default_value = "hart-bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "hart_bridge=debug,hart_core=info".to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    let password = match cli.password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let serial = hart_bridge::transport::serial::open(&cli.port, &config.serial)?;
    let mut session = DeviceSession::new(serial, config.serial.session_config());

    let settings = MqttSettings::new(
        cli.broker,
        cli.broker_port,
        cli.username,
        password,
        &config.mqtt,
    );
    let topics = config.mqtt.topics();

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            cancel_on_signal.cancel();
        }
    });

    let outcome = bridge::run(
        &mut session,
        &topics,
        || MqttPublisher::connect(&settings),
        cancel,
    )
    .await?;

    match outcome {
        Outcome::DeviceNotFound => info!("No device answered, exiting"),
        Outcome::Cancelled => info!("hart-bridge shut down complete"),
    }

    Ok(())
}

/// Hidden prompt, repeated until both entries match.
fn prompt_password() -> std::io::Result<String> {
    loop {
        let password = rpassword::prompt_password("Password: ")?;
        let confirmation = rpassword::prompt_password("Repeat for confirmation: ")?;
        if password == confirmation {
            return Ok(password);
        }
        eprintln!("Error: The two entered values do not match.");
    }
}
