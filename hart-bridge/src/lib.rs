pub mod bridge;
pub mod config;
pub mod publisher;
pub mod session;
pub mod transport;

pub use bridge::{BridgeError, Outcome, Topics};
pub use config::{Config, MqttConfig, SerialConfig, SerialParity};
pub use publisher::{MqttPublisher, MqttSettings, Publish};
pub use session::{DeviceSession, Reading, SessionConfig, SessionError, SessionState};
pub use transport::Transport;
