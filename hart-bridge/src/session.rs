use std::time::Duration;

use hart_core::protocol::{
    CMD_READ_DYNAMIC_VARIABLES, CMD_READ_PRIMARY_VARIABLE, CMD_READ_UNIQUE_IDENTIFIER,
    DEFAULT_SHORT_PREAMBLE_LEN,
};
use hart_core::{
    DeviceIdentity, DynamicVariables, LongAddress, Message, OnError, ResponseBody, UnitCode,
    Unpacker, pack_long_frame, pack_short_frame,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::transport::Transport;

/// The secondary variable is published in millionths of the device unit.
pub const SECONDARY_SCALE: f64 = 1_000_000.0;

const READ_CHUNK: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("serial I/O error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("command {command} needs an identified device")]
    NotIdentified { command: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No command 0 reply seen yet.
    Unidentified,
    /// Identity and long address known.
    Identified,
    /// Command 1 sent.
    StatusRead,
    /// Command 3 sent at least once.
    Polling,
}

/// Timing and addressing of the command exchanges.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait between sending a command and draining replies.
    pub response_guard: Duration,
    /// Wait after commands 1 and 3 before the next command.
    pub settle: Duration,
    /// A drain ends once the link has been quiet this long.
    pub drain_idle: Duration,
    /// Preamble length for the command 0 short frame.
    pub preamble_len: usize,
    pub polling_address: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_guard: Duration::from_millis(500),
            settle: Duration::from_secs(1),
            drain_idle: Duration::from_millis(50),
            preamble_len: DEFAULT_SHORT_PREAMBLE_LEN,
            polling_address: 0,
        }
    }
}

/// One command 3 result, ready for publication.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub primary: Option<f64>,
    pub primary_units: Option<UnitCode>,
    /// Already multiplied by [`SECONDARY_SCALE`].
    pub secondary: Option<f64>,
    pub secondary_units: Option<UnitCode>,
}

impl Reading {
    pub fn from_variables(vars: &DynamicVariables) -> Self {
        Self {
            primary: Some(f64::from(vars.primary.value)),
            primary_units: Some(vars.primary.units),
            secondary: vars
                .secondary
                .map(|v| f64::from(v.value) * SECONDARY_SCALE),
            secondary_units: vars.secondary.map(|v| v.units),
        }
    }
}

/// Request/response exchanges with a single field device.
///
/// Every command is send, fixed wait, drain: the session writes the frame,
/// sleeps for the response guard, then reads whatever the device sent until
/// the link goes quiet. Only the last decoded reply of interest is kept.
pub struct DeviceSession<T> {
    transport: T,
    unpacker: Unpacker,
    config: SessionConfig,
    state: SessionState,
    identity: Option<DeviceIdentity>,
    long_address: Option<LongAddress>,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            unpacker: Unpacker::new(OnError::Continue),
            config,
            state: SessionState::Unidentified,
            identity: None,
            long_address: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }

    pub fn long_address(&self) -> Option<LongAddress> {
        self.long_address
    }

    /// Identifies the device at the configured polling address.
    ///
    /// Returns `false` when no command 0 reply was decoded; the session then
    /// stays unidentified.
    #[instrument(name = "command_0", skip(self))]
    pub async fn run_command_0(&mut self) -> Result<bool, SessionError> {
        let frame = pack_short_frame(
            self.config.polling_address,
            CMD_READ_UNIQUE_IDENTIFIER,
            self.config.preamble_len,
            None,
        );
        self.send(&frame).await?;
        debug!("Sent command 0");
        sleep(self.config.response_guard).await;

        let mut identity = None;
        for message in self.drain().await? {
            debug!(?message, "Response from device");
            if let Some(found) = message.identity() {
                identity = Some(found);
            }
        }

        let Some(identity) = identity else {
            warn!("No identity received from device");
            return Ok(false);
        };

        let long_address = LongAddress::from_identity(&identity);
        info!(
            manufacturer_id = identity.manufacturer_id,
            device_type = identity.device_type,
            device_id = identity.device_id.as_u32(),
            %long_address,
            "Device identified"
        );

        self.identity = Some(identity);
        self.long_address = Some(long_address);
        self.state = SessionState::Identified;
        Ok(true)
    }

    /// Reads the device status. Replies are logged and discarded; no reply
    /// is not an error.
    #[instrument(name = "command_1", skip(self))]
    pub async fn run_command_1(&mut self) -> Result<(), SessionError> {
        let long_address = self.require_long_address(CMD_READ_PRIMARY_VARIABLE)?;

        self.send(&pack_long_frame(long_address, CMD_READ_PRIMARY_VARIABLE, None))
            .await?;
        debug!("Sent command 1");
        sleep(self.config.response_guard).await;

        for message in self.drain().await? {
            debug!(?message, "Response from device");
            if let Message::Response(response) = &message {
                info!(
                    response_code = response.response_code,
                    device_status = response.device_status,
                    "Device status"
                );
                if let ResponseBody::PrimaryVariable(pv) = &response.body {
                    info!(units = pv.units.0, value = pv.value, "Primary variable");
                }
            }
        }

        sleep(self.config.settle).await;
        self.state = SessionState::StatusRead;
        Ok(())
    }

    /// Reads the dynamic variables. With no decoded reply the returned
    /// reading has every field unset.
    #[instrument(name = "command_3", skip(self))]
    pub async fn run_command_3(&mut self) -> Result<Reading, SessionError> {
        let long_address = self.require_long_address(CMD_READ_DYNAMIC_VARIABLES)?;

        self.send(&pack_long_frame(long_address, CMD_READ_DYNAMIC_VARIABLES, None))
            .await?;
        debug!("Sent command 3");
        sleep(self.config.response_guard).await;

        let mut latest = None;
        for message in self.drain().await? {
            debug!(?message, "Response from device");
            if let Some(vars) = message.dynamic_variables() {
                latest = Some(*vars);
            }
        }

        let reading = latest
            .as_ref()
            .map(Reading::from_variables)
            .unwrap_or_default();
        if latest.is_none() {
            warn!("No dynamic variables received from device");
        }

        sleep(self.config.settle).await;
        self.state = SessionState::Polling;
        Ok(reading)
    }

    fn require_long_address(&self, command: u8) -> Result<LongAddress, SessionError> {
        self.long_address
            .ok_or(SessionError::NotIdentified { command })
    }

    /// Writes one request. Bytes still buffered from an earlier exchange
    /// cannot answer it and are dropped first.
    async fn send(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        if self.unpacker.buffered() > 0 {
            debug!(stale = self.unpacker.buffered(), "Discarding unread bytes");
            self.unpacker.clear();
        }
        self.transport.write_all(frame).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Reads until the link is idle or the guard time has passed again, then
    /// returns every complete frame received.
    async fn drain(&mut self) -> Result<Vec<Message>, SessionError> {
        let mut chunk = [0u8; READ_CHUNK];
        let hard_deadline = Instant::now() + self.config.response_guard;

        loop {
            let deadline = (Instant::now() + self.config.drain_idle).min(hard_deadline);
            match timeout_at(deadline, self.transport.read(&mut chunk)).await {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => self.unpacker.feed(&chunk[..n]),
                Ok(Err(e)) => return Err(SessionError::Transport(e)),
            }
        }

        let mut messages = Vec::new();
        for decoded in self.unpacker.by_ref() {
            match decoded {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "Dropping undecodable frame"),
            }
        }

        Ok(messages)
    }
}
