use tokio_serial::{DataBits, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

use crate::config::{SerialConfig, SerialParity};

/// Opens the serial port with eight data bits and one stop bit.
pub fn open(path: &str, config: &SerialConfig) -> tokio_serial::Result<SerialStream> {
    let stream = tokio_serial::new(path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(config.parity.into())
        .stop_bits(StopBits::One)
        .open_native_async()?;

    info!(
        port = path,
        baud_rate = config.baud_rate,
        parity = ?config.parity,
        "Serial port opened"
    );

    Ok(stream)
}

impl From<SerialParity> for tokio_serial::Parity {
    fn from(value: SerialParity) -> Self {
        match value {
            SerialParity::None => tokio_serial::Parity::None,
            SerialParity::Odd => tokio_serial::Parity::Odd,
            SerialParity::Even => tokio_serial::Parity::Even,
        }
    }
}
