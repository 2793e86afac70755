pub mod serial;

use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream to a field device.
///
/// Implemented for any async duplex stream: the serial port in production,
/// an in-memory pipe in tests.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
