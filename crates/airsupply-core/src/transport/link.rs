use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A duplex byte stream the transport session can drive.
///
/// Reads and writes happen from different threads, so the session keeps two
/// handles obtained with [`SerialLink::try_clone`]: one for the writer and
/// one owned by the background reader.
pub trait SerialLink: Read + Write + Send {
    /// Set how long a single read may block before reporting `TimedOut`
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Get a second handle onto the same underlying stream
    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>>;
}

/// Serial port wrapper implementing SerialLink
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Name of the underlying port, if the driver reports one
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        let port_clone = self.port.try_clone().map_err(io::Error::other)?;
        Ok(Box::new(SerialChannel::new(port_clone)))
    }
}
