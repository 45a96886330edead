//! Byte transports between drivers and hardware
//!
//! A transport is either a serial line opened once and kept for the driver's
//! lifetime, a TCP endpoint connected afresh for every command, or a virtual
//! writer used for simulation and tests. Drivers only ever write; replies are
//! never read back.

use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use avs_protocol::hex;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;
use tracing::{debug, trace};

/// Default bound on connect and write operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Directory bare tty names are resolved against
const DEVICE_DIR: &str = "/dev";

/// Errors raised while opening or writing a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to open a serial port
    #[error("failed to open serial port {port}: {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Host name did not resolve to any address
    #[error("could not resolve {0}")]
    Resolve(String),

    /// Failed to connect to a network endpoint
    #[error("failed to connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    /// I/O error while writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error while writing or clearing buffers
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}

/// Serial line parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
}

impl LineSettings {
    /// 8 data bits, no parity, one stop bit
    pub const fn eight_n_one(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// 8 data bits, odd parity, one stop bit
    pub const fn eight_o_one(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::Odd,
            stop_bits: StopBits::One,
        }
    }
}

impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_bits = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop_bits = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {}{}{}", self.baud_rate, data_bits, parity, stop_bits)
    }
}

/// Where a transport connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Serial device (bare names resolve under `/dev`)
    Serial { tty: String, line: LineSettings },
    /// TCP host and port, connected per command
    Network { host: String, port: u16 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Serial { tty, line } => write!(f, "serial {} ({})", tty, line),
            Endpoint::Network { host, port } => write!(f, "tcp {}:{}", host, port),
        }
    }
}

/// Endpoint plus I/O timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Connection target
    pub endpoint: Endpoint,
    /// Bound on connect and write operations
    pub timeout: Duration,
}

impl TransportConfig {
    /// Create a transport configuration with the default timeout
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Serial endpoint with the default timeout
    pub fn serial(tty: impl Into<String>, line: LineSettings) -> Self {
        Self::new(Endpoint::Serial {
            tty: tty.into(),
            line,
        })
    }

    /// Network endpoint with the default timeout
    pub fn network(host: impl Into<String>, port: u16) -> Self {
        Self::new(Endpoint::Network {
            host: host.into(),
            port,
        })
    }

    /// Override the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Resolve a configured tty name to a device path
///
/// Bare names such as `ttyUSB0` resolve under `/dev`, following symlinks when
/// the device exists. Absolute paths and Windows port names pass through.
pub fn resolve_tty(tty: &str) -> String {
    if cfg!(windows) || Path::new(tty).is_absolute() {
        return tty.to_string();
    }

    let joined = Path::new(DEVICE_DIR).join(tty);
    joined
        .canonicalize()
        .unwrap_or(joined)
        .to_string_lossy()
        .into_owned()
}

/// Serial line kept open for the driver's lifetime
pub struct SerialLink {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open a serial port with fixed line settings
    pub fn open(tty: &str, line: LineSettings, timeout: Duration) -> Result<Self, TransportError> {
        let name = resolve_tty(tty);
        let port = serialport::new(&name, line.baud_rate)
            .data_bits(line.data_bits)
            .parity(line.parity)
            .stop_bits(line.stop_bits)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::OpenFailed {
                port: name.clone(),
                source,
            })?;

        trace!("Opened serial port {} ({})", name, line);
        Ok(Self { name, port })
    }

    /// Resolved device path
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write bytes, then discard anything the device echoed back
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        trace!("Closing serial port {}", self.name);
    }
}

/// TCP endpoint, connected for each command and closed after flushing
pub struct NetworkLink {
    host: String,
    port: u16,
    timeout: Duration,
}

impl NetworkLink {
    /// Create a link; nothing is connected until the first send
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect(&self) -> Result<TcpStream, TransportError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::ConnectFailed {
                target: self.target(),
                source,
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(source) => Err(TransportError::ConnectFailed {
                target: self.target(),
                source,
            }),
            None => Err(TransportError::Resolve(self.target())),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut stream = self.connect()?;
        trace!("Connected to {}", self.target());

        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(data)?;
        stream.flush()?;

        // The peer may already have hung up; the command is out either way
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}

/// A driver's connection to its hardware
pub enum Transport {
    /// Serial line
    Serial(SerialLink),
    /// TCP endpoint
    Network(NetworkLink),
    /// In-process writer (simulation and tests)
    Virtual {
        name: String,
        writer: Box<dyn Write + Send>,
    },
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transport").field(&self.describe()).finish()
    }
}

impl Transport {
    /// Open a transport for the given configuration
    pub fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        match &config.endpoint {
            Endpoint::Serial { tty, line } => {
                SerialLink::open(tty, *line, config.timeout).map(Transport::Serial)
            }
            Endpoint::Network { host, port } => Ok(Transport::Network(NetworkLink::new(
                host.clone(),
                *port,
                config.timeout,
            ))),
        }
    }

    /// Wrap an in-process writer
    pub fn virtual_link(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Transport::Virtual {
            name: name.into(),
            writer: Box::new(writer),
        }
    }

    /// Human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            Transport::Serial(link) => format!("serial {}", link.name),
            Transport::Network(link) => format!("tcp {}", link.target()),
            Transport::Virtual { name, .. } => format!("virtual {}", name),
        }
    }

    /// Write one complete command
    pub fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        debug!("{} <- {}", self.describe(), hex(data));
        match self {
            Transport::Serial(link) => link.send(data),
            Transport::Network(link) => link.send(data),
            Transport::Virtual { writer, .. } => {
                writer.write_all(data)?;
                writer.flush()?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avs_sim::{Journal, VirtualLink};
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_line_settings_display() {
        assert_eq!(LineSettings::eight_o_one(38400).to_string(), "38400 8O1");
        assert_eq!(LineSettings::eight_n_one(9600).to_string(), "9600 8N1");
    }

    #[test]
    fn test_endpoint_display() {
        let config = TransportConfig::network("switch.local", 23);
        assert_eq!(config.endpoint.to_string(), "tcp switch.local:23");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_tty() {
        assert_eq!(resolve_tty("/tmp/fake-tty"), "/tmp/fake-tty");
        assert!(resolve_tty("ttyDoesNotExist0").ends_with("ttyDoesNotExist0"));
        assert!(resolve_tty("ttyDoesNotExist0").starts_with("/dev"));
    }

    #[test]
    fn test_virtual_send() {
        let journal = Journal::new();
        let link = VirtualLink::new("test", journal.clone());
        let mut transport = Transport::virtual_link("test", link);
        transport.send(b"1*1%\r\n").unwrap();
        transport.send(b"1*1$\r\n").unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.bytes_for("test"), b"1*1%\r\n1*1$\r\n".to_vec());
        assert_eq!(transport.describe(), "virtual test");
    }

    #[test]
    fn test_virtual_send_failure() {
        let link = VirtualLink::new("flaky", Journal::new());
        let fault = link.fault_switch();
        let mut transport = Transport::virtual_link("flaky", link);

        fault.fail();
        assert!(transport.send(b"x").is_err());
        fault.recover();
        transport.send(b"x").unwrap();
    }

    #[test]
    fn test_network_connects_per_command() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).unwrap();
                received.push(buf);
            }
            received
        });

        let mut transport = Transport::open(&TransportConfig::network("127.0.0.1", port)).unwrap();
        transport.send(&[0xAA, 0xBB, 0x03, 0x01, 0x02, 0xEE]).unwrap();
        transport.send(&[0xAA, 0xBB, 0x03, 0x01, 0x03, 0xEE]).unwrap();

        let received = server.join().unwrap();
        assert_eq!(received[0], vec![0xAA, 0xBB, 0x03, 0x01, 0x02, 0xEE]);
        assert_eq!(received[1], vec![0xAA, 0xBB, 0x03, 0x01, 0x03, 0xEE]);
    }

    #[test]
    fn test_network_connect_failure() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = Transport::open(
            &TransportConfig::network("127.0.0.1", port).with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        assert!(matches!(
            transport.send(b"x"),
            Err(TransportError::ConnectFailed { .. })
        ));
    }
}
