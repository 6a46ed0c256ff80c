//! Serial port handling
//!
//! Port discovery and setup for the air-supply controller. Boards show up as
//! CDC-ACM devices (`/dev/ttyACM*`) or behind a USB-UART bridge (`/dev/ttyUSB*`).

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::debug;

use super::TransportError;
use crate::config::ChannelConfig;

/// Device node prefixes a controller board appears under, best first
const BOARD_NODES: [&str; 2] = ["ttyACM", "ttyUSB"];

/// A serial port the console can offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Path or name to pass as `port_name`
    pub name: String,
    /// USB product string, when the enumerator knows it
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let product = match info.port_type {
            SerialPortType::UsbPort(usb) => usb.product,
            _ => None,
        };
        Self {
            name: info.port_name,
            product,
        }
    }
}

/// List serial ports a controller could be attached to, most likely first
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    // Without udev the enumerator misses nodes that do exist
    #[cfg(target_os = "linux")]
    ports.extend(board_nodes_in_dev());
    order_ports(&mut ports);
    ports
}

#[cfg(target_os = "linux")]
fn board_nodes_in_dev() -> Vec<PortInfo> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|node| BOARD_NODES.iter().any(|prefix| node.starts_with(prefix)))
        .map(|node| PortInfo {
            name: format!("/dev/{}", node),
            product: None,
        })
        .collect()
}

/// Board nodes first by prefix and number, then the rest by name. Duplicate
/// names keep the first entry, which carries the enumerator's product string.
fn order_ports(ports: &mut Vec<PortInfo>) {
    fn key(name: &str) -> (usize, usize, &str) {
        let node = name.rsplit('/').next().unwrap_or(name);
        BOARD_NODES
            .iter()
            .enumerate()
            .find_map(|(rank, prefix)| {
                let number = node.strip_prefix(prefix)?;
                Some((rank, number.parse().unwrap_or(usize::MAX), node))
            })
            .unwrap_or((BOARD_NODES.len(), 0, node))
    }

    ports.sort_by(|a, b| key(&a.name).cmp(&key(&b.name)));
    ports.dedup_by(|later, earlier| later.name == earlier.name);
}

/// Open and configure the port named in `config`
pub fn open_port(config: &ChannelConfig) -> Result<Box<dyn SerialPort>, TransportError> {
    debug!(
        port = %config.port_name,
        baud = config.baud_rate,
        "opening air supply port"
    );
    let mut port = serialport::new(&config.port_name, config.baud_rate)
        .timeout(config.read_timeout())
        .open()?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// Configure 8N1, no flow control, DTR asserted
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), TransportError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;

    // Some Arduino-class boards reset when DTR drops; not every driver supports it
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!("failed to set DTR high: {} (continuing)", e);
    }

    port.clear(serialport::ClearBuffer::All)?;
    Ok(())
}
