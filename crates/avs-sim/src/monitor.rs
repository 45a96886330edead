//! Virtual Sony BVM-D monitor

use std::sync::{Arc, Mutex};

use avs_protocol::sony_bvm::{Address, AddressKind, Command, CommandBlock, SonyCodec};
use avs_protocol::ProtocolCodec;
use tracing::{debug, info};

use crate::link::VirtualHardware;

/// Monitor on an RS-485 bus
///
/// Reacts to blocks addressed to everyone, to its group, or to its own
/// monitor number.
#[derive(Debug)]
pub struct VirtualMonitor {
    address: u8,
    group: u8,
    powered: bool,
    channel: Option<u8>,
    codec: SonyCodec,
    received: Vec<CommandBlock>,
}

impl VirtualMonitor {
    /// Monitor number `address` in group `group`, powered off
    pub fn new(address: u8, group: u8) -> Self {
        Self {
            address,
            group,
            powered: false,
            channel: None,
            codec: SonyCodec::new(),
            received: Vec::new(),
        }
    }

    /// Create a monitor ready to attach to a link
    pub fn shared(address: u8, group: u8) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(address, group)))
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Selected channel
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Every block decoded, addressed to this monitor or not
    pub fn received(&self) -> &[CommandBlock] {
        &self.received
    }

    fn addressed_to_me(&self, destination: Address) -> bool {
        match destination.kind() {
            AddressKind::All => true,
            AddressKind::Group => destination.number() == self.group,
            AddressKind::Monitor => destination.number() == self.address,
        }
    }

    fn apply(&mut self, block: &CommandBlock) {
        if !self.addressed_to_me(block.destination) {
            debug!("Virtual monitor {} ignoring {:?}", self.address, block);
            return;
        }
        match block.command {
            Command::PowerOn => {
                info!("Virtual monitor {}: power on", self.address);
                self.powered = true;
            }
            Command::PowerOff => {
                info!("Virtual monitor {}: power off", self.address);
                self.powered = false;
            }
            Command::SetChannel => {
                if let Some(channel) = block.arg1 {
                    info!("Virtual monitor {}: channel {}", self.address, channel);
                    self.channel = Some(channel);
                }
            }
            Command::Button | Command::Other(_) => {
                debug!("Virtual monitor {} ignoring {:?}", self.address, block.command);
            }
        }
    }
}

impl VirtualHardware for VirtualMonitor {
    fn receive(&mut self, data: &[u8]) {
        self.codec.push_bytes(data);
        while let Some(block) = self.codec.next_command() {
            self.apply(&block);
            self.received.push(block);
        }
    }
}
