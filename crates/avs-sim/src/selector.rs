//! Virtual TeslaSmart input selector

use std::sync::{Arc, Mutex};

use avs_protocol::tesla_smart::{TeslaSmartCodec, TeslaSmartCommand};
use avs_protocol::ProtocolCodec;
use tracing::{info, warn};

use crate::link::VirtualHardware;

/// Selector with a single output
#[derive(Debug)]
pub struct VirtualSelector {
    inputs: u8,
    active: Option<u8>,
    codec: TeslaSmartCodec,
    frames: usize,
}

impl VirtualSelector {
    pub fn new(inputs: u8) -> Self {
        Self {
            inputs,
            active: None,
            codec: TeslaSmartCodec::new(),
            frames: 0,
        }
    }

    /// Create a selector ready to attach to a link
    pub fn shared(inputs: u8) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(inputs)))
    }

    /// Currently selected input
    pub fn active_input(&self) -> Option<u8> {
        self.active
    }

    /// Frames decoded so far
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl VirtualHardware for VirtualSelector {
    fn receive(&mut self, data: &[u8]) {
        self.codec.push_bytes(data);
        while let Some(TeslaSmartCommand::SelectInput { input }) = self.codec.next_command() {
            self.frames += 1;
            if (1..=self.inputs).contains(&input) {
                info!("Virtual selector: input {}", input);
                self.active = Some(input);
            } else {
                warn!("Virtual selector ignoring input {} of {}", input, self.inputs);
            }
        }
    }
}
