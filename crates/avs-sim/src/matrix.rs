//! Virtual Extron SIS matrix switch

use std::sync::{Arc, Mutex};

use avs_protocol::extron::{ExtronCodec, ExtronCommand, TiePlane};
use avs_protocol::ProtocolCodec;
use tracing::{info, warn};

use crate::link::VirtualHardware;

/// Matrix with independent video and audio planes
///
/// Outputs start unrouted. Ties outside the matrix are logged and ignored,
/// the way the real switch answers with an error and changes nothing.
#[derive(Debug)]
pub struct VirtualMatrix {
    inputs: u32,
    video: Vec<Option<u32>>,
    audio: Vec<Option<u32>>,
    codec: ExtronCodec,
    /// Every command decoded, including rejected ones
    received: Vec<ExtronCommand>,
}

impl VirtualMatrix {
    pub fn new(inputs: u32, outputs: u32) -> Self {
        Self {
            inputs,
            video: vec![None; outputs as usize],
            audio: vec![None; outputs as usize],
            codec: ExtronCodec::new(),
            received: Vec::new(),
        }
    }

    /// Create a matrix ready to attach to a link
    pub fn shared(inputs: u32, outputs: u32) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(inputs, outputs)))
    }

    /// Input tied to `output` on the video plane
    pub fn video_input(&self, output: u32) -> Option<u32> {
        Self::slot(&self.video, output)
    }

    /// Input tied to `output` on the audio plane
    pub fn audio_input(&self, output: u32) -> Option<u32> {
        Self::slot(&self.audio, output)
    }

    pub fn received(&self) -> &[ExtronCommand] {
        &self.received
    }

    fn slot(plane: &[Option<u32>], output: u32) -> Option<u32> {
        let index = (output as usize).checked_sub(1)?;
        plane.get(index).copied().flatten()
    }

    fn apply(&mut self, command: &ExtronCommand) {
        let ExtronCommand::Tie {
            input,
            output,
            plane,
        } = *command
        else {
            warn!("Virtual matrix ignoring unknown command {:?}", command);
            return;
        };

        let outputs = self.video.len() as u32;
        if !(1..=self.inputs).contains(&input) || !(1..=outputs).contains(&output) {
            warn!(
                "Virtual matrix rejecting tie {}*{}{} ({}x{})",
                input,
                output,
                plane.suffix(),
                self.inputs,
                outputs
            );
            return;
        }

        let slots = match plane {
            TiePlane::Video => &mut self.video,
            TiePlane::Audio => &mut self.audio,
        };
        slots[output as usize - 1] = Some(input);
        info!("Virtual matrix: {}*{}{}", input, output, plane.suffix());
    }
}

impl VirtualHardware for VirtualMatrix {
    fn receive(&mut self, data: &[u8]) {
        self.codec.push_bytes(data);
        while let Some(command) = self.codec.next_command() {
            self.apply(&command);
            self.received.push(command);
        }
    }
}
