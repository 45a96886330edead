//! Virtual links and the shared command journal

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use avs_protocol::hex;
use tracing::{debug, warn};

/// Hardware that consumes the bytes written to a link
pub trait VirtualHardware {
    /// Handle bytes as they arrive; partial commands may be buffered
    fn receive(&mut self, data: &[u8]);
}

/// One write seen by a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Name of the link written to
    pub link: String,
    /// Bytes written
    pub bytes: Vec<u8>,
}

/// Ordered record of writes across every link sharing it
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, link: &str, bytes: &[u8]) {
        self.lock().push(JournalEntry {
            link: link.to_string(),
            bytes: bytes.to_vec(),
        });
    }

    /// Snapshot of every entry so far
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Link names in write order
    pub fn links(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.link.clone()).collect()
    }

    /// Everything written to one link, concatenated
    pub fn bytes_for(&self, link: &str) -> Vec<u8> {
        self.lock()
            .iter()
            .filter(|e| e.link == link)
            .flat_map(|e| e.bytes.iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Shared flag making a link's writes fail
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    /// Make every following write fail
    pub fn fail(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Let writes succeed again
    pub fn recover(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory link standing in for a serial port or TCP connection
pub struct VirtualLink {
    name: String,
    journal: Journal,
    fault: FaultSwitch,
    hardware: Option<Arc<Mutex<dyn VirtualHardware + Send>>>,
}

impl VirtualLink {
    /// Create a link recording into `journal`
    pub fn new(name: impl Into<String>, journal: Journal) -> Self {
        Self {
            name: name.into(),
            journal,
            fault: FaultSwitch::default(),
            hardware: None,
        }
    }

    /// Forward written bytes to `hardware`
    pub fn with_hardware<H>(mut self, hardware: Arc<Mutex<H>>) -> Self
    where
        H: VirtualHardware + Send + 'static,
    {
        let hardware: Arc<Mutex<dyn VirtualHardware + Send>> = hardware;
        self.hardware = Some(hardware);
        self
    }

    /// Share a fault switch with the caller
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle controlling this link's write failures
    pub fn fault_switch(&self) -> FaultSwitch {
        self.fault.clone()
    }
}

impl std::fmt::Debug for VirtualLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualLink")
            .field("name", &self.name)
            .field("failing", &self.fault.is_failing())
            .field("has_hardware", &self.hardware.is_some())
            .finish()
    }
}

impl Write for VirtualLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fault.is_failing() {
            warn!("[{}] Injected write failure", self.name);
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("virtual link `{}` is failing", self.name),
            ));
        }

        debug!("[{}] {}", self.name, hex(buf));
        self.journal.record(&self.name, buf);
        if let Some(hardware) = &self.hardware {
            hardware
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .receive(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fault.is_failing() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("virtual link `{}` is failing", self.name),
            ));
        }
        Ok(())
    }
}
