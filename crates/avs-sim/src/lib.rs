//! AV Switch Simulation Library
//!
//! This crate provides stand-ins for the hardware the router drives, so the
//! routing model can be exercised without serial ports or a network:
//!
//! - **VirtualLink**: a `Write` sink that records every command in a shared
//!   [`Journal`], can be told to fail, and forwards bytes to virtual hardware
//! - **VirtualMatrix**: an Extron SIS matrix tracking video and audio ties
//! - **VirtualSelector**: a TeslaSmart selector tracking the active input
//! - **VirtualMonitor**: a Sony BVM-D monitor tracking power and channel
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//! use avs_sim::{Journal, VirtualLink, VirtualMatrix};
//!
//! let journal = Journal::new();
//! let matrix = VirtualMatrix::shared(12, 8);
//! let mut link = VirtualLink::new("matrix", journal.clone()).with_hardware(matrix.clone());
//!
//! link.write_all(b"3*2%\r\n3*2$\r\n").unwrap();
//!
//! assert_eq!(matrix.lock().unwrap().video_input(2), Some(3));
//! assert_eq!(journal.links(), vec!["matrix".to_string()]);
//! ```

pub mod link;
pub mod matrix;
pub mod monitor;
pub mod selector;

pub use link::{FaultSwitch, Journal, JournalEntry, VirtualHardware, VirtualLink};
pub use matrix::VirtualMatrix;
pub use monitor::VirtualMonitor;
pub use selector::VirtualSelector;
