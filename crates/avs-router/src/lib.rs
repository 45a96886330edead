//! AV Switch Routing Engine
//!
//! This crate maps user-selectable *devices* onto ties on physical matrix
//! switches, input selectors and monitors, and drives the hardware through
//! the protocols in `avs-protocol`.
//!
//! # Model
//!
//! - A [`Switch`] is one piece of hardware with one [`Driver`] and one
//!   [`Transport`]
//! - A [`Tie`] connects an input to an output pair on one switch
//! - A [`Device`] is an ordered list of ties; selecting it applies them in order
//! - A [`Router`] owns the [`SwitchRegistry`] and [`DeviceRegistry`] built
//!   from one configuration document
//!
//! Loading validates everything up front: an unknown switch, driver or
//! malformed tie fails the load before any command is sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use avs_router::Router;
//!
//! let router = Router::load(Path::new("/etc/avswitch/config.json"))?;
//! router.power_on_all()?;
//! router.find_device("SNES")?.select()?;
//! # Ok::<(), avs_router::RouterError>(())
//! ```

pub mod actor;
pub mod config;
pub mod device;
pub mod drivers;
pub mod error;
pub mod events;
pub mod registry;
pub mod router;
pub mod switch;
pub mod tie;
pub mod transport;

pub use actor::{run_router_actor, RouterCommand, RouterHandle};
pub use config::{
    DeviceConfig, DriverConfig, OutputConfig, RouterConfig, SwitchConfig, TieConfig,
    CONFIG_FILE_NAME,
};
pub use device::Device;
pub use drivers::{Driver, DriverCapabilities, DriverError, DriverKind, DriverSettings};
pub use error::RouterError;
pub use events::RouterEvent;
pub use registry::{DeviceRegistry, SwitchRegistry};
pub use router::Router;
pub use switch::Switch;
pub use tie::{OutputPair, Tie};
pub use transport::{
    Endpoint, LineSettings, Transport, TransportConfig, TransportError, DEFAULT_TIMEOUT,
};
