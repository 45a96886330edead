//! Error types for the router

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while loading configuration or driving hardware
#[derive(Debug, Error)]
pub enum RouterError {
    /// Bad configuration or out-of-range channel; nothing was sent
    #[error("validation failed: {0}")]
    Validation(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Driver name is not in the registry
    #[error("driver `{name}` does not exist (switch `{switch}`)")]
    UnknownDriver { switch: String, name: String },

    /// Switch id is not loaded
    #[error("no such switch `{0}`")]
    SwitchNotFound(String),

    /// Device index or title is not loaded
    #[error("no such device `{0}`")]
    DeviceNotFound(String),

    /// Transport failed while talking to a switch
    #[error("transport error on `{switch}`: {source}")]
    Transport {
        /// Switch whose transport failed
        switch: String,
        #[source]
        source: TransportError,
    },

    /// A device selection stopped part way; earlier ties stay applied
    #[error(
        "selecting `{device}` failed at tie {index} on switch `{switch}` \
         ({} tie(s) already applied): {source}",
        .applied.len()
    )]
    SelectFailed {
        /// Title of the device being selected
        device: String,
        /// Zero-based index of the failing tie
        index: usize,
        /// Switch the failing tie targets
        switch: String,
        /// Switches whose ties were applied before the failure
        applied: Vec<String>,
        #[source]
        source: Box<RouterError>,
    },

    /// Bulk power change failed on one or more switches
    #[error(
        "power {} failed on {} switch(es): {}",
        on_off(.on),
        .failures.len(),
        describe(.failures)
    )]
    PowerFailed {
        /// Requested power state
        on: bool,
        /// Failing switch ids with their errors
        failures: Vec<(String, RouterError)>,
    },

    /// Router actor is not running
    #[error("router actor is not running")]
    ActorClosed,

    /// Blocking work panicked or was cancelled
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl RouterError {
    /// Returns true if this error was raised before any byte reached the hardware
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Config(_)
                | Self::UnknownDriver { .. }
                | Self::SwitchNotFound(_)
                | Self::DeviceNotFound(_)
        )
    }
}

fn on_off(on: &bool) -> &'static str {
    if *on {
        "on"
    } else {
        "off"
    }
}

fn describe(failures: &[(String, RouterError)]) -> String {
    failures
        .iter()
        .map(|(switch, e)| format!("`{}`: {}", switch, e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fail with a validation error unless `condition` holds
pub(crate) fn validate(condition: bool, message: impl FnOnce() -> String) -> Result<(), RouterError> {
    if condition {
        Ok(())
    } else {
        Err(RouterError::Validation(message()))
    }
}
