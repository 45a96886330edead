//! Selectable devices

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::RouterError;
use crate::registry::SwitchRegistry;
use crate::tie::Tie;

/// A source the user can pick, routed by an ordered list of ties
#[derive(Debug, Clone)]
pub struct Device {
    index: usize,
    title: String,
    image: Option<PathBuf>,
    ties: Vec<Tie>,
}

impl Device {
    pub fn new(index: usize, title: impl Into<String>, image: Option<PathBuf>, ties: Vec<Tie>) -> Self {
        Self {
            index,
            title: title.into(),
            image,
            ties,
        }
    }

    /// Build device `index` from its block, resolving ties against `switches`
    ///
    /// A relative `image` is resolved against `base_dir` when one is known.
    pub fn from_config(
        index: usize,
        value: &Value,
        switches: &SwitchRegistry,
        base_dir: Option<&Path>,
    ) -> Result<Self, RouterError> {
        let config = DeviceConfig::from_value(&index.to_string(), value)?;
        let title = config.title.clone().unwrap_or_else(|| index.to_string());

        let ties = config
            .ties(&title)?
            .iter()
            .map(|(switch_id, tie)| Tie::from_config(switch_id, tie, switches))
            .collect::<Result<Vec<_>, _>>()?;

        let image = config.image.as_deref().map(|image| match base_dir {
            Some(dir) => dir.join(image),
            None => PathBuf::from(image),
        });

        debug!("Loaded device {} `{}` with {} tie(s)", index, title, ties.len());
        Ok(Self::new(index, title, image, ties))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn ties(&self) -> &[Tie] {
        &self.ties
    }

    /// Apply every tie in order
    ///
    /// Stops at the first failure; ties already applied stay applied.
    pub fn select(&self) -> Result<(), RouterError> {
        info!("Selecting `{}`", self.title);

        for (index, tie) in self.ties.iter().enumerate() {
            debug!("Applying {}", tie);
            if let Err(source) = tie.apply() {
                let applied: Vec<String> = self.ties[..index]
                    .iter()
                    .map(|t| t.switch().id().to_string())
                    .collect();
                warn!(
                    "Selecting `{}` stopped at `{}` with {} tie(s) applied: {}",
                    self.title,
                    tie.switch().id(),
                    applied.len(),
                    source
                );
                return Err(RouterError::SelectFailed {
                    device: self.title.clone(),
                    index,
                    switch: tie.switch().id().to_string(),
                    applied,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }
}
