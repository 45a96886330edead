//! Resolved routing facts

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{OutputConfig, TieConfig};
use crate::drivers::DriverCapabilities;
use crate::error::{validate, RouterError};
use crate::registry::SwitchRegistry;
use crate::switch::Switch;

/// Video and audio output channels of a tie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputPair {
    pub video: u32,
    pub audio: u32,
}

impl OutputPair {
    /// Same channel for video and audio
    pub fn coupled(output: u32) -> Self {
        Self {
            video: output,
            audio: output,
        }
    }

    pub fn is_decoupled(&self) -> bool {
        self.video != self.audio
    }
}

/// One input-to-output connection on one switch
#[derive(Debug, Clone)]
pub struct Tie {
    switch: Arc<Switch>,
    input: u32,
    output: OutputPair,
}

impl Tie {
    pub fn new(switch: Arc<Switch>, input: u32, output: OutputPair) -> Self {
        Self {
            switch,
            input,
            output,
        }
    }

    /// Resolve a tie block against the loaded switches
    pub fn from_config(
        switch_id: &str,
        value: &Value,
        switches: &SwitchRegistry,
    ) -> Result<Self, RouterError> {
        validate(!switch_id.is_empty(), || {
            "Switch ID in tie cannot be empty".to_string()
        })?;
        let switch = switches
            .get(switch_id)
            .ok_or_else(|| RouterError::SwitchNotFound(switch_id.to_string()))?;
        let config = TieConfig::from_value(switch_id, value)?;

        let input = config.input.ok_or_else(|| {
            RouterError::Validation(format!("No input specified for `{}`", switch_id))
        })?;

        let capabilities = switch.capabilities();
        let output = if capabilities.contains(DriverCapabilities::HAS_MULTIPLE_OUTPUTS) {
            match config.output {
                None => {
                    return Err(RouterError::Validation(format!(
                        "No output specified for `{}`",
                        switch_id
                    )))
                }
                Some(OutputConfig::Single(output)) => OutputPair::coupled(output),
                Some(OutputConfig::Split { video, audio }) => {
                    validate(
                        capabilities.contains(DriverCapabilities::CAN_DECOUPLE_AUDIO_OUTPUT),
                        || {
                            format!(
                                "Separate audio and video given for `{}`, which does not support decoupling",
                                switch_id
                            )
                        },
                    )?;
                    let video = video.ok_or_else(|| {
                        RouterError::Validation(format!(
                            "Missing `video` channel on decoupled output for `{}`",
                            switch_id
                        ))
                    })?;
                    let audio = audio.ok_or_else(|| {
                        RouterError::Validation(format!(
                            "Missing `audio` channel on decoupled output for `{}`",
                            switch_id
                        ))
                    })?;
                    OutputPair { video, audio }
                }
            }
        } else {
            validate(
                !matches!(config.output, Some(OutputConfig::Split { .. }))
                    || capabilities.contains(DriverCapabilities::CAN_DECOUPLE_AUDIO_OUTPUT),
                || {
                    format!(
                        "Separate audio and video given for `{}`, which does not support decoupling",
                        switch_id
                    )
                },
            )?;
            let default = switch.default_output();
            let given = match config.output {
                None => vec![],
                Some(OutputConfig::Single(output)) => vec![output],
                Some(OutputConfig::Split { video, audio }) => {
                    video.into_iter().chain(audio).collect()
                }
            };
            if let Some(output) = given.into_iter().find(|&o| o != default) {
                return Err(RouterError::Validation(format!(
                    "Output {} given for `{}`, which only has output {}",
                    output, switch_id, default
                )));
            }
            OutputPair::coupled(default)
        };

        Ok(Self::new(Arc::clone(switch), input, output))
    }

    pub fn switch(&self) -> &Arc<Switch> {
        &self.switch
    }

    pub fn input(&self) -> u32 {
        self.input
    }

    pub fn output(&self) -> OutputPair {
        self.output
    }

    /// Send this tie to its switch
    pub fn apply(&self) -> Result<(), RouterError> {
        self.switch
            .set_tie(self.input, self.output.video, self.output.audio)
    }
}

impl fmt::Display for Tie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output.is_decoupled() {
            write!(
                f,
                "{}: {} -> video {} / audio {}",
                self.switch.id(),
                self.input,
                self.output.video,
                self.output.audio
            )
        } else {
            write!(
                f,
                "{}: {} -> {}",
                self.switch.id(),
                self.input,
                self.output.video
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Transport, TransportConfig, TransportError};
    use serde_json::json;
    use std::io;

    fn sink(_: &str, _: &TransportConfig) -> Result<Transport, TransportError> {
        Ok(Transport::virtual_link("sink", io::sink()))
    }

    fn registry() -> SwitchRegistry {
        let switches = json!({
            "matrix": {"driver": "extron",
                       "config": {"host": "m", "maxInputs": 12, "maxOutputs": 8}},
            "scaler": {"driver": "extron",
                       "config": {"host": "s", "maxInputs": 4, "maxOutputs": 1}},
            "selector": {"driver": "tesla-smart",
                         "config": {"host": "t", "maxInputs": 8}}
        });
        let Value::Object(switches) = switches else {
            unreachable!()
        };
        SwitchRegistry::load(&switches, &mut sink).unwrap()
    }

    #[test]
    fn test_coupled_output() {
        let switches = registry();
        let tie = Tie::from_config("matrix", &json!({"input": 3, "output": 2}), &switches).unwrap();
        assert_eq!(tie.input(), 3);
        assert_eq!(tie.output(), OutputPair::coupled(2));
        assert_eq!(tie.to_string(), "matrix: 3 -> 2");
    }

    #[test]
    fn test_decoupled_output() {
        let switches = registry();
        let tie = Tie::from_config(
            "matrix",
            &json!({"input": 3, "output": {"video": 1, "audio": 4}}),
            &switches,
        )
        .unwrap();
        assert_eq!(tie.output(), OutputPair { video: 1, audio: 4 });
        assert_eq!(tie.to_string(), "matrix: 3 -> video 1 / audio 4");
    }

    #[test]
    fn test_single_output_uses_default() {
        let switches = registry();
        let tie = Tie::from_config("selector", &json!({"input": 5}), &switches).unwrap();
        assert_eq!(tie.output(), OutputPair::coupled(0));

        let tie = Tie::from_config("scaler", &json!({"input": 2}), &switches).unwrap();
        assert_eq!(tie.output(), OutputPair::coupled(1));
        tie.apply().unwrap();
    }

    #[test]
    fn test_single_output_accepts_its_default() {
        let switches = registry();
        let tie = Tie::from_config("selector", &json!({"input": 5, "output": 0}), &switches).unwrap();
        assert_eq!(tie.output(), OutputPair::coupled(0));

        let tie = Tie::from_config(
            "scaler",
            &json!({"input": 2, "output": {"video": 1, "audio": 1}}),
            &switches,
        )
        .unwrap();
        assert_eq!(tie.output(), OutputPair::coupled(1));
    }

    #[test]
    fn test_single_output_rejects_other_outputs() {
        let switches = registry();
        let cases = [
            ("selector", json!({"input": 5, "output": 3}), "Output 3 given for `selector`"),
            ("scaler", json!({"input": 2, "output": 2}), "Output 2 given for `scaler`"),
            (
                "scaler",
                json!({"input": 2, "output": {"video": 5, "audio": 7}}),
                "Output 5 given for `scaler`, which only has output 1",
            ),
            (
                "scaler",
                json!({"input": 2, "output": {"video": 1, "audio": 7}}),
                "Output 7 given for `scaler`",
            ),
        ];
        for (id, value, expected) in cases {
            let err = Tie::from_config(id, &value, &switches).unwrap_err();
            assert!(err.is_validation());
            assert!(
                err.to_string().contains(expected),
                "`{}` does not contain `{}`",
                err,
                expected
            );
        }
    }

    #[test]
    fn test_decoupled_rejected_without_capability() {
        let switches = registry();
        let err = Tie::from_config(
            "selector",
            &json!({"input": 1, "output": {"video": 2, "audio": 3}}),
            &switches,
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("`selector`"));
        assert!(err.to_string().contains("does not support decoupling"));
    }

    #[test]
    fn test_validation_messages() {
        let switches = registry();
        let cases = [
            ("", json!({"input": 1}), "cannot be empty"),
            ("nowhere", json!({"input": 1}), "no such switch `nowhere`"),
            ("matrix", json!({"output": 1}), "No input specified for `matrix`"),
            ("matrix", json!({"input": 1}), "No output specified for `matrix`"),
            (
                "matrix",
                json!({"input": 1, "output": {"audio": 2}}),
                "Missing `video` channel on decoupled output for `matrix`",
            ),
            (
                "matrix",
                json!({"input": 1, "output": {"video": 2}}),
                "Missing `audio` channel on decoupled output for `matrix`",
            ),
        ];
        for (id, value, expected) in cases {
            let err = Tie::from_config(id, &value, &switches).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "`{}` does not contain `{}`",
                err,
                expected
            );
            assert!(err.is_validation());
        }
    }
}
