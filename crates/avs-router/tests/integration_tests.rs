//! Integration tests for the routing engine
//!
//! These tests drive a full router built from JSON configuration against
//! virtual hardware from `avs-sim`:
//! - Wire bytes reaching each switch
//! - Tie ordering across switches
//! - Load-time validation (unknown switches, decoupling, ranges)
//! - Partial selection failures and bulk power

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use avs_router::{
    Router, RouterConfig, RouterError, Transport, TransportConfig, TransportError,
};
use avs_sim::{FaultSwitch, Journal, VirtualLink, VirtualMatrix, VirtualMonitor, VirtualSelector};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Virtual hardware behind every switch id the fixtures use
    pub struct Bench {
        pub journal: Journal,
        pub matrix: Arc<Mutex<VirtualMatrix>>,
        pub selector: Arc<Mutex<VirtualSelector>>,
        pub monitor: Arc<Mutex<VirtualMonitor>>,
        pub faults: HashMap<String, FaultSwitch>,
    }

    impl Bench {
        pub fn new() -> Self {
            Self {
                journal: Journal::new(),
                matrix: VirtualMatrix::shared(12, 8),
                selector: VirtualSelector::shared(8),
                monitor: VirtualMonitor::shared(1, 0),
                faults: HashMap::new(),
            }
        }

        /// Open a virtual link for `id`, wired to the matching hardware
        pub fn open(&mut self, id: &str) -> Transport {
            let link = VirtualLink::new(id, self.journal.clone());
            let link = match id {
                "matrix" => link.with_hardware(self.matrix.clone()),
                "selector" => link.with_hardware(self.selector.clone()),
                "pvm" => link.with_hardware(self.monitor.clone()),
                _ => link,
            };
            self.faults.insert(id.to_string(), link.fault_switch());
            Transport::virtual_link(id, link)
        }

        pub fn fault(&self, id: &str) -> &FaultSwitch {
            &self.faults[id]
        }
    }

    /// Standard switch set: 12x8 Extron, 8-input selector, one monitor
    pub fn switches() -> serde_json::Value {
        json!({
            "matrix": {"title": "Main matrix", "driver": "extron",
                       "config": {"host": "10.0.0.5", "maxInputs": 12, "maxOutputs": 8}},
            "selector": {"driver": "tesla-smart",
                         "config": {"tty": "ttyUSB1", "maxInputs": 8}},
            "pvm": {"title": "PVM", "driver": "sony-bvm-d",
                    "config": {"tty": "ttyUSB2"}}
        })
    }

    pub fn load(devices: serde_json::Value, bench: &mut Bench) -> Result<Router, RouterError> {
        let config = RouterConfig::from_value(json!({
            "switches": switches(),
            "devices": devices,
        }))?;
        let mut open = |id: &str, _: &TransportConfig| -> Result<Transport, TransportError> {
            Ok(bench.open(id))
        };
        Router::from_config(&config, None, &mut open)
    }
}

use helpers::*;

// ============================================================================
// Wire Output
// ============================================================================

#[test]
fn test_extron_tie_reaches_matrix() {
    let mut bench = Bench::new();
    let router = load(
        json!([{"title": "SNES", "ties": {"matrix": {"input": 1, "output": 1}}}]),
        &mut bench,
    )
    .unwrap();

    router.select(0).unwrap();

    assert_eq!(bench.journal.bytes_for("matrix"), b"1*1%\r\n1*1$\r\n".to_vec());
    let matrix = bench.matrix.lock().unwrap();
    assert_eq!(matrix.video_input(1), Some(1));
    assert_eq!(matrix.audio_input(1), Some(1));
}

#[test]
fn test_extron_tie_is_one_write() {
    let mut bench = Bench::new();
    let router = load(
        json!([{"ties": {"matrix": {"input": 2, "output": {"video": 3, "audio": 4}}}}]),
        &mut bench,
    )
    .unwrap();

    router.select(0).unwrap();

    let entries = bench.journal.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].bytes, b"2*3%\r\n2*4$\r\n".to_vec());
    let matrix = bench.matrix.lock().unwrap();
    assert_eq!(matrix.video_input(3), Some(2));
    assert_eq!(matrix.audio_input(4), Some(2));
    assert_eq!(matrix.audio_input(3), None);
}

#[test]
fn test_selector_and_monitor_bytes() {
    let mut bench = Bench::new();
    let router = load(
        json!([{"ties": {"selector": {"input": 3}, "pvm": {"input": 10}}}]),
        &mut bench,
    )
    .unwrap();

    router.select(0).unwrap();

    assert_eq!(
        bench.journal.bytes_for("selector"),
        vec![0xAA, 0xBB, 0x03, 0x01, 0x03, 0xEE]
    );
    assert_eq!(
        bench.journal.bytes_for("pvm"),
        vec![0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x0A, 0x4E]
    );
    assert_eq!(bench.selector.lock().unwrap().active_input(), Some(3));
    assert_eq!(bench.monitor.lock().unwrap().channel(), Some(10));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_ties_apply_in_configured_order() {
    let mut bench = Bench::new();
    let router = load(
        json!([
            {"title": "A", "ties": {
                "pvm": {"input": 1},
                "matrix": {"input": 5, "output": 2},
                "selector": {"input": 2}
            }},
            {"title": "B", "ties": {
                "selector": {"input": 4},
                "pvm": {"input": 2},
                "matrix": {"input": 6, "output": 2}
            }}
        ]),
        &mut bench,
    )
    .unwrap();

    router.select(0).unwrap();
    assert_eq!(bench.journal.links(), vec!["pvm", "matrix", "selector"]);

    bench.journal.clear();
    router.find_device("b").unwrap().select().unwrap();
    assert_eq!(bench.journal.links(), vec!["selector", "pvm", "matrix"]);
    assert_eq!(bench.matrix.lock().unwrap().video_input(2), Some(6));
}

// ============================================================================
// Load-Time Validation
// ============================================================================

#[test]
fn test_unknown_switch_fails_before_any_write() {
    let mut bench = Bench::new();
    let err = load(
        json!([
            {"title": "Good", "ties": {"matrix": {"input": 1, "output": 1}}},
            {"title": "Bad", "ties": {
                "matrix": {"input": 1, "output": 1},
                "ghost": {"input": 1}
            }}
        ]),
        &mut bench,
    )
    .unwrap_err();

    assert!(matches!(err, RouterError::SwitchNotFound(ref id) if id == "ghost"));
    assert!(err.is_validation());
    assert!(bench.journal.is_empty());
}

#[test]
fn test_decoupled_audio_rejected_naming_switch() {
    let mut bench = Bench::new();
    let err = load(
        json!([{"ties": {"selector": {"input": 1, "output": {"video": 2, "audio": 3}}}}]),
        &mut bench,
    )
    .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("`selector`"));
    assert!(bench.journal.is_empty());
}

#[test]
fn test_single_output_switch_rejects_other_output() {
    for ties in [
        json!({"selector": {"input": 2, "output": 3}}),
        json!({"pvm": {"input": 4, "output": 1}}),
    ] {
        let mut bench = Bench::new();
        let err = load(json!([{"ties": ties}]), &mut bench).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("which only has output 0"));
        assert!(bench.journal.is_empty());
    }
}

#[test]
fn test_matrix_requires_output() {
    let mut bench = Bench::new();
    let err = load(json!([{"ties": {"matrix": {"input": 1}}}]), &mut bench).unwrap_err();
    assert!(err.to_string().contains("No output specified for `matrix`"));
}

#[test]
fn test_unknown_driver() {
    let config = RouterConfig::from_value(json!({
        "switches": {"kramer": {"driver": "kramer-vs", "config": {}}},
        "devices": []
    }))
    .unwrap();
    let mut bench = Bench::new();
    let mut open = |id: &str, _: &TransportConfig| -> Result<Transport, TransportError> {
        Ok(bench.open(id))
    };
    let err = Router::from_config(&config, None, &mut open).unwrap_err();
    assert!(matches!(err, RouterError::UnknownDriver { ref name, .. } if name == "kramer-vs"));
}

// ============================================================================
// Runtime Failures
// ============================================================================

#[test]
fn test_out_of_range_input_writes_nothing() {
    let mut bench = Bench::new();
    let router = load(
        json!([
            {"ties": {"matrix": {"input": 0, "output": 1}}},
            {"ties": {"matrix": {"input": 13, "output": 1}}}
        ]),
        &mut bench,
    )
    .unwrap();

    for index in 0..2 {
        match router.select(index).unwrap_err() {
            RouterError::SelectFailed { source, applied, .. } => {
                assert!(source.is_validation());
                assert!(applied.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
    assert!(bench.journal.is_empty());
}

#[test]
fn test_partial_failure_is_not_rolled_back() {
    let mut bench = Bench::new();
    let router = load(
        json!([{"title": "Saturn", "ties": {
            "matrix": {"input": 7, "output": 1},
            "selector": {"input": 2},
            "pvm": {"input": 3}
        }}]),
        &mut bench,
    )
    .unwrap();
    bench.fault("selector").fail();

    match router.select(0).unwrap_err() {
        RouterError::SelectFailed {
            device,
            index,
            switch,
            applied,
            source,
        } => {
            assert_eq!(device, "Saturn");
            assert_eq!(index, 1);
            assert_eq!(switch, "selector");
            assert_eq!(applied, vec!["matrix".to_string()]);
            assert!(matches!(*source, RouterError::Transport { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }

    // The first tie stays applied and the last was never attempted
    assert_eq!(bench.matrix.lock().unwrap().video_input(1), Some(7));
    assert_eq!(bench.journal.links(), vec!["matrix"]);
    assert_eq!(bench.monitor.lock().unwrap().channel(), None);

    bench.fault("selector").recover();
    router.select(0).unwrap();
    assert_eq!(bench.selector.lock().unwrap().active_input(), Some(2));
}

// ============================================================================
// Bulk Power
// ============================================================================

#[test]
fn test_power_all() {
    let mut bench = Bench::new();
    let router = load(json!([]), &mut bench).unwrap();

    router.power_on_all().unwrap();
    assert!(bench.monitor.lock().unwrap().is_powered());
    // Passive switches have no power command
    assert_eq!(bench.journal.links(), vec!["pvm"]);

    router.power_off_all().unwrap();
    assert!(!bench.monitor.lock().unwrap().is_powered());
}

#[test]
fn test_power_failure_is_collected() {
    let mut bench = Bench::new();
    let router = load(json!([]), &mut bench).unwrap();
    bench.fault("pvm").fail();

    match router.power_on_all().unwrap_err() {
        RouterError::PowerFailed { on, failures } => {
            assert!(on);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "pvm");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!bench.monitor.lock().unwrap().is_powered());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_matrix_follows_selection(
        input in 1u32..=12,
        video in 1u32..=8,
        audio in 1u32..=8,
    ) {
        let mut bench = Bench::new();
        let router = load(
            json!([{"ties": {"matrix": {"input": input, "output": {"video": video, "audio": audio}}}}]),
            &mut bench,
        )
        .unwrap();

        router.select(0).unwrap();

        let expected = format!("{input}*{video}%\r\n{input}*{audio}$\r\n");
        prop_assert_eq!(bench.journal.bytes_for("matrix"), expected.into_bytes());
        let matrix = bench.matrix.lock().unwrap();
        prop_assert_eq!(matrix.video_input(video), Some(input));
        prop_assert_eq!(matrix.audio_input(audio), Some(input));
    }

    #[test]
    fn prop_out_of_range_never_writes(input in 13u32..1000) {
        let mut bench = Bench::new();
        let router = load(
            json!([{"ties": {"selector": {"input": input}}}]),
            &mut bench,
        )
        .unwrap();

        prop_assert!(router.select(0).is_err());
        prop_assert!(bench.journal.is_empty());
    }
}
