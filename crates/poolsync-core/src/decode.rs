// ── Flag decoding ──
//
// Pure interpretations of raw status words. Every function returns `None`
// when an input is missing, so "unknown" never reads as "off".
//
// The stateFlags/ctrlFlags thresholds are the device's observed control
// word encoding and must stay exactly as written.

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

/// `stateFlags` strictly above this means the heat pump is active.
pub const HEAT_ACTIVE_STATE_FLAGS: i64 = 257;
/// `ctrlFlags` at or above this (with an active state) means the compressor
/// is heating.
pub const HEAT_COMPRESSOR_CTRL_FLAGS: i64 = 397;
/// `stateFlags` at or above this (in cool mode) means the compressor runs.
pub const COOL_COMPRESSOR_STATE_FLAGS: i64 = 272;
/// `ctrlFlags` at or above this (in cool mode) means the compressor runs.
pub const COOL_COMPRESSOR_CTRL_FLAGS: i64 = 445;
/// `stateFlags` at or above this means the fan runs.
pub const FAN_STATE_FLAGS: i64 = 264;

/// Heat pump operating mode as stored in `config.mode`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum HeatMode {
    Off = 0,
    Heat = 1,
    Cool = 2,
}

impl HeatMode {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Heat),
            2 => Some(Self::Cool),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
        }
    }
}

/// What the heat pump is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    Off,
    Heating,
    Cooling,
    Idle,
}

/// Integer view of a status word. Booleans count as 0/1, floats are
/// truncated, and numeric strings are parsed.
pub fn as_int(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn truncate(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

/// `true` iff `v` is boolean true or a nonzero integer.
pub fn online(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// `true` iff `faults` is a non-empty list with any nonzero element.
/// A present value that is not a list reads as no fault.
pub fn fault_present(faults: Option<&Value>) -> Option<bool> {
    let Value::Array(items) = faults? else {
        return Some(false);
    };
    Some(items.iter().any(|item| match item {
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => true,
    }))
}

/// Decode `config.mode`. Unknown codes are `None`.
pub fn heat_mode(mode: Option<&Value>) -> Option<HeatMode> {
    as_int(mode).and_then(HeatMode::from_raw)
}

/// Whether `mode` equals `expected`.
pub fn heating_mode_active(mode: Option<&Value>, expected: HeatMode) -> Option<bool> {
    as_int(mode).map(|m| m == expected.raw())
}

/// Whether the compressor is running.
///
/// Heat: `stateFlags > 257 && ctrlFlags >= 397`.
/// Cool: `stateFlags >= 272 && ctrlFlags >= 445`.
/// Any other mode: never running.
pub fn compressor_running(
    mode: Option<&Value>,
    state_flags: Option<&Value>,
    ctrl_flags: Option<&Value>,
) -> Option<bool> {
    let mode = as_int(mode)?;
    let state = as_int(state_flags)?;
    let ctrl = as_int(ctrl_flags)?;
    Some(match HeatMode::from_raw(mode) {
        Some(HeatMode::Heat) => {
            state > HEAT_ACTIVE_STATE_FLAGS && ctrl >= HEAT_COMPRESSOR_CTRL_FLAGS
        }
        Some(HeatMode::Cool) => {
            state >= COOL_COMPRESSOR_STATE_FLAGS && ctrl >= COOL_COMPRESSOR_CTRL_FLAGS
        }
        Some(HeatMode::Off) | None => false,
    })
}

/// `true` iff `stateFlags >= 264`.
pub fn fan_running(state_flags: Option<&Value>) -> Option<bool> {
    as_int(state_flags).map(|s| s >= FAN_STATE_FLAGS)
}

/// Hub service mode. Integers and booleans are accepted; anything else,
/// including a float or a list, is indeterminate.
pub fn service_mode(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Hub-level fault word, decoded like [`service_mode`].
pub fn hub_fault(v: Option<&Value>) -> Option<bool> {
    service_mode(v)
}

/// Water flow through the heat pump: bit 0 of `ctrlFlags`.
pub fn flow_present(ctrl_flags: Option<&Value>) -> Option<bool> {
    as_int(ctrl_flags).map(|c| c & 1 == 1)
}

/// Heat pump actively heating: mode is heat and `stateFlags > 257`.
pub fn heating_active(mode: Option<&Value>, state_flags: Option<&Value>) -> Option<bool> {
    let mode = as_int(mode)?;
    let state = as_int(state_flags)?;
    Some(mode == HeatMode::Heat.raw() && state > HEAT_ACTIVE_STATE_FLAGS)
}

/// Current action of the heat pump.
pub fn run_action(
    mode: Option<&Value>,
    state_flags: Option<&Value>,
    ctrl_flags: Option<&Value>,
) -> Option<RunAction> {
    let decoded = heat_mode(mode)?;
    if decoded == HeatMode::Off {
        return Some(RunAction::Off);
    }
    let running = compressor_running(mode, state_flags, ctrl_flags)?;
    Some(match (running, decoded) {
        (true, HeatMode::Heat) => RunAction::Heating,
        (true, HeatMode::Cool) => RunAction::Cooling,
        _ => RunAction::Idle,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn online_truth_table() {
        assert_eq!(online(Some(&json!(0))), Some(false));
        assert_eq!(online(Some(&json!(1))), Some(true));
        assert_eq!(online(Some(&json!(true))), Some(true));
        assert_eq!(online(Some(&json!(false))), Some(false));
        assert_eq!(online(None), None);
        assert_eq!(online(Some(&json!("yes"))), None);
    }

    #[test]
    fn fault_lists() {
        assert_eq!(fault_present(Some(&json!([0]))), Some(false));
        assert_eq!(fault_present(Some(&json!([0, 0, 3]))), Some(true));
        assert_eq!(fault_present(Some(&json!([]))), Some(false));
        assert_eq!(fault_present(Some(&json!(7))), Some(false));
        assert_eq!(fault_present(None), None);
    }

    #[test]
    fn compressor_heat_boundary_is_exclusive_on_state() {
        let heat = json!(1);
        assert_eq!(
            compressor_running(Some(&heat), Some(&json!(258)), Some(&json!(397))),
            Some(true)
        );
        assert_eq!(
            compressor_running(Some(&heat), Some(&json!(257)), Some(&json!(397))),
            Some(false)
        );
        assert_eq!(
            compressor_running(Some(&heat), Some(&json!(300)), Some(&json!(396))),
            Some(false)
        );
    }

    #[test]
    fn compressor_cool_thresholds() {
        let cool = json!(2);
        assert_eq!(
            compressor_running(Some(&cool), Some(&json!(272)), Some(&json!(445))),
            Some(true)
        );
        assert_eq!(
            compressor_running(Some(&cool), Some(&json!(271)), Some(&json!(445))),
            Some(false)
        );
        assert_eq!(
            compressor_running(Some(&json!(0)), Some(&json!(999)), Some(&json!(999))),
            Some(false)
        );
        assert_eq!(compressor_running(Some(&cool), None, Some(&json!(445))), None);
    }

    #[test]
    fn fan_and_flow() {
        assert_eq!(fan_running(Some(&json!(264))), Some(true));
        assert_eq!(fan_running(Some(&json!(263))), Some(false));
        assert_eq!(fan_running(None), None);
        assert_eq!(flow_present(Some(&json!(397))), Some(true));
        assert_eq!(flow_present(Some(&json!(396))), Some(false));
    }

    #[test]
    fn service_mode_accepts_integers_and_booleans() {
        assert_eq!(service_mode(Some(&json!(1))), Some(true));
        assert_eq!(service_mode(Some(&json!(0))), Some(false));
        assert_eq!(service_mode(Some(&json!(true))), Some(true));
        assert_eq!(service_mode(Some(&json!(false))), Some(false));
        assert_eq!(service_mode(Some(&json!(1.5))), None);
        assert_eq!(hub_fault(Some(&json!(true))), Some(true));
        assert_eq!(hub_fault(Some(&json!([0, 3]))), None);
    }

    #[test]
    fn run_action_classification() {
        let ra = |m, s, c| run_action(Some(&json!(m)), Some(&json!(s)), Some(&json!(c)));
        assert_eq!(ra(0, 300, 500), Some(RunAction::Off));
        assert_eq!(ra(1, 300, 500), Some(RunAction::Heating));
        assert_eq!(ra(2, 300, 500), Some(RunAction::Cooling));
        assert_eq!(ra(1, 257, 500), Some(RunAction::Idle));
        assert_eq!(run_action(None, Some(&json!(1)), Some(&json!(1))), None);
    }

    #[test]
    fn heat_mode_parses_names_and_codes() {
        assert_eq!(heat_mode(Some(&json!("2"))), Some(HeatMode::Cool));
        assert_eq!(heat_mode(Some(&json!(9))), None);
        assert_eq!("HEAT".parse::<HeatMode>().ok(), Some(HeatMode::Heat));
        assert_eq!(HeatMode::Off.to_string(), "off");
        assert_eq!(heating_mode_active(Some(&json!(1)), HeatMode::Heat), Some(true));
        assert_eq!(heating_active(Some(&json!(1)), Some(&json!(258))), Some(true));
        assert_eq!(heating_active(Some(&json!(2)), Some(&json!(300))), Some(false));
    }
}
