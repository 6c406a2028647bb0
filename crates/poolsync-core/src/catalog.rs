// ── Field catalog ──
//
// Declarative list of every value surfaced from a snapshot. Each record
// pairs a path (relative to the hub or to a discovered sub-device) with a
// decode function; `FieldSpec::evaluate` is the one generic adapter that
// runs PathResolver and FlagDecoder for all of them.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use strum::{Display, EnumIter, EnumString};

use crate::decode::{self, HeatMode, RunAction};
use crate::error::CoreError;
use crate::path::{FieldPath, resolve};
use crate::snapshot::{DeviceKind, Snapshot};

// ── Units ────────────────────────────────────────────────────────────

/// Temperature scale the device is configured for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Temperature,
    Percent,
    PartsPerMillion,
    MilliAmpere,
    MilliVolt,
    DecibelMilliwatt,
    Seconds,
    Rpm,
}

impl Unit {
    pub fn symbol(self, units: UnitSystem) -> &'static str {
        match (self, units) {
            (Self::Temperature, UnitSystem::Metric) => "°C",
            (Self::Temperature, UnitSystem::Imperial) => "°F",
            (Self::Percent, _) => "%",
            (Self::PartsPerMillion, _) => "ppm",
            (Self::MilliAmpere, _) => "mA",
            (Self::MilliVolt, _) => "mV",
            (Self::DecibelMilliwatt, _) => "dBm",
            (Self::Seconds, _) => "s",
            (Self::Rpm, _) => "rpm",
        }
    }
}

// ── Values ───────────────────────────────────────────────────────────

/// A decoded catalog value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(Number),
    Text(String),
    Bool(bool),
    Mode(HeatMode),
    Action(RunAction),
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    fn from_bool(b: Option<bool>) -> Self {
        b.map_or(Self::Absent, Self::Bool)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Mode(m) => write!(f, "{m}"),
            Self::Action(a) => write!(f, "{a}"),
            Self::Absent => f.write_str("-"),
        }
    }
}

// ── Field records ────────────────────────────────────────────────────

/// Where a field's relative path is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The hub section, `poolSync`.
    Hub,
    /// `devices.<id>` of the discovered sub-device.
    Device(DeviceKind),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub => f.write_str("hub"),
            Self::Device(kind) => write!(f, "{kind}"),
        }
    }
}

pub type Decoder = fn(Option<&Value>) -> FieldValue;

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Stable identifier used on the command line.
    pub key: &'static str,
    pub name: &'static str,
    pub scope: Scope,
    /// Keys below the scope root. Empty hands the whole scope node to the
    /// decoder, which derived fields use to read several words at once.
    pub path: &'static [&'static str],
    pub decode: Decoder,
    pub unit: Option<Unit>,
    pub writable: Option<WritableField>,
}

impl FieldSpec {
    /// Absolute path of this field in `snapshot`, or `None` if its
    /// sub-device is not present.
    pub fn path_in(&self, snapshot: &Snapshot) -> Option<FieldPath> {
        let tail = FieldPath::from_keys(self.path.iter().copied());
        match self.scope {
            Scope::Hub => Some(FieldPath::from_keys([poolsync_api::client::REGISTRY_SECTION]).join(&tail)),
            Scope::Device(kind) => {
                let id = snapshot.device_id_of(kind)?;
                Some(Snapshot::device_path(&id).join(&tail))
            }
        }
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> FieldValue {
        let raw = self.path_in(snapshot).and_then(|p| snapshot.get(&p));
        (self.decode)(raw)
    }

    pub fn unit_symbol(&self, units: UnitSystem) -> &'static str {
        self.unit.map_or("", |u| u.symbol(units))
    }
}

/// A catalog field paired with its value in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FieldReading {
    pub key: &'static str,
    pub name: &'static str,
    pub scope: Scope,
    pub value: FieldValue,
    pub unit: Option<&'static str>,
}

/// Every catalog field, in display order.
pub fn fields() -> &'static [FieldSpec] {
    FIELDS
}

/// Look a field up by key.
pub fn find(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Evaluate the whole catalog against `snapshot`.
pub fn evaluate(snapshot: &Snapshot, units: UnitSystem) -> Vec<FieldReading> {
    FIELDS
        .iter()
        .map(|spec| FieldReading {
            key: spec.key,
            name: spec.name,
            scope: spec.scope,
            value: spec.evaluate(snapshot),
            unit: spec.unit.map(|u| u.symbol(units)),
        })
        .collect()
}

// ── Writable fields ──────────────────────────────────────────────────

/// The configuration values the device accepts writes for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum WritableField {
    #[strum(to_string = "chlor_output", serialize = "chlorOutput")]
    ChlorOutput,
    #[strum(to_string = "hp_setpoint", serialize = "setpoint")]
    Setpoint,
    #[strum(to_string = "hp_mode", serialize = "mode")]
    Mode,
}

impl WritableField {
    /// Key inside the sub-device's `config` object.
    pub fn wire_key(self) -> &'static str {
        match self {
            Self::ChlorOutput => "chlorOutput",
            Self::Setpoint => "setpoint",
            Self::Mode => "mode",
        }
    }

    /// Sub-device that owns this setting.
    pub fn device_kind(self) -> DeviceKind {
        match self {
            Self::ChlorOutput => DeviceKind::ChlorSync,
            Self::Setpoint | Self::Mode => DeviceKind::HeatPump,
        }
    }

    pub fn range(self, units: UnitSystem) -> RangeInclusive<f64> {
        match (self, units) {
            (Self::ChlorOutput, _) => 0.0..=100.0,
            (Self::Setpoint, UnitSystem::Imperial) => 40.0..=104.0,
            (Self::Setpoint, UnitSystem::Metric) => 5.0..=40.0,
            (Self::Mode, _) => 0.0..=2.0,
        }
    }

    /// Check `value` against the range and truncate it to the integer the
    /// device expects.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn validate(self, value: f64, units: UnitSystem) -> Result<i64, CoreError> {
        let range = self.range(units);
        if !value.is_finite() || !range.contains(&value) {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "{self} must be between {} and {} (got {value})",
                    range.start(),
                    range.end()
                ),
            });
        }
        Ok(value.trunc() as i64)
    }

    /// Catalog entry showing this setting's current value.
    pub fn spec(self) -> &'static FieldSpec {
        match self {
            Self::ChlorOutput => &CHLOR_OUTPUT,
            Self::Setpoint => &HP_SETPOINT,
            Self::Mode => &HP_MODE,
        }
    }
}

// ── Decoders ─────────────────────────────────────────────────────────

fn number(v: Option<&Value>) -> FieldValue {
    match v {
        Some(Value::Number(n)) => FieldValue::Number(n.clone()),
        _ => FieldValue::Absent,
    }
}

fn text(v: Option<&Value>) -> FieldValue {
    match v {
        Some(Value::String(s)) => FieldValue::Text(s.clone()),
        Some(Value::Number(n)) => FieldValue::Text(n.to_string()),
        _ => FieldValue::Absent,
    }
}

/// Device clock. Normalized to RFC 3339 when it parses, passed through
/// otherwise.
fn datetime(v: Option<&Value>) -> FieldValue {
    let Some(Value::String(s)) = v else {
        return FieldValue::Absent;
    };
    let normalized = chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.to_rfc3339())
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        })
        .unwrap_or_else(|_| s.clone());
    FieldValue::Text(normalized)
}

fn online(v: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::online(v))
}

fn faults(v: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::fault_present(v))
}

fn service_mode(v: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::service_mode(v))
}

fn hub_fault(v: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::hub_fault(v))
}

fn flow(v: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::flow_present(v))
}

fn mode(v: Option<&Value>) -> FieldValue {
    decode::heat_mode(v).map_or(FieldValue::Absent, FieldValue::Mode)
}

// Derived decoders receive the whole sub-device node.

fn node_mode(node: Option<&Value>) -> Option<&Value> {
    resolve(node?, &FieldPath::from_keys(["config", "mode"]))
}

fn node_state(node: Option<&Value>) -> Option<&Value> {
    resolve(node?, &FieldPath::from_keys(["status", "stateFlags"]))
}

fn node_ctrl(node: Option<&Value>) -> Option<&Value> {
    resolve(node?, &FieldPath::from_keys(["status", "ctrlFlags"]))
}

fn heat_pump_active(node: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::heating_active(node_mode(node), node_state(node)))
}

fn heat_pump_fan(node: Option<&Value>) -> FieldValue {
    // The fan reading is only meaningful while heating.
    let heating = decode::heating_mode_active(node_mode(node), HeatMode::Heat);
    let fan = decode::fan_running(node_state(node));
    FieldValue::from_bool(heating.zip(fan).map(|(h, f)| h && f))
}

fn heat_pump_compressor(node: Option<&Value>) -> FieldValue {
    FieldValue::from_bool(decode::compressor_running(
        node_mode(node),
        node_state(node),
        node_ctrl(node),
    ))
}

fn heat_pump_action(node: Option<&Value>) -> FieldValue {
    decode::run_action(node_mode(node), node_state(node), node_ctrl(node))
        .map_or(FieldValue::Absent, FieldValue::Action)
}

// ── Table ────────────────────────────────────────────────────────────

const CHLOR: Scope = Scope::Device(DeviceKind::ChlorSync);
const HEAT_PUMP: Scope = Scope::Device(DeviceKind::HeatPump);

macro_rules! field {
    ($key:expr, $name:expr, $scope:expr, [$($seg:expr),*], $decode:expr) => {
        field!($key, $name, $scope, [$($seg),*], $decode, None, None)
    };
    ($key:expr, $name:expr, $scope:expr, [$($seg:expr),*], $decode:expr, $unit:expr) => {
        field!($key, $name, $scope, [$($seg),*], $decode, Some($unit), None)
    };
    ($key:expr, $name:expr, $scope:expr, [$($seg:expr),*], $decode:expr, $unit:expr, $writable:expr) => {
        FieldSpec {
            key: $key,
            name: $name,
            scope: $scope,
            path: &[$($seg),*],
            decode: $decode,
            unit: $unit,
            writable: $writable,
        }
    };
}

const CHLOR_OUTPUT: FieldSpec = field!("chlor_output", "Chlorinator Output", CHLOR,
    ["config", "chlorOutput"], number, Some(Unit::Percent), Some(WritableField::ChlorOutput));
const HP_MODE: FieldSpec = field!("hp_mode", "Heat Pump Mode", HEAT_PUMP,
    ["config", "mode"], mode, None, Some(WritableField::Mode));
const HP_SETPOINT: FieldSpec = field!("hp_setpoint", "Setpoint", HEAT_PUMP,
    ["config", "setpoint"], number, Some(Unit::Temperature), Some(WritableField::Setpoint));

static FIELDS: &[FieldSpec] = &[
    // Hub
    field!("board_temp", "Board Temperature", Scope::Hub, ["status", "boardTemp"], number, Unit::Temperature),
    field!("wifi_rssi", "Wi-Fi Signal Strength", Scope::Hub, ["status", "rssi"], number, Unit::DecibelMilliwatt),
    field!("system_datetime", "System Date/Time", Scope::Hub, ["status", "dateTime"], datetime),
    field!("firmware_version", "System Firmware Version", Scope::Hub, ["system", "fwVersion"], text),
    field!("hardware_version", "System Hardware Version", Scope::Hub, ["system", "hwVersion"], text),
    field!("uptime_seconds", "System Uptime", Scope::Hub, ["stats", "upTimeSecs"], number, Unit::Seconds),
    field!("online", "PoolSync Online", Scope::Hub, ["status", "online"], online),
    field!("service_mode", "Service Mode", Scope::Hub, ["config", "serviceMode"], service_mode),
    field!("system_fault", "System Fault", Scope::Hub, ["faults"], hub_fault),
    // Chlorinator
    field!("chlor_water_temp", "Water Temperature", CHLOR, ["status", "waterTemp"], number, Unit::Temperature),
    field!("salt_ppm", "Salt Level", CHLOR, ["status", "saltPPM"], number, Unit::PartsPerMillion),
    field!("flow_rate", "Chlor Flow Rate", CHLOR, ["status", "flowRate"], number),
    CHLOR_OUTPUT,
    field!("boost_remaining", "Boost Time Remaining", CHLOR, ["status", "boostRemaining"], number),
    field!("cell_fwd_current", "Cell Forward Current", CHLOR, ["status", "fwdCurrent"], number, Unit::MilliAmpere),
    field!("cell_rev_current", "Cell Reverse Current", CHLOR, ["status", "revCurrent"], number, Unit::MilliAmpere),
    field!("cell_output_voltage", "Cell Output Voltage", CHLOR, ["status", "outVoltage"], number, Unit::MilliVolt),
    field!("cell_serial_number", "Cell Serial Number", CHLOR, ["system", "cellSerialNum"], text),
    field!("cell_firmware_version", "Cell Firmware Version", CHLOR, ["system", "cellFwVersion"], text),
    field!("cell_hardware_version", "Cell Hardware Version", CHLOR, ["system", "cellHwVersion"], text),
    field!("chlor_online", "ChlorSync Online", CHLOR, ["nodeAttr", "online"], online),
    field!("chlor_fault", "ChlorSync Fault", CHLOR, ["faults"], faults),
    // Heat pump
    field!("hp_water_temp", "Heat Pump Water Temperature", HEAT_PUMP, ["status", "waterTemp"], number, Unit::Temperature),
    field!("hp_air_temp", "Air Temperature", HEAT_PUMP, ["status", "airTemp"], number, Unit::Temperature),
    HP_MODE,
    HP_SETPOINT,
    field!("hp_compressor_rpm", "Compressor RPM", HEAT_PUMP, ["status", "compRPM"], number, Unit::Rpm),
    field!("hp_online", "Heat Pump Online", HEAT_PUMP, ["nodeAttr", "online"], online),
    field!("hp_fault", "Heat Pump Fault", HEAT_PUMP, ["faults"], faults),
    field!("hp_flow", "Heat Pump Flow", HEAT_PUMP, ["status", "ctrlFlags"], flow),
    field!("hp_active", "Heat Pump Active", HEAT_PUMP, [], heat_pump_active),
    field!("hp_fan", "Heat Pump Fan", HEAT_PUMP, [], heat_pump_fan),
    field!("hp_compressor", "Heat Pump Compressor", HEAT_PUMP, [], heat_pump_compressor),
    field!("hp_action", "Heat Pump Action", HEAT_PUMP, [], heat_pump_action),
];
