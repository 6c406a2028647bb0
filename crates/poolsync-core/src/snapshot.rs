// ── Snapshot ──
//
// One full, immutable read of the device state. A new `Snapshot` is built
// per successful fetch and published behind an `Arc`; nothing mutates one
// after construction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumIter};

use crate::path::{FieldPath, resolve};

/// Top-level map from sub-device id to equipment type name.
pub const DEVICE_TYPE_SECTION: &str = "deviceType";
/// Factory default hub name, replaced with an identifier-based one.
pub const FACTORY_NAME: &str = "PoolSync®";
pub const MANUFACTURER: &str = "AutoPilot";
pub const DEFAULT_MODEL: &str = "PoolSync";

/// Kinds of equipment hanging off the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    HeatPump,
    ChlorSync,
}

impl DeviceKind {
    /// Type name in the `deviceType` map.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::HeatPump => "heatPump",
            Self::ChlorSync => "chlorSync",
        }
    }

    /// Sub-device id assumed when the snapshot has no `deviceType` map.
    pub fn default_id(self) -> &'static str {
        match self {
            Self::HeatPump => "0",
            Self::ChlorSync => "-1",
        }
    }
}

/// Static facts about the hub, derived from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware: Option<String>,
    pub hardware: Option<String>,
    pub configuration_url: String,
}

/// Immutable device state captured at `fetched_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    data: Value,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(data: Value) -> Self {
        Self::with_timestamp(data, Utc::now())
    }

    pub fn with_timestamp(data: Value, fetched_at: DateTime<Utc>) -> Self {
        Self { data, fetched_at }
    }

    /// The raw payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Resolve `path` against the payload.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        resolve(&self.data, path)
    }

    /// Sub-device id of `kind`.
    ///
    /// Without a `deviceType` map the fixed defaults apply. With one, the
    /// first id whose type name matches wins, and a missing kind is `None`.
    pub fn device_id_of(&self, kind: DeviceKind) -> Option<String> {
        let Some(types) = self
            .data
            .get(DEVICE_TYPE_SECTION)
            .and_then(Value::as_object)
        else {
            return Some(kind.default_id().to_owned());
        };

        let mut ids: Vec<&String> = types
            .iter()
            .filter(|(_, ty)| ty.as_str() == Some(kind.type_name()))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.first().map(|id| (*id).clone())
    }

    /// Path to the node of sub-device `id`.
    pub fn device_path(id: &str) -> FieldPath {
        FieldPath::from_keys([poolsync_api::client::DEVICES_SECTION, id])
    }

    /// Node of the sub-device of `kind`, if present.
    pub fn device_node(&self, kind: DeviceKind) -> Option<&Value> {
        let id = self.device_id_of(kind)?;
        self.get(&Self::device_path(&id))
    }

    /// Hub identity for display and diagnostics.
    pub fn device_info(&self, identifier: &str, address: &str) -> DeviceInfo {
        let text = |keys: &[&str]| {
            self.get(&FieldPath::from_keys(keys.iter().copied()))
                .and_then(value_text)
        };

        let name = text(&["poolSync", "config", "name"])
            .filter(|n| !n.trim().is_empty() && n != FACTORY_NAME)
            .unwrap_or_else(|| match identifier_suffix(identifier) {
                Some(suffix) => format!("{DEFAULT_MODEL} {suffix}"),
                None => DEFAULT_MODEL.to_owned(),
            });

        DeviceInfo {
            identifier: identifier.to_owned(),
            name,
            manufacturer: MANUFACTURER.to_owned(),
            model: text(&["devices", "0", "nodeAttr", "name"])
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            firmware: text(&["poolSync", "system", "fwVersion"]),
            hardware: text(&["poolSync", "system", "hwVersion"]),
            configuration_url: format!("http://{address}"),
        }
    }
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Last six characters of the identifier, if it has that many.
fn identifier_suffix(identifier: &str) -> Option<&str> {
    let skip = identifier.chars().count().checked_sub(6)?;
    identifier
        .char_indices()
        .nth(skip)
        .map(|(i, _)| &identifier[i..])
}
