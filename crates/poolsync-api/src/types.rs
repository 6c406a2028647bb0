// Wire-level types for the pairing surface and the long-lived credential.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::Error;

/// JSON key carrying the secret in a completed push-link status.
pub const PASSWORD_KEY: &str = "password";
/// JSON key carrying the device's hardware address.
pub const MAC_ADDRESS_KEY: &str = "macAddress";
/// JSON key carrying the seconds left in the push-link window.
pub const TIME_REMAINING_KEY: &str = "timeRemaining";

/// Long-lived secret issued by the device at pairing time, plus the
/// stable identifier of the device that issued it.
#[derive(Clone)]
pub struct Credential {
    secret: SecretString,
    identifier: String,
}

impl Credential {
    pub fn new(secret: SecretString, identifier: impl Into<String>) -> Self {
        Self {
            secret,
            identifier: identifier.into(),
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Hardware address of the device (or a synthesized stand-in).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `true` when there is no usable secret.
    pub fn is_empty(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"[REDACTED]")
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// Parsed answer to a push-link status poll.
#[derive(Debug, Clone)]
pub enum PairingStatus {
    /// The button has not been pressed yet.
    Waiting {
        /// Seconds left as reported by the device, if it reported any.
        time_remaining: Option<i64>,
    },
    /// The button was pressed and the device handed out a secret.
    Linked {
        secret: SecretString,
        identifier: Option<String>,
    },
}

impl PairingStatus {
    /// Interpret a decoded status body.
    ///
    /// A non-empty string `password` wins; anything else is still waiting.
    /// `timeRemaining` may arrive as an integer, a float, or a numeric
    /// string depending on firmware.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let Some(obj) = value.as_object() else {
            return Err(Error::protocol(
                "push-link status is not a JSON object",
                None,
                Some(&value.to_string()),
            ));
        };

        match obj.get(PASSWORD_KEY) {
            Some(Value::String(secret)) if !secret.is_empty() => {
                let identifier = obj
                    .get(MAC_ADDRESS_KEY)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                return Ok(Self::Linked {
                    secret: SecretString::from(secret.clone()),
                    identifier,
                });
            }
            None | Some(Value::Null | Value::String(_)) => {}
            Some(other) => {
                return Err(Error::protocol(
                    format!("unexpected password type in push-link status: {}", json_type(other)),
                    None,
                    None,
                ));
            }
        }

        let time_remaining = obj.get(TIME_REMAINING_KEY).and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(f64_to_secs)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        });

        Ok(Self::Waiting { time_remaining })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn f64_to_secs(v: f64) -> i64 {
    v.trunc() as i64
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
