use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Legacy Flags ==============

/// Booleans stored as `"True"` / `"False"` strings in the data file.
///
/// Reading also accepts JSON booleans and any casing of the strings.
pub mod flag {
    use serde::{de, de::IgnoredAny, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *v { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Bool(b) => Ok(b),
            Raw::Str(s) => {
                parse(&s).ok_or_else(|| de::Error::custom(format!("invalid flag: {s:?}")))
            }
            Raw::Other(_) => Err(de::Error::custom("invalid flag: expected string or bool")),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Str(String),
        Other(IgnoredAny),
    }

    fn parse(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Same encoding, but an unreadable value reads as `false` instead of
    /// failing the whole document.
    pub mod lenient {
        use serde::{Deserialize, Deserializer};

        use super::{parse, Raw};

        pub use super::serialize;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
            let v = match Raw::deserialize(d)? {
                Raw::Bool(b) => Some(b),
                Raw::Str(s) => parse(&s),
                Raw::Other(_) => None,
            };
            Ok(v.unwrap_or_else(|| {
                tracing::warn!("unrecognised flag value in data file, reading it as False");
                false
            }))
        }
    }
}

// ============== Audit Logging ==============

/// One access decision or registry mutation.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub actor_id: String,
    pub location_id: String,
    pub group_id: String,
    pub command: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, identity: &crate::domain::Identity, command: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            actor_id: identity.actor_id.to_string(),
            location_id: identity.location_id.to_string(),
            group_id: identity.group_id.to_string(),
            command: command.to_string(),
            gate: None,
            decision: None,
            outcome: None,
        }
    }

    pub fn access(
        identity: &crate::domain::Identity,
        command: &str,
        gate: &str,
        decision: &str,
    ) -> Self {
        Self {
            gate: Some(gate.to_string()),
            decision: Some(decision.to_string()),
            ..Self::base("access", identity, command)
        }
    }

    pub fn command(identity: &crate::domain::Identity, command: &str, outcome: &str) -> Self {
        Self {
            outcome: Some(outcome.to_string()),
            ..Self::base("command", identity, command)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, event: &AuditEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text: one `key=value` pair per field on a single line.
        let value = serde_json::to_value(event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        let line = obj
            .iter()
            .map(|(k, v)| format!("{k}={}", v.as_str().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(file, "{line}")?;
        Ok(())
    }
}
