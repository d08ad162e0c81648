//! Global policy store: whitelist, blacklist, admins and the stream registry,
//! plus the persisted form they are loaded from and written back to.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    domain::Snowflake, errors::Error, security::Policy, streams::StreamRegistry, utils::flag,
    Result,
};

/// Everything the bot persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotData {
    /// Well-formedness marker; a store without it is treated as corrupt.
    #[serde(with = "flag", default)]
    pub configured: bool,
    #[serde(default)]
    pub streams: StreamRegistry,
    #[serde(flatten)]
    pub policy: Policy,
    #[serde(default)]
    pub admins: BTreeSet<Snowflake>,
}

impl Default for BotData {
    fn default() -> Self {
        Self {
            configured: true,
            streams: StreamRegistry::default(),
            policy: Policy::default(),
            admins: BTreeSet::new(),
        }
    }
}

impl BotData {
    /// Built-in defaults: empty lists, the given admins.
    pub fn with_admins(admins: impl IntoIterator<Item = Snowflake>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Load/store interface for persisted state.
pub trait DataStore: Send + Sync {
    fn load(&self) -> Result<BotData>;
    fn save(&self, data: &BotData) -> Result<()>;

    /// Move unreadable persisted state out of the way so a later `save` cannot
    /// overwrite it. Returns where it went, or `None` when there was nothing to move.
    fn set_aside(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// JSON file store, compatible with the `data.json` layout.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataStore for JsonFileStore {
    fn load(&self) -> Result<BotData> {
        let txt = fs::read_to_string(&self.path)?;
        let data: BotData = serde_json::from_str(&txt)?;
        if !data.configured {
            return Err(Error::ConfigCorrupt {
                path: self.path.clone(),
                reason: "\"configured\" marker is missing or not \"True\"".to_string(),
            });
        }
        Ok(data)
    }

    fn save(&self, data: &BotData) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        // Write next to the target, then rename over it.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let txt = serde_json::to_string_pretty(data)?;
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn set_aside(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut aside = self.path.clone().into_os_string();
        aside.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        let aside = PathBuf::from(aside);
        fs::rename(&self.path, &aside)?;
        Ok(Some(aside))
    }
}

/// Result of [`load_or_default`].
#[derive(Clone, Debug)]
pub struct Loaded {
    pub data: BotData,
    /// False when the primary store held unreadable state that could not be
    /// moved aside; saving would destroy it.
    pub writable: bool,
}

/// Load `primary`, falling back to `defaults` (if any), then to `builtin`.
///
/// Load failures never abort startup; they are logged and the next source is
/// tried. Anything unreadable in `primary` other than a missing file is set
/// aside first.
pub fn load_or_default(
    primary: &dyn DataStore,
    defaults: Option<&dyn DataStore>,
    builtin: BotData,
) -> Loaded {
    let writable = match primary.load() {
        Ok(data) => {
            return Loaded {
                data,
                writable: true,
            }
        }
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("no data file yet, using defaults");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "data file is unreadable, using defaults");
            match primary.set_aside() {
                Ok(Some(aside)) => {
                    tracing::warn!(moved_to = %aside.display(), "unreadable data file set aside");
                    true
                }
                Ok(None) => true,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "could not set unreadable data file aside, changes will not be saved"
                    );
                    false
                }
            }
        }
    };

    let data = defaults
        .and_then(|defaults| match defaults.load() {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(error = %e, "defaults file unusable, using built-in defaults");
                None
            }
        })
        .unwrap_or(builtin);

    Loaded { data, writable }
}
