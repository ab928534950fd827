// SPDX-License-Identifier: GPL-3.0-only
//! Persisted per-display, per-command register state
//!
//! Every record is keyed by a `(DisplayId, Command)` pair. Records are kept
//! in memory by the worker that owns the display and written to a JSON file
//! when the application shuts down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::APPID;
use crate::error::Result;
use crate::monitor::DisplayId;

/// Hard ceiling for register values exposed to the OSD
pub const DEFAULT_MAX_CEILING: u16 = 100;

const VALUES_FILE: &str = "values.json";

/// How hard to try when reading a register back from the display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollingMode {
    None,
    Minimal,
    #[default]
    Normal,
    Heavy,
    Custom,
}

impl PollingMode {
    /// Read tries for this mode; `custom_count` only applies to `Custom`
    pub fn tries(self, custom_count: u16) -> u16 {
        match self {
            PollingMode::None => 0,
            PollingMode::Minimal => 5,
            PollingMode::Normal => 10,
            PollingMode::Heavy => 100,
            PollingMode::Custom => custom_count,
        }
    }
}

impl FromStr for PollingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(PollingMode::None),
            "minimal" => Ok(PollingMode::Minimal),
            "normal" => Ok(PollingMode::Normal),
            "heavy" => Ok(PollingMode::Heavy),
            "custom" => Ok(PollingMode::Custom),
            other => Err(format!("unknown polling mode '{other}'")),
        }
    }
}

/// State of one register of one display
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct CommandRecord {
    pub current: u16,
    pub max: u16,
    /// Value to come back to after contrast was lowered with brightness
    pub restore: u16,
    pub polling_mode: PollingMode,
    pub polling_count: u16,
}

impl Default for CommandRecord {
    fn default() -> Self {
        Self {
            current: 0,
            max: DEFAULT_MAX_CEILING,
            restore: 0,
            polling_mode: PollingMode::default(),
            polling_count: 0,
        }
    }
}

/// Key-value access to register state, last write wins
pub trait ValueStore {
    fn record(&self, display: &DisplayId, command: Command) -> CommandRecord;

    fn put(&mut self, display: &DisplayId, command: Command, record: CommandRecord);

    fn get(&self, display: &DisplayId, command: Command) -> u16 {
        self.record(display, command).current
    }

    /// Store the current value, kept within `[0, max]`
    fn set(&mut self, display: &DisplayId, command: Command, value: u16) {
        let mut record = self.record(display, command);
        record.current = value.min(record.max);
        self.put(display, command, record);
    }

    fn get_max(&self, display: &DisplayId, command: Command) -> u16 {
        self.record(display, command).max
    }

    /// Store the maximum; the current value is pulled down with it
    fn set_max(&mut self, display: &DisplayId, command: Command, max: u16) {
        let mut record = self.record(display, command);
        record.max = max;
        record.current = record.current.min(max);
        self.put(display, command, record);
    }

    fn get_restore(&self, display: &DisplayId, command: Command) -> u16 {
        self.record(display, command).restore
    }

    fn set_restore(&mut self, display: &DisplayId, command: Command, value: u16) {
        let mut record = self.record(display, command);
        record.restore = value;
        self.put(display, command, record);
    }

    fn get_polling_mode(&self, display: &DisplayId, command: Command) -> PollingMode {
        self.record(display, command).polling_mode
    }

    fn set_polling_mode(&mut self, display: &DisplayId, command: Command, mode: PollingMode) {
        let mut record = self.record(display, command);
        record.polling_mode = mode;
        self.put(display, command, record);
    }

    fn get_polling_count(&self, display: &DisplayId, command: Command) -> u16 {
        self.record(display, command).polling_count
    }

    fn set_polling_count(&mut self, display: &DisplayId, command: Command, count: u16) {
        let mut record = self.record(display, command);
        record.polling_count = count;
        self.put(display, command, record);
    }

    /// Read tries implied by the polling configuration
    fn polling_tries(&self, display: &DisplayId, command: Command) -> u16 {
        let record = self.record(display, command);
        record.polling_mode.tries(record.polling_count)
    }
}

/// One persisted record as it appears in the values file
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub display: DisplayId,
    pub command: Command,
    #[serde(flatten)]
    pub record: CommandRecord,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ValuesFile {
    entries: Vec<StoredEntry>,
}

/// In-memory value store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    records: HashMap<(DisplayId, Command), CommandRecord>,
}

impl ValueStore for MemoryStore {
    fn record(&self, display: &DisplayId, command: Command) -> CommandRecord {
        self.records
            .get(&(display.clone(), command))
            .cloned()
            .unwrap_or_default()
    }

    fn put(&mut self, display: &DisplayId, command: Command, record: CommandRecord) {
        self.records.insert((display.clone(), command), record);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records belonging to `display`, as a store of their own
    pub fn partition(&self, display: &DisplayId) -> MemoryStore {
        let records = self
            .records
            .iter()
            .filter(|((id, _), _)| id == display)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        MemoryStore { records }
    }

    /// Take over every record of `other`, replacing ours on conflict
    pub fn merge(&mut self, other: MemoryStore) {
        self.records.extend(other.records);
    }

    pub fn entries(&self) -> Vec<StoredEntry> {
        let mut entries: Vec<_> = self
            .records
            .iter()
            .map(|((display, command), record)| StoredEntry {
                display: display.clone(),
                command: *command,
                record: record.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.display, a.command).cmp(&(&b.display, b.command)));
        entries
    }

    /// Default location of the values file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APPID).join(VALUES_FILE))
    }

    /// Load a values file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no values file at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let file: ValuesFile = serde_json::from_str(&contents)?;
        let records = file
            .entries
            .into_iter()
            .map(|entry| ((entry.display, entry.command), entry.record))
            .collect();
        Ok(Self { records })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ValuesFile {
            entries: self.entries(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        debug!("saved {} value record(s) to {}", self.len(), path.display());
        Ok(())
    }
}
