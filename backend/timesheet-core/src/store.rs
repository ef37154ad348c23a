// src/store.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{io_context, AppError};
use crate::timesheet::TimesheetEntry;

pub const TIMESHEET_DIR: &str = "timesheet_data";
pub const CUSTOMER_FILE: &str = "customer_data/customer_type.json";
pub const ROSTER_FILE: &str = "user_data/employee.json";
pub const USERS_FILE: &str = "users.json";

/// Customer name -> category label, as stored on disk.
pub type CustomerTable = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Staff Number")]
    pub staff_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    /// Argon2 PHC string.
    pub password: String,
}

pub type UserTable = BTreeMap<String, UserRecord>;

// --- Flat File Store ---

/// JSON documents under one data directory. Every write replaces a whole file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the directory layout and seeds empty reference files.
    pub fn bootstrap(&self) -> Result<(), AppError> {
        let timesheet_dir = self.timesheet_dir();
        fs::create_dir_all(&timesheet_dir).map_err(|e| {
            io_context(
                e,
                format!("Failed to create timesheet directory: {:?}", timesheet_dir),
            )
        })?;

        let customers = self.root.join(CUSTOMER_FILE);
        if !customers.exists() {
            write_json(&customers, &CustomerTable::new())?;
        }
        let roster = self.root.join(ROSTER_FILE);
        if !roster.exists() {
            write_json(&roster, &Vec::<RosterEntry>::new())?;
        }

        info!("Record store ready at {}", self.root.display());
        Ok(())
    }

    fn timesheet_dir(&self) -> PathBuf {
        self.root.join(TIMESHEET_DIR)
    }

    fn timesheet_path(&self, key: &str) -> Result<PathBuf, AppError> {
        validate_key(key)?;
        Ok(self.timesheet_dir().join(format!("{}.json", key)))
    }

    // --- Timesheets ---

    /// Storage keys of every persisted collection, sorted.
    pub fn list_timesheets(&self) -> Result<Vec<String>, AppError> {
        let dir = self.timesheet_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let read_dir = fs::read_dir(&dir)
            .map_err(|e| io_context(e, format!("Failed to list timesheets in {:?}", dir)))?;

        let mut keys = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| io_context(e, format!("Failed to read entry in {:?}", dir)))?;
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// `None` when the employee has no collection yet.
    pub fn load_timesheet(&self, key: &str) -> Result<Option<Vec<TimesheetEntry>>, AppError> {
        let path = self.timesheet_path(key)?;
        read_json_opt(&path)
    }

    pub fn save_timesheet(&self, key: &str, entries: &[TimesheetEntry]) -> Result<(), AppError> {
        let path = self.timesheet_path(key)?;
        write_json(&path, &entries)?;
        info!("Saved {} entries for '{}'", entries.len(), key);
        Ok(())
    }

    // --- Reference lists ---

    pub fn load_customers(&self) -> Result<CustomerTable, AppError> {
        Ok(read_json_opt(&self.root.join(CUSTOMER_FILE))?.unwrap_or_default())
    }

    pub fn save_customers(&self, customers: &CustomerTable) -> Result<(), AppError> {
        write_json(&self.root.join(CUSTOMER_FILE), customers)
    }

    pub fn load_roster(&self) -> Result<Vec<RosterEntry>, AppError> {
        Ok(read_json_opt(&self.root.join(ROSTER_FILE))?.unwrap_or_default())
    }

    pub fn save_roster(&self, roster: &[RosterEntry]) -> Result<(), AppError> {
        write_json(&self.root.join(ROSTER_FILE), &roster)
    }

    // --- Credentials ---

    pub fn load_users(&self) -> Result<UserTable, AppError> {
        Ok(read_json_opt(&self.root.join(USERS_FILE))?.unwrap_or_default())
    }

    pub fn save_users(&self, users: &UserTable) -> Result<(), AppError> {
        write_json(&self.root.join(USERS_FILE), users)
    }
}

/// Keys become file names, so anything that could leave the directory is refused.
fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.contains('\0')
    {
        return Err(AppError::InvalidFormat(format!(
            "Invalid timesheet name: '{}'",
            key
        )));
    }
    Ok(())
}

fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    if !path.exists() {
        debug!("{} not found", path.display());
        return Ok(None);
    }
    let json_string = fs::read_to_string(path)
        .map_err(|e| io_context(e, format!("Failed to read file: {:?}", path)))?;
    let data = serde_json::from_str(&json_string)?;
    Ok(Some(data))
}

/// Writes to a sibling temp file and renames it into place.
fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), AppError> {
    let json_string = serde_json::to_string_pretty(data)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            io_context(e, format!("Failed to create directory: {:?}", parent))
        })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, json_string.as_bytes())
        .map_err(|e| io_context(e, format!("Failed to write file: {:?}", tmp_path)))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| io_context(e, format!("Failed to replace file: {:?}", path)))?;
    Ok(())
}
