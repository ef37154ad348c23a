// src/timesheet.rs
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// --- Timesheet Data Structures ---

/// Reason recorded for a half-day off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffReason {
    #[serde(rename = "AL")]
    AnnualLeave,
    #[serde(rename = "CL")]
    CompensationLeave,
    #[serde(rename = "SL")]
    SickLeave,
    #[serde(rename = "Public Holiday")]
    PublicHoliday,
}

impl OffReason {
    pub const ALL: [OffReason; 4] = [
        OffReason::AnnualLeave,
        OffReason::CompensationLeave,
        OffReason::SickLeave,
        OffReason::PublicHoliday,
    ];

    /// Maps a raw timesheet cell to an off reason. `/` marks a public holiday.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "/" => Some(OffReason::PublicHoliday),
            "AL" => Some(OffReason::AnnualLeave),
            "CL" => Some(OffReason::CompensationLeave),
            "SL" => Some(OffReason::SickLeave),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OffReason::AnnualLeave => "AL",
            OffReason::CompensationLeave => "CL",
            OffReason::SickLeave => "SL",
            OffReason::PublicHoliday => "Public Holiday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Onsite,
    Office,
}

impl Location {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Onsite" => Some(Location::Onsite),
            "Office" => Some(Location::Office),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobType {
    Ps,
    Ma,
    Internal,
    PreSales,
}

impl JobType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PS" => Some(JobType::Ps),
            "MA" => Some(JobType::Ma),
            "Internal" => Some(JobType::Internal),
            "Pre-Sales" => Some(JobType::PreSales),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobType::Ps => "PS",
            JobType::Ma => "MA",
            JobType::Internal => "Internal",
            JobType::PreSales => "Pre-Sales",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pipe-delimited work cell: `Location|Customer|Job_Type|Work_Detail[|SO]`.
///
/// Fields keep the legacy on-disk names so existing collections load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkDetail {
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    #[serde(rename = "Customer", default)]
    pub customer: Option<String>,
    #[serde(rename = "Job_Type", default)]
    pub job_type: Option<String>,
    #[serde(rename = "Work_Detail", default)]
    pub work_detail: Option<String>,
    #[serde(rename = "SO", default)]
    pub service_order: Option<String>,
}

impl WorkDetail {
    /// Splits a work cell on `|`. Missing leading fields stay `None`, a fifth
    /// field becomes the service order and anything after it is dropped.
    pub fn from_cell(cell: &str) -> Self {
        let mut fields = cell.split('|').map(str::to_string);
        Self {
            location: fields.next(),
            customer: fields.next(),
            job_type: fields.next(),
            work_detail: fields.next(),
            service_order: fields.next(),
        }
    }

    pub fn location_kind(&self) -> Option<Location> {
        self.location.as_deref().and_then(Location::parse)
    }

    pub fn job_type_kind(&self) -> Option<JobType> {
        self.job_type.as_deref().and_then(JobType::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntryDetail {
    Off {
        off: OffReason,
    },
    Work(WorkDetail),
}

#[derive(Deserialize)]
struct StoredDetail {
    off: Option<OffReason>,
    #[serde(flatten)]
    work: WorkDetail,
}

/// An entry with an `off` key is an off entry and its value must be a known reason.
impl<'de> Deserialize<'de> for EntryDetail {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredDetail::deserialize(deserializer)?;
        Ok(match stored.off {
            Some(off) => EntryDetail::Off { off },
            None => EntryDetail::Work(stored.work),
        })
    }
}

impl EntryDetail {
    /// Classifies a data cell: off markers first, everything else is work.
    pub fn from_marker(marker: &str) -> Self {
        match OffReason::from_marker(marker) {
            Some(off) => EntryDetail::Off { off },
            None => EntryDetail::Work(WorkDetail::from_cell(marker)),
        }
    }
}

/// Identity of a half-day slot inside one employee's collection.
///
/// Field order gives the collection's sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub time_slot: String,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {}",
            self.year, self.month, self.date, self.time_slot
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Date")]
    pub date: u32,
    #[serde(rename = "time_slots")]
    pub time_slot: String,
    #[serde(flatten)]
    pub detail: EntryDetail,
}

impl TimesheetEntry {
    pub fn key(&self) -> DedupKey {
        DedupKey {
            year: self.year,
            month: self.month,
            date: self.date,
            time_slot: self.time_slot.clone(),
        }
    }

    pub fn is_in_period(&self, year: i32, month: u32) -> bool {
        self.year == year && self.month == month
    }

    pub fn work(&self) -> Option<&WorkDetail> {
        match &self.detail {
            EntryDetail::Work(work) => Some(work),
            EntryDetail::Off { .. } => None,
        }
    }

    pub fn off_reason(&self) -> Option<OffReason> {
        match &self.detail {
            EntryDetail::Off { off } => Some(*off),
            EntryDetail::Work(_) => None,
        }
    }
}

/// Storage key for an employee: spaces become underscores.
pub fn employee_key(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Display name for a storage key, as listed to the front end.
pub fn display_name(key: &str) -> String {
    key.replace('_', " ")
}

/// Sorts ascending by `(year, month, date, time_slot)`.
pub fn sort_entries(entries: &mut [TimesheetEntry]) {
    entries.sort_by(|a, b| {
        (a.year, a.month, a.date, a.time_slot.as_str()).cmp(&(
            b.year,
            b.month,
            b.date,
            b.time_slot.as_str(),
        ))
    });
}
