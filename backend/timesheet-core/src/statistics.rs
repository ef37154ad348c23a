// src/statistics.rs
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Index;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::error::AppError;
use crate::store::{CustomerTable, JsonStore};
use crate::timesheet::{display_name, employee_key, JobType, Location, OffReason, TimesheetEntry};

/// Every entry is one half-day slot.
const HALF_DAY: Decimal = dec!(0.5);

pub const FIRST_SELECTABLE_YEAR: i32 = 2024;
pub const LAST_SELECTABLE_YEAR: i32 = 2047;
pub const DEFAULT_JOB_TYPE: &str = "PS";

// --- Selection ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllEmployees,
    Employee(String),
}

impl Scope {
    /// `team_scope` names the whole team; anything else is an employee, addressed
    /// either by display name or storage key.
    pub fn parse(raw: &str, team_scope: &str) -> Self {
        let raw = raw.trim();
        if raw == team_scope {
            Scope::AllEmployees
        } else {
            Scope::Employee(employee_key(raw.trim_end_matches(".json")))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CustomerCategory {
    Thu,
    Fsi,
    EduNgo,
    Gov,
    Others,
    Tbc,
}

impl CustomerCategory {
    pub const ALL: [CustomerCategory; 6] = [
        CustomerCategory::Thu,
        CustomerCategory::Fsi,
        CustomerCategory::EduNgo,
        CustomerCategory::Gov,
        CustomerCategory::Others,
        CustomerCategory::Tbc,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "THU" => Some(CustomerCategory::Thu),
            "FSI" => Some(CustomerCategory::Fsi),
            "EDU/NGO" => Some(CustomerCategory::EduNgo),
            "GOV" => Some(CustomerCategory::Gov),
            "Others" => Some(CustomerCategory::Others),
            "TBC" => Some(CustomerCategory::Tbc),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CustomerCategory::Thu => "THU",
            CustomerCategory::Fsi => "FSI",
            CustomerCategory::EduNgo => "EDU/NGO",
            CustomerCategory::Gov => "GOV",
            CustomerCategory::Others => "Others",
            CustomerCategory::Tbc => "TBC",
        }
    }

    /// Job types counted per category. Unconfirmed (TBC) customers only track MA.
    pub fn tracked_job_types(self) -> &'static [JobType] {
        match self {
            CustomerCategory::Tbc => &[JobType::Ma],
            _ => &[JobType::Ps, JobType::PreSales, JobType::Ma],
        }
    }
}

/// One employee's stored collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeTimesheet {
    pub key: String,
    pub entries: Vec<TimesheetEntry>,
}

// --- Report ---

/// Label-keyed figures that keep their insertion order when serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Labelled<V>(Vec<(&'static str, V)>);

impl<V> Labelled<V> {
    pub fn get(&self, label: &str) -> Option<&V> {
        self.0
            .iter()
            .find(|(key, _)| *key == label)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
impl<V> Labelled<V> {
    pub fn contains_key(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(|(key, _)| *key).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, value)| value)
    }
}

impl<V> FromIterator<(&'static str, V)> for Labelled<V> {
    fn from_iter<I: IntoIterator<Item = (&'static str, V)>>(iter: I) -> Self {
        Labelled(iter.into_iter().collect())
    }
}

impl<V> Index<&str> for Labelled<V> {
    type Output = V;

    fn index(&self, label: &str) -> &V {
        match self.get(label) {
            Some(value) => value,
            None => panic!("no figure labelled '{}'", label),
        }
    }
}

impl<V: Serialize> Serialize for Labelled<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStat {
    pub customer: Option<String>,
    pub name: Option<String>,
    pub so: Option<String>,
    pub frequency: f64,
    pub percentage: f64,
}

/// Figures for one (scope, year, month) selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub onsite_percentage: f64,
    pub office_percentage: f64,
    pub timesheet_count: usize,
    pub ps_percentage: f64,
    pub ma_percentage: f64,
    pub internal_percentage: f64,
    pub presales_percentage: f64,
    /// Categories in `CustomerCategory::ALL` order, job types in tracked order.
    pub customer_data: Labelled<Labelled<f64>>,
    pub monthly_projects: Vec<ProjectStat>,
    /// Only reported for a single employee.
    pub off: Option<Labelled<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub selected_year: i32,
    pub selected_month: u32,
    #[serde(flatten)]
    pub aggregate: Aggregate,
    pub selected_job_type: String,
    pub timesheet_files: Vec<String>,
    pub selected_file: String,
    pub status: &'static str,
}

impl StatisticsReport {
    pub fn new(
        year: i32,
        month: u32,
        aggregate: Aggregate,
        selected_job_type: String,
        timesheet_files: Vec<String>,
        selected_file: String,
    ) -> Self {
        Self {
            years: (FIRST_SELECTABLE_YEAR..=LAST_SELECTABLE_YEAR).collect(),
            months: (1..=12).collect(),
            selected_year: year,
            selected_month: month,
            aggregate,
            selected_job_type,
            timesheet_files,
            selected_file,
            status: "success",
        }
    }
}

// --- Aggregation ---

type ProjectKey = (Option<String>, Option<String>, Option<String>);

#[derive(Debug)]
struct Tally {
    onsite: Decimal,
    office: Decimal,
    jobs: HashMap<JobType, Decimal>,
    categories: BTreeMap<CustomerCategory, Vec<(JobType, Decimal)>>,
    off: HashMap<OffReason, Decimal>,
    projects: Vec<(ProjectKey, Decimal)>,
    project_index: HashMap<ProjectKey, usize>,
    working_days: Decimal,
    submitted: BTreeSet<String>,
}

impl Tally {
    fn new() -> Self {
        let categories = CustomerCategory::ALL
            .iter()
            .map(|category| {
                let cells = category
                    .tracked_job_types()
                    .iter()
                    .map(|job| (*job, Decimal::ZERO))
                    .collect();
                (*category, cells)
            })
            .collect();

        Self {
            onsite: Decimal::ZERO,
            office: Decimal::ZERO,
            jobs: HashMap::new(),
            categories,
            off: HashMap::new(),
            projects: Vec::new(),
            project_index: HashMap::new(),
            working_days: Decimal::ZERO,
            submitted: BTreeSet::new(),
        }
    }

    fn add(&mut self, owner: &str, entry: &TimesheetEntry, customers: &CustomerTable, with_off: bool) {
        self.submitted.insert(owner.to_string());

        if with_off {
            if let Some(reason) = entry.off_reason() {
                *self.off.entry(reason).or_insert(Decimal::ZERO) += HALF_DAY;
            }
        }

        let Some(work) = entry.work() else {
            return;
        };

        match work.location_kind() {
            Some(Location::Onsite) => self.onsite += HALF_DAY,
            Some(Location::Office) => self.office += HALF_DAY,
            None => {}
        }

        let job_type = work.job_type_kind();
        if let Some(job) = job_type {
            *self.jobs.entry(job).or_insert(Decimal::ZERO) += HALF_DAY;
        }

        // Unknown customers and unknown categories fall out of the category table.
        let category = work
            .customer
            .as_ref()
            .and_then(|customer| customers.get(customer))
            .and_then(|label| CustomerCategory::parse(label));
        if let (Some(category), Some(job)) = (category, job_type) {
            if let Some((_, cell)) = self
                .categories
                .get_mut(&category)
                .and_then(|cells| cells.iter_mut().find(|(tracked, _)| *tracked == job))
            {
                *cell += HALF_DAY;
            }
        }

        self.working_days += HALF_DAY;
        let key: ProjectKey = (
            work.customer.clone(),
            work.work_detail.clone(),
            work.service_order.clone(),
        );
        match self.project_index.get(&key) {
            Some(&index) => self.projects[index].1 += HALF_DAY,
            None => {
                self.project_index.insert(key.clone(), self.projects.len());
                self.projects.push((key, HALF_DAY));
            }
        }
    }

    fn job(&self, job: JobType) -> Decimal {
        self.jobs.get(&job).copied().unwrap_or(Decimal::ZERO)
    }

    fn finish(self, with_off: bool) -> Aggregate {
        let total_location = self.onsite + self.office;
        let total_jobs: Decimal = self.jobs.values().copied().sum();

        let customer_data = self
            .categories
            .iter()
            .map(|(category, cells)| {
                let cells = cells
                    .iter()
                    .map(|(job, count)| (job.label(), to_f64(*count)))
                    .collect();
                (category.label(), cells)
            })
            .collect();

        let mut monthly_projects: Vec<ProjectStat> = self
            .projects
            .iter()
            .map(|((customer, name, so), frequency)| ProjectStat {
                customer: customer.clone(),
                name: name.clone(),
                so: so.clone(),
                frequency: to_f64(*frequency),
                percentage: percentage(*frequency, self.working_days),
            })
            .collect();
        // Stable: equal frequencies keep first-seen order.
        monthly_projects.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));

        let off = with_off.then(|| {
            OffReason::ALL
                .iter()
                .map(|reason| {
                    let count = self.off.get(reason).copied().unwrap_or(Decimal::ZERO);
                    (reason.label(), to_f64(count))
                })
                .collect()
        });

        Aggregate {
            onsite_percentage: percentage(self.onsite, total_location),
            office_percentage: percentage(self.office, total_location),
            timesheet_count: self.submitted.len(),
            ps_percentage: percentage(self.job(JobType::Ps), total_jobs),
            ma_percentage: percentage(self.job(JobType::Ma), total_jobs),
            internal_percentage: percentage(self.job(JobType::Internal), total_jobs),
            presales_percentage: percentage(self.job(JobType::PreSales), total_jobs),
            customer_data,
            monthly_projects,
            off,
        }
    }
}

/// `count / total * 100`, or `0` when there is nothing to divide by.
pub fn percentage(count: Decimal, total: Decimal) -> f64 {
    if total <= Decimal::ZERO {
        return 0.0;
    }
    to_f64(count * dec!(100) / total)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Folds the in-scope collections into percentages for one month.
///
/// A single-employee scope must name a collection present in `collections`.
pub fn aggregate(
    scope: &Scope,
    year: i32,
    month: u32,
    customers: &CustomerTable,
    collections: &[EmployeeTimesheet],
) -> Result<Aggregate, AppError> {
    let (in_scope, with_off): (Vec<&EmployeeTimesheet>, bool) = match scope {
        Scope::AllEmployees => (collections.iter().collect(), false),
        Scope::Employee(key) => {
            let collection = collections
                .iter()
                .find(|collection| &collection.key == key)
                .ok_or_else(|| AppError::NotFound(format!("Timesheet '{}' not found.", key)))?;
            (vec![collection], true)
        }
    };

    let mut tally = Tally::new();
    for collection in in_scope {
        let mut matched = 0usize;
        for entry in collection.entries.iter().filter(|e| e.is_in_period(year, month)) {
            tally.add(&collection.key, entry, customers, with_off);
            matched += 1;
        }
        debug!(
            "Collection '{}' contributed {} entries for {}-{:02}",
            collection.key, matched, year, month
        );
    }

    info!(
        "Aggregated {:?} for {}-{:02}: {} timesheets submitted, {} working days",
        scope, year, month, tally.submitted.len(), tally.working_days
    );
    Ok(tally.finish(with_off))
}

// --- Store-backed Report ---

/// What the caller asked for, with defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub year: i32,
    pub month: u32,
    pub job_type: String,
    pub timesheet_file: String,
}

/// Loads the collections in scope and builds the full report.
pub fn build_report(
    store: &JsonStore,
    team_scope: &str,
    selection: Selection,
) -> Result<StatisticsReport, AppError> {
    let scope = Scope::parse(&selection.timesheet_file, team_scope);
    let keys = store.list_timesheets()?;

    let mut collections = Vec::new();
    match &scope {
        Scope::AllEmployees => {
            for key in &keys {
                if let Some(entries) = store.load_timesheet(key)? {
                    collections.push(EmployeeTimesheet {
                        key: key.clone(),
                        entries,
                    });
                }
            }
        }
        Scope::Employee(key) => match store.load_timesheet(key) {
            Ok(Some(entries)) => collections.push(EmployeeTimesheet {
                key: key.clone(),
                entries,
            }),
            // A name that cannot be a storage key has no collection either.
            Ok(None) | Err(AppError::InvalidFormat(_)) => {}
            Err(e) => return Err(e),
        },
    }

    let customers = store.load_customers()?;
    let aggregate = aggregate(&scope, selection.year, selection.month, &customers, &collections)?;

    Ok(StatisticsReport::new(
        selection.year,
        selection.month,
        aggregate,
        selection.job_type,
        keys.iter().map(|key| display_name(key)).collect(),
        selection.timesheet_file,
    ))
}
