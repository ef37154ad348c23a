// src/reference.rs
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::statistics::CustomerCategory;
use crate::store::{CustomerTable, JsonStore, RosterEntry};

/// Shown by the settings page until a customer is picked.
pub const CURRENT_CUSTOMER_PLACEHOLDER: &str = "Current Customer Name";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub current_customer: String,
    pub people_list: Vec<RosterEntry>,
    pub customer_types: CustomerTable,
}

pub fn settings(store: &JsonStore) -> Result<Settings, AppError> {
    Ok(Settings {
        current_customer: CURRENT_CUSTOMER_PLACEHOLDER.to_string(),
        people_list: store.load_roster()?,
        customer_types: store.load_customers()?,
    })
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required.", what)));
    }
    Ok(trimmed)
}

// --- Roster ---

/// The same name may appear with different staff numbers; only exact pairs are duplicates.
pub fn add_person(store: &JsonStore, name: &str, staff_number: &str) -> Result<(), AppError> {
    let name = required(name, "Name")?;
    let staff_number = staff_number.trim();

    let mut roster = store.load_roster()?;
    if roster
        .iter()
        .any(|person| person.name == name && person.staff_number == staff_number)
    {
        return Err(AppError::AlreadyExists("Person already exists!".to_string()));
    }

    roster.push(RosterEntry {
        name: name.to_string(),
        staff_number: staff_number.to_string(),
    });
    store.save_roster(&roster)?;
    info!("Added '{}' ({}) to the roster", name, staff_number);
    Ok(())
}

/// Drops every roster entry carrying `name`. Returns how many were removed.
pub fn remove_person(store: &JsonStore, name: &str) -> Result<usize, AppError> {
    let name = required(name, "Name")?;
    let mut roster = store.load_roster()?;
    let before = roster.len();
    roster.retain(|person| person.name != name);
    let removed = before - roster.len();

    store.save_roster(&roster)?;
    info!("Removed {} roster entries named '{}'", removed, name);
    Ok(removed)
}

// --- Customers ---

pub fn add_customer(store: &JsonStore, name: &str, category: &str) -> Result<(), AppError> {
    let name = required(name, "Customer name")?;
    let category = CustomerCategory::parse(category.trim()).ok_or_else(|| {
        let known: Vec<&str> = CustomerCategory::ALL.iter().map(|c| c.label()).collect();
        AppError::BadRequest(format!(
            "Unknown customer type '{}'. Expected one of: {}",
            category,
            known.join(", ")
        ))
    })?;

    let mut customers = store.load_customers()?;
    if customers.contains_key(name) {
        return Err(AppError::AlreadyExists("Customer already exists!".to_string()));
    }
    customers.insert(name.to_string(), category.label().to_string());
    store.save_customers(&customers)?;
    info!("Added customer '{}' as {}", name, category.label());
    Ok(())
}
