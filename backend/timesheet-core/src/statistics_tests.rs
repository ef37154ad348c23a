// src/statistics_tests.rs

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::statistics::{
        aggregate, build_report, EmployeeTimesheet, Scope, Selection, DEFAULT_JOB_TYPE,
    };
    use crate::store::CustomerTable;
    use crate::test_support::{setup, teardown, work_entry};

    fn customers(pairs: &[(&str, &str)]) -> CustomerTable {
        pairs
            .iter()
            .map(|(name, category)| (name.to_string(), category.to_string()))
            .collect()
    }

    fn jane() -> EmployeeTimesheet {
        EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![work_entry(2025, 3, 5, "AM", "Onsite|Acme|PS|Design")],
        }
    }

    #[test]
    fn test_single_onsite_ps_entry() {
        let table = customers(&[("Acme", "FSI")]);
        let result = aggregate(
            &Scope::Employee("Jane_Doe".to_string()),
            2025,
            3,
            &table,
            &[jane()],
        )
        .unwrap();

        assert_eq!(result.onsite_percentage, 100.0);
        assert_eq!(result.office_percentage, 0.0);
        assert_eq!(result.ps_percentage, 100.0);
        assert_eq!(result.ma_percentage, 0.0);
        assert_eq!(result.timesheet_count, 1);
        assert_eq!(result.customer_data["FSI"]["PS"], 0.5);
        assert_eq!(result.monthly_projects.len(), 1);
        assert_eq!(result.monthly_projects[0].frequency, 0.5);
        assert_eq!(result.monthly_projects[0].percentage, 100.0);
        assert_eq!(result.monthly_projects[0].customer.as_deref(), Some("Acme"));
        assert_eq!(result.monthly_projects[0].name.as_deref(), Some("Design"));
    }

    #[test]
    fn test_missing_employee_is_not_found() {
        let result = aggregate(
            &Scope::Employee("Nobody".to_string()),
            2025,
            3,
            &CustomerTable::new(),
            &[jane()],
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_empty_month_reports_zeroes() {
        let result = aggregate(&Scope::AllEmployees, 2025, 4, &CustomerTable::new(), &[jane()]).unwrap();

        assert_eq!(result.timesheet_count, 0);
        assert_eq!(result.onsite_percentage, 0.0);
        assert_eq!(result.office_percentage, 0.0);
        assert_eq!(result.ps_percentage, 0.0);
        assert_eq!(result.presales_percentage, 0.0);
        assert!(result.monthly_projects.is_empty());
        assert!(result.off.is_none());
        // Every category is still listed
        assert_eq!(result.customer_data.len(), 6);
        assert_eq!(result.customer_data["TBC"].len(), 1);
        assert_eq!(result.customer_data["GOV"]["Pre-Sales"], 0.0);
    }

    #[test]
    fn test_uncategorized_customer_counts_only_in_totals() {
        let collection = EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![
                work_entry(2025, 3, 5, "AM", "Onsite|Mystery Corp|PS|Design"),
                work_entry(2025, 3, 5, "PM", "Office|Acme|MA|Support"),
            ],
        };
        let table = customers(&[("Acme", "GOV")]);

        let result = aggregate(&Scope::AllEmployees, 2025, 3, &table, &[collection]).unwrap();

        assert_eq!(result.onsite_percentage, 50.0);
        assert_eq!(result.office_percentage, 50.0);
        assert_eq!(result.ps_percentage, 50.0);
        assert_eq!(result.ma_percentage, 50.0);
        let categorized: f64 = result
            .customer_data
            .values()
            .flat_map(|cells| cells.values())
            .sum();
        assert_eq!(categorized, 0.5);
        assert_eq!(result.customer_data["GOV"]["MA"], 0.5);
    }

    #[test]
    fn test_customer_data_keeps_category_order() {
        let result = aggregate(&Scope::AllEmployees, 2025, 3, &CustomerTable::new(), &[]).unwrap();

        assert_eq!(
            result.customer_data.labels(),
            vec!["THU", "FSI", "EDU/NGO", "GOV", "Others", "TBC"]
        );
        assert_eq!(result.customer_data["THU"].labels(), vec!["PS", "Pre-Sales", "MA"]);
        assert_eq!(result.customer_data["TBC"].labels(), vec!["MA"]);

        // The order must survive serialization
        let json = serde_json::to_string(&result.customer_data).unwrap();
        let positions: Vec<usize> = ["\"THU\"", "\"FSI\"", "\"EDU/NGO\"", "\"GOV\"", "\"Others\"", "\"TBC\""]
            .iter()
            .map(|label| json.find(label).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(json.starts_with(r#"{"THU":{"PS":0.0,"Pre-Sales":0.0,"MA":0.0}"#));
    }

    #[test]
    fn test_tbc_customers_only_track_ma() {
        let collection = EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![
                work_entry(2025, 3, 5, "AM", "Onsite|Prospect|PS|Workshop"),
                work_entry(2025, 3, 5, "PM", "Onsite|Prospect|MA|Support"),
            ],
        };
        let table = customers(&[("Prospect", "TBC")]);

        let result = aggregate(&Scope::AllEmployees, 2025, 3, &table, &[collection]).unwrap();

        assert_eq!(result.customer_data["TBC"]["MA"], 0.5);
        assert!(!result.customer_data["TBC"].contains_key("PS"));
    }

    #[test]
    fn test_unknown_category_label_is_ignored() {
        let table = customers(&[("Acme", "Retail")]);
        let result = aggregate(&Scope::AllEmployees, 2025, 3, &table, &[jane()]).unwrap();

        assert_eq!(result.ps_percentage, 100.0);
        assert!(result
            .customer_data
            .values()
            .all(|cells| cells.values().all(|count| *count == 0.0)));
    }

    #[test]
    fn test_off_tallies_only_for_single_employee() {
        let collection = EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![
                work_entry(2025, 3, 3, "AM", "AL"),
                work_entry(2025, 3, 3, "PM", "AL"),
                work_entry(2025, 3, 4, "AM", "/"),
                work_entry(2025, 3, 5, "AM", "Office|Acme|Internal|Admin"),
            ],
        };
        let collections = vec![collection];

        let single = aggregate(
            &Scope::Employee("Jane_Doe".to_string()),
            2025,
            3,
            &CustomerTable::new(),
            &collections,
        )
        .unwrap();
        let off = single.off.expect("Single employee reports off days");
        assert_eq!(off["AL"], 1.0);
        assert_eq!(off["Public Holiday"], 0.5);
        assert_eq!(off["SL"], 0.0);
        assert_eq!(off["CL"], 0.0);
        // Off slots are not work
        assert_eq!(single.internal_percentage, 100.0);
        assert_eq!(single.monthly_projects.len(), 1);

        let team = aggregate(&Scope::AllEmployees, 2025, 3, &CustomerTable::new(), &collections).unwrap();
        assert!(team.off.is_none());
        assert_eq!(team.timesheet_count, 1);
    }

    #[test]
    fn test_projects_sorted_by_frequency_with_stable_ties() {
        let collection = EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![
                work_entry(2025, 3, 3, "AM", "Onsite|Beta|PS|Rollout"),
                work_entry(2025, 3, 3, "PM", "Onsite|Alpha|PS|Audit"),
                work_entry(2025, 3, 4, "AM", "Onsite|Gamma|MA|Support|SO-7"),
                work_entry(2025, 3, 4, "PM", "Onsite|Gamma|MA|Support|SO-7"),
            ],
        };

        let result = aggregate(&Scope::AllEmployees, 2025, 3, &CustomerTable::new(), &[collection]).unwrap();

        let order: Vec<_> = result
            .monthly_projects
            .iter()
            .map(|p| p.customer.clone().unwrap_or_default())
            .collect();
        assert_eq!(order, vec!["Gamma", "Beta", "Alpha"]);
        assert_eq!(result.monthly_projects[0].so.as_deref(), Some("SO-7"));
        assert_eq!(result.monthly_projects[0].frequency, 1.0);
        assert_eq!(result.monthly_projects[0].percentage, 50.0);
        assert_eq!(result.monthly_projects[1].percentage, 25.0);
    }

    #[test]
    fn test_team_scope_counts_each_submitting_collection() {
        let john = EmployeeTimesheet {
            key: "John_Smith".to_string(),
            entries: vec![work_entry(2025, 3, 6, "AM", "Office|Acme|Pre-Sales|Demo")],
        };
        let idle = EmployeeTimesheet {
            key: "Idle_Person".to_string(),
            entries: vec![work_entry(2025, 2, 6, "AM", "Office|Acme|PS|Demo")],
        };
        let table = customers(&[("Acme", "THU")]);

        let result = aggregate(&Scope::AllEmployees, 2025, 3, &table, &[jane(), john, idle]).unwrap();

        assert_eq!(result.timesheet_count, 2);
        assert_eq!(result.onsite_percentage, 50.0);
        assert_eq!(result.presales_percentage, 50.0);
        assert_eq!(result.customer_data["THU"]["Pre-Sales"], 0.5);
        assert_eq!(result.customer_data["THU"]["PS"], 0.5);
    }

    #[test]
    fn test_percentages_stay_within_bounds() {
        let collection = EmployeeTimesheet {
            key: "Jane_Doe".to_string(),
            entries: vec![
                work_entry(2025, 3, 3, "AM", "Onsite|Acme|PS|Design"),
                work_entry(2025, 3, 3, "PM", "Office|Acme|MA|Support"),
                work_entry(2025, 3, 4, "AM", "Remote|Acme|Unknown|Design"),
            ],
        };

        let result = aggregate(&Scope::AllEmployees, 2025, 3, &CustomerTable::new(), &[collection]).unwrap();

        for value in [
            result.onsite_percentage,
            result.office_percentage,
            result.ps_percentage,
            result.ma_percentage,
            result.internal_percentage,
            result.presales_percentage,
        ] {
            assert!((0.0..=100.0).contains(&value), "{} out of range", value);
        }
        for project in &result.monthly_projects {
            assert!((0.0..=100.0).contains(&project.percentage));
        }
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("SSS_Team", "SSS_Team"), Scope::AllEmployees);
        assert_eq!(
            Scope::parse("Jane Doe", "SSS_Team"),
            Scope::Employee("Jane_Doe".to_string())
        );
        assert_eq!(
            Scope::parse("Jane_Doe.json", "SSS_Team"),
            Scope::Employee("Jane_Doe".to_string())
        );
    }

    // --- Store-backed report ---

    #[test]
    fn test_build_report_from_store() {
        let test_name = "build_report_from_store";
        let store = setup(test_name);
        store
            .save_timesheet("Jane_Doe", &jane().entries)
            .unwrap();
        store
            .save_customers(&customers(&[("Acme", "FSI")]))
            .unwrap();

        let report = build_report(
            &store,
            "SSS_Team",
            Selection {
                year: 2025,
                month: 3,
                job_type: DEFAULT_JOB_TYPE.to_string(),
                timesheet_file: "Jane Doe".to_string(),
            },
        )
        .unwrap();

        assert_eq!(report.status, "success");
        assert_eq!(report.timesheet_files, vec!["Jane Doe"]);
        assert_eq!(report.selected_file, "Jane Doe");
        assert_eq!(report.years.first(), Some(&2024));
        assert_eq!(report.years.last(), Some(&2047));
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.aggregate.onsite_percentage, 100.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["onsite_percentage"], 100.0);
        assert_eq!(json["selected_job_type"], "PS");
        assert_eq!(json["customer_data"]["FSI"]["PS"], 0.5);

        teardown(test_name);
    }

    #[test]
    fn test_build_report_missing_employee() {
        let test_name = "build_report_missing_employee";
        let store = setup(test_name);

        let result = build_report(
            &store,
            "SSS_Team",
            Selection {
                year: 2025,
                month: 3,
                job_type: DEFAULT_JOB_TYPE.to_string(),
                timesheet_file: "Ghost".to_string(),
            },
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));

        for name in ["../users", "Jane/Doe"] {
            let result = build_report(
                &store,
                "SSS_Team",
                Selection {
                    year: 2025,
                    month: 3,
                    job_type: DEFAULT_JOB_TYPE.to_string(),
                    timesheet_file: name.to_string(),
                },
            );
            assert!(
                matches!(result, Err(AppError::NotFound(_))),
                "{:?} should be reported as not found",
                name
            );
        }

        let team = build_report(
            &store,
            "SSS_Team",
            Selection {
                year: 2025,
                month: 3,
                job_type: DEFAULT_JOB_TYPE.to_string(),
                timesheet_file: "SSS_Team".to_string(),
            },
        )
        .unwrap();
        assert_eq!(team.aggregate.timesheet_count, 0);
        assert!(serde_json::to_value(&team).unwrap()["off"].is_null());

        teardown(test_name);
    }
}
