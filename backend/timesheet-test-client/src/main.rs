// src/main.rs

use clap::Parser;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "timesheet-test-client", about = "Exercises a running timesheet-core server")]
struct Args {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:5000")]
    base_url: String,

    /// Timesheet workbook (.xlsx) to upload
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long, default_value = "test-user")]
    user_id: String,

    #[arg(long, default_value = "test-password")]
    password: String,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    month: Option<u32>,

    /// Employee to report on; omit for the whole team
    #[arg(long)]
    employee: Option<String>,
}

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct StatisticsSummary {
    selected_year: i32,
    selected_month: u32,
    selected_file: String,
    timesheet_count: usize,
    onsite_percentage: f64,
    office_percentage: f64,
    ps_percentage: f64,
    ma_percentage: f64,
    internal_percentage: f64,
    presales_percentage: f64,
    timesheet_files: Vec<String>,
    off: Option<Value>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let base_url = args.base_url.trim_end_matches('/').to_string();
    let client = Client::builder().cookie_store(true).build()?;

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health_response);

    // Test 2: Protected endpoint without a session
    println!("\n🔍 Testing settings endpoint without a session...");
    let anonymous = client.get(format!("{}/api/settings", base_url)).send().await?;
    println!("Settings status (expected 401): {}", anonymous.status());

    // Test 3: Register (an existing user is fine) and log in
    println!("\n🔍 Registering and logging in as '{}'...", args.user_id);
    let register_response = client
        .post(format!("{}/api/register", base_url))
        .json(&json!({
            "name": args.user_id,
            "user_id": args.user_id,
            "password": args.password,
        }))
        .send()
        .await?;
    println!("Register status: {}", register_response.status());
    println!("Register body: {}", register_response.text().await?);

    let login_response = client
        .post(format!("{}/api/login", base_url))
        .json(&json!({ "user_id": args.user_id, "password": args.password }))
        .send()
        .await?;
    println!("Login status: {}", login_response.status());
    if !login_response.status().is_success() {
        println!("Login failed: {}", login_response.text().await?);
        return Ok(());
    }

    // Test 4: Upload a workbook
    if let Some(path) = &args.file {
        println!("\n🔍 Uploading {}...", path.display());
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "timesheet.xlsx".to_string());
        let form = multipart::Form::new().part("file", multipart::Part::bytes(data).file_name(file_name));

        let upload_response = client
            .post(format!("{}/api/upload", base_url))
            .multipart(form)
            .send()
            .await?;
        println!("Upload status: {}", upload_response.status());
        println!("Upload body: {}", upload_response.text().await?);
    } else {
        println!("\n⚠️ No --file given, skipping upload");
    }

    // Test 5: Statistics
    println!("\n🔍 Requesting statistics...");
    let mut body = json!({ "job_type": "PS" });
    if let Some(year) = args.year {
        body["year"] = json!(year);
    }
    if let Some(month) = args.month {
        body["month"] = json!(month);
    }
    if let Some(employee) = &args.employee {
        body["timesheet_file"] = json!(employee);
    }

    let stats_response = client
        .post(format!("{}/api/statistics", base_url))
        .json(&body)
        .send()
        .await?;
    println!("Statistics status: {}", stats_response.status());
    if stats_response.status().is_success() {
        let stats = stats_response.json::<StatisticsSummary>().await?;
        println!(
            "  {} {}-{:02}: {} timesheets from {:?}",
            stats.selected_file,
            stats.selected_year,
            stats.selected_month,
            stats.timesheet_count,
            stats.timesheet_files
        );
        println!(
            "  Onsite {:.1}% / Office {:.1}%",
            stats.onsite_percentage, stats.office_percentage
        );
        println!(
            "  PS {:.1}% / MA {:.1}% / Internal {:.1}% / Pre-Sales {:.1}%",
            stats.ps_percentage, stats.ma_percentage, stats.internal_percentage, stats.presales_percentage
        );
        if let Some(off) = stats.off {
            println!("  Off: {}", off);
        }
    } else {
        println!("Statistics failed: {}", stats_response.text().await?);
    }

    // Test 6: Dashboard
    println!("\n🔍 Testing dashboard endpoint...");
    let dashboard_response = client.get(format!("{}/api/dashboard", base_url)).send().await?;
    println!("Dashboard status: {}", dashboard_response.status());
    println!("Dashboard body: {}", dashboard_response.text().await?);

    // Test 7: Logout
    println!("\n🔍 Logging out...");
    let logout_response = client.post(format!("{}/api/logout", base_url)).send().await?;
    println!("Logout status: {}", logout_response.status());
    let after_logout = client.get(format!("{}/api/settings", base_url)).send().await?;
    println!("Settings after logout (expected 401): {}", after_logout.status());

    println!("\n✅ Testing complete!");

    Ok(())
}
