//! Terminal formatting for command results.

use arogya_core::models::{AccessLogEntry, ReportSummary, Subscription, UploadHistoryEntry};
use serde_json::Value;

/// Format a phone number for display as `+91 XXXXX XXXXX`
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("+91 {} {}", &digits[0..5], &digits[5..10]),
        12 if digits.starts_with("91") => format!("+91 {} {}", &digits[2..7], &digits[7..12]),
        _ => phone.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%d %b %Y").to_string()
    } else {
        date.chars().take(10).collect()
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn or_dash(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("-").to_string()
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

pub fn print_reports(reports: &[ReportSummary]) {
    if reports.is_empty() {
        println!("No reports yet.");
        return;
    }
    println!(
        "{:>5}  {:<30}  {:<12}  {:<24}  {:<11}  {:<8}  {}",
        "ID", "TITLE", "TYPE", "HOSPITAL", "UPLOADED", "ANALYZED", "OTP"
    );
    for report in reports {
        println!(
            "{:>5}  {:<30}  {:<12}  {:<24}  {:<11}  {:<8}  {}",
            report.id,
            truncate_string(&report.title, 30),
            truncate_string(&or_dash(&report.scan_type), 12),
            truncate_string(&or_dash(&report.hospital_name), 24),
            report.uploaded_date.as_deref().map(format_date).unwrap_or_default(),
            yes_no(report.is_analyzed),
            if report.requires_otp { "required" } else { "-" },
        );
    }
}

pub fn print_upload_history(entries: &[UploadHistoryEntry]) {
    if entries.is_empty() {
        println!("No uploads yet.");
        return;
    }
    println!(
        "{:>5}  {:<30}  {:<20}  {:<12}  {:<11}  {}",
        "ID", "TITLE", "PATIENT", "TYPE", "UPLOADED", "ANALYZED"
    );
    for entry in entries {
        println!(
            "{:>5}  {:<30}  {:<20}  {:<12}  {:<11}  {}",
            entry.id,
            truncate_string(&entry.title, 30),
            truncate_string(&or_dash(&entry.patient_name), 20),
            truncate_string(&or_dash(&entry.scan_type), 12),
            entry.uploaded_date.as_deref().map(format_date).unwrap_or_default(),
            yes_no(entry.is_analyzed),
        );
    }
}

pub fn print_access_logs(entries: &[AccessLogEntry]) {
    if entries.is_empty() {
        println!("No one has accessed your reports.");
        return;
    }
    println!(
        "{:<20}  {:<30}  {:<10}  {:<8}  {:<8}  {}",
        "WHO", "REPORT", "ACCESS", "OTP", "GRANTED", "WHEN"
    );
    for entry in entries {
        println!(
            "{:<20}  {:<30}  {:<10}  {:<8}  {:<8}  {}",
            truncate_string(&or_dash(&entry.username), 20),
            truncate_string(&or_dash(&entry.report_title), 30),
            or_dash(&entry.access_type),
            yes_no(entry.otp_verified),
            yes_no(entry.access_granted),
            entry.accessed_at.as_deref().map(format_date).unwrap_or_default(),
        );
    }
}

pub fn print_subscription(subscription: &Subscription) {
    println!("Plan:     {}", subscription.plan_display());
    if let Some(ref status) = subscription.status {
        println!("Status:   {}", status);
    }
    if let Some(ref end) = subscription.end_date {
        println!("Renews:   {}", format_date(end));
    }
    if let Some(count) = subscription.ai_analysis_count {
        println!("Analyses: {}", count);
    }
}
