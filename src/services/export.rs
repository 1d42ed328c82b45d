use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::database::models::{FinanceDocument, FinanceDocumentLine, FinanceOverviewRow};
use crate::error::AppError;

const BOM: &[u8] = b"\xEF\xBB\xBF";
const CALCULATED: &str = "calculated";

/// `;`-separated CSV with a UTF-8 byte order mark, so spreadsheet tools pick
/// the right encoding.
fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(BOM.to_vec())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    writer
        .into_inner()
        .map_err(|e| AppError::InternalServerError(Some(format!("CSV export failed: {}", e.error()))))
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|v| v.to_rfc3339()).unwrap_or_default()
}

pub fn file_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.csv", prefix, now.format("%Y-%m-%d_%H%M%S"))
}

pub fn finance_bookings_csv(rows: &[FinanceOverviewRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = writer();
    writer.write_record([
        "Booking ID",
        "Title",
        "Company",
        "Start",
        "End",
        "Executed",
        "Invoiced",
        "Paid",
        "Wage total",
        "Price total",
        "Margin total",
    ])?;

    for row in rows {
        let rollup = &row.rollup;
        let booking = &rollup.booking;
        writer.write_record([
            booking.id.to_string(),
            booking.title.clone(),
            rollup.company_name.clone().unwrap_or_default(),
            booking.starts_at.to_rfc3339(),
            booking.ends_at.to_rfc3339(),
            timestamp(booking.executed_at),
            yes_no(booking.is_invoiced).to_string(),
            yes_no(booking.is_paid).to_string(),
            rollup.wage_total.to_string(),
            rollup.price_total.to_string(),
            rollup.margin_total.to_string(),
        ])?;
    }

    finish(writer)
}

pub fn finance_lines_csv(rows: &[FinanceOverviewRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = writer();
    writer.write_record([
        "Booking ID",
        "Title",
        "Company",
        "Employee",
        "Employee email",
        "Hours",
        "Wage total",
        "Price total",
        "Margin",
        "Timesheet status",
        "Invoiced",
        "Paid",
    ])?;

    for row in rows {
        let rollup = &row.rollup;
        let booking = &rollup.booking;
        for line in &rollup.lines {
            writer.write_record([
                booking.id.to_string(),
                booking.title.clone(),
                rollup.company_name.clone().unwrap_or_default(),
                line.employee_name.clone().unwrap_or_default(),
                line.employee_email.clone().unwrap_or_default(),
                line.hours_worked.to_string(),
                line.wage_total.to_string(),
                line.price_total.to_string(),
                line.margin_total.to_string(),
                line.timesheet_status
                    .map_or(CALCULATED.to_string(), |status| status.to_string()),
                yes_no(booking.is_invoiced).to_string(),
                yes_no(booking.is_paid).to_string(),
            ])?;
        }
    }

    finish(writer)
}

/// Bookings that could go on an invoice right now.
pub fn invoice_preview_csv(rows: &[FinanceOverviewRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = writer();
    writer.write_record([
        "Booking ID",
        "Title",
        "Company",
        "End",
        "Price total",
        "Wage total",
        "Margin",
    ])?;

    for row in rows.iter().filter(|row| row.can_mark_invoiced) {
        let rollup = &row.rollup;
        writer.write_record([
            rollup.booking.id.to_string(),
            rollup.booking.title.clone(),
            rollup.company_name.clone().unwrap_or_default(),
            rollup.booking.ends_at.to_rfc3339(),
            rollup.price_total.to_string(),
            rollup.wage_total.to_string(),
            rollup.margin_total.to_string(),
        ])?;
    }

    finish(writer)
}

/// Per-employee lines of bookings that could be paid right now.
pub fn payroll_preview_csv(rows: &[FinanceOverviewRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = writer();
    writer.write_record([
        "Booking ID",
        "Title",
        "Company",
        "Employee",
        "Email",
        "Hours",
        "Wage total",
        "Timesheet status",
    ])?;

    for row in rows.iter().filter(|row| row.can_mark_paid) {
        let rollup = &row.rollup;
        for line in &rollup.lines {
            writer.write_record([
                rollup.booking.id.to_string(),
                rollup.booking.title.clone(),
                rollup.company_name.clone().unwrap_or_default(),
                line.employee_name.clone().unwrap_or_default(),
                line.employee_email.clone().unwrap_or_default(),
                line.hours_worked.to_string(),
                line.wage_total.to_string(),
                line.timesheet_status
                    .map_or(CALCULATED.to_string(), |status| status.to_string()),
            ])?;
        }
    }

    finish(writer)
}

/// A stored document line by line. Names are looked up by id; unknown ids
/// leave the column empty.
pub fn document_csv(
    document: &FinanceDocument,
    lines: &[FinanceDocumentLine],
    company_names: &HashMap<i64, String>,
    employee_names: &HashMap<i64, String>,
) -> Result<Vec<u8>, AppError> {
    let mut writer = writer();
    writer.write_record([
        "Document ID",
        "Type",
        "Status",
        "Booking ID",
        "Description",
        "Company",
        "Employee",
        "Hours",
        "Wage total",
        "Price total",
        "Margin",
    ])?;

    for line in lines {
        let company = line
            .company_id
            .and_then(|id| company_names.get(&id))
            .cloned()
            .unwrap_or_default();
        let employee = line
            .employee_user_id
            .and_then(|id| employee_names.get(&id))
            .cloned()
            .unwrap_or_default();
        writer.write_record([
            document.id.to_string(),
            document.document_type.to_string(),
            document.status.to_string(),
            line.booking_id.to_string(),
            line.description.clone(),
            company,
            employee,
            line.hours_worked.to_string(),
            line.wage_total.to_string(),
            line.price_total.to_string(),
            line.margin_total.to_string(),
        ])?;
    }

    finish(writer)
}
