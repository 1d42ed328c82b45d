use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::booking::{Booking, WorkflowStatus};
use super::macros::string_enum;
use super::timesheet::TimesheetStatus;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum DocumentType {
        Invoice => "invoice",
        Payroll => "payroll",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum DocumentStatus {
        Draft => "draft",
        Finalized => "finalized",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinanceDocument {
    pub id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub wage_total: BigDecimal,
    pub price_total: BigDecimal,
    pub margin_total: BigDecimal,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub finalized_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinanceDocumentLine {
    pub id: i64,
    pub finance_document_id: i64,
    pub booking_id: i64,
    pub company_id: Option<i64>,
    pub employee_user_id: Option<i64>,
    pub description: String,
    pub hours_worked: BigDecimal,
    pub wage_total: BigDecimal,
    pub price_total: BigDecimal,
    pub margin_total: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocumentLine {
    pub booking_id: i64,
    pub company_id: Option<i64>,
    pub employee_user_id: Option<i64>,
    pub description: String,
    pub hours_worked: BigDecimal,
    pub wage_total: BigDecimal,
    pub price_total: BigDecimal,
    pub margin_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub document_type: DocumentType,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithLines {
    pub document: FinanceDocument,
    pub lines: Vec<FinanceDocumentLine>,
}

/// Result of a draft request: the document (if anything was eligible) and
/// which of the requested bookings made it in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOutcome {
    pub document: DocumentWithLines,
    pub included: Vec<i64>,
    pub skipped: Vec<i64>,
}

/// Financial view of one assigned employee on a booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupLine {
    pub assignment_id: i64,
    pub employee_user_id: i64,
    pub employee_name: Option<String>,
    pub employee_email: Option<String>,
    pub hours_worked: BigDecimal,
    pub worker_rate: Option<BigDecimal>,
    pub customer_rate: Option<BigDecimal>,
    pub wage_total: BigDecimal,
    pub price_total: BigDecimal,
    pub margin_total: BigDecimal,
    pub timesheet_status: Option<TimesheetStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRollup {
    pub booking: Booking,
    pub company_name: Option<String>,
    pub workflow_status: WorkflowStatus,
    pub lines: Vec<RollupLine>,
    pub hours_total: BigDecimal,
    pub wage_total: BigDecimal,
    pub price_total: BigDecimal,
    pub margin_total: BigDecimal,
    pub has_blocking_timesheet: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceOverviewRow {
    #[serde(flatten)]
    pub rollup: BookingRollup,
    pub can_mark_invoiced: bool,
    pub can_unmark_invoiced: bool,
    pub can_mark_paid: bool,
    pub can_unmark_paid: bool,
    pub pay_block_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinanceStage {
    #[default]
    All,
    Invoicing,
    Payroll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinanceFilter {
    pub stage: Option<FinanceStage>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl FinanceFilter {
    /// Fill in the stage when the caller did not pick one.
    pub fn or_stage(mut self, stage: FinanceStage) -> Self {
        self.stage.get_or_insert(stage);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingIdsInput {
    #[serde(default)]
    pub booking_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub updated: usize,
    pub skipped: usize,
}
