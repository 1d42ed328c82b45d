use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::database::models::{BookingIdsInput, FinanceFilter, FinanceStage, RecordHoursInput};
use crate::error::AppError;
use crate::handlers::shared::{ApiResponse, csv_attachment};
use crate::services::accounting::PreviewKind;
use crate::services::{FinanceService, UserContext};

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Comma-separated booking ids; empty means the current overview.
    pub booking_ids: Option<String>,
}

fn parse_ids(raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid booking id '{}'", part)))
        })
        .collect()
}

pub async fn overview(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    query: web::Query<FinanceFilter>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let filter = query.into_inner().or_stage(FinanceStage::Invoicing);
    let rows = service.overview(&filter).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rows)))
}

pub async fn mark_invoiced(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.mark_invoiced(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn unmark_invoiced(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.unmark_invoiced(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn mark_paid(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.mark_paid(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn unmark_paid(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.unmark_paid(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn bulk_mark_invoiced(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    input: web::Json<BookingIdsInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let outcome = service.bulk_mark_invoiced(&input.booking_ids).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

pub async fn bulk_mark_paid(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    input: web::Json<BookingIdsInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let outcome = service.bulk_mark_paid(&input.booking_ids).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

pub async fn approve_timesheet(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let timesheet = service.approve_timesheet(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(timesheet)))
}

pub async fn reopen_timesheet(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let timesheet = service.reopen_timesheet(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(timesheet)))
}

pub async fn record_hours(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
    input: web::Json<RecordHoursInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let timesheet = service.record_hours(path.into_inner(), &input).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(timesheet)))
}

pub async fn export_bookings(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    query: web::Query<FinanceFilter>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let filter = query.into_inner().or_stage(FinanceStage::All);
    let body = service.export_bookings(&filter).await?;
    Ok(csv_attachment("finance-bookings", body))
}

pub async fn export_lines(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    query: web::Query<FinanceFilter>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let filter = query.into_inner().or_stage(FinanceStage::All);
    let body = service.export_lines(&filter).await?;
    Ok(csv_attachment("finance-lines", body))
}

pub async fn export_invoice_preview(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    query: web::Query<PreviewQuery>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let ids = parse_ids(query.booking_ids.as_deref())?;
    let body = service.export_preview(PreviewKind::Invoice, &ids).await?;
    Ok(csv_attachment("invoice-preview", body))
}

pub async fn export_payroll_preview(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    query: web::Query<PreviewQuery>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let ids = parse_ids(query.booking_ids.as_deref())?;
    let body = service.export_preview(PreviewKind::Payroll, &ids).await?;
    Ok(csv_attachment("payroll-preview", body))
}
