use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::database::models::{AddEmployeeOutcome, AssignmentRatesInput, BookingInput, RequestEmployeesInput};
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::{BookingService, UserContext};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEmployeeRequest {
    pub employee_user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEmployeeResponse {
    pub outcome: AddEmployeeOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub executed: u64,
}

pub async fn create_booking(
    user_context: UserContext,
    service: web::Data<BookingService>,
    input: web::Json<BookingInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.create(&input, user_context.user_id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(booking)))
}

pub async fn get_booking(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let detail = service.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(detail)))
}

pub async fn update_booking(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
    input: web::Json<BookingInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.update(path.into_inner(), &input).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn delete_booking(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    service.delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        None,
        "Booking deleted",
    )))
}

pub async fn approve_booking(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service
        .approve(path.into_inner(), user_context.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn revoke_approval(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let booking = service.revoke_approval(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(booking)))
}

pub async fn sync_executed(
    user_context: UserContext,
    service: web::Data<BookingService>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let executed = service.sync_executed().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(SweepResponse { executed })))
}

pub async fn add_employee(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
    input: web::Json<AddEmployeeRequest>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let outcome = service
        .add_employee(path.into_inner(), input.employee_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(AddEmployeeResponse { outcome })))
}

pub async fn request_employees(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
    input: web::Json<RequestEmployeesInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let requests = service
        .request_employees(path.into_inner(), &input.employee_ids)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(requests)))
}

pub async fn cancel_assignment(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let (booking_id, assignment_id) = path.into_inner();
    let changed = service.cancel_assignment(booking_id, assignment_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChangedResponse { changed })))
}

pub async fn update_assignment_rates(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<(i64, i64)>,
    input: web::Json<AssignmentRatesInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let (booking_id, assignment_id) = path.into_inner();
    let assignment = service
        .update_assignment_rates(booking_id, assignment_id, &input)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(assignment)))
}

pub async fn promote_waitlist_entry(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let (booking_id, entry_id) = path.into_inner();
    if !service.promote_waitlist_entry(booking_id, entry_id).await? {
        return Err(AppError::Conflict(
            "booking has no free slot for this waitlist entry".to_string(),
        ));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChangedResponse { changed: true })))
}

pub async fn remove_waitlist_entry(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let (booking_id, entry_id) = path.into_inner();
    let changed = service.remove_waitlist_entry(booking_id, entry_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChangedResponse { changed })))
}
