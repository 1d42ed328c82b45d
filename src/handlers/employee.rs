use actix_web::{HttpResponse, web};

use crate::database::models::RespondToRequestInput;
use crate::error::AppError;
use crate::handlers::bookings::ChangedResponse;
use crate::handlers::shared::ApiResponse;
use crate::services::{BookingService, UserContext};

/// The caller's own booking requests, with their waitlist position if any.
pub async fn my_requests(
    user_context: UserContext,
    service: web::Data<BookingService>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_employee()?;

    let requests = service.employee_requests(user_context.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(requests)))
}

pub async fn respond_to_request(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
    input: web::Json<RespondToRequestInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_employee()?;

    let changed = service
        .respond_to_request(path.into_inner(), user_context.user_id, input.response)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChangedResponse { changed })))
}

pub async fn leave_waitlist(
    user_context: UserContext,
    service: web::Data<BookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_employee()?;

    let changed = service
        .leave_waitlist(path.into_inner(), user_context.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChangedResponse { changed })))
}
