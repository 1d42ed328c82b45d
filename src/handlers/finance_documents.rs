use actix_web::{HttpResponse, web};

use crate::database::models::BookingIdsInput;
use crate::error::AppError;
use crate::handlers::shared::{ApiResponse, csv_attachment};
use crate::services::{FinanceService, UserContext};

pub async fn list_documents(
    user_context: UserContext,
    service: web::Data<FinanceService>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let documents = service.list_documents().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(documents)))
}

pub async fn get_document(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let document = service.get_document(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(document)))
}

pub async fn create_invoice_draft(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    input: web::Json<BookingIdsInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let outcome = service
        .create_invoice_draft(&input.booking_ids, user_context.user_id)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

pub async fn create_payroll_draft(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    input: web::Json<BookingIdsInput>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let outcome = service
        .create_payroll_draft(&input.booking_ids, user_context.user_id)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(outcome)))
}

pub async fn finalize_document(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let document = service
        .finalize_document(path.into_inner(), user_context.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(document)))
}

pub async fn cancel_document(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let document = service.cancel_document(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(document)))
}

pub async fn export_document(
    user_context: UserContext,
    service: web::Data<FinanceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    user_context.requires_admin()?;

    let document_id = path.into_inner();
    let body = service.export_document(document_id).await?;
    Ok(csv_attachment(&format!("finance-document-{}", document_id), body))
}
