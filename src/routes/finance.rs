use actix_web::web;

use crate::handlers::{finance, finance_documents};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/finance")
            .route("", web::get().to(finance::overview))
            .route("/bulk/invoiced", web::post().to(finance::bulk_mark_invoiced))
            .route("/bulk/paid", web::post().to(finance::bulk_mark_paid))
            .route("/bookings/{id}/invoiced", web::post().to(finance::mark_invoiced))
            .route("/bookings/{id}/invoiced", web::delete().to(finance::unmark_invoiced))
            .route("/bookings/{id}/paid", web::post().to(finance::mark_paid))
            .route("/bookings/{id}/paid", web::delete().to(finance::unmark_paid))
            .route("/timesheets/{id}/approve", web::post().to(finance::approve_timesheet))
            .route("/timesheets/{id}/reopen", web::post().to(finance::reopen_timesheet))
            .route("/timesheets/{id}/hours", web::put().to(finance::record_hours))
            .route("/export/bookings", web::get().to(finance::export_bookings))
            .route("/export/lines", web::get().to(finance::export_lines))
            .route(
                "/export/invoice-preview",
                web::get().to(finance::export_invoice_preview),
            )
            .route(
                "/export/payroll-preview",
                web::get().to(finance::export_payroll_preview),
            ),
    )
    .service(
        web::scope("/finance-documents")
            .route("", web::get().to(finance_documents::list_documents))
            .route("/invoice", web::post().to(finance_documents::create_invoice_draft))
            .route("/payroll", web::post().to(finance_documents::create_payroll_draft))
            .route("/{id}", web::get().to(finance_documents::get_document))
            .route("/{id}/finalize", web::post().to(finance_documents::finalize_document))
            .route("/{id}/cancel", web::post().to(finance_documents::cancel_document))
            .route("/{id}/export", web::get().to(finance_documents::export_document)),
    );
}
