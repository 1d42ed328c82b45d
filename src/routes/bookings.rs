use actix_web::web;

use crate::handlers::bookings;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(bookings::create_booking))
            .route("/sync-executed", web::post().to(bookings::sync_executed))
            .route("/{id}", web::get().to(bookings::get_booking))
            .route("/{id}", web::put().to(bookings::update_booking))
            .route("/{id}", web::delete().to(bookings::delete_booking))
            .route("/{id}/approve", web::post().to(bookings::approve_booking))
            .route("/{id}/approve", web::delete().to(bookings::revoke_approval))
            .route("/{id}/assignments", web::post().to(bookings::add_employee))
            .route(
                "/{id}/assignments/{assignment_id}",
                web::delete().to(bookings::cancel_assignment),
            )
            .route(
                "/{id}/assignments/{assignment_id}/rates",
                web::put().to(bookings::update_assignment_rates),
            )
            .route("/{id}/requests", web::post().to(bookings::request_employees))
            .route(
                "/{id}/waitlist/{entry_id}/promote",
                web::post().to(bookings::promote_waitlist_entry),
            )
            .route(
                "/{id}/waitlist/{entry_id}",
                web::delete().to(bookings::remove_waitlist_entry),
            ),
    );
}
