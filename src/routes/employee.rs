use actix_web::web;

use crate::handlers::employee;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/me")
            .route("/requests", web::get().to(employee::my_requests))
            .route(
                "/requests/{id}/respond",
                web::post().to(employee::respond_to_request),
            )
            .route("/waitlist/{id}", web::delete().to(employee::leave_waitlist)),
    );
}
