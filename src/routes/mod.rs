use actix_web::web;

use crate::handlers::health;

pub mod bookings;
pub mod employee;
pub mod finance;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure).service(
        web::scope("/api/v1")
            .configure(bookings::configure)
            .configure(employee::configure)
            .configure(finance::configure),
    );
}
