pub mod accounting;
pub mod auth;
pub mod bookings;
pub mod directory;
pub mod export;
pub mod finance;
pub mod lifecycle;
pub mod notifications;
pub mod staffing;
pub mod store;
pub mod timesheets;
pub mod user_context;

pub use accounting::FinanceService;
pub use auth::AuthService;
pub use bookings::BookingService;
pub use user_context::UserContext;
