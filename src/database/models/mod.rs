pub mod assignment;
pub mod booking;
pub mod employee;
pub mod finance;
pub mod macros;
pub mod money;
pub mod request;
pub mod timesheet;
pub mod waitlist;

// Re-export all models for easy importing
pub use assignment::*;
pub use booking::*;
pub use employee::*;
pub use finance::*;
pub use request::*;
pub use timesheet::*;
pub use waitlist::*;
