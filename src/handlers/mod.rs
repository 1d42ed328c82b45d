pub mod bookings;
pub mod employee;
pub mod finance;
pub mod finance_documents;
pub mod health;
pub mod shared;
