pub mod assignment;
pub mod booking;
pub mod company;
pub mod employee;
pub mod finance_document;
pub mod notification;
pub mod request;
pub mod timesheet;
pub mod waitlist;
