pub mod bot;
pub mod customer;
pub mod expense;
pub mod notify;
pub mod payment;
pub mod production;
pub mod records;
pub mod report;
pub mod schedule;
pub mod user;
pub mod utils;
pub mod views;
