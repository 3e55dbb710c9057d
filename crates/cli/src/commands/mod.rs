//! CLI Commands

pub mod balance;
pub mod get;
pub mod notifications;
pub mod resolve;
