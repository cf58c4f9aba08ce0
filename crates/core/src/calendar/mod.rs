//! External calendar ports and credential handling

pub mod ports;
pub mod token_manager;

pub use ports::{CalendarAccess, CalendarCatalog, CalendarService};
pub use token_manager::TokenManager;
