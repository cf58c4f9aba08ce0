//! Database implementations

mod columns;
pub mod manager;
pub mod sync_config_repository;
pub mod sync_log_repository;
pub mod sync_record_repository;
pub mod task_repository;

pub use manager::*;
pub use sync_config_repository::*;
pub use sync_log_repository::*;
pub use sync_record_repository::*;
pub use task_repository::*;
