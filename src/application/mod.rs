pub mod accounts;
pub mod error;
pub mod follows;
pub mod forms;
pub mod groups;
pub mod listing;
pub mod pagination;
pub mod posts;
pub mod repos;
