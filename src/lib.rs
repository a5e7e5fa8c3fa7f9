// Library exports for integration tests and reusable components

pub mod config;
pub mod db;
pub mod import;
pub mod isbn;
pub mod library;
pub mod messages;
pub mod metadata;
