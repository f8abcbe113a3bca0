pub mod aggregation;
pub mod attachments;
pub mod cache;
pub mod categories;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod form;
pub mod logging;
pub mod object_store;
pub mod poomsae;
pub mod portal;
pub mod store;
