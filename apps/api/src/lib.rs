//! Kanban-style job-application tracker: a flat-file backed CRUD service and
//! the client-side cache that drives optimistic stage transitions.

pub mod applications;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod state;
