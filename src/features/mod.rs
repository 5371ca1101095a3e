//! Features layer - lifecycle domains, each with its own models, services
//! and admin routes

pub mod accounts;
pub mod audit;
pub mod file_requests;
pub mod files;
pub mod sweeps;
