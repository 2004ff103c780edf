//! Careerwise — profile and industry-insight service.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod insights;
pub mod llm;
pub mod profile;
pub mod store;
