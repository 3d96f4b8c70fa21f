//! Stockwatch Server Library
//!
//! This module exposes the alert engine components for testing purposes.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod source;
