//! Wire models for the payloads deploybot accepts.

pub mod models;
