//! Wire models for the services deploybot talks to.

pub mod models;
