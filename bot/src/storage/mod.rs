//! Settings and secrets

pub mod settings;
