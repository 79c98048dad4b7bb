//! Clients for the services the bot talks to

pub mod argo;
pub mod client;
pub mod github;
pub mod registry;
pub mod slack;
