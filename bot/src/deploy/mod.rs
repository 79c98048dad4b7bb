//! Deployment workflow

pub mod artifact;
pub mod command;
pub mod correlation;
pub mod fsm;
pub mod manifest;
pub mod narrate;
pub mod orchestrator;
pub mod poller;
pub mod publish;
pub mod readiness;
pub mod webhook;
