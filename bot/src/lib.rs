//! deploybot library
//!
//! Chat-triggered GitOps deployments: command validation, artifact and CI
//! checks, manifest commits, push webhook correlation and Argo CD sync polling.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
