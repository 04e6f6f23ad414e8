//! WhaleRay Log Watcher Library
//!
//! Polls a deployment's build and runtime logs from the WhaleRay backend and
//! follows them until the deployment settles.

pub mod app;
pub mod authn;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
pub mod watch;
