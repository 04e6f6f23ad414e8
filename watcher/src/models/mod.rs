//! Domain and wire models

pub mod deployment;
