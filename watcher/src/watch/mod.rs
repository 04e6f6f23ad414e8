//! Deployment log watching: fetcher, session, controller and view

pub mod controller;
pub mod fetcher;
pub mod session;
pub mod view;
