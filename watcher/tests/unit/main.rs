//! Integration tests for the log watcher

mod test_controller;
