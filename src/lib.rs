pub mod app;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod decision;
pub mod dependencies;
pub mod domain;
pub mod download;
pub mod error;
pub mod install;
pub mod output;
pub mod references;
pub mod resolver;
pub mod run_log;
pub mod selector;
