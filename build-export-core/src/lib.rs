#[macro_use]
extern crate log;

pub mod auth;
pub mod build_handlers;
pub mod build_processor;
pub mod config;
pub mod error;
pub mod event_stream;
pub mod export_api;
pub mod export_app;
pub mod sample_handlers;

pub use error::ExportApiError;
