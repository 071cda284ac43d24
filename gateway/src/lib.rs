//! REST → gRPC translation layer for sensor readings.
//!
//! Accepts HTTP/JSON requests for readings and forwards them to the
//! datamanager `ReadingService`, translating shapes, timestamps, pagination,
//! aggregation results and failure codes in both directions.

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mapping;
pub mod service;
pub mod timecodec;
pub mod validate;
