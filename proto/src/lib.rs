//! Compiled protobuf / gRPC types for the readings backend.
//!
//! Client and server stubs are generated at build time from
//! `protos/iot_readings.proto` in the workspace root.

/// gRPC types and stubs for the datamanager `ReadingService`.
pub mod iot {
    tonic::include_proto!("iot");
}

/// Wire timestamp used by every time-bearing backend message.
pub use prost_types::Timestamp;
