//! Shape translation between the REST vocabulary and the backend protocol.

pub mod request;
pub mod response;
