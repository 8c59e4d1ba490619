//! Outer adapters: CSV input/output, the HTTP service, response envelopes
//! and batch replay.

pub mod csv;
pub mod http;
pub mod replay;
pub mod response;
