//! Worker to server protocol.
//!
//! JSON request/response over HTTP. Every endpoint may answer with an
//! `{"error": "..."}` envelope, which is mapped onto [`ProtocolError`]
//! so callers can tell fatal conditions (credentials, client version)
//! from transient ones.
//!
//! The [`ServerClient`] trait is the seam the worker is written against;
//! [`HttpServerClient`] is the `reqwest` implementation.

mod client;
mod error;
mod messages;

pub use client::{HttpServerClient, ServerClient};
pub use error::ProtocolError;
pub use messages::{
    BadBenchReport, Directive, ErrorReport, HeartbeatRequest, NpsReport, RegisterRequest, ResultSubmission, ServerReply,
    Session, WorkloadRequest, WorkloadResponse,
};

/// Protocol revision; the server rejects workers it no longer supports.
pub const CLIENT_VERSION: u32 = 19;
