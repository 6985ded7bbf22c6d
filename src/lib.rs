//! HTTP-shaped control channel for a recorder.
//!
//! A single event loop owns every connection. Bytes are framed until the
//! header boundary, routed to one of five operations, checked against the
//! controller's current state, and answered with exactly one response
//! before the connection is closed.

pub mod config;
pub mod conn;
pub mod controller;
pub mod error;
pub mod framer;
pub mod protocol;
pub mod response;
pub mod router;
pub mod server;

pub use config::{Args, ServerConfig};
pub use conn::{ConnectionId, ConnectionManager, Event};
pub use controller::{Confirm, HeadlessRecorder, RecordingController, StatusSnapshot};
pub use error::{ControllerError, FrameError};
pub use protocol::{Operation, Request, Route};
pub use response::{Envelope, Response};
pub use router::{Outcome, Router};
