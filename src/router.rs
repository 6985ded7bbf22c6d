use anyhow::Context;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::controller::{Confirm, RecordingController, StatusSnapshot};
use crate::error::ControllerError;
use crate::protocol::{self, Operation, Route};
use crate::response::{Envelope, Response};

const INDEX: &str = "record-relay control channel\n\
                     \n\
                     Available endpoints:\n\
                     - /start - Start or resume recording\n\
                     - /pause - Pause recording\n\
                     - /save - Save recording\n\
                     - /cancel - Cancel recording\n\
                     - /status - Get status information\n";

/// Result of an operation the controller's state allowed or refused.
///
/// A refusal is a normal answer, sent as `{success: false}` with status 200.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done(Value),
    Rejected(&'static str),
}

impl From<Outcome> for Envelope {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done(data) => Envelope::ok(data),
            Outcome::Rejected(reason) => Envelope::fail(reason),
        }
    }
}

pub struct Router<C> {
    controller: Option<C>,
}

impl<C: RecordingController> Router<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    pub fn unbound() -> Self {
        Self { controller: None }
    }

    pub fn controller(&self) -> Option<&C> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut C> {
        self.controller.as_mut()
    }

    /// Turns one framed request into a response.
    ///
    /// Framing and routing problems become 400/404 here. `Err` is reserved
    /// for faults the caller must turn into a 500.
    pub fn handle(&mut self, raw: &[u8]) -> anyhow::Result<Response> {
        let request = match protocol::parse_request(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!("{err}");
                return Ok(Response::bad_request());
            }
        };

        info!(method = %request.method, path = %request.path, "request");

        match protocol::route(&request.path, request.body.as_deref()) {
            Route::Operation(op) => self.reply(op),
            Route::Index => Ok(Response::text(200, INDEX)),
            Route::Legacy { op: Some(op), params } => {
                debug!(op = op.as_str(), ?params, "legacy api call");
                self.reply(op)
            }
            Route::Legacy { op: None, .. } => {
                warn!(path = %request.path, "unknown api endpoint");
                Ok(Response::json(200, &Envelope::fail("Unknown API endpoint"))?)
            }
            Route::NotFound => {
                warn!(path = %request.path, "unknown path");
                Ok(Response::not_found())
            }
        }
    }

    fn reply(&mut self, op: Operation) -> anyhow::Result<Response> {
        let outcome = self
            .dispatch(op)
            .with_context(|| format!("{} failed in the recording controller", op.as_str()))?;
        if let Outcome::Rejected(reason) = &outcome {
            info!(op = op.as_str(), reason, "rejected");
        }
        Ok(Response::json(200, &Envelope::from(outcome))?)
    }

    /// Applies `op` if the controller's current state permits it.
    pub fn dispatch(&mut self, op: Operation) -> Result<Outcome, ControllerError> {
        let Some(ctl) = self.controller.as_mut() else {
            return Ok(match op {
                Operation::Status => Outcome::Done(json!({})),
                _ => Outcome::Rejected("No access to recording controller"),
            });
        };

        let outcome = match op {
            Operation::Start => {
                if ctl.is_paused() {
                    ctl.resume()?;
                    Outcome::Done(json!({ "action": "resumed" }))
                } else if !ctl.is_recording() {
                    ctl.start()?;
                    Outcome::Done(json!({ "action": "started" }))
                } else {
                    Outcome::Rejected("Already recording")
                }
            }
            Operation::Pause => {
                if ctl.is_recording() && !ctl.is_paused() {
                    ctl.pause()?;
                    Outcome::Done(json!({}))
                } else {
                    Outcome::Rejected("Not recording or already paused")
                }
            }
            Operation::Cancel => {
                if ctl.is_recording() {
                    ctl.cancel(Confirm::Suppress)?;
                    Outcome::Done(json!({}))
                } else {
                    Outcome::Rejected("Not recording")
                }
            }
            Operation::Save => {
                if ctl.is_recording() {
                    ctl.save(Confirm::Suppress)?;
                    Outcome::Done(json!({}))
                } else {
                    Outcome::Rejected("Not recording")
                }
            }
            Operation::Status => {
                let snapshot = StatusSnapshot::capture(&*ctl);
                Outcome::Done(json!(snapshot))
            }
        };
        Ok(outcome)
    }
}
