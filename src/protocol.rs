//! Wire message types.
//!
//! Every frame on a client connection carries exactly one [`Message`],
//! discriminated by its `type` field:
//!
//! - `hello`: client → relay, first frame only, announces the client id.
//! - `command`: relay → client, a dispatched handler invocation.
//! - `response`: client → relay, the reply to a command, matched by id.
//!
//! Unknown `type` values deserialize to [`Message::Unknown`] and are
//! ignored by the read loop, so new message kinds can be added without
//! breaking older peers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Parameter set for a handler invocation (a JSON object).
pub type Params = Map<String, Value>;

/// Outcome reported by the remote handler.
///
/// A `failure` is the handler's own execution error and travels inside a
/// normal response; it is not a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// A single protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Client announcement, must be the first frame on a connection.
    Hello { client_id: String },
    /// A command dispatched to exactly one client.
    Command {
        id: Uuid,
        handler: String,
        params: Params,
    },
    /// The client's reply, referencing the originating command id.
    Response(Response),
    /// Any message kind this version does not understand.
    #[serde(other)]
    Unknown,
}

/// Reply to a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request id of the command this answers.
    pub id: Uuid,
    /// Whether the handler ran to completion.
    pub status: Status,
    /// Handler result on success, error description on failure.
    pub payload: Value,
    /// Output the worker captured while the handler ran.
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl Response {
    /// Build a success response carrying the handler's result.
    pub fn success(id: Uuid, payload: Value) -> Self {
        Self {
            id,
            status: Status::Success,
            payload,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Build a failure response carrying an error description.
    pub fn failure(id: Uuid, error: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::Failure,
            payload: serde_json::json!({ "error": error.into() }),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}
