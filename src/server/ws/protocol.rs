use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionOutput, ExecutionResult};
use crate::graph::ChunkKind;
use crate::server::handlers::execute::CodeRequest;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    RunCode(CodeRequest),
    QuickHelp(CodeRequest),
    Ping,
    Stop,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { message: String },
    ExecutionOutput { data: ExecutionOutput },
    ExecutionComplete { result: ExecutionResult },
    RagExplanation { data: String, kind: ChunkKind },
    ExecutionError { message: String },
    QuickHelp { help: String },
    Pong,
    Stopped,
    Error { message: String },
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Every outgoing frame carries the time it was sent.
#[derive(Debug, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: ServerMessage,
    pub timestamp: String,
}

impl Envelope {
    pub fn now(message: ServerMessage) -> Self {
        Self {
            message,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
