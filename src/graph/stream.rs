// Stream chunks
// What the pipeline emits, in the order the consumer sees it

use std::fmt;

use serde::Serialize;

/// Explanation text is streamed in slices of this many characters.
pub const EXPLANATION_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Progress,
    Explanation,
    Error,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Progress => "progress",
            ChunkKind::Explanation => "explanation",
            ChunkKind::Error => "error",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A stage finished; carries the label it left in the state.
    Progress { stage: &'static str, label: String },
    /// One slice of the explanation.
    Explanation(String),
    /// Engine failure. Always the last chunk of its stream.
    Error(String),
}

impl StreamChunk {
    pub fn kind(&self) -> ChunkKind {
        match self {
            StreamChunk::Progress { .. } => ChunkKind::Progress,
            StreamChunk::Explanation(_) => ChunkKind::Explanation,
            StreamChunk::Error(_) => ChunkKind::Error,
        }
    }

    /// The exact text a client renders.
    pub fn text(&self) -> String {
        match self {
            StreamChunk::Progress { stage, label } => format!("**{}**: {}\n\n", stage, label),
            StreamChunk::Explanation(slice) => slice.clone(),
            StreamChunk::Error(message) => format!("Error generating explanation: {}", message),
        }
    }
}

/// Splits an explanation on `char` boundaries into slices of
/// [`EXPLANATION_CHUNK_CHARS`]; the last slice may be shorter.
pub fn explanation_chunks(explanation: &str) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for c in explanation.chars() {
        current.push(c);
        count += 1;
        if count == EXPLANATION_CHUNK_CHARS {
            chunks.push(StreamChunk::Explanation(std::mem::take(&mut current)));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(StreamChunk::Explanation(current));
    }

    chunks
}
