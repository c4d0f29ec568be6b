//! Test doubles shared by the service tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use crate::generation::{CompletionRequest, Generate, GenerationError};

pub(crate) const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRfake";
pub(crate) const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIFfake";

/// Scripted generator: pops replies in order, then falls back to a counter so
/// every call produces distinct text. Records every request it sees.
#[derive(Debug, Default)]
pub(crate) struct FakeGenerator {
    script: Mutex<VecDeque<Result<Option<String>, GenerationError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl FakeGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, reply: Result<Option<String>, GenerationError>) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Generate for FakeGenerator {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, GenerationError> {
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(request);
            seen.len()
        };
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(format!("generated #{call}"))))
    }
}

pub(crate) fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).unwrap();
}
