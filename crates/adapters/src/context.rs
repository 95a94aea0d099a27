// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from context-document storage
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("store failed: {0}")]
    StoreFailed(String),
}

/// A shared context document headed for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDoc {
    pub file_path: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// Opaque document store the engine publishes to on `context/share`.
///
/// Embedding and similarity search happen behind this seam; the engine
/// only hands documents over.
#[async_trait]
pub trait ContextSink: Send + Sync + 'static {
    async fn store(&self, doc: ContextDoc) -> Result<(), ContextError>;
}

/// Accepts and discards every document.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullContextSink;

#[async_trait]
impl ContextSink for NullContextSink {
    async fn store(&self, _doc: ContextDoc) -> Result<(), ContextError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use super::{ContextDoc, ContextError, ContextSink};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records stored documents for assertions.
    #[derive(Clone, Default)]
    pub struct RecordingContextSink {
        docs: Arc<Mutex<Vec<ContextDoc>>>,
    }

    impl RecordingContextSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn docs(&self) -> Vec<ContextDoc> {
            self.docs.lock().clone()
        }
    }

    #[async_trait]
    impl ContextSink for RecordingContextSink {
        async fn store(&self, doc: ContextDoc) -> Result<(), ContextError> {
            self.docs.lock().push(doc);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingContextSink;
