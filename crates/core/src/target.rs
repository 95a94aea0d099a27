// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic lock targets.
//!
//! A target names a region of code: a whole file, a line range, or a
//! symbol/block that has been resolved to a line range. Conflict detection
//! reduces everything to `(file_path, optional line span)`.

use serde::{Deserialize, Serialize};

use crate::error::CoordError;

/// What kind of region a target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    File,
    LineRange,
    Symbol,
    Block,
}

/// A region of a shared codebase that a lock covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticTarget {
    pub kind: TargetKind,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
}

impl SemanticTarget {
    /// Whole-file target.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::File,
            file_path: path.into(),
            start_line: None,
            end_line: None,
            symbol_name: None,
        }
    }

    /// Line-range target (inclusive bounds).
    pub fn line_range(path: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            kind: TargetKind::LineRange,
            file_path: path.into(),
            start_line: Some(start),
            end_line: Some(end),
            symbol_name: None,
        }
    }

    /// Symbol target resolved to the lines it spans.
    pub fn symbol(path: impl Into<String>, name: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            kind: TargetKind::Symbol,
            file_path: path.into(),
            start_line: Some(start),
            end_line: Some(end),
            symbol_name: Some(name.into()),
        }
    }

    /// Block target resolved to the lines it spans.
    pub fn block(path: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            kind: TargetKind::Block,
            file_path: path.into(),
            start_line: Some(start),
            end_line: Some(end),
            symbol_name: None,
        }
    }

    /// Check structural validity. Line-addressed kinds need a well-ordered
    /// span; a whole-file target must not carry one.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.file_path.is_empty() {
            return Err(CoordError::validation("empty_path", "target file path is empty"));
        }
        match self.kind {
            TargetKind::File => Ok(()),
            TargetKind::LineRange | TargetKind::Symbol | TargetKind::Block => {
                match (self.start_line, self.end_line) {
                    (Some(s), Some(e)) if s <= e => Ok(()),
                    (Some(_), Some(_)) => Err(CoordError::validation(
                        "inverted_range",
                        "target start line is past end line",
                    )
                    .with_file_path(&self.file_path)),
                    _ => Err(CoordError::validation(
                        "missing_range",
                        "line-addressed target lacks a line span",
                    )
                    .with_file_path(&self.file_path)),
                }
            }
        }
    }

    /// The inclusive line span this target covers, `None` for file-wide.
    ///
    /// Symbol and block targets reduce to their resolved spans; a
    /// line-addressed target with no span degrades to file-wide.
    pub fn line_span(&self) -> Option<(u32, u32)> {
        match self.kind {
            TargetKind::File => None,
            _ => match (self.start_line, self.end_line) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            },
        }
    }

    /// Two targets conflict iff they cover the same file and their spans
    /// overlap. A file-wide target overlaps everything in its file.
    pub fn conflicts_with(&self, other: &SemanticTarget) -> bool {
        if self.file_path != other.file_path {
            return false;
        }
        match (self.line_span(), other.line_span()) {
            (None, _) | (_, None) => true,
            (Some((a1, a2)), Some((b1, b2))) => a1 <= b2 && b1 <= a2,
        }
    }
}

impl std::fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_span() {
            Some((s, e)) => write!(f, "{}:{}-{}", self.file_path, s, e),
            None => write!(f, "{}", self.file_path),
        }
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
