//! # Backtrace registry
//!
//! Maps term-tree positions to error-reporting frames. The parser opens a
//! frame per child it descends into; evaluators resolve a failing term's
//! `BacktraceId` back through the registry to produce a path from the
//! query root to the failure site.

use crate::datum::Datum;

/// Opaque handle to a frame in a [`BacktraceRegistry`].
///
/// Id 0 is the empty backtrace: the query root, or a node whose position
/// is not tracked (binary replay, global optargs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BacktraceId(u32);

impl BacktraceId {
    /// The untracked-position sentinel
    pub const EMPTY: BacktraceId = BacktraceId(0);

    /// Raw wire value
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Rebuild a handle from its wire value
    pub fn from_u32(raw: u32) -> Self {
        BacktraceId(raw)
    }

    /// True for the empty sentinel
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for BacktraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "bt:empty")
        } else {
            write!(f, "bt:{}", self.0)
        }
    }
}

/// One step from a parent frame into a child position.
///
/// The key is a datum: a number for positional children, a string for
/// named children.
#[derive(Debug, Clone)]
struct Frame {
    parent: BacktraceId,
    key: Datum,
}

/// Append-only registry of backtrace frames for one query
#[derive(Debug, Default)]
pub struct BacktraceRegistry {
    frames: Vec<Frame>,
}

impl BacktraceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new frame under `parent`, keyed by a positional index or an
    /// optarg name.
    pub fn new_frame(&mut self, parent: BacktraceId, key: Datum) -> BacktraceId {
        self.frames.push(Frame { parent, key });
        // Frame ids start at 1; 0 is reserved for EMPTY.
        BacktraceId(self.frames.len() as u32)
    }

    /// Parent of a frame, or None for EMPTY / unknown ids
    pub fn parent_of(&self, id: BacktraceId) -> Option<BacktraceId> {
        self.frame(id).map(|f| f.parent)
    }

    /// Key of a frame, or None for EMPTY / unknown ids
    pub fn key_of(&self, id: BacktraceId) -> Option<&Datum> {
        self.frame(id).map(|f| &f.key)
    }

    /// Number of registered frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frames have been registered
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn frame(&self, id: BacktraceId) -> Option<&Frame> {
        if id.is_empty() {
            return None;
        }
        self.frames.get(id.0 as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sentinel() {
        assert!(BacktraceId::EMPTY.is_empty());
        assert_eq!(BacktraceId::EMPTY.as_u32(), 0);
    }

    #[test]
    fn test_new_frame_chains_to_parent() {
        let mut registry = BacktraceRegistry::new();
        let first = registry.new_frame(BacktraceId::EMPTY, Datum::Num(0.0));
        let second = registry.new_frame(first, Datum::Str("index".into()));

        assert!(!first.is_empty());
        assert_eq!(registry.parent_of(second), Some(first));
        assert_eq!(registry.parent_of(first), Some(BacktraceId::EMPTY));
        assert_eq!(registry.key_of(second), Some(&Datum::Str("index".into())));
    }

    #[test]
    fn test_empty_has_no_frame() {
        let registry = BacktraceRegistry::new();
        assert_eq!(registry.parent_of(BacktraceId::EMPTY), None);
        assert_eq!(registry.key_of(BacktraceId::EMPTY), None);
    }

    #[test]
    fn test_wire_round_trip() {
        let mut registry = BacktraceRegistry::new();
        let id = registry.new_frame(BacktraceId::EMPTY, Datum::Num(3.0));
        assert_eq!(BacktraceId::from_u32(id.as_u32()), id);
    }
}
