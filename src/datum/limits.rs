//! Configured conversion limits.
//!
//! Query parsing converts client documents under unlimited sizes; the
//! stricter limits apply when the evaluator materializes user data.

/// Size limits applied while converting documents to datums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum number of elements in a single array (None = unlimited)
    pub max_array_size: Option<usize>,
}

impl ParseLimits {
    /// Limits with no array-size ceiling
    pub fn unlimited() -> Self {
        Self {
            max_array_size: None,
        }
    }

    /// Limits with an array-size ceiling
    pub fn with_array_limit(limit: usize) -> Self {
        Self {
            max_array_size: Some(limit),
        }
    }
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_has_no_ceiling() {
        assert_eq!(ParseLimits::unlimited().max_array_size, None);
    }

    #[test]
    fn test_array_limit_recorded() {
        assert_eq!(
            ParseLimits::with_array_limit(100_000).max_array_size,
            Some(100_000)
        );
    }
}
