/// Configuration errors reported by [`crate::Recycler::new`] and the
/// corresponding setters.
///
/// These are fail-fast: invalid values are rejected, never clamped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("stack count must be at least 2 (got {0})")]
    StackCountTooSmall(usize),
    #[error("buffer scale must be 0 or within 1.0..=4.0 (got {0})")]
    BufferScaleOutOfRange(f64),
}
