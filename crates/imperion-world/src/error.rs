//! Error types for the `imperion-world` crate.

/// Errors that can occur while building or restoring map data.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Restored map data does not have the expected dimensions.
    #[error("map data is {rows}x{columns}, expected {expected}x{expected}")]
    MalformedMap {
        /// Number of rows found.
        rows: usize,
        /// Length of the first short or long row found.
        columns: usize,
        /// Expected edge length.
        expected: usize,
    },
}
