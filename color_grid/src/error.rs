// THEORY:
// Every failure in this crate happens at a boundary. Configuration is checked
// before the grid is allocated, allocation is checked before the first
// iteration, and encoding happens after the grid has been handed off. The
// simulation loop itself has no failure path: the similarity set of a sampled
// pixel always contains the pixel itself, so the centroid division is safe.

use thiserror::Error;

/// Errors raised while configuring or allocating a grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// The grid side length must be at least one cell.
    #[error("invalid grid size {0}: size must be greater than zero")]
    InvalidSize(usize),
    /// A threshold of zero would exclude the reference pixel from its own similarity set.
    #[error("invalid color threshold {0}: threshold must be greater than zero")]
    InvalidThreshold(u32),
    #[error("invalid snapshot interval: interval must be greater than zero")]
    InvalidSnapshotInterval,
    #[error("expected {expected} cells for a square grid, got {actual}")]
    CellCount { expected: usize, actual: usize },
    /// The cell buffer could not be reserved (or `size * size` overflowed).
    #[error("failed to allocate a grid of {cells} cells")]
    Allocation { cells: u128 },
}

/// Errors raised while turning a grid into an image or handing it to a sink.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("a {size}x{size} grid is too large to encode as an image")]
    TooLarge { size: usize },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    /// The consumer on the other side of a frame channel has shut down.
    #[error("frame sink closed before the run finished")]
    SinkClosed,
}

/// Top-level error of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
