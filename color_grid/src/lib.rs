// THEORY:
// This file is the main entry point for the `color_grid` library crate.
//
// The crate simulates spatial color clustering on a square grid of random colors: a
// sampled pixel is swapped toward the mean position of every similarly colored pixel,
// one step at a time, until like colors drift together.
//
// The primary goal is to export the `ClusterPipeline` and its associated data
// structures (`SimulationConfig`, `RunReport`, the `FrameSink` family) as the high-level
// interface. The `core_modules` stay public for callers that want to drive the
// `GridSimulator` or query a `Grid` directly.

pub mod core_modules;
pub mod error;
pub mod export;
pub mod pipeline;

pub use core_modules::grid::{Grid, Position};
pub use core_modules::pixel::pixel::Pixel;
pub use core_modules::simulator::{ClusterRules, GridSimulator};
pub use core_modules::utils::image_helper::image_helper::RasterFormat;
pub use error::{ExportError, GridError, PipelineError};
pub use pipeline::{ClusterPipeline, RunReport, SimulationConfig};
