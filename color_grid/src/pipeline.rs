// THEORY:
// The `pipeline` module is the top-level API of the clustering engine. It wraps the
// full stack (configuration checks, grid creation, the swap loop, periodic snapshots and
// the final hand-off) behind one struct, so a caller only provides a random source and
// a `FrameSink`.

use crate::core_modules::grid::Grid;
use crate::core_modules::pixel::pixel::ColorDistance;
use crate::core_modules::simulator::{ClusterRules, DEFAULT_THRESHOLD, GridSimulator};
use crate::core_modules::spatial_query::spatial_query::mean_adjacent_distance;
use crate::error::{ExportError, GridError, PipelineError};
use crate::export::{FrameLabel, FrameSink};
use log::{debug, warn};
use rand::Rng;
use std::time::{Duration, Instant};

// Re-export key data structures for the public API.
pub use crate::core_modules::simulator::StepOutcome;
pub use crate::core_modules::spatial_query::spatial_query::{CellMetric, NeighborTopology};

pub const DEFAULT_SIZE: usize = 256;
pub const DEFAULT_ITERATIONS: u64 = 1_000_000;
/// Snapshot cadence used by time-lapse mode when no interval is given.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 100_000;
/// How many steps pass between two progress callbacks.
pub const PROGRESS_STRIDE: u64 = 1_000;
/// Above this many cell reads (`iterations * size^2`) a run is reported as expensive.
const EXPENSIVE_CELL_VISITS: u128 = 50_000_000_000;

/// Configuration for a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Side length of the square grid.
    pub size: usize,
    /// Number of sampled steps. Zero is allowed and leaves the grid as initialized.
    pub iterations: u64,
    /// Color-distance cutoff for the similarity set (strict `<`).
    pub threshold: ColorDistance,
    pub topology: NeighborTopology,
    pub metric: CellMetric,
    /// Hand a snapshot to the sink after every `n` completed steps.
    pub snapshot_interval: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            iterations: DEFAULT_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
            topology: NeighborTopology::default(),
            metric: CellMetric::default(),
            snapshot_interval: None,
        }
    }
}

impl SimulationConfig {
    pub fn rules(&self) -> ClusterRules {
        ClusterRules {
            threshold: self.threshold,
            topology: self.topology,
            metric: self.metric,
        }
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.size == 0 {
            return Err(GridError::InvalidSize(self.size));
        }
        if self.snapshot_interval == Some(0) {
            return Err(GridError::InvalidSnapshotInterval);
        }
        self.rules().validate()
    }

    /// Total number of cell reads the centroid scans will perform.
    pub fn cell_visits(&self) -> u128 {
        self.iterations as u128 * self.size as u128 * self.size as u128
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub iterations: u64,
    /// Steps that exchanged two different cells.
    pub swaps: u64,
    /// Frames accepted by the sink, the final frame included.
    pub frames_written: u64,
    /// Snapshots the sink failed to write. The run carries on past these.
    pub snapshot_failures: u64,
    pub initial_adjacent_distance: f64,
    pub final_adjacent_distance: f64,
    pub elapsed: Duration,
}

/// The main, top-level struct for the clustering engine.
pub struct ClusterPipeline {
    simulator: GridSimulator,
    config: SimulationConfig,
}

impl ClusterPipeline {
    /// Validates `config` and fills a fresh grid with random colors from `rng`.
    pub fn new<R: Rng + ?Sized>(
        config: SimulationConfig,
        rng: &mut R,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        if config.cell_visits() > EXPENSIVE_CELL_VISITS {
            warn!(
                "{} iterations on a {}x{} grid scan {} cells in total; expect a long run",
                config.iterations,
                config.size,
                config.size,
                config.cell_visits()
            );
        }
        let simulator = GridSimulator::initialize_random(config.size, config.rules(), rng)?;
        debug!("initialized {0}x{0} grid with {1:?}", config.size, config.rules());
        Ok(Self { simulator, config })
    }

    /// Runs on a caller-provided grid. `config.size` is taken from the grid.
    pub fn with_grid(mut config: SimulationConfig, grid: Grid) -> Result<Self, PipelineError> {
        config.size = grid.size();
        config.validate()?;
        let simulator = GridSimulator::new(grid, config.rules())?;
        Ok(Self { simulator, config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        self.simulator.grid()
    }

    pub fn into_grid(self) -> Grid {
        self.simulator.into_grid()
    }

    pub fn run<R, S>(&mut self, rng: &mut R, sink: &mut S) -> Result<RunReport, PipelineError>
    where
        R: Rng + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.run_with_progress(rng, sink, |_| {})
    }

    /// Performs every configured iteration, handing snapshots and the final grid to
    /// `sink`. `on_progress` receives the number of steps completed since its last call.
    pub fn run_with_progress<R, S, P>(
        &mut self,
        rng: &mut R,
        sink: &mut S,
        mut on_progress: P,
    ) -> Result<RunReport, PipelineError>
    where
        R: Rng + ?Sized,
        S: FrameSink + ?Sized,
        P: FnMut(u64),
    {
        let started = Instant::now();
        let iterations = self.config.iterations;
        let swaps_before = self.simulator.swaps();
        let initial_adjacent_distance = mean_adjacent_distance(self.simulator.grid());
        let mut frames_written = 0u64;
        let mut snapshot_failures = 0u64;
        let mut snapshot_index = 0u64;

        debug!("running {iterations} iterations");
        for iteration in 1..=iterations {
            self.simulator.step(rng);

            if let Some(interval) = self.config.snapshot_interval {
                if iteration % interval == 0 {
                    let label = FrameLabel::Snapshot {
                        index: snapshot_index,
                        iteration,
                    };
                    snapshot_index += 1;
                    match sink.write_frame(self.simulator.grid(), label) {
                        Ok(()) => frames_written += 1,
                        Err(ExportError::SinkClosed) => return Err(ExportError::SinkClosed.into()),
                        Err(err) => {
                            warn!("snapshot {label:?} was not written: {err}");
                            snapshot_failures += 1;
                        }
                    }
                }
            }

            if iteration % PROGRESS_STRIDE == 0 {
                on_progress(PROGRESS_STRIDE);
            }
        }
        if iterations % PROGRESS_STRIDE != 0 {
            on_progress(iterations % PROGRESS_STRIDE);
        }

        sink.write_frame(self.simulator.grid(), FrameLabel::Final)?;
        frames_written += 1;

        let report = RunReport {
            iterations,
            swaps: self.simulator.swaps() - swaps_before,
            frames_written,
            snapshot_failures,
            initial_adjacent_distance,
            final_adjacent_distance: mean_adjacent_distance(self.simulator.grid()),
            elapsed: started.elapsed(),
        };
        debug!("run finished: {report:?}");
        Ok(report)
    }
}
