// THEORY:
// The `export` module decouples the simulation from any particular image format. The
// pipeline only knows about a `FrameSink`: something that is shown the grid at a given
// moment and must take what it needs before handing control back. Whether that ends up
// as a PNG, a PPM, a frame in memory or a message to another task is the sink's
// business.
//
// Key architectural principles:
// 1.  **Copy-Out Contract**: A sink receives `&Grid`. The borrow ends when `write_frame`
//     returns and the next iteration resumes mutating the grid, so a sink that needs the
//     pixels later captures a `FrameImage` (an owned RGBA copy) first.
// 2.  **Deterministic Names**: `OutputLayout` encodes the grid size and iteration count
//     (plus a zero-padded frame index for snapshots) into every filename so consecutive
//     runs with different parameters do not overwrite each other.
// 3.  **Glue, Not Logic**: The video script is a fixed ffmpeg invocation over the
//     snapshot filename pattern. It carries no algorithmic content.

use crate::core_modules::grid::Grid;
use crate::core_modules::utils::image_helper::image_helper::{self, RasterFormat};
use crate::error::ExportError;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const VIDEO_SCRIPT_NAME: &str = "compile-video.sh";
pub const VIDEO_OUTPUT_NAME: &str = "output_video.m4v";
/// Input frame rate of the assembled video: one snapshot per second.
pub const VIDEO_INPUT_FPS: u32 = 1;
pub const VIDEO_OUTPUT_FPS: u32 = 30;
pub const VIDEO_SIDE: u32 = 1080;

/// Identifies a frame handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    /// The `index`-th periodic snapshot (zero-based), taken after `iteration` steps.
    Snapshot { index: u64, iteration: u64 },
    /// The grid after the last iteration.
    Final,
}

/// An owned RGBA copy of a grid, safe to keep while the simulation continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub label: FrameLabel,
    /// Side length in pixels.
    pub size: u32,
    /// Row-major RGBA8 bytes, `size * size * 4` long.
    pub rgba: Vec<u8>,
}

impl FrameImage {
    pub fn capture(grid: &Grid, label: FrameLabel) -> Result<Self, ExportError> {
        let size = u32::try_from(grid.size())
            .map_err(|_| ExportError::TooLarge { size: grid.size() })?;
        Ok(Self {
            label,
            size,
            rgba: grid.to_rgba_bytes(),
        })
    }
}

/// A consumer of grid frames.
pub trait FrameSink {
    /// Called with a read-only view of the grid. Anything needed after this call returns
    /// must be copied out before returning.
    fn write_frame(&mut self, grid: &Grid, label: FrameLabel) -> Result<(), ExportError>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write_frame(&mut self, grid: &Grid, label: FrameLabel) -> Result<(), ExportError> {
        (**self).write_frame(grid, label)
    }
}

/// Where and under which names the frames of one run are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    directory: PathBuf,
    format: RasterFormat,
    size: usize,
    iterations: u64,
}

impl OutputLayout {
    pub fn new(
        directory: impl Into<PathBuf>,
        format: RasterFormat,
        size: usize,
        iterations: u64,
    ) -> Self {
        Self {
            directory: directory.into(),
            format,
            size,
            iterations,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    /// `output_{size}x{size}_{iterations}`
    pub fn stem(&self) -> String {
        format!("output_{0}x{0}_{1}", self.size, self.iterations)
    }

    pub fn final_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.stem(), self.format.extension()))
    }

    pub fn snapshot_path(&self, index: u64) -> PathBuf {
        let name = format!("{}_{index:05}.{}", self.stem(), self.format.extension());
        self.directory.join(name)
    }

    /// The snapshot filename pattern in ffmpeg's printf syntax.
    pub fn snapshot_pattern(&self) -> String {
        format!("{}_%05d.{}", self.stem(), self.format.extension())
    }

    pub fn path_for(&self, label: FrameLabel) -> PathBuf {
        match label {
            FrameLabel::Snapshot { index, .. } => self.snapshot_path(index),
            FrameLabel::Final => self.final_path(),
        }
    }
}

/// Encodes every frame straight to disk using an `OutputLayout`.
#[derive(Debug, Clone)]
pub struct FileSink {
    layout: OutputLayout,
}

impl FileSink {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Encodes an already captured frame. Returns the path written.
    pub fn save(&self, frame: &FrameImage) -> Result<PathBuf, ExportError> {
        let path = self.layout.path_for(frame.label);
        image_helper::save(
            &path,
            frame.size,
            frame.size,
            &frame.rgba,
            self.layout.format(),
        )?;
        Ok(path)
    }
}

impl FrameSink for FileSink {
    fn write_frame(&mut self, grid: &Grid, label: FrameLabel) -> Result<(), ExportError> {
        let frame = FrameImage::capture(grid, label)?;
        self.save(&frame)?;
        Ok(())
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<FrameImage>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, grid: &Grid, label: FrameLabel) -> Result<(), ExportError> {
        self.frames.push(FrameImage::capture(grid, label)?);
        Ok(())
    }
}

/// The bash script that assembles the numbered snapshots matching `pattern` into a
/// square H.264 video.
pub fn video_script(pattern: &str) -> String {
    let mut script = String::from("#!/bin/bash\n");
    script.push_str("cd \"$(dirname \"$0\")\" || exit 1\n");
    let _ = writeln!(
        script,
        "ffmpeg -framerate {VIDEO_INPUT_FPS} -i {pattern} \
         -vf \"scale={VIDEO_SIDE}:-1, pad={VIDEO_SIDE}:{VIDEO_SIDE}:(ow-iw)/2:(oh-ih)/2\" \
         -c:v libx264 -r {VIDEO_OUTPUT_FPS} -pix_fmt yuv420p {VIDEO_OUTPUT_NAME}"
    );
    script
}

/// Writes `compile-video.sh` next to the snapshots and marks it executable.
pub fn write_video_script(layout: &OutputLayout) -> Result<PathBuf, ExportError> {
    let path = layout.directory().join(VIDEO_SCRIPT_NAME);
    std::fs::write(&path, video_script(&layout.snapshot_pattern()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}
