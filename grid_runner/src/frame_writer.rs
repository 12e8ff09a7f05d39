// THEORY:
// The `FrameWriter` is a small actor that owns the output files of a run. The
// simulation thread never touches the disk: it copies each frame out of the grid and
// drops it into a bounded channel, and this task encodes frames in arrival order.
//
// Key architectural principles:
// 1.  **Copies Cross, Grids Don't**: Only owned `FrameImage`s travel over the channel.
//     The grid stays on the simulation thread for its entire life.
// 2.  **Back-Pressure**: The channel is bounded. When encoding falls behind, the
//     simulation blocks on `blocking_send` instead of piling frames up in memory.
// 3.  **Ordered Shutdown**: `Shutdown` is queued behind every frame already sent, so
//     by the time the actor stops, every frame has been written or counted as failed.

use color_grid::export::{FileSink, FrameImage, FrameLabel, FrameSink};
use color_grid::{ExportError, Grid};
use log::{debug, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Message type for the frame-writer actor
pub enum FrameMessage {
    Write(FrameImage),
    Shutdown,
}

/// What the writer did over the lifetime of a run.
#[derive(Debug, Default)]
pub struct WriterSummary {
    /// Frames encoded successfully, the final image included.
    pub written: u64,
    /// Snapshots that could not be encoded.
    pub failed: u64,
    pub final_path: Option<PathBuf>,
}

/// Handle to a running frame-writer task.
pub struct FrameWriter {
    sender: mpsc::Sender<FrameMessage>,
    task: JoinHandle<Result<WriterSummary, ExportError>>,
}

impl FrameWriter {
    /// Spawns the actor on the current runtime with a queue of `depth` frames.
    pub fn spawn(sink: FileSink, depth: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<FrameMessage>(depth.max(1));

        let task = tokio::spawn(async move {
            let mut summary = WriterSummary::default();
            let mut final_error = None;

            while let Some(msg) = receiver.recv().await {
                match msg {
                    FrameMessage::Write(frame) => {
                        let label = frame.label;
                        match encode(sink.clone(), frame).await {
                            Ok(path) => {
                                debug!("wrote {}", path.display());
                                summary.written += 1;
                                if label == FrameLabel::Final {
                                    summary.final_path = Some(path);
                                }
                            }
                            Err(err) if label == FrameLabel::Final => final_error = Some(err),
                            Err(err) => {
                                warn!("failed to write {label:?}: {err}");
                                summary.failed += 1;
                            }
                        }
                    }
                    FrameMessage::Shutdown => break,
                }
            }

            match final_error {
                Some(err) => Err(err),
                None => Ok(summary),
            }
        });

        Self { sender, task }
    }

    /// A sink for the simulation thread that forwards copies of the grid to this actor.
    pub fn sink(&self) -> ChannelSink {
        ChannelSink {
            sender: self.sender.clone(),
        }
    }

    /// Waits for every queued frame, then stops the actor.
    pub async fn shutdown(self) -> Result<WriterSummary, ExportError> {
        let _ = self.sender.send(FrameMessage::Shutdown).await;
        self.task
            .await
            .map_err(|err| ExportError::Io(std::io::Error::other(err)))?
    }
}

/// Encodes on the blocking pool so PNG compression does not stall the runtime.
async fn encode(sink: FileSink, frame: FrameImage) -> Result<PathBuf, ExportError> {
    tokio::task::spawn_blocking(move || sink.save(&frame))
        .await
        .map_err(|err| ExportError::Io(std::io::Error::other(err)))?
}

/// The simulation side of the channel. Must be used from a blocking thread.
pub struct ChannelSink {
    sender: mpsc::Sender<FrameMessage>,
}

impl FrameSink for ChannelSink {
    fn write_frame(&mut self, grid: &Grid, label: FrameLabel) -> Result<(), ExportError> {
        let frame = FrameImage::capture(grid, label)?;
        self.sender
            .blocking_send(FrameMessage::Write(frame))
            .map_err(|_| ExportError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_grid::export::OutputLayout;
    use color_grid::{Pixel, RasterFormat};

    fn checkerboard() -> Grid {
        Grid::from_fn(4, |p| {
            if (p.x + p.y) % 2 == 0 {
                Pixel::rgb(255, 255, 255)
            } else {
                Pixel::rgb(0, 0, 0)
            }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn writes_frames_sent_from_a_blocking_thread() {
        let dir = std::env::temp_dir()
            .join(format!("grid_runner-{}-writer", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let layout = OutputLayout::new(&dir, RasterFormat::Png, 4, 20);
        let writer = FrameWriter::spawn(FileSink::new(layout.clone()), 2);

        let mut sink = writer.sink();
        tokio::task::spawn_blocking(move || {
            let grid = checkerboard();
            for index in 0..3 {
                let label = FrameLabel::Snapshot {
                    index,
                    iteration: (index + 1) * 5,
                };
                sink.write_frame(&grid, label).unwrap();
            }
            sink.write_frame(&grid, FrameLabel::Final).unwrap();
        })
        .await
        .unwrap();

        let summary = writer.shutdown().await.unwrap();
        assert_eq!(summary.written, 4);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.final_path, Some(layout.final_path()));
        assert!(layout.snapshot_path(2).exists());

        let decoded = image::open(layout.final_path()).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[tokio::test]
    async fn failing_final_write_is_an_error() {
        let missing = std::env::temp_dir()
            .join(format!("grid_runner-{}-writer-missing", std::process::id()));
        let _ = std::fs::remove_dir_all(&missing);
        let layout = OutputLayout::new(&missing, RasterFormat::Ppm, 4, 20);
        let writer = FrameWriter::spawn(FileSink::new(layout), 1);

        let mut sink = writer.sink();
        tokio::task::spawn_blocking(move || {
            let grid = checkerboard();
            let snapshot = FrameLabel::Snapshot {
                index: 0,
                iteration: 10,
            };
            sink.write_frame(&grid, snapshot).unwrap();
            sink.write_frame(&grid, FrameLabel::Final).unwrap();
        })
        .await
        .unwrap();

        assert!(matches!(writer.shutdown().await, Err(ExportError::Io(_))));
    }

    #[tokio::test]
    async fn sink_reports_a_closed_channel() {
        let dir = std::env::temp_dir();
        let layout = OutputLayout::new(&dir, RasterFormat::Png, 4, 1);
        let writer = FrameWriter::spawn(FileSink::new(layout), 1);
        let mut sink = writer.sink();
        writer.shutdown().await.unwrap();

        let result = tokio::task::spawn_blocking(move || {
            sink.write_frame(&checkerboard(), FrameLabel::Final)
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(ExportError::SinkClosed)));
    }
}
