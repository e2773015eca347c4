// src/sinks/render.rs
//! Headless render sink: reduces each snapshot to a display frame and
//! reports it through tracing

use serde::Serialize;
use tracing::{info, trace};

use crate::acquisition::snapshot::Snapshot;
use crate::error::SinkError;
use crate::estimate;
use crate::sinks::SnapshotSink;

/// What a plot would draw for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderFrame {
    pub taken_at_s: f64,
    pub emg_activity: f32,
    pub latest_force: Vec<f64>,
    pub peak_force: Vec<f64>,
    pub estimated_force: f64,
}

impl RenderFrame {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let latest_emg = snapshot.latest_emg();
        let peak_force: Vec<f64> = snapshot
            .force
            .iter()
            .map(|window| window.iter().copied().fold(0.0, f64::max))
            .collect();

        Self {
            taken_at_s: snapshot.taken_at_secs(),
            emg_activity: estimate::emg_activity(&latest_emg),
            latest_force: snapshot.latest_force(),
            estimated_force: estimate::activity_to_force(&latest_emg, &peak_force),
            peak_force,
        }
    }
}

/// Logs a summary every `summary_every` frames and every frame at trace
pub struct TracingRenderSink {
    summary_every: u64,
    frames: u64,
    last: RenderFrame,
}

impl TracingRenderSink {
    pub fn new(summary_every: u64) -> Self {
        Self {
            summary_every: summary_every.max(1),
            frames: 0,
            last: RenderFrame::default(),
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> &RenderFrame {
        &self.last
    }
}

impl SnapshotSink for TracingRenderSink {
    fn name(&self) -> &str {
        "render"
    }

    fn consume(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        self.last = RenderFrame::from_snapshot(snapshot);
        self.frames += 1;

        trace!(frame = ?self.last, "render");
        if self.frames % self.summary_every == 0 {
            info!(
                t = format_args!("{:.2}", self.last.taken_at_s),
                emg_activity = self.last.emg_activity,
                force = ?self.last.latest_force,
                estimated = format_args!("{:.3}", self.last.estimated_force),
                "live"
            );
        }
        Ok(())
    }
}
