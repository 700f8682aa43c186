//! Progress reporting and cooperative cancellation for long builds.
use crate::errors::AnalysisError;

/// Answer of a progress sink at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Cancel,
}

/// Receives stage updates while the graphs are built.
pub trait ProgressSink {
    /// Report progress; `fraction` is in `0.0..=1.0`.
    fn report(&mut self, stage: &str, message: &str, fraction: f32) -> Checkpoint;

    /// Called once when a build finishes or is cancelled.
    fn clear(&mut self);
}

/// Sink that ignores every report and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _stage: &str, _message: &str, _fraction: f32) -> Checkpoint {
        Checkpoint::Continue
    }

    fn clear(&mut self) {}
}

/// Sink that forwards reports to `tracing`: one `debug!` per stage change,
/// `trace!` for individual steps.
#[derive(Debug, Default)]
pub struct TracingProgress {
    stage: String,
}

impl ProgressSink for TracingProgress {
    fn report(&mut self, stage: &str, message: &str, fraction: f32) -> Checkpoint {
        if self.stage != stage {
            self.stage.clear();
            self.stage.push_str(stage);
            tracing::debug!(stage, "analysis stage started");
        }
        tracing::trace!(stage, fraction, "{message}");
        Checkpoint::Continue
    }

    fn clear(&mut self) {
        if !self.stage.is_empty() {
            tracing::debug!(stage = %self.stage, "analysis finished");
        }
        self.stage.clear();
    }
}

/// Slice of the whole build's `0.0..=1.0` range owned by one stage.
pub(crate) type Span = (f32, f32);

/// Stage spans in build order; adjacent spans share their boundary.
pub(crate) const COLLECT_SPAN: Span = (0.0, 0.3);
pub(crate) const INVERT_SPAN: Span = (0.3, 0.6);
pub(crate) const DESCRIBE_SPAN: Span = (0.6, 0.7);
pub(crate) const REFERENCES_SPAN: Span = (0.7, 1.0);

/// Map a stage-local fraction onto its span.
pub(crate) fn within(span: Span, t: f32) -> f32 {
    lerp(span.0, span.1, t)
}

/// Linear interpolation used to map per-stage progress onto the whole build.
#[must_use]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Report one step; a `Cancel` answer clears the sink and becomes an error.
pub(crate) fn checkpoint(
    sink: &mut dyn ProgressSink,
    stage: &str,
    message: &str,
    fraction: f32,
) -> Result<(), AnalysisError> {
    match sink.report(stage, message, fraction) {
        Checkpoint::Continue => Ok(()),
        Checkpoint::Cancel => {
            sink.clear();
            tracing::debug!(stage, "analysis cancelled");
            Err(AnalysisError::Cancelled { stage: stage.to_string() })
        }
    }
}

/// Fraction of `done` out of `total`, 1.0 for empty stages.
pub(crate) fn ratio(done: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        done as f32 / total as f32
    }
}
