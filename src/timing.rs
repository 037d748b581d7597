//! Call timing carried on the context.

use std::time::{Duration, Instant};

use crate::context::Context;

/// Start and end of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub start: Instant,
    pub end: Instant,
}

impl Timing {
    /// A window from `start` until now.
    pub fn since(start: Instant) -> Self {
        Self {
            start,
            end: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Derive a context carrying `timing`. The given context is not modified.
pub fn with_timing(ctx: &Context, timing: Timing) -> Context {
    ctx.with_value(timing)
}

/// The timing attached to `ctx`, if any.
pub fn timing(ctx: &Context) -> Option<Timing> {
    ctx.value::<Timing>().copied()
}
