use serde::Serialize;

use crate::types::{OriginId, Sequence};

/// Something the renderer can animate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceKind {
    Launched { origin: OriginId },
    Arrived { origin: OriginId },
    Admitted { origin: OriginId, sequence: Sequence },
    Stalled { origin: OriginId },
    Granted { origin: OriginId, sequence: Sequence },
    Departed { sequence: Sequence },
    BodyCleared { sequence: Sequence },
    L2Complete { sequence: Sequence },
    AckArrived { sequence: Sequence },
    Retired { origin: OriginId, sequence: Sequence },
    L2Locked { origin: OriginId },
    DataDelivered {
        origin: OriginId,
        sequence: Option<Sequence>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub at_ns: u64,
    #[serde(flatten)]
    pub kind: TraceKind,
}

/// Receives trace events as they happen.
pub trait StormObserver {
    fn on_event(&mut self, event: &TraceEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StormObserver for NoopObserver {
    fn on_event(&mut self, _event: &TraceEvent) {}
}

impl<F: FnMut(&TraceEvent)> StormObserver for F {
    fn on_event(&mut self, event: &TraceEvent) {
        self(event)
    }
}
