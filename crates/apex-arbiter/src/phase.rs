use core::fmt;

use serde::Serialize;

use crate::types::{OriginId, Sequence};

/// Display phase of an in-flight atomic, as shown by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPhase {
    Queued,
    Granted,
    Rmw,
    Ack,
    Retiring,
}

impl OpPhase {
    pub fn label(self) -> &'static str {
        match self {
            OpPhase::Queued => "QUEUED",
            OpPhase::Granted => "GRANTED",
            OpPhase::Rmw => "RMW→L2",
            OpPhase::Ack => "ACK←L2",
            OpPhase::Retiring => "RETIRING",
        }
    }
}

impl fmt::Display for OpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveOp {
    pub sequence: Sequence,
    pub origin: OriginId,
    pub phase: OpPhase,
    /// Virtual time the current phase started.
    pub phase_start_ns: u64,
}

/// One entry of the recent-grant ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecentGrant {
    pub sequence: Sequence,
    /// Cosmetic wait estimate; grows with queue depth at grant time.
    pub cycles: u32,
}
