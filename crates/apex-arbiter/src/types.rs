use core::fmt;

use serde::Serialize;

/// Transaction identifier stamped on every admitted atomic request.
///
/// Sequences are strictly increasing within a session and only restart after
/// [`crate::Arbiter::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SEQ#{}", self.0)
    }
}

/// Opaque identifier of the compute unit (SM) that issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OriginId(pub u32);

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SM{}", self.0)
    }
}

/// Atomic operation tag. Informational only: arbitration never looks at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AtomicKind {
    #[default]
    Add,
    Sub,
    Inc,
    Dec,
    Min,
    Max,
    And,
    Or,
    Xor,
    Exch,
    Cas,
}

impl AtomicKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AtomicKind::Add => "ATOM.ADD",
            AtomicKind::Sub => "ATOM.SUB",
            AtomicKind::Inc => "ATOM.INC",
            AtomicKind::Dec => "ATOM.DEC",
            AtomicKind::Min => "ATOM.MIN",
            AtomicKind::Max => "ATOM.MAX",
            AtomicKind::And => "ATOM.AND",
            AtomicKind::Or => "ATOM.OR",
            AtomicKind::Xor => "ATOM.XOR",
            AtomicKind::Exch => "ATOM.EXCH",
            AtomicKind::Cas => "ATOM.CAS",
        }
    }
}

impl fmt::Display for AtomicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
