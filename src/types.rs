use std::fmt;
use std::str::FromStr;

/// Terminal result of a vertex as seen by its successors.
///
/// - `Invalid`: the vertex has not finished in the current run.
/// - `Ok`: the vertex ran (or was a satisfied control node) and reported success.
/// - `Err`: the vertex failed, or was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Outcome {
    Invalid = 0,
    Ok = 1,
    Err = 2,
}

impl Outcome {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Outcome::Ok,
            2 => Outcome::Err,
            _ => Outcome::Invalid,
        }
    }

    /// Outcome implied by a processor return code (`0` is success).
    pub fn from_code(code: i32) -> Self {
        if code == 0 { Outcome::Ok } else { Outcome::Err }
    }

    pub fn is_terminal(self) -> bool {
        self != Outcome::Invalid
    }
}

/// Finer-grained per-vertex status, distinguishing "ran and failed" from
/// "never ran".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexCode {
    Invalid = 0,
    Ok = 1,
    Err = 2,
    /// The vertex body was not executed (mask mismatch, missing input,
    /// unregistered processor, control node).
    Skip = 3,
}

impl VertexCode {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => VertexCode::Ok,
            2 => VertexCode::Err,
            3 => VertexCode::Skip,
            _ => VertexCode::Invalid,
        }
    }
}

/// Bitset over {OK, ERR} describing which predecessor outcomes satisfy an
/// edge.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutcomeMask(u8);

impl OutcomeMask {
    pub const OK: OutcomeMask = OutcomeMask(Outcome::Ok as u8);
    pub const ERR: OutcomeMask = OutcomeMask(Outcome::Err as u8);
    pub const ALL: OutcomeMask = OutcomeMask(Outcome::Ok as u8 | Outcome::Err as u8);

    /// Whether a predecessor that finished with `outcome` satisfies this edge.
    ///
    /// `Outcome::Invalid` never matches.
    pub fn matches(self, outcome: Outcome) -> bool {
        self.0 & outcome as u8 != 0
    }

    pub fn intersect(self, other: OutcomeMask) -> OutcomeMask {
        OutcomeMask(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Short label used in diagnostics and the DOT export.
    pub fn label(self) -> &'static str {
        match self {
            OutcomeMask::OK => "ok",
            OutcomeMask::ERR => "err",
            OutcomeMask::ALL => "all",
            _ => "none",
        }
    }
}

impl Default for OutcomeMask {
    fn default() -> Self {
        OutcomeMask::ALL
    }
}

impl fmt::Debug for OutcomeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutcomeMask({})", self.label())
    }
}

impl FromStr for OutcomeMask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Ok(OutcomeMask::OK),
            "err" | "error" => Ok(OutcomeMask::ERR),
            "all" | "any" => Ok(OutcomeMask::ALL),
            other => Err(format!(
                "invalid outcome mask: {other} (expected \"ok\", \"err\" or \"all\")"
            )),
        }
    }
}
