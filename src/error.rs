use std::fmt;

use crate::Instruction;

/// Errors that abort a run. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A loop bracket has no partner at the same nesting depth.
    #[error("unmatched bracket {kind} at instruction {ip}")]
    UnbalancedBrackets { ip: usize, kind: BracketKind },

    /// The data pointer attempted to move left of cell 0 or beyond the last cell.
    #[error("data pointer out of bounds at instruction {ip} (ptr={ptr}, op='{instruction}')")]
    TapeBoundsExceeded {
        ip: usize,
        ptr: usize,
        instruction: Instruction,
    },

    /// An input instruction ran after the input source reached end-of-file.
    #[error("input exhausted at instruction {ip}")]
    InputExhausted { ip: usize },

    /// Reading from the input source or writing to the output sink failed.
    #[error("I/O error at instruction {ip}: {source}")]
    Io {
        ip: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("execution aborted: step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize },

    /// The cancel flag handed to the engine was raised.
    #[error("execution aborted: cancelled")]
    Canceled,
}

impl EngineError {
    /// Position of the failing instruction, when the error has one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            EngineError::UnbalancedBrackets { ip, .. }
            | EngineError::TapeBoundsExceeded { ip, .. }
            | EngineError::InputExhausted { ip }
            | EngineError::Io { ip, .. } => Some(*ip),
            EngineError::StepLimitExceeded { .. } | EngineError::Canceled => None,
        }
    }
}

/// Which side of the loop was unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Open,
    Close,
}

impl fmt::Display for BracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketKind::Open => write!(f, "'['"),
            BracketKind::Close => write!(f, "']'"),
        }
    }
}
