//! Bracket matching.
//!
//! Pairs every `[` with the nearest later `]` at its own nesting depth, so
//! the engine can take loop jumps in O(1).

use crate::{BracketKind, EngineError, Instruction, Program};

/// Partner positions for every loop bracket in a program.
///
/// `get(p)` is `Some` exactly for positions holding `[` or `]`, and for every
/// matched pair `(p, q)` both `get(p) == Some(q)` and `get(q) == Some(p)` hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpTable {
    targets: Vec<Option<usize>>,
    pairs: usize,
}

impl JumpTable {
    /// Matching position for the bracket at `ip`.
    pub fn get(&self, ip: usize) -> Option<usize> {
        self.targets.get(ip).copied().flatten()
    }

    /// Number of positions with an entry (twice the number of loops).
    pub fn len(&self) -> usize {
        self.pairs * 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Iterate over `(position, partner)` entries in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(ip, target)| target.map(|t| (ip, t)))
    }
}

/// Build the jump table for `program`, failing on the first unbalanced bracket.
///
/// A `]` with no open `[` is reported at its own position. If `[`s remain
/// open at the end, the innermost one is reported.
pub fn match_brackets(program: &Program) -> Result<JumpTable, EngineError> {
    let mut targets: Vec<Option<usize>> = vec![None; program.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = 0;

    for (i, instr) in program.instructions().iter().enumerate() {
        match instr {
            Instruction::LoopStart => stack.push(i),
            Instruction::LoopEnd => {
                let Some(open_index) = stack.pop() else {
                    return Err(EngineError::UnbalancedBrackets {
                        ip: i,
                        kind: BracketKind::Close,
                    });
                };
                targets[open_index] = Some(i);
                targets[i] = Some(open_index);
                pairs += 1;
            }
            _ => {}
        }
    }

    if let Some(unmatched_open) = stack.last().copied() {
        return Err(EngineError::UnbalancedBrackets {
            ip: unmatched_open,
            kind: BracketKind::Open,
        });
    }

    Ok(JumpTable { targets, pairs })
}
