//! Operand duplication for each branch kind.
//!
//! A probe must consume copies of the values the branch is about to test, so
//! the original instruction still finds its operands at the same depth and in
//! the same order. The plan is the instruction sequence that leaves those
//! copies (plus any site constants) on top of the stack.

use crate::error::TransformError;
use crate::ir::{ArrayKind, Constant, Insn, SlotKind};
use crate::site::{BranchSite, SiteShape};

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicationPlan {
    /// Kinds that must be on top of the stack, topmost last.
    pub requires: &'static [SlotKind],
    pub instructions: Vec<Insn>,
}

impl DuplicationPlan {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Checks that `stack`, the state in front of instruction `index`, holds
    /// the operands this plan duplicates.
    pub fn verify(&self, stack: &[SlotKind], index: usize) -> Result<(), TransformError> {
        if stack.len() < self.requires.len() {
            return Err(TransformError::StackUnderflow { index });
        }
        let top = &stack[stack.len() - self.requires.len()..];
        if top != self.requires {
            return Err(TransformError::StackMismatch {
                index,
                expected: render(self.requires),
                found: render(top),
            });
        }
        Ok(())
    }
}

fn render(kinds: &[SlotKind]) -> String {
    let names: Vec<String> = kinds.iter().map(|kind| kind.to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// Builds the duplication plan for `site`.
pub fn plan(site: &BranchSite) -> DuplicationPlan {
    match site.shape() {
        SiteShape::UnaryCompare => DuplicationPlan {
            requires: &[SlotKind::Int],
            instructions: vec![Insn::Dup],
        },
        SiteShape::NullCheck | SiteShape::ExceptionHandlerEntry => DuplicationPlan {
            requires: &[SlotKind::Reference],
            instructions: vec![Insn::Dup],
        },
        SiteShape::BinaryIntCompare => DuplicationPlan {
            requires: &[SlotKind::Int, SlotKind::Int],
            instructions: vec![Insn::Dup2],
        },
        SiteShape::BinaryRefCompare => DuplicationPlan {
            requires: &[SlotKind::Reference, SlotKind::Reference],
            instructions: vec![Insn::Dup2],
        },
        SiteShape::TableSwitch { min, max } => DuplicationPlan {
            requires: &[SlotKind::Int],
            instructions: vec![
                Insn::Dup,
                Insn::Const(Constant::Int(*min)),
                Insn::Const(Constant::Int(*max)),
            ],
        },
        SiteShape::LookupSwitch { keys } => {
            let mut instructions = Vec::with_capacity(3 + 4 * keys.len());
            instructions.push(Insn::Dup);
            instructions.push(Insn::Const(Constant::Int(keys.len() as i32)));
            instructions.push(Insn::NewArray(ArrayKind::Int));
            for (slot, key) in keys.iter().enumerate() {
                instructions.extend([
                    Insn::Dup,
                    Insn::Const(Constant::Int(slot as i32)),
                    Insn::Const(Constant::Int(*key)),
                    Insn::IaStore,
                ]);
            }
            DuplicationPlan {
                requires: &[SlotKind::Int],
                instructions,
            }
        }
    }
}
