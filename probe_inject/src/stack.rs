//! Operand-stack analysis.
//!
//! Computes the stack shape in front of every instruction by abstract
//! interpretation over the control-flow graph. The pass uses the result twice:
//! on the original body, to check that each probe's duplicated operands are
//! really there, and on the instrumented body, to make sure the spliced code
//! left every program point consistent and to recompute `max_stack`.

use std::collections::HashMap;

use crate::descriptor::MethodSignature;
use crate::error::TransformError;
use crate::ir::{Insn, LabelId, MethodBody, SlotKind};

/// Stack contents, bottom first.
pub type StackState = Vec<SlotKind>;

#[derive(Debug, Clone)]
pub struct StackAnalysis {
    states: Vec<Option<StackState>>,
    max_words: usize,
}

impl StackAnalysis {
    /// The stack in front of instruction `index`, `None` when it is unreachable.
    pub fn state_at(&self, index: usize) -> Option<&[SlotKind]> {
        self.states.get(index)?.as_deref()
    }

    /// Largest stack size reached anywhere, in words.
    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

/// Runs the analysis over `body`. `labels` must come from
/// [`MethodBody::label_positions`] on the same body.
pub fn analyze(
    body: &MethodBody,
    labels: &HashMap<LabelId, usize>,
) -> Result<StackAnalysis, TransformError> {
    let insns = &body.instructions;
    let mut states: Vec<Option<StackState>> = vec![None; insns.len()];
    let mut max_words = 0;
    if insns.is_empty() {
        return Ok(StackAnalysis { states, max_words });
    }

    // Handler ranges as (start, end, handler) positions.
    let ranges = body
        .handlers
        .iter()
        .map(|block| {
            Ok((
                position(labels, block.start)?,
                position(labels, block.end)?,
                position(labels, block.handler)?,
            ))
        })
        .collect::<Result<Vec<(usize, usize, usize)>, TransformError>>()?;

    let mut worklist = vec![0];
    states[0] = Some(Vec::new());

    while let Some(index) = worklist.pop() {
        let Some(before) = states[index].clone() else {
            continue;
        };
        max_words = max_words.max(words(&before));

        for &(start, end, handler) in &ranges {
            if (start..end).contains(&index) {
                merge(&mut states, &mut worklist, handler, vec![SlotKind::Reference])?;
            }
        }

        let insn = &insns[index];
        let mut stack = before;
        execute(insn, index, &mut stack)?;
        max_words = max_words.max(words(&stack));

        for target in insn.jump_targets() {
            merge(&mut states, &mut worklist, position(labels, target)?, stack.clone())?;
        }
        if insn.falls_through() {
            if index + 1 >= insns.len() {
                return Err(TransformError::FallsOffEnd { index });
            }
            merge(&mut states, &mut worklist, index + 1, stack)?;
        }
    }

    Ok(StackAnalysis { states, max_words })
}

fn position(labels: &HashMap<LabelId, usize>, label: LabelId) -> Result<usize, TransformError> {
    labels
        .get(&label)
        .copied()
        .ok_or(TransformError::UndefinedLabel { label })
}

fn words(stack: &[SlotKind]) -> usize {
    stack.iter().map(|slot| slot.width()).sum()
}

fn merge(
    states: &mut [Option<StackState>],
    worklist: &mut Vec<usize>,
    index: usize,
    incoming: StackState,
) -> Result<(), TransformError> {
    match &states[index] {
        None => {
            states[index] = Some(incoming);
            worklist.push(index);
            Ok(())
        }
        Some(existing) if *existing == incoming => Ok(()),
        Some(_) => Err(TransformError::InconsistentStack { index }),
    }
}

/// Applies the stack effect of `insn` to `stack`.
fn execute(insn: &Insn, index: usize, stack: &mut StackState) -> Result<(), TransformError> {
    let mut ops = Operands { stack, index };
    match insn {
        Insn::Label(_) | Insn::LineNumber { .. } | Insn::Frame { .. } | Insn::Nop => {}
        Insn::Goto(_) | Insn::Return(None) => {}
        Insn::Const(constant) => ops.push(constant.slot_kind()),
        Insn::New(_) => ops.push(SlotKind::Reference),
        Insn::Load(kind, _) => ops.push(*kind),
        Insn::Store(kind, _) | Insn::Return(Some(kind)) => ops.pop(*kind)?,
        Insn::Pop => {
            ops.pop_category1()?;
        }
        Insn::Pop2 => {
            if ops.pop_any()?.is_category1() {
                ops.pop_category1()?;
            }
        }
        Insn::Dup => {
            let top = ops.pop_category1()?;
            ops.push(top);
            ops.push(top);
        }
        Insn::Dup2 => {
            let top = ops.pop_any()?;
            if top.is_category1() {
                let below = ops.pop_category1()?;
                ops.push(below);
                ops.push(top);
                ops.push(below);
                ops.push(top);
            } else {
                ops.push(top);
                ops.push(top);
            }
        }
        Insn::Swap => {
            let top = ops.pop_category1()?;
            let below = ops.pop_category1()?;
            ops.push(top);
            ops.push(below);
        }
        Insn::IAdd | Insn::ISub | Insn::IMul => {
            ops.pop(SlotKind::Int)?;
            ops.pop(SlotKind::Int)?;
            ops.push(SlotKind::Int);
        }
        Insn::ArrayLength => {
            ops.pop(SlotKind::Reference)?;
            ops.push(SlotKind::Int);
        }
        Insn::NewArray(_) => {
            ops.pop(SlotKind::Int)?;
            ops.push(SlotKind::Reference);
        }
        Insn::IaLoad => {
            ops.pop(SlotKind::Int)?;
            ops.pop(SlotKind::Reference)?;
            ops.push(SlotKind::Int);
        }
        Insn::IaStore => {
            ops.pop(SlotKind::Int)?;
            ops.pop(SlotKind::Int)?;
            ops.pop(SlotKind::Reference)?;
        }
        Insn::IfZero { .. } | Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
            ops.pop(SlotKind::Int)?;
        }
        Insn::IfICmp { .. } => {
            ops.pop(SlotKind::Int)?;
            ops.pop(SlotKind::Int)?;
        }
        Insn::IfACmpEq(_) | Insn::IfACmpNe(_) => {
            ops.pop(SlotKind::Reference)?;
            ops.pop(SlotKind::Reference)?;
        }
        Insn::IfNull(_) | Insn::IfNonNull(_) | Insn::AThrow => {
            ops.pop(SlotKind::Reference)?;
        }
        Insn::InvokeStatic { descriptor, .. } => {
            let signature = MethodSignature::parse(descriptor)
                .map_err(|source| TransformError::InvalidInvokeDescriptor { index, source })?;
            for param in signature.params().iter().rev() {
                if let Some(kind) = param.slot_kind() {
                    ops.pop(kind)?;
                }
            }
            if let Some(kind) = signature.return_kind().slot_kind() {
                ops.push(kind);
            }
        }
    }
    Ok(())
}

struct Operands<'a> {
    stack: &'a mut StackState,
    index: usize,
}

impl Operands<'_> {
    fn push(&mut self, kind: SlotKind) {
        self.stack.push(kind);
    }

    fn pop_any(&mut self) -> Result<SlotKind, TransformError> {
        self.stack
            .pop()
            .ok_or(TransformError::StackUnderflow { index: self.index })
    }

    fn pop(&mut self, expected: SlotKind) -> Result<(), TransformError> {
        let found = self.pop_any()?;
        if found != expected {
            return Err(TransformError::StackMismatch {
                index: self.index,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn pop_category1(&mut self) -> Result<SlotKind, TransformError> {
        let found = self.pop_any()?;
        if !found.is_category1() {
            return Err(TransformError::StackMismatch {
                index: self.index,
                expected: "category 1 value".to_string(),
                found: found.to_string(),
            });
        }
        Ok(found)
    }
}
