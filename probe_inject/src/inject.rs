//! Assembly of probe calls into the output stream.
//!
//! The pass copies the original instructions into a fresh stream, so a probe
//! is spliced "before" its anchor simply by appending it right before the
//! anchor is copied. Every probe is `[duplicate ops.., push hash, call probe]`.

use crate::constants::PROBE_CALL_LEN;
use crate::ir::{Constant, Insn};
use crate::plan::DuplicationPlan;
use crate::registry::ProbeDescriptor;

/// Builds the instrumented instruction stream.
#[derive(Debug, Default)]
pub struct ProbeInjector {
    output: Vec<Insn>,
}

impl ProbeInjector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: Vec::with_capacity(capacity),
        }
    }

    /// Copies an original instruction.
    pub fn push(&mut self, insn: Insn) {
        self.output.push(insn);
    }

    /// Index the anchor will occupy once a probe for each of `plans` is spliced
    /// in front of it. Includes every instruction inserted so far.
    pub fn anchor_index<'a>(&self, plans: impl IntoIterator<Item = &'a DuplicationPlan>) -> usize {
        self.output.len()
            + plans
                .into_iter()
                .map(|plan| plan.len() + PROBE_CALL_LEN)
                .sum::<usize>()
    }

    /// Appends the probe sequence. The next instruction pushed is the anchor.
    pub fn inject(&mut self, plan: DuplicationPlan, hash: i32, probe: &ProbeDescriptor) {
        self.output.extend(probe_sequence(plan, hash, probe));
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn finish(self) -> Vec<Insn> {
        self.output
    }
}

/// The complete instruction sequence for one probe call.
pub fn probe_sequence(plan: DuplicationPlan, hash: i32, probe: &ProbeDescriptor) -> Vec<Insn> {
    let mut sequence = plan.instructions;
    sequence.push(Insn::Const(Constant::Int(hash)));
    sequence.push(probe.invoke());
    sequence
}
