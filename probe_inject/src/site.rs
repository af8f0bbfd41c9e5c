//! Classification of instrumentable branch sites.

use std::collections::HashSet;
use std::fmt;

use crate::error::TransformError;
use crate::ir::{Insn, LabelId, TryCatchBlock};

/// The category of a branch site. Fixes both the operands the probe receives
/// and the probe's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchKind {
    /// Conditional jump on a single int.
    UnaryCompare,
    /// Conditional jump comparing two ints.
    BinaryIntCompare,
    /// Conditional jump comparing two references.
    BinaryRefCompare,
    /// Jump on a reference being (non-)null.
    NullCheck,
    TableSwitch,
    LookupSwitch,
    /// Entry of an exception handler, where the caught value is on the stack.
    ExceptionHandlerEntry,
}

impl BranchKind {
    pub const ALL: [BranchKind; 7] = [
        BranchKind::UnaryCompare,
        BranchKind::BinaryIntCompare,
        BranchKind::BinaryRefCompare,
        BranchKind::NullCheck,
        BranchKind::TableSwitch,
        BranchKind::LookupSwitch,
        BranchKind::ExceptionHandlerEntry,
    ];

    /// Position of the kind in [`BranchKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BranchKind::UnaryCompare => "unary-compare",
            BranchKind::BinaryIntCompare => "binary-int-compare",
            BranchKind::BinaryRefCompare => "binary-ref-compare",
            BranchKind::NullCheck => "null-check",
            BranchKind::TableSwitch => "table-switch",
            BranchKind::LookupSwitch => "lookup-switch",
            BranchKind::ExceptionHandlerEntry => "exception-handler-entry",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The shape of a site: its kind together with the values its probe
/// receives besides the duplicated operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteShape {
    UnaryCompare,
    BinaryIntCompare,
    BinaryRefCompare,
    NullCheck,
    TableSwitch { min: i32, max: i32 },
    /// Match keys in declared order.
    LookupSwitch { keys: Vec<i32> },
    ExceptionHandlerEntry,
}

impl SiteShape {
    pub fn kind(&self) -> BranchKind {
        match self {
            SiteShape::UnaryCompare => BranchKind::UnaryCompare,
            SiteShape::BinaryIntCompare => BranchKind::BinaryIntCompare,
            SiteShape::BinaryRefCompare => BranchKind::BinaryRefCompare,
            SiteShape::NullCheck => BranchKind::NullCheck,
            SiteShape::TableSwitch { .. } => BranchKind::TableSwitch,
            SiteShape::LookupSwitch { .. } => BranchKind::LookupSwitch,
            SiteShape::ExceptionHandlerEntry => BranchKind::ExceptionHandlerEntry,
        }
    }
}

/// An instruction the pass places a probe in front of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSite {
    anchor: usize,
    shape: SiteShape,
}

impl BranchSite {
    fn new(shape: SiteShape, anchor: usize) -> Self {
        Self { anchor, shape }
    }

    pub fn kind(&self) -> BranchKind {
        self.shape.kind()
    }

    /// Index, in the original stream, of the instruction the probe precedes.
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn shape(&self) -> &SiteShape {
        &self.shape
    }
}

/// Collects the entry labels of all exception handlers.
pub fn handler_labels<'a>(
    handlers: impl IntoIterator<Item = &'a TryCatchBlock>,
) -> HashSet<LabelId> {
    handlers.into_iter().map(|block| block.handler).collect()
}

/// Classifies the instruction at `index`.
///
/// For handler labels the returned site is anchored at the first instruction
/// after the label that is not a line-number or frame marker; that is where
/// the caught value is available on the stack.
pub fn classify(
    insns: &[Insn],
    index: usize,
    handlers: &HashSet<LabelId>,
) -> Result<Option<BranchSite>, TransformError> {
    let site = match &insns[index] {
        Insn::IfZero { .. } => BranchSite::new(SiteShape::UnaryCompare, index),
        Insn::IfICmp { .. } => BranchSite::new(SiteShape::BinaryIntCompare, index),
        Insn::IfACmpEq(_) | Insn::IfACmpNe(_) => {
            BranchSite::new(SiteShape::BinaryRefCompare, index)
        }
        Insn::IfNull(_) | Insn::IfNonNull(_) => BranchSite::new(SiteShape::NullCheck, index),
        Insn::TableSwitch { min, max, .. } => BranchSite::new(
            SiteShape::TableSwitch {
                min: *min,
                max: *max,
            },
            index,
        ),
        Insn::LookupSwitch { cases, .. } => BranchSite::new(
            SiteShape::LookupSwitch {
                keys: cases.iter().map(|(key, _)| *key).collect(),
            },
            index,
        ),
        Insn::Label(label) if handlers.contains(label) => {
            let anchor = insns[index + 1..]
                .iter()
                .position(|insn| !insn.is_metadata())
                .map(|offset| index + 1 + offset)
                .ok_or(TransformError::NoHandlerAnchor { label: *label })?;
            BranchSite::new(SiteShape::ExceptionHandlerEntry, anchor)
        }
        _ => return Ok(None),
    };
    Ok(Some(site))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Condition, SlotKind};
    use assert_matches::assert_matches;

    fn no_handlers() -> HashSet<LabelId> {
        HashSet::new()
    }

    #[test]
    fn conditional_jumps_map_to_their_kinds() {
        let target = LabelId(0);
        let cases = [
            (
                Insn::IfZero {
                    cond: Condition::Ge,
                    target,
                },
                BranchKind::UnaryCompare,
            ),
            (
                Insn::IfICmp {
                    cond: Condition::Ne,
                    target,
                },
                BranchKind::BinaryIntCompare,
            ),
            (Insn::IfACmpNe(target), BranchKind::BinaryRefCompare),
            (Insn::IfNonNull(target), BranchKind::NullCheck),
        ];
        for (insn, kind) in cases {
            let site = classify(&[insn], 0, &no_handlers()).unwrap().unwrap();
            assert_eq!(site.kind(), kind);
            assert_eq!(site.anchor(), 0);
            assert_eq!(site.shape().kind(), kind);
        }
    }

    #[test]
    fn lookup_switch_keeps_declared_key_order() {
        let insn = Insn::LookupSwitch {
            default: LabelId(0),
            cases: vec![(9, LabelId(1)), (1, LabelId(2)), (5, LabelId(3))],
        };
        let site = classify(&[insn], 0, &no_handlers()).unwrap().unwrap();
        assert_eq!(
            site.shape(),
            &SiteShape::LookupSwitch {
                keys: vec![9, 1, 5]
            }
        );
    }

    #[test]
    fn handler_anchor_skips_metadata_but_not_code() {
        let insns = vec![
            Insn::Label(LabelId(4)),
            Insn::LineNumber {
                line: 12,
                start: LabelId(4),
            },
            Insn::Frame {
                locals: vec![],
                stack: vec![],
            },
            Insn::Store(SlotKind::Reference, 1),
        ];
        let handlers = HashSet::from([LabelId(4)]);
        let site = classify(&insns, 0, &handlers).unwrap().unwrap();
        assert_eq!(site.kind(), BranchKind::ExceptionHandlerEntry);
        assert_eq!(site.anchor(), 3);
    }

    #[test]
    fn plain_labels_are_not_sites() {
        let insns = vec![Insn::Label(LabelId(1)), Insn::Return(None)];
        assert_eq!(classify(&insns, 0, &no_handlers()).unwrap(), None);
    }

    #[test]
    fn handler_without_code_is_an_error() {
        let insns = vec![
            Insn::Label(LabelId(2)),
            Insn::LineNumber {
                line: 1,
                start: LabelId(2),
            },
        ];
        let handlers = HashSet::from([LabelId(2)]);
        assert_matches!(
            classify(&insns, 0, &handlers),
            Err(TransformError::NoHandlerAnchor { label: LabelId(2) })
        );
    }
}
