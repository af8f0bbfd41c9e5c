//! The method-level intermediate representation the pass operates on.
//!
//! A [`MethodBody`] is an ordered list of [`Insn`]s plus an exception table.
//! Control flow never refers to instructions by position: jumps, switch
//! targets, line-number markers and try/catch ranges all name a [`LabelId`],
//! and [`MethodBody::label_positions`] resolves those ids to indices for the
//! current layout. Inserting instructions therefore never invalidates a jump.
//!
//! Reading and writing the binary class format is the job of the embedding
//! driver; this module only models what the instrumentation needs.

use std::collections::HashMap;
use std::fmt;

use crate::descriptor::ValueKind;
use crate::error::TransformError;

/// An interned label identifier, unique within one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Identifies a method by its owning class, name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
    owner: String,
    name: String,
    descriptor: String,
}

impl MethodIdentity {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Internal name of the owning class, e.g. `com/example/Parser`.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// The verifier category of a single operand-stack or local-variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl SlotKind {
    /// Number of stack words the value occupies.
    pub fn width(self) -> usize {
        match self {
            SlotKind::Long | SlotKind::Double => 2,
            SlotKind::Int | SlotKind::Float | SlotKind::Reference => 1,
        }
    }

    pub fn is_category1(self) -> bool {
        self.width() == 1
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Int => "int",
            SlotKind::Long => "long",
            SlotKind::Float => "float",
            SlotKind::Double => "double",
            SlotKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Comparison performed by the integer conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// Element type of a primitive array created by `newarray`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Null,
    String(String),
}

impl Constant {
    pub fn slot_kind(&self) -> SlotKind {
        match self {
            Constant::Int(_) => SlotKind::Int,
            Constant::Long(_) => SlotKind::Long,
            Constant::Null | Constant::String(_) => SlotKind::Reference,
        }
    }
}

/// A single element of a method's instruction stream.
///
/// `Label`, `LineNumber` and `Frame` are pseudo instructions: they occupy a
/// position in the stream but are never executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Label(LabelId),
    LineNumber {
        line: u32,
        start: LabelId,
    },
    /// A verifier frame marker. Carried through untouched.
    Frame {
        locals: Vec<ValueKind>,
        stack: Vec<ValueKind>,
    },
    Nop,
    Const(Constant),
    Load(SlotKind, u16),
    Store(SlotKind, u16),
    Pop,
    Pop2,
    Dup,
    Dup2,
    Swap,
    IAdd,
    ISub,
    IMul,
    ArrayLength,
    NewArray(ArrayKind),
    IaLoad,
    IaStore,
    New(String),
    IfZero {
        cond: Condition,
        target: LabelId,
    },
    IfICmp {
        cond: Condition,
        target: LabelId,
    },
    IfACmpEq(LabelId),
    IfACmpNe(LabelId),
    IfNull(LabelId),
    IfNonNull(LabelId),
    Goto(LabelId),
    TableSwitch {
        min: i32,
        max: i32,
        default: LabelId,
        targets: Vec<LabelId>,
    },
    /// Match keys are kept in the order they were declared.
    LookupSwitch {
        default: LabelId,
        cases: Vec<(i32, LabelId)>,
    },
    InvokeStatic {
        owner: String,
        name: String,
        descriptor: String,
    },
    Return(Option<SlotKind>),
    AThrow,
}

impl Insn {
    /// Source-line and verifier-frame markers carry no semantics of their own.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Insn::LineNumber { .. } | Insn::Frame { .. })
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, Insn::Label(_)) || self.is_metadata()
    }

    /// Labels this instruction may transfer control to, excluding fall-through.
    pub fn jump_targets(&self) -> Vec<LabelId> {
        match self {
            Insn::IfZero { target, .. } | Insn::IfICmp { target, .. } => vec![*target],
            Insn::IfACmpEq(target)
            | Insn::IfACmpNe(target)
            | Insn::IfNull(target)
            | Insn::IfNonNull(target)
            | Insn::Goto(target) => vec![*target],
            Insn::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Insn::LookupSwitch { default, cases } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether execution can continue with the next instruction in the stream.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Insn::Goto(_)
                | Insn::TableSwitch { .. }
                | Insn::LookupSwitch { .. }
                | Insn::Return(_)
                | Insn::AThrow
        )
    }
}

/// One entry of a method's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// First instruction covered, inclusive.
    pub start: LabelId,
    /// End of the covered range, exclusive.
    pub end: LabelId,
    /// Entry point of the handler code.
    pub handler: LabelId,
    /// Internal name of the caught class; `None` catches everything.
    pub catch_type: Option<String>,
}

/// A method body as handed to the pass by the class reader.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    pub identity: MethodIdentity,
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Insn>,
    pub handlers: Vec<TryCatchBlock>,
}

impl MethodBody {
    pub fn new(identity: MethodIdentity, instructions: Vec<Insn>) -> Self {
        Self {
            identity,
            max_stack: 0,
            max_locals: 0,
            instructions,
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, block: TryCatchBlock) -> Self {
        self.handlers.push(block);
        self
    }

    pub fn with_max_locals(mut self, max_locals: u16) -> Self {
        self.max_locals = max_locals;
        self
    }

    /// Resolves every label to its current position in the stream.
    ///
    /// Fails if a label is defined twice, or if a jump, switch, line-number
    /// marker or exception-table entry names a label that is never defined.
    pub fn label_positions(&self) -> Result<HashMap<LabelId, usize>, TransformError> {
        let mut positions = HashMap::new();
        for (index, insn) in self.instructions.iter().enumerate() {
            if let Insn::Label(label) = insn {
                if positions.insert(*label, index).is_some() {
                    return Err(TransformError::DuplicateLabel { label: *label });
                }
            }
        }

        let mut referenced = Vec::new();
        for insn in &self.instructions {
            referenced.extend(insn.jump_targets());
            if let Insn::LineNumber { start, .. } = insn {
                referenced.push(*start);
            }
        }
        for block in &self.handlers {
            referenced.extend([block.start, block.end, block.handler]);
        }
        if let Some(label) = referenced
            .into_iter()
            .find(|label| !positions.contains_key(label))
        {
            return Err(TransformError::UndefinedLabel { label });
        }

        Ok(positions)
    }
}
