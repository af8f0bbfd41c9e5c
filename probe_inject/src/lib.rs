//! Branch-probe instrumentation for coverage-guided fuzzing of bytecode methods.
//!
//! The pass walks a method's instruction stream once and, in front of every
//! conditional jump, switch and exception-handler entry, injects a static call
//! to a *probe* function. Each probe receives copies of the operands the
//! branch is about to test plus a location hash, so the fuzzer can observe
//! which way the program went and with which values, while the original code
//! still sees its operands untouched.
//!
//! ## Getting Started
//!
//! Build a [`registry::ProbeRegistry`] once, then instrument methods with an
//! [`instrumentation::Instrumenter`] that shares it.
//!
//! ```
//! use std::sync::Arc;
//! use probe_inject::instrumentation::Instrumenter;
//! use probe_inject::ir::{Condition, Insn, LabelId, MethodBody, MethodIdentity, SlotKind};
//! use probe_inject::registry::ProbeRegistry;
//!
//! // 1. Register one probe per branch kind; all signatures are checked here.
//! let registry = ProbeRegistry::with_owner("fuzz/Probes").expect("valid probes");
//! let instrumenter = Instrumenter::new(Arc::new(registry));
//!
//! // 2. Describe the method as read from the class file.
//! let body = MethodBody::new(
//!     MethodIdentity::new("app/Main", "check", "(I)V"),
//!     vec![
//!         Insn::Load(SlotKind::Int, 0),
//!         Insn::IfZero { cond: Condition::Eq, target: LabelId(0) },
//!         Insn::Label(LabelId(0)),
//!         Insn::Return(None),
//!     ],
//! );
//!
//! // 3. Instrument and hand the result to a backend.
//! let mut written: Vec<probe_inject::InstrumentedMethod> = Vec::new();
//! let probes = instrumenter.run(body, &mut written).expect("instrumented");
//! assert_eq!(probes, 1);
//! assert_eq!(written[0].body.instructions.len(), 7);
//! ```
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod inject;
pub mod instrumentation;
pub mod ir;
pub mod plan;
pub mod registry;
pub mod site;
pub mod stack;

mod constants;

pub use error::{ConfigurationError, DescriptorError, TransformError};
pub use instrumentation::{InstrumentedMethod, Instrumenter, MethodSink, ProbeSite};
pub use registry::{ProbeDescriptor, ProbeRegistry};
pub use site::BranchKind;
