//! This module drives the instrumentation of individual methods for
//! coverage-guided fuzzing, injecting a probe call in front of every
//! data-dependent control-flow decision.
//!
//! For each method the pass:
//! 1.  Resolves all labels and collects the entry labels of exception handlers.
//! 2.  Computes the operand stack in front of every instruction.
//! 3.  Copies the instruction stream in a single forward scan. Before each
//!     branch site it splices the operand duplication, the location hash and
//!     the static call to the probe registered for that branch kind.
//! 4.  Re-verifies the stack of the new stream, updates `max_stack`, and hands
//!     the result to the backend.
//!
//! A failing pass never reaches the backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use slog::{Discard, Logger, debug, info, o, warn};

use crate::error::TransformError;
use crate::hash::location_hash;
use crate::inject::ProbeInjector;
use crate::ir::{MethodBody, MethodIdentity};
use crate::plan::{self, DuplicationPlan};
use crate::registry::{ProbeDescriptor, ProbeRegistry};
use crate::site::{BranchKind, BranchSite, classify, handler_labels};
use crate::stack::{self, StackAnalysis};

/// A probe call injected into a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSite {
    pub kind: BranchKind,
    /// Index of the anchor instruction in the instrumented stream.
    pub index: usize,
    pub hash: i32,
}

/// The result of one successful pass.
#[derive(Debug, Clone)]
pub struct InstrumentedMethod {
    pub body: MethodBody,
    /// One entry per injected probe, in stream order.
    pub probes: Vec<ProbeSite>,
}

/// Receives finished methods, typically to serialize them.
pub trait MethodSink {
    fn accept(&mut self, method: InstrumentedMethod) -> Result<()>;
}

impl MethodSink for Vec<InstrumentedMethod> {
    fn accept(&mut self, method: InstrumentedMethod) -> Result<()> {
        self.push(method);
        Ok(())
    }
}

/// Adapts a closure into a [`MethodSink`].
pub struct FnSink<F>(pub F);

impl<F> MethodSink for FnSink<F>
where
    F: FnMut(InstrumentedMethod) -> Result<()>,
{
    fn accept(&mut self, method: InstrumentedMethod) -> Result<()> {
        (self.0)(method)
    }
}

/// Outcome of instrumenting a batch of methods.
#[derive(Debug, Default)]
pub struct InstrumentationReport {
    pub instrumented: usize,
    pub probes: usize,
    pub failures: Vec<(MethodIdentity, anyhow::Error)>,
}

/// Instruments methods against a shared, already validated probe registry.
///
/// Holds no per-method state; cloning is cheap and clones can run on
/// different threads.
#[derive(Clone)]
pub struct Instrumenter {
    registry: Arc<ProbeRegistry>,
    log: Logger,
}

impl Instrumenter {
    pub fn new(registry: Arc<ProbeRegistry>) -> Self {
        Self {
            registry,
            log: Logger::root(Discard, o!()),
        }
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Runs the pass over one method and returns the instrumented body along
    /// with a record of every probe spliced into it.
    ///
    /// The body is consumed; on success its exception table and `max_locals`
    /// are carried over unchanged and `max_stack` is raised to cover the
    /// duplicated operands.
    ///
    /// # Arguments
    ///
    /// * `body` - The method as read from the class file. Labels must be
    ///   unique and every referenced label defined.
    ///
    /// # Errors
    ///
    /// Any [`TransformError`]: a malformed label layout, an operand stack that
    /// does not match what a branch expects, or a handler with no code after it.
    pub fn instrument_method(&self, body: MethodBody) -> Result<InstrumentedMethod, TransformError> {
        let labels = body.label_positions()?;
        let handlers = handler_labels(&body.handlers);
        let analysis = stack::analyze(&body, &labels)?;

        let MethodBody {
            identity,
            max_stack,
            max_locals,
            instructions,
            handlers: exception_table,
        } = body;

        let mut injector = ProbeInjector::with_capacity(instructions.len() * 2);
        let mut probes = Vec::new();
        // Handler sites wait here until the scan reaches their anchor.
        let mut pending: Vec<BranchSite> = Vec::new();

        for (index, insn) in instructions.iter().enumerate() {
            let (mut ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut pending)
                .into_iter()
                .partition(|site| site.anchor() == index);
            pending = waiting;

            match classify(&instructions, index, &handlers)? {
                Some(site) if site.anchor() == index => ready.push(site),
                Some(site) => pending.push(site),
                None => {}
            }

            let mut spliced = Vec::with_capacity(ready.len());
            for site in &ready {
                if let Some(prepared) = self.prepare(&analysis, site)? {
                    spliced.push(prepared);
                }
            }
            if spliced.is_empty() {
                injector.push(insn.clone());
                continue;
            }
            // Every probe spliced here precedes the same anchor and reports
            // the index it ends up at.
            let anchor = injector.anchor_index(spliced.iter().map(|(_, _, plan)| plan));
            let hash = location_hash(&identity, anchor);
            for (kind, probe, plan) in spliced {
                injector.inject(plan, hash, probe);
                debug!(self.log, "injected probe";
                    "kind" => %kind,
                    "index" => anchor,
                    "hash" => hash);
                probes.push(ProbeSite {
                    kind,
                    index: anchor,
                    hash,
                });
            }
            injector.push(insn.clone());
        }
        debug_assert!(pending.is_empty(), "handler site past the end of the stream");

        let mut instrumented = MethodBody {
            identity,
            max_stack,
            max_locals,
            instructions: injector.finish(),
            handlers: exception_table,
        };
        let labels = instrumented.label_positions()?;
        let verified = stack::analyze(&instrumented, &labels)?;
        let words = u16::try_from(verified.max_words()).unwrap_or(u16::MAX);
        instrumented.max_stack = instrumented.max_stack.max(words);

        info!(self.log, "instrumented method";
            "method" => %instrumented.identity,
            "probes" => probes.len(),
            "max_stack" => instrumented.max_stack);

        Ok(InstrumentedMethod {
            body: instrumented,
            probes,
        })
    }

    /// Looks up the probe for `site` and builds its duplication plan, checked
    /// against the stack the original code has at the anchor.
    fn prepare(
        &self,
        analysis: &StackAnalysis,
        site: &BranchSite,
    ) -> Result<Option<(BranchKind, &ProbeDescriptor, DuplicationPlan)>, TransformError> {
        let Some(probe) = self.registry.get(site.kind()) else {
            return Ok(None);
        };
        let plan = plan::plan(site);
        match analysis.state_at(site.anchor()) {
            Some(stack) => plan.verify(stack, site.anchor())?,
            None => debug!(self.log, "site in unreachable code, stack not checked";
                "kind" => %site.kind(),
                "anchor" => site.anchor()),
        }
        Ok(Some((site.kind(), probe, plan)))
    }

    /// Instruments `body` and forwards the result to `sink`.
    ///
    /// The sink only ever sees fully instrumented and re-verified methods;
    /// when the pass fails nothing is forwarded. Returns the number of probes
    /// injected.
    ///
    /// # Arguments
    ///
    /// * `body` - The method to instrument.
    /// * `sink` - The backend receiving the instrumented method, e.g. a class
    ///   writer or a `Vec<InstrumentedMethod>`.
    ///
    /// # Errors
    ///
    /// The [`TransformError`] of a failed pass, or the sink's own error. Both
    /// carry the method identity as context.
    pub fn run<S: MethodSink + ?Sized>(&self, body: MethodBody, sink: &mut S) -> Result<usize> {
        let identity = body.identity.clone();
        let method = self
            .instrument_method(body)
            .with_context(|| format!("failed to instrument {identity}"))?;
        let probes = method.probes.len();
        sink.accept(method)
            .with_context(|| format!("backend rejected {identity}"))?;
        Ok(probes)
    }

    /// Instruments every method in `methods`, forwarding each success to
    /// `sink`.
    ///
    /// A failure only affects the method it happened on: it is logged at
    /// warning level and collected in the returned report, and the batch
    /// moves on to the next method.
    ///
    /// # Arguments
    ///
    /// * `methods` - The methods to instrument, in the order they are forwarded.
    /// * `sink` - The backend receiving every successfully instrumented method.
    pub fn instrument_all<I, S>(&self, methods: I, sink: &mut S) -> InstrumentationReport
    where
        I: IntoIterator<Item = MethodBody>,
        S: MethodSink + ?Sized,
    {
        let mut report = InstrumentationReport::default();
        for body in methods {
            let identity = body.identity.clone();
            match self.run(body, sink) {
                Ok(probes) => {
                    report.instrumented += 1;
                    report.probes += probes;
                }
                Err(err) => {
                    warn!(self.log, "skipping method";
                        "method" => %identity,
                        "error" => format!("{err:#}"));
                    report.failures.push((identity, err));
                }
            }
        }
        report
    }
}
