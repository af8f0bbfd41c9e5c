//! The validated mapping from branch kind to probe function.
//!
//! Probes are registered through [`ProbeRegistryBuilder`] and checked all at
//! once by [`ProbeRegistryBuilder::build`]. A [`ProbeRegistry`] that exists is
//! complete and type-correct, and is immutable from then on, so one instance
//! can be shared (behind an `Arc`) by any number of method passes.

use std::fmt;

use once_cell::sync::Lazy;

use crate::constants::{
    BINARY_INT_COMPARE_PROBE, BINARY_REF_COMPARE_PROBE, CAUGHT_EXCEPTION_PROBE,
    LOOKUP_SWITCH_PROBE, NULL_CHECK_PROBE, TABLE_SWITCH_PROBE, UNARY_COMPARE_PROBE,
};
use crate::descriptor::{MethodSignature, ValueKind};
use crate::error::ConfigurationError;
use crate::ir::Insn;
use crate::site::BranchKind;

/// A static function the instrumented code calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeDescriptor {
    owner: String,
    name: String,
    signature: MethodSignature,
}

impl ProbeDescriptor {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, signature: MethodSignature) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            signature,
        }
    }

    /// Creates a descriptor from a method descriptor string such as `(II)V`.
    pub fn parse(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: &str,
    ) -> Result<Self, ConfigurationError> {
        let signature = MethodSignature::parse(descriptor)?;
        Ok(Self::new(owner, name, signature))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// The static call instruction invoking this probe.
    pub fn invoke(&self) -> Insn {
        Insn::InvokeStatic {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.signature.to_descriptor(),
        }
    }
}

impl fmt::Display for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.signature)
    }
}

static EXPECTED_SIGNATURES: Lazy<[MethodSignature; 7]> = Lazy::new(|| {
    use ValueKind::Int;
    [
        // void probe(int value, int hash)
        MethodSignature::void(vec![Int, Int]),
        // void probe(int lhs, int rhs, int hash)
        MethodSignature::void(vec![Int, Int, Int]),
        // void probe(Object lhs, Object rhs, int hash)
        MethodSignature::void(vec![ValueKind::reference(), ValueKind::reference(), Int]),
        // void probe(Object value, int hash)
        MethodSignature::void(vec![ValueKind::reference(), Int]),
        // void probe(int value, int min, int max, int hash)
        MethodSignature::void(vec![Int, Int, Int, Int]),
        // void probe(int value, int[] keys, int hash)
        MethodSignature::void(vec![Int, ValueKind::array_of(Int), Int]),
        // void probe(Throwable value, int hash)
        MethodSignature::void(vec![ValueKind::throwable(), Int]),
    ]
});

/// The signature a probe for `kind` must have, or `None` if `kind` takes no probe.
pub fn expected_signature(kind: BranchKind) -> Option<&'static MethodSignature> {
    match kind {
        BranchKind::UnaryCompare
        | BranchKind::BinaryIntCompare
        | BranchKind::BinaryRefCompare
        | BranchKind::NullCheck
        | BranchKind::TableSwitch
        | BranchKind::LookupSwitch
        | BranchKind::ExceptionHandlerEntry => Some(&EXPECTED_SIGNATURES[kind.index()]),
    }
}

fn default_probe_name(kind: BranchKind) -> &'static str {
    match kind {
        BranchKind::UnaryCompare => UNARY_COMPARE_PROBE,
        BranchKind::BinaryIntCompare => BINARY_INT_COMPARE_PROBE,
        BranchKind::BinaryRefCompare => BINARY_REF_COMPARE_PROBE,
        BranchKind::NullCheck => NULL_CHECK_PROBE,
        BranchKind::TableSwitch => TABLE_SWITCH_PROBE,
        BranchKind::LookupSwitch => LOOKUP_SWITCH_PROBE,
        BranchKind::ExceptionHandlerEntry => CAUGHT_EXCEPTION_PROBE,
    }
}

/// Collects probe registrations before validation.
#[derive(Debug, Default)]
pub struct ProbeRegistryBuilder {
    slots: [Option<ProbeDescriptor>; 7],
    duplicates: Vec<BranchKind>,
}

impl ProbeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the probe for `kind`. Registering a second probe for the
    /// same kind is reported by [`build`](Self::build).
    pub fn with_probe(mut self, kind: BranchKind, probe: ProbeDescriptor) -> Self {
        let slot = &mut self.slots[kind.index()];
        if slot.is_some() {
            self.duplicates.push(kind);
        }
        *slot = Some(probe);
        self
    }

    /// Validates every slot and produces the registry.
    pub fn build(self) -> Result<ProbeRegistry, ConfigurationError> {
        if let Some(&kind) = self.duplicates.first() {
            return Err(ConfigurationError::DuplicateProbe { kind });
        }
        for kind in BranchKind::ALL {
            let probe = self.slots[kind.index()].as_ref();
            match (expected_signature(kind), probe) {
                (Some(_), None) => return Err(ConfigurationError::MissingProbe { kind }),
                (None, Some(probe)) => {
                    return Err(ConfigurationError::UnexpectedProbe {
                        kind,
                        probe: probe.to_string(),
                    });
                }
                (Some(expected), Some(probe)) => check_signature(kind, expected, probe)?,
                (None, None) => {}
            }
        }
        Ok(ProbeRegistry { probes: self.slots })
    }
}

fn check_signature(
    kind: BranchKind,
    expected: &MethodSignature,
    probe: &ProbeDescriptor,
) -> Result<(), ConfigurationError> {
    let actual = probe.signature();
    if actual.return_kind() != expected.return_kind() {
        return Err(ConfigurationError::ReturnMismatch {
            kind,
            probe: probe.to_string(),
            expected: expected.return_kind().clone(),
            actual: actual.return_kind().clone(),
        });
    }
    if actual.params() != expected.params() {
        return Err(ConfigurationError::ParameterMismatch {
            kind,
            probe: probe.to_string(),
            expected: join(expected.params()),
            actual: join(actual.params()),
        });
    }
    Ok(())
}

fn join(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validated, immutable branch-kind to probe mapping.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    probes: [Option<ProbeDescriptor>; 7],
}

impl ProbeRegistry {
    pub fn builder() -> ProbeRegistryBuilder {
        ProbeRegistryBuilder::new()
    }

    /// Registers the conventionally named probe on `owner` for every kind,
    /// e.g. `owner.unaryCompare(II)V`.
    pub fn with_owner(owner: &str) -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder();
        for kind in BranchKind::ALL {
            if let Some(signature) = expected_signature(kind) {
                builder = builder.with_probe(
                    kind,
                    ProbeDescriptor::new(owner, default_probe_name(kind), signature.clone()),
                );
            }
        }
        builder.build()
    }

    /// The probe for `kind`; `None` only for kinds that take no probe.
    pub fn get(&self, kind: BranchKind) -> Option<&ProbeDescriptor> {
        self.probes[kind.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BranchKind, &ProbeDescriptor)> {
        BranchKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|probe| (kind, probe)))
    }
}
