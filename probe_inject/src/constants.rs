//! This module defines constants used throughout the probe instrumentation.
//! These cover the well-known class names that appear in probe signatures and
//! the conventional names of the probe functions.

/// Internal name of the root class. Probes take arbitrary references as this type.
pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// Internal name of the throwable root class, used by the caught-exception probe.
pub const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";

/// Number of instructions every probe call appends after the duplicated
/// operands: the location hash constant and the static call itself.
pub const PROBE_CALL_LEN: usize = 2;

/// Conventional probe names used by `ProbeRegistry::with_owner`.
pub const UNARY_COMPARE_PROBE: &str = "unaryCompare";
pub const BINARY_INT_COMPARE_PROBE: &str = "binaryIntCompare";
pub const BINARY_REF_COMPARE_PROBE: &str = "binaryRefCompare";
pub const NULL_CHECK_PROBE: &str = "nullCheck";
pub const TABLE_SWITCH_PROBE: &str = "tableSwitch";
pub const LOOKUP_SWITCH_PROBE: &str = "lookupSwitch";
pub const CAUGHT_EXCEPTION_PROBE: &str = "caughtException";
