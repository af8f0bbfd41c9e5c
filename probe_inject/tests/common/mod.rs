#![allow(dead_code)]

use difference::Changeset;
use probe_inject::descriptor::ValueKind;
use probe_inject::ir::{Condition, Constant, Insn, SlotKind};

fn prefix(kind: SlotKind) -> &'static str {
    match kind {
        SlotKind::Int => "i",
        SlotKind::Long => "l",
        SlotKind::Float => "f",
        SlotKind::Double => "d",
        SlotKind::Reference => "a",
    }
}

fn cond(cond: Condition) -> &'static str {
    match cond {
        Condition::Eq => "eq",
        Condition::Ne => "ne",
        Condition::Lt => "lt",
        Condition::Ge => "ge",
        Condition::Gt => "gt",
        Condition::Le => "le",
    }
}

fn kinds(values: &[ValueKind]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders an instruction in a javap-like mnemonic form.
pub fn mnemonic(insn: &Insn) -> String {
    match insn {
        Insn::Label(label) => format!("{label}:"),
        Insn::LineNumber { line, start } => format!("  line {line} {start}"),
        Insn::Frame { locals, stack } => {
            format!("  frame [{}] [{}]", kinds(locals), kinds(stack))
        }
        Insn::Nop => "  nop".to_string(),
        Insn::Const(Constant::Int(v)) => format!("  ldc {v}"),
        Insn::Const(Constant::Long(v)) => format!("  ldc {v}L"),
        Insn::Const(Constant::Null) => "  aconst_null".to_string(),
        Insn::Const(Constant::String(s)) => format!("  ldc \"{s}\""),
        Insn::Load(kind, slot) => format!("  {}load {slot}", prefix(*kind)),
        Insn::Store(kind, slot) => format!("  {}store {slot}", prefix(*kind)),
        Insn::Pop => "  pop".to_string(),
        Insn::Pop2 => "  pop2".to_string(),
        Insn::Dup => "  dup".to_string(),
        Insn::Dup2 => "  dup2".to_string(),
        Insn::Swap => "  swap".to_string(),
        Insn::IAdd => "  iadd".to_string(),
        Insn::ISub => "  isub".to_string(),
        Insn::IMul => "  imul".to_string(),
        Insn::ArrayLength => "  arraylength".to_string(),
        Insn::NewArray(kind) => format!("  newarray {}", format!("{kind:?}").to_lowercase()),
        Insn::IaLoad => "  iaload".to_string(),
        Insn::IaStore => "  iastore".to_string(),
        Insn::New(class) => format!("  new {class}"),
        Insn::IfZero { cond: c, target } => format!("  if{} {target}", cond(*c)),
        Insn::IfICmp { cond: c, target } => format!("  if_icmp{} {target}", cond(*c)),
        Insn::IfACmpEq(target) => format!("  if_acmpeq {target}"),
        Insn::IfACmpNe(target) => format!("  if_acmpne {target}"),
        Insn::IfNull(target) => format!("  ifnull {target}"),
        Insn::IfNonNull(target) => format!("  ifnonnull {target}"),
        Insn::Goto(target) => format!("  goto {target}"),
        Insn::TableSwitch {
            min,
            max,
            default,
            targets,
        } => {
            let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
            format!(
                "  tableswitch {min}..{max} default {default} [{}]",
                targets.join(", ")
            )
        }
        Insn::LookupSwitch { default, cases } => {
            let cases: Vec<String> = cases.iter().map(|(k, t)| format!("{k}: {t}")).collect();
            format!("  lookupswitch default {default} [{}]", cases.join(", "))
        }
        Insn::InvokeStatic {
            owner,
            name,
            descriptor,
        } => format!("  invokestatic {owner}.{name}{descriptor}"),
        Insn::Return(None) => "  return".to_string(),
        Insn::Return(Some(kind)) => format!("  {}return", prefix(*kind)),
        Insn::AThrow => "  athrow".to_string(),
    }
}

pub fn listing(insns: &[Insn]) -> String {
    insns.iter().map(mnemonic).collect::<Vec<_>>().join("\n")
}

/// Compares a rendered instruction stream against an expected listing,
/// printing a line diff on mismatch.
pub fn assert_listing(actual: &[Insn], expected: &str) {
    let expected = expected
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let actual = listing(actual);
    let changeset = Changeset::new(&expected, &actual, "\n");
    assert!(changeset.distance == 0, "listing mismatch:\n{changeset}");
}
