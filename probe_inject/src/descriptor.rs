//! Semantic method signatures and their descriptor syntax.
//!
//! Probe functions are declared by the harness with an explicit signature, and
//! that signature is compared structurally against the one each branch kind
//! expects. The same parser reads the descriptors of `invokestatic`
//! instructions during stack analysis.

use std::fmt;
use std::str::FromStr;

use crate::constants::{JAVA_LANG_OBJECT, JAVA_LANG_THROWABLE};
use crate::error::DescriptorError;
use crate::ir::SlotKind;

/// The type of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// A class instance, by internal name (`java/lang/Object`).
    Object(String),
    Array(Box<ValueKind>),
}

impl ValueKind {
    pub fn object(internal_name: impl Into<String>) -> Self {
        ValueKind::Object(internal_name.into())
    }

    /// `java/lang/Object`, the type probes use for arbitrary references.
    pub fn reference() -> Self {
        Self::object(JAVA_LANG_OBJECT)
    }

    pub fn throwable() -> Self {
        Self::object(JAVA_LANG_THROWABLE)
    }

    pub fn array_of(element: ValueKind) -> Self {
        ValueKind::Array(Box::new(element))
    }

    /// The operand-stack slot a value of this type occupies, `None` for `void`.
    pub fn slot_kind(&self) -> Option<SlotKind> {
        match self {
            ValueKind::Void => None,
            ValueKind::Boolean
            | ValueKind::Byte
            | ValueKind::Char
            | ValueKind::Short
            | ValueKind::Int => Some(SlotKind::Int),
            ValueKind::Long => Some(SlotKind::Long),
            ValueKind::Float => Some(SlotKind::Float),
            ValueKind::Double => Some(SlotKind::Double),
            ValueKind::Object(_) | ValueKind::Array(_) => Some(SlotKind::Reference),
        }
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            ValueKind::Void => out.push('V'),
            ValueKind::Boolean => out.push('Z'),
            ValueKind::Byte => out.push('B'),
            ValueKind::Char => out.push('C'),
            ValueKind::Short => out.push('S'),
            ValueKind::Int => out.push('I'),
            ValueKind::Long => out.push('J'),
            ValueKind::Float => out.push('F'),
            ValueKind::Double => out.push('D'),
            ValueKind::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            ValueKind::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Void => f.write_str("void"),
            ValueKind::Boolean => f.write_str("boolean"),
            ValueKind::Byte => f.write_str("byte"),
            ValueKind::Char => f.write_str("char"),
            ValueKind::Short => f.write_str("short"),
            ValueKind::Int => f.write_str("int"),
            ValueKind::Long => f.write_str("long"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::Double => f.write_str("double"),
            ValueKind::Object(name) => f.write_str(name),
            ValueKind::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Ordered parameter kinds plus a return kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    params: Vec<ValueKind>,
    ret: ValueKind,
}

impl MethodSignature {
    pub fn new(params: Vec<ValueKind>, ret: ValueKind) -> Self {
        Self { params, ret }
    }

    /// A `void` signature with the given parameters.
    pub fn void(params: Vec<ValueKind>) -> Self {
        Self::new(params, ValueKind::Void)
    }

    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    pub fn return_kind(&self) -> &ValueKind {
        &self.ret
    }

    /// Parses a method descriptor such as `(Ljava/lang/Object;I)V`.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let invalid = |reason| DescriptorError {
            descriptor: descriptor.to_string(),
            reason,
        };

        let rest = descriptor
            .strip_prefix('(')
            .ok_or_else(|| invalid("missing opening parenthesis"))?;
        let mut chars = rest.chars().peekable();
        let mut params = Vec::new();
        loop {
            match chars.peek() {
                Some(')') => {
                    chars.next();
                    break;
                }
                Some(_) => {
                    let param = parse_value(&mut chars).map_err(invalid)?;
                    if param == ValueKind::Void {
                        return Err(invalid("void parameter"));
                    }
                    params.push(param);
                }
                None => return Err(invalid("missing closing parenthesis")),
            }
        }

        let ret = parse_value(&mut chars).map_err(invalid)?;
        if chars.next().is_some() {
            return Err(invalid("trailing characters after return type"));
        }
        Ok(Self { params, ret })
    }

    /// Renders the signature back to descriptor syntax.
    pub fn to_descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }
}

impl FromStr for MethodSignature {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_descriptor())
    }
}

fn parse_value(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<ValueKind, &'static str> {
    let kind = match chars.next().ok_or("unexpected end of descriptor")? {
        'V' => ValueKind::Void,
        'Z' => ValueKind::Boolean,
        'B' => ValueKind::Byte,
        'C' => ValueKind::Char,
        'S' => ValueKind::Short,
        'I' => ValueKind::Int,
        'J' => ValueKind::Long,
        'F' => ValueKind::Float,
        'D' => ValueKind::Double,
        'L' => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some(';') => break,
                    Some(c) => name.push(c),
                    None => return Err("unterminated class name"),
                }
            }
            if name.is_empty() {
                return Err("empty class name");
            }
            ValueKind::Object(name)
        }
        '[' => {
            let element = parse_value(chars)?;
            if element == ValueKind::Void {
                return Err("array of void");
            }
            ValueKind::array_of(element)
        }
        _ => return Err("unknown type character"),
    };
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_style_descriptors() {
        let sig = MethodSignature::parse("(I[ILjava/lang/Throwable;)V").unwrap();
        assert_eq!(
            sig.params(),
            &[
                ValueKind::Int,
                ValueKind::array_of(ValueKind::Int),
                ValueKind::throwable()
            ]
        );
        assert_eq!(sig.return_kind(), &ValueKind::Void);
        assert_eq!(sig.to_descriptor(), "(I[ILjava/lang/Throwable;)V");
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for bad in ["I)V", "(I", "(V)V", "(Ljava/lang/Object)V", "(L;)V", "(I)VI", "(Q)V", "([V)V"] {
            let err = MethodSignature::parse(bad).unwrap_err();
            assert_eq!(err.descriptor, bad);
        }
    }

    #[test]
    fn slot_kinds_collapse_subword_ints() {
        assert_eq!(ValueKind::Boolean.slot_kind(), Some(SlotKind::Int));
        assert_eq!(ValueKind::Long.slot_kind(), Some(SlotKind::Long));
        assert_eq!(
            ValueKind::array_of(ValueKind::Int).slot_kind(),
            Some(SlotKind::Reference)
        );
        assert_eq!(ValueKind::Void.slot_kind(), None);
    }

    #[test]
    fn display_uses_source_names() {
        assert_eq!(ValueKind::array_of(ValueKind::Int).to_string(), "int[]");
        assert_eq!(ValueKind::reference().to_string(), "java/lang/Object");
    }
}
