//! The model signature the orchestrator validates a request against, and
//! the shape-compatibility check shared by the JSON and binary paths.

use std::fmt;

/// Element type tags the codec understands. Anything else a runtime reports
/// (string tensors, complex types) is an unsupported dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl ElementType {
    /// Size in bytes of one element when packed for the wire. Booleans are
    /// one byte per element, never bit-packed.
    pub fn elem_size(self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
            ElementType::I32 => 4,
            ElementType::I64 => 8,
            ElementType::Bool => 1,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::Bool => "bool",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "float32" => Some(ElementType::F32),
            "float64" => Some(ElementType::F64),
            "int32" => Some(ElementType::I32),
            "int64" => Some(ElementType::I64),
            "bool" => Some(ElementType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One dimension of a declared input shape: either a fixed positive size or
/// a wildcard (the runtime's `None`, `-1`, or a symbolic dimension name all
/// normalize to this single variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Fixed(u64),
    Any,
}

/// The input/output shape the orchestrator derives from a session before
/// every call. Cheap to recompute, never persisted.
#[derive(Debug, Clone)]
pub struct ModelSignature {
    pub input_name: String,
    pub input_element_type: Option<ElementType>,
    pub input_shape: Vec<Dim>,
    pub output_name: String,
}

/// Check whether a concrete shape satisfies a declared shape: same rank, and
/// every fixed declared dimension equal to the concrete one. Wildcards match
/// any positive size.
pub fn shape_compatible(expected: &[Dim], actual: &[u64]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    expected
        .iter()
        .zip(actual.iter())
        .all(|(e, a)| matches!(e, Dim::Any) || matches!(e, Dim::Fixed(n) if *n == *a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![Dim::Any, Dim::Fixed(4), Dim::Fixed(5)], vec![3, 4, 5], true)]
    #[case(vec![Dim::Fixed(3), Dim::Fixed(4)], vec![3, 4], true)]
    #[case(vec![Dim::Fixed(3), Dim::Fixed(4)], vec![3, 5], false)]
    #[case(vec![Dim::Any], vec![1, 2], false)]
    fn shape_compat_cases(#[case] expected: Vec<Dim>, #[case] actual: Vec<u64>, #[case] want: bool) {
        assert_eq!(shape_compatible(&expected, &actual), want);
    }

    #[test]
    fn wildcard_idempotent_across_fixing() {
        let expected = vec![Dim::Any, Dim::Fixed(4)];
        for n in [1u64, 2, 100] {
            assert!(shape_compatible(&expected, &[n, 4]));
        }
    }

    #[test]
    fn dtype_tag_roundtrip() {
        for ty in [
            ElementType::F32,
            ElementType::F64,
            ElementType::I32,
            ElementType::I64,
            ElementType::Bool,
        ] {
            assert_eq!(ElementType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ElementType::from_tag("string"), None);
    }
}
