use std::fmt;

/// Signature of a function: parameter types, return type, var-arg flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
    pub var_arg: bool,
}

impl Signature {
    #[must_use]
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params,
            ret,
            var_arg: false,
        }
    }
}

/// A type in the IR. Only the slice of LLVM's type system the passes in
/// this crate need to reason about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr,
    Array(Box<Type>, u32),
    Struct(Vec<Type>),
    Func(Box<Signature>),
}

impl Type {
    /// Bit width of an integer type, or `None` for non-integer types.
    ///
    /// MBA's `x > 0` rewrite needs the top-bit index (`W-1`); widths other
    /// than 32/64 are rejected by that pass, not here.
    #[must_use]
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(8),
            Type::I16 => Some(16),
            Type::I32 => Some(32),
            Type::I64 => Some(64),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.int_width().is_some()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::Ptr => write!(f, "ptr"),
            Type::Array(elem, n) => write!(f, "[{n} x {elem}]"),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Type::Func(sig) => {
                write!(f, "{}(", sig.ret)?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}
