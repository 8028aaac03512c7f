use std::fmt;

use crate::ir::ty::Type;

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(Type, i128),
    Null(Type),
    Undef(Type),
    /// A constant byte array (stands in for the string/array globals the
    /// annotation table points through).
    DataArray(Vec<u8>),
}

impl Constant {
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(ty, _) | Constant::Null(ty) | Constant::Undef(ty) => ty.clone(),
            Constant::DataArray(bytes) => Type::Array(Box::new(Type::I8), bytes.len() as u32),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Constant::Int(_, 0))
    }

    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Constant::Int(_, v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(ty, v) => write!(f, "{ty} {v}"),
            Constant::Null(ty) => write!(f, "{ty} null"),
            Constant::Undef(ty) => write!(f, "{ty} undef"),
            Constant::DataArray(bytes) => write!(f, "c\"{}\"", bytes.len()),
        }
    }
}
