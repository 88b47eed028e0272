//! The type lattice used by the fixed-point inferrer (L7) and consulted by
//! codegen to decide between native operators and runtime helpers.

mod infer;

pub use infer::{infer_program, TypeInfo};

use serde::{Deserialize, Serialize};

/// `Unknown < {Int, Float, String, Bool, Nil, Array, Hash} < Dynamic`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum Type {
    #[strum(to_string = "unknown")]
    Unknown,
    #[strum(to_string = "int")]
    Int,
    #[strum(to_string = "float")]
    Float,
    #[strum(to_string = "string")]
    String,
    #[strum(to_string = "bool")]
    Bool,
    #[strum(to_string = "nil")]
    Nil,
    #[strum(to_string = "array")]
    Array,
    #[strum(to_string = "hash")]
    Hash,
    #[strum(to_string = "dynamic")]
    Dynamic,
}

impl Type {
    /// Not `Unknown` and not `Dynamic` — the inferrer found something concrete.
    pub fn is_resolved(self) -> bool {
        !matches!(self, Type::Unknown | Type::Dynamic)
    }

    /// Concrete enough that codegen can emit a native (non-`interface{}`-style)
    /// representation.
    pub fn is_typed_for_codegen(self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::String | Type::Bool)
    }
}

/// `unify(a,a)=a`; `unify(Unknown,b)=b`; `unify(Dynamic,_)=Dynamic`;
/// `unify(Int,Float)=Float`; otherwise `Dynamic`.
pub fn unify(a: Type, b: Type) -> Type {
    match (a, b) {
        (a, b) if a == b => a,
        (Type::Unknown, other) | (other, Type::Unknown) => other,
        (Type::Dynamic, _) | (_, Type::Dynamic) => Type::Dynamic,
        (Type::Int, Type::Float) | (Type::Float, Type::Int) => Type::Float,
        _ => Type::Dynamic,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unify_is_commutative() {
        let pairs = [
            (Type::Int, Type::Float),
            (Type::Unknown, Type::String),
            (Type::Dynamic, Type::Bool),
            (Type::Array, Type::Hash),
        ];
        for (a, b) in pairs {
            assert_eq!(unify(a, b), unify(b, a));
        }
    }

    #[test]
    fn unify_same_type_is_identity() {
        for t in [Type::Int, Type::Float, Type::String, Type::Bool, Type::Nil] {
            assert_eq!(unify(t, t), t);
        }
    }

    #[test]
    fn unify_int_float_is_float() {
        assert_eq!(unify(Type::Int, Type::Float), Type::Float);
    }

    #[test]
    fn unify_unknown_takes_other_side() {
        assert_eq!(unify(Type::Unknown, Type::String), Type::String);
    }

    #[test]
    fn unify_dynamic_dominates() {
        assert_eq!(unify(Type::Dynamic, Type::Int), Type::Dynamic);
    }
}
