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

//! Well-typed runtime values (`spec.md` §3, C3) and the operations a contract can emit.
//!
//! We cannot index [`Value`] by a compile-time `T` the way the reference GADT does (see the
//! module docs on [`crate::types`]), so [`Value`] is a plain erased enum and every container
//! variant that cannot recover its element type from an empty payload (`List`, `Option`, `Set`,
//! `Map`, `BigMap`, `Or`, `Contract`, `Lambda`) carries its own type tag alongside the data. The
//! checker is the only place that produces a `Value`, and it always fills the tag from the type it
//! just checked the value against, so [`Value::type_of`] never has to guess.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::address::Address;
use crate::crypto::{KeyHash, PublicKey, Signature};
use crate::instr::Instr;
use crate::types::{CT, T};

/// Millionths of a tez: a non-negative 63-bit integer that never overflows or underflows
/// silently (`spec.md` §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mutez(u64);

/// Raised by [`Mutez`] arithmetic that would go negative or overflow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
#[display(doc_comments)]
pub enum MutezError {
    /// mutez arithmetic overflowed 63-bit range.
    Overflow,
    /// mutez arithmetic would have produced a negative amount.
    Underflow,
}

impl Mutez {
    pub const ZERO: Mutez = Mutez(0);
    /// The protocol-defined ceiling: mutez is a signed 63-bit quantity in the reference
    /// implementation, so the unsigned range tops out one bit short of `u64::MAX`.
    pub const MAX: Mutez = Mutez(i64::MAX as u64);

    pub fn new(amount: u64) -> Result<Mutez, MutezError> {
        if amount > Self::MAX.0 {
            Err(MutezError::Overflow)
        } else {
            Ok(Mutez(amount))
        }
    }

    pub fn as_u64(self) -> u64 { self.0 }

    pub fn checked_add(self, other: Mutez) -> Result<Mutez, MutezError> {
        self.0.checked_add(other.0).filter(|v| *v <= Self::MAX.0).map(Mutez).ok_or(MutezError::Overflow)
    }

    pub fn checked_sub(self, other: Mutez) -> Result<Mutez, MutezError> {
        self.0.checked_sub(other.0).map(Mutez).ok_or(MutezError::Underflow)
    }

    pub fn checked_mul_nat(self, factor: u128) -> Result<Mutez, MutezError> {
        let product = (self.0 as u128).checked_mul(factor).ok_or(MutezError::Overflow)?;
        if product > Self::MAX.0 as u128 {
            return Err(MutezError::Overflow);
        }
        Ok(Mutez(product as u64))
    }
}

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Well-typed Michelson values.
///
/// See the module docs for why container variants repeat a type tag that would, in the reference
/// implementation, live only in the compile-time index.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i128),
    Nat(u128),
    String(String),
    Bytes(Vec<u8>),
    Mutez(Mutez),
    Bool(bool),
    KeyHash(KeyHash),
    Timestamp(i64),
    Address(Address),
    Key(PublicKey),
    Unit,
    Signature(Signature),
    Option(T, Option<Box<Value>>),
    List(T, Vec<Value>),
    Set(CT, BTreeSet<Comparable>),
    Operation(Box<Op>),
    Contract(T, Address),
    Pair(Box<Value>, Box<Value>),
    Or(T, T, Either),
    Lambda(T, T, Instr),
    Map(CT, T, BTreeMap<Comparable, Value>),
    BigMap(CT, T, BTreeMap<Comparable, Value>),
}

/// The payload of an `or(a, b)` value: either its left or its right branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Either {
    Left(Box<Value>),
    Right(Box<Value>),
}

impl Value {
    /// Recovers the [`T`] a value was checked against.
    ///
    /// This never fails: every `Value` in existence was produced either by the checker (which
    /// fills type tags from the type it just verified) or by the interpreter acting on such a
    /// value, so the tags are always internally consistent.
    pub fn type_of(&self) -> T {
        match self {
            Value::Int(_) => T::int(),
            Value::Nat(_) => T::nat(),
            Value::String(_) => T::string(),
            Value::Bytes(_) => T::bytes(),
            Value::Mutez(_) => T::mutez(),
            Value::Bool(_) => T::bool(),
            Value::KeyHash(_) => T::key_hash(),
            Value::Timestamp(_) => T::timestamp(),
            Value::Address(_) => T::address(),
            Value::Key(_) => T::Key,
            Value::Unit => T::Unit,
            Value::Signature(_) => T::Signature,
            Value::Option(t, _) => T::option(t.clone()),
            Value::List(t, _) => T::list(t.clone()),
            Value::Set(ct, _) => T::Set(*ct),
            Value::Operation(_) => T::Operation,
            Value::Contract(t, _) => T::Contract(Box::new(t.clone())),
            Value::Pair(a, b) => T::pair(a.type_of(), b.type_of()),
            Value::Or(l, r, _) => T::or(l.clone(), r.clone()),
            Value::Lambda(i, o, _) => T::lambda(i.clone(), o.clone()),
            Value::Map(k, v, _) => T::Map(*k, Box::new(v.clone())),
            Value::BigMap(k, v, _) => T::BigMap(*k, Box::new(v.clone())),
        }
    }

    /// Michelson's comparison order: numeric for numeric types, byte-lexicographic for
    /// `string`/`bytes`/`key_hash`/`address`, `false < true` for `bool`. Only meaningful for
    /// comparable values; see [`Comparable`] for the total order this backs.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Nat(a), Value::Nat(b)) => a.cmp(b),
            (Value::Mutez(a), Value::Mutez(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::KeyHash(a), Value::KeyHash(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Address(a), Value::Address(b)) => (a.tag, &a.hash).cmp(&(b.tag, &b.hash)),
            _ => unreachable!("compare() called on non-comparable or mismatched values"),
        }
    }
}

/// A comparable [`Value`] wrapped for use as a `set`/`map`/`big_map` key, carrying Michelson's
/// comparison order as its [`Ord`] implementation instead of Rust's derived structural one.
///
/// # Panics
///
/// `Ord`/`Eq` panic if wrapping a non-comparable `Value` — a checker invariant violation, not a
/// user-reachable error, since only [`CT`]-typed values are ever inserted into one of these.
#[derive(Clone, Debug)]
pub struct Comparable(pub Value);

impl PartialEq for Comparable {
    fn eq(&self, other: &Self) -> bool { self.0.compare(&other.0) == Ordering::Equal }
}
impl Eq for Comparable {}
impl PartialOrd for Comparable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for Comparable {
    fn cmp(&self, other: &Self) -> Ordering { self.0.compare(&other.0) }
}

/// Operations a contract may emit, to be folded back into the scenario's pending queue
/// (`spec.md` §3, §4.6).
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    TransferTokens {
        parameter: Value,
        parameter_ty: T,
        amount: Mutez,
        dest: Address,
    },
    SetDelegate(Option<KeyHash>),
    CreateAccount {
        manager: PublicKey,
        delegate: Option<KeyHash>,
        spendable: bool,
        balance: Mutez,
    },
    CreateContract {
        manager: PublicKey,
        delegate: Option<KeyHash>,
        spendable: bool,
        delegatable: bool,
        balance: Mutez,
        initial_storage: Value,
        storage_ty: T,
        parameter_ty: T,
        code: Instr,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutez_checked_sub_underflows() {
        assert_eq!(Mutez::new(1).unwrap().checked_sub(Mutez::new(2).unwrap()), Err(MutezError::Underflow));
    }

    #[test]
    fn mutez_checked_add_overflows() {
        assert_eq!(Mutez::MAX.checked_add(Mutez::new(1).unwrap()), Err(MutezError::Overflow));
    }

    #[test]
    fn comparable_ordering_is_numeric_for_int() {
        let a = Comparable(Value::Int(-5));
        let b = Comparable(Value::Int(3));
        assert!(a < b);
    }

    #[test]
    fn comparable_ordering_is_lexicographic_for_bytes() {
        let a = Comparable(Value::Bytes(vec![0x01]));
        let b = Comparable(Value::Bytes(vec![0x01, 0x00]));
        assert!(a < b);
    }

    #[test]
    fn set_keeps_keys_sorted_and_unique() {
        let mut set = BTreeSet::new();
        set.insert(Comparable(Value::Int(3)));
        set.insert(Comparable(Value::Int(1)));
        set.insert(Comparable(Value::Int(3)));
        let values: Vec<_> = set.iter().map(|c| match &c.0 {
            Value::Int(i) => *i,
            _ => unreachable!(),
        }).collect();
        assert_eq!(values, vec![1, 3]);
    }

    #[test]
    fn type_of_pair_recurses() {
        let v = Value::Pair(Box::new(Value::Int(1)), Box::new(Value::Bool(true)));
        assert_eq!(v.type_of(), T::pair(T::int(), T::bool()));
    }
}
