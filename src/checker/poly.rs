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

//! Resolution tables for Michelson's polymorphic primitives (`spec.md` §4.4: `MEM`, `GET`,
//! `UPDATE`, `SIZE`, `SLICE`, `CONCAT`, `ADD`, `SUB`, `MUL`, `EDIV`, `COMPARE`, `ABS`, `NEG`).
//!
//! Rather than growing one `match` per primitive over every operand-type combination, each
//! primitive gets a small capability enum naming exactly the operand shapes it accepts; resolving
//! an instruction is a single lookup into that enum, and the enum itself travels with the checked
//! [`crate::instr::Instr`] node so the interpreter never has to re-derive which overload applies.

use crate::types::{CT, T};

/// The operand/result shape `ADD`, `SUB`, `MUL` or `COMPARE` were resolved to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOp {
    IntInt,
    IntNat,
    NatInt,
    NatNat,
    MutezMutez,
    NatMutez,
    MutezNat,
    TimestampInt,
    IntTimestamp,
    TimestampTimestamp,
    /// Same-type comparison, the only shape `COMPARE` accepts.
    Comparable(CT),
}

impl ArithOp {
    pub fn resolve_add(lhs: CT, rhs: CT) -> Option<(ArithOp, T)> {
        use CT::*;
        Some(match (lhs, rhs) {
            (Int, Int) => (ArithOp::IntInt, T::int()),
            (Int, Nat) => (ArithOp::IntNat, T::int()),
            (Nat, Int) => (ArithOp::NatInt, T::int()),
            (Nat, Nat) => (ArithOp::NatNat, T::nat()),
            (Mutez, Mutez) => (ArithOp::MutezMutez, T::mutez()),
            (Timestamp, Int) => (ArithOp::TimestampInt, T::timestamp()),
            (Int, Timestamp) => (ArithOp::IntTimestamp, T::timestamp()),
            _ => return None,
        })
    }

    pub fn resolve_sub(lhs: CT, rhs: CT) -> Option<(ArithOp, T)> {
        use CT::*;
        Some(match (lhs, rhs) {
            (Int, Int) => (ArithOp::IntInt, T::int()),
            (Int, Nat) => (ArithOp::IntNat, T::int()),
            (Nat, Int) => (ArithOp::NatInt, T::int()),
            (Nat, Nat) => (ArithOp::NatNat, T::int()),
            (Mutez, Mutez) => (ArithOp::MutezMutez, T::mutez()),
            (Timestamp, Int) => (ArithOp::TimestampInt, T::timestamp()),
            (Timestamp, Timestamp) => (ArithOp::TimestampTimestamp, T::int()),
            _ => return None,
        })
    }

    pub fn resolve_mul(lhs: CT, rhs: CT) -> Option<(ArithOp, T)> {
        use CT::*;
        Some(match (lhs, rhs) {
            (Int, Int) => (ArithOp::IntInt, T::int()),
            (Int, Nat) => (ArithOp::IntNat, T::int()),
            (Nat, Int) => (ArithOp::NatInt, T::int()),
            (Nat, Nat) => (ArithOp::NatNat, T::nat()),
            (Nat, Mutez) => (ArithOp::NatMutez, T::mutez()),
            (Mutez, Nat) => (ArithOp::MutezNat, T::mutez()),
            _ => return None,
        })
    }

    pub fn resolve_compare(lhs: CT, rhs: CT) -> Option<ArithOp> {
        if lhs == rhs {
            Some(ArithOp::Comparable(lhs))
        } else {
            None
        }
    }
}

/// The operand shape `EDIV` was resolved to; always produces `option (pair (q) (r))`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EDivOp {
    IntInt,
    IntNat,
    NatInt,
    NatNat,
    MutezNat,
    MutezMutez,
}

impl EDivOp {
    /// Returns the `(quotient, remainder)` types `EDIV` produces for this shape.
    pub fn result_types(self) -> (T, T) {
        match self {
            EDivOp::IntInt | EDivOp::IntNat | EDivOp::NatInt => (T::int(), T::nat()),
            EDivOp::NatNat => (T::nat(), T::nat()),
            EDivOp::MutezNat => (T::mutez(), T::mutez()),
            EDivOp::MutezMutez => (T::nat(), T::mutez()),
        }
    }

    pub fn resolve(lhs: CT, rhs: CT) -> Option<EDivOp> {
        use CT::*;
        Some(match (lhs, rhs) {
            (Int, Int) => EDivOp::IntInt,
            (Int, Nat) => EDivOp::IntNat,
            (Nat, Int) => EDivOp::NatInt,
            (Nat, Nat) => EDivOp::NatNat,
            (Mutez, Nat) => EDivOp::MutezNat,
            (Mutez, Mutez) => EDivOp::MutezMutez,
            _ => return None,
        })
    }
}

/// The operand shape `ABS`/`NEG` were resolved to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryArithOp {
    FromInt,
    FromNat,
}

impl UnaryArithOp {
    pub fn resolve(operand: CT) -> Option<UnaryArithOp> {
        match operand {
            CT::Int => Some(UnaryArithOp::FromInt),
            CT::Nat => Some(UnaryArithOp::FromNat),
            _ => None,
        }
    }

    pub fn abs_result(self) -> T { T::nat() }
    pub fn neg_result(self) -> T { T::int() }
}

/// The container `MEM` was resolved to test membership in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemOp {
    Set(CT),
    Map(CT),
    BigMap(CT),
}

/// The container `GET` was resolved to read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GetOp {
    Map(CT, T),
    BigMap(CT, T),
}

/// The container `UPDATE` was resolved to write into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdOp {
    Set(CT),
    Map(CT, T),
    BigMap(CT, T),
}

/// The container `SIZE` was resolved to measure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizeOp {
    String,
    Bytes,
    List(T),
    Set(CT),
    Map(CT, T),
}

/// The operand `SLICE` was resolved to cut into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SliceOp {
    String,
    Bytes,
}

/// The operand shape `CONCAT` was resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConcatOp {
    StringString,
    BytesBytes,
    StringList,
    BytesList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_resolves_nat_nat_to_nat() {
        assert_eq!(ArithOp::resolve_add(CT::Nat, CT::Nat), Some((ArithOp::NatNat, T::nat())));
    }

    #[test]
    fn add_rejects_string_string() {
        assert_eq!(ArithOp::resolve_add(CT::String, CT::String), None);
    }

    #[test]
    fn sub_timestamp_timestamp_yields_int() {
        assert_eq!(ArithOp::resolve_sub(CT::Timestamp, CT::Timestamp), Some((ArithOp::TimestampTimestamp, T::int())));
    }

    #[test]
    fn compare_requires_same_type() {
        assert_eq!(ArithOp::resolve_compare(CT::Int, CT::Nat), None);
        assert_eq!(ArithOp::resolve_compare(CT::Int, CT::Int), Some(ArithOp::Comparable(CT::Int)));
    }

    #[test]
    fn ediv_mutez_mutez_yields_nat_mutez() {
        assert_eq!(EDivOp::resolve(CT::Mutez, CT::Mutez).unwrap().result_types(), (T::nat(), T::mutez()));
    }

    #[test]
    fn unary_arith_rejects_non_numeric() {
        assert_eq!(UnaryArithOp::resolve(CT::String), None);
    }
}
