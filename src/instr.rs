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

//! The typed instruction tree (`spec.md` §3, C3).
//!
//! [`Instr`] is what [`crate::checker`] produces from an untyped program and what
//! [`crate::interpreter`] executes. Every node that consumes or produces a polymorphic primitive
//! (`ADD`, `COMPARE`, `GET`, ...) carries the concrete operation the checker resolved it to,
//! picked from the capability tables in [`crate::checker::poly`] — the interpreter never
//! re-dispatches on runtime type tags.

use crate::checker::poly::{ArithOp, ConcatOp, EDivOp, GetOp, MemOp, SizeOp, SliceOp, UnaryArithOp, UpdOp};
use crate::types::T;
use crate::value::Value;

/// A typed Michelson instruction.
///
/// Structured control instructions embed fully-checked sub-trees (`Box<Instr>` or `Vec<Instr>`
/// for sequences) rather than referring back into an untyped AST, so the interpreter never has to
/// re-typecheck a branch it is about to execute.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    /// A sequence of instructions executed in order.
    Seq(Vec<Instr>),

    // --- stack shuffling ---
    Drop(u16),
    Dup(u16),
    Swap,
    Dig(u16),
    Dug(u16),
    Push(T, Value),
    /// Applies `body` to the stack below the top `n` elements, which are set aside and restored
    /// unchanged afterward.
    Dip(u16, Box<Instr>),

    // --- pairs, ors, options ---
    Pair,
    Unpair,
    Car,
    Cdr,
    Left(T),
    Right(T),
    IfLeft(Box<Instr>, Box<Instr>),
    Some_,
    None_(T),
    IfNone(Box<Instr>, Box<Instr>),
    Cons,
    IfCons(Box<Instr>, Box<Instr>),
    Nil(T),
    If(Box<Instr>, Box<Instr>),

    // --- comparable / boolean ---
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    Not,

    // --- polymorphic primitives, resolved to a concrete operation by the checker ---
    Compare(ArithOp),
    Add(ArithOp),
    Sub(ArithOp),
    Mul(ArithOp),
    EDiv(EDivOp),
    Abs(UnaryArithOp),
    Neg(UnaryArithOp),
    Concat(ConcatOp),
    Slice(SliceOp),
    Size(SizeOp),
    Mem(MemOp),
    Get(GetOp),
    Update(UpdOp),

    // --- iteration ---
    Loop(Box<Instr>),
    LoopLeft(Box<Instr>),
    Iter(Box<Instr>),
    Map(Box<Instr>),

    // --- lambdas ---
    Lambda(T, T, Box<Instr>),
    Exec,
    Apply,

    // --- contract / operation emission ---
    TransferTokens,
    SetDelegate,
    CreateContract { storage_ty: T, parameter_ty: T, code: Box<Instr> },
    Amount,
    Balance,
    Now,
    Source,
    Sender,
    SelfContract(T),
    Address_,
    ContractOf(T),
    ImplicitAccount,

    // --- failure ---
    FailWith,

    // --- constants ---
    Unit,

    /// A meta-instruction from the Morley-style extension set (C5), checked and interpreted
    /// separately; see [`crate::ext`].
    Ext(crate::ext::ExtInstr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_and_dip_nest_without_recursion_limit_in_practice() {
        let program = Instr::Seq(vec![Instr::Push(T::int(), Value::Int(1)), Instr::Dip(1, Box::new(Instr::Drop(1)))]);
        match program {
            Instr::Seq(v) => assert_eq!(v.len(), 2),
            _ => unreachable!(),
        }
    }
}
