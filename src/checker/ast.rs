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

//! The untyped surface the checker lowers into [`crate::instr::Instr`] and [`crate::value::Value`].
//!
//! Parsing Michelson's concrete S-expression syntax into this tree is explicitly out of scope
//! (`spec.md` §1); callers build [`UType`]/`UValue`/[`UInstr`] trees directly (by hand, or from
//! whatever front end they bring), the same role the reference implementation's `ParsedOp`/`Expr`
//! play upstream of its own typed core.

use crate::annot::{FieldAnn, TypeAnn, VarAnn};
use crate::types::CT;

/// An untyped type literal, annotated the way source Michelson annotates a type.
#[derive(Clone, Debug, PartialEq)]
pub enum UType {
    Comparable(CT),
    Key,
    Unit,
    Signature,
    Operation,
    Option(Box<UType>),
    List(Box<UType>),
    Set(CT),
    Contract(Box<UType>),
    Pair(Box<UType>, Box<UType>, Option<FieldAnn>, Option<FieldAnn>),
    Or(Box<UType>, Box<UType>, Option<FieldAnn>, Option<FieldAnn>),
    Lambda(Box<UType>, Box<UType>),
    Map(CT, Box<UType>),
    BigMap(CT, Box<UType>),
}

impl UType {
    pub fn pair(a: UType, b: UType) -> Self { UType::Pair(Box::new(a), Box::new(b), None, None) }
    pub fn or(a: UType, b: UType) -> Self { UType::Or(Box::new(a), Box::new(b), None, None) }
    pub fn option(a: UType) -> Self { UType::Option(Box::new(a)) }
    pub fn list(a: UType) -> Self { UType::List(Box::new(a)) }
    pub fn lambda(i: UType, o: UType) -> Self { UType::Lambda(Box::new(i), Box::new(o)) }
}

/// An untyped value literal (`spec.md` §3): what a `PUSH`, contract storage, or transfer
/// parameter is supplied as before the checker establishes it has the expected [`crate::types::T`].
#[derive(Clone, Debug, PartialEq)]
pub enum UValue {
    Int(i128),
    Nat(u128),
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Mutez(u64),
    Timestamp(i64),
    Address(String),
    KeyHash(String),
    Key(Vec<u8>),
    Signature(Vec<u8>),
    Unit,
    Pair(Box<UValue>, Box<UValue>),
    Left(Box<UValue>),
    Right(Box<UValue>),
    Some(Box<UValue>),
    None,
    List(Vec<UValue>),
    Set(Vec<UValue>),
    Map(Vec<(UValue, UValue)>),
    Lambda(Box<UInstr>),
}

/// An untyped instruction, annotated the way source Michelson annotates an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum UInstr {
    Seq(Vec<UInstr>),
    Drop(u16),
    Dup(u16, Option<VarAnn>),
    Swap,
    Dig(u16),
    Dug(u16),
    Push(UType, UValue, Option<TypeAnn>, Option<VarAnn>),
    Dip(u16, Box<UInstr>),
    Pair(Option<FieldAnn>, Option<FieldAnn>, Option<VarAnn>),
    Unpair,
    Car(crate::annot::CarCdrVarReq),
    Cdr(crate::annot::CarCdrVarReq),
    Left(UType, Option<FieldAnn>, Option<FieldAnn>, Option<VarAnn>),
    Right(UType, Option<FieldAnn>, Option<FieldAnn>, Option<VarAnn>),
    IfLeft(Box<UInstr>, Box<UInstr>),
    Some_(Option<VarAnn>),
    None_(UType, Option<VarAnn>),
    IfNone(Box<UInstr>, Box<UInstr>),
    Cons,
    IfCons(Box<UInstr>, Box<UInstr>),
    Nil(UType, Option<VarAnn>),
    If(Box<UInstr>, Box<UInstr>),
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
    Compare,
    Add,
    Sub,
    Mul,
    EDiv,
    Abs,
    Neg,
    Concat,
    Slice,
    Size,
    Mem,
    Get,
    Update,
    Loop(Box<UInstr>),
    LoopLeft(Box<UInstr>),
    Iter(Box<UInstr>),
    Map(Box<UInstr>),
    Lambda(UType, UType, Box<UInstr>),
    Exec,
    Apply,
    TransferTokens,
    SetDelegate,
    CreateContract { storage_ty: UType, parameter_ty: UType, code: Box<UInstr> },
    Amount,
    Balance,
    Now,
    Source,
    Sender,
    SelfContract(UType),
    Address_,
    ContractOf(UType),
    ImplicitAccount,
    FailWith,
    Unit,
    Ext(UExtInstr),
}

/// The untyped form of a meta-instruction (`spec.md` §5, C5).
#[derive(Clone, Debug, PartialEq)]
pub enum UExtInstr {
    StackType(Vec<UStkPatternElem>),
    Print(Vec<UPrintArg>),
    TestAssert { message: String, body: Box<UInstr> },
    Fn { name: String, type_vars: Vec<String>, input: Vec<UStkPatternElem>, output: UFnOutput, body: Box<UInstr> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum UStkPatternElem {
    Exact(UType),
    Var(String),
    Rest(String),
}

/// The untyped form of an `FN`'s declared output (`spec.md` §4.5).
#[derive(Clone, Debug, PartialEq)]
pub enum UFnOutput {
    Concrete(UType),
    AnyOutInstr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UPrintArg {
    Literal(String),
    StackSlot(usize),
}
