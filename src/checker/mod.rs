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

//! Untyped-to-typed lowering (`spec.md` §4, C4): turns an [`ast::UInstr`] program and [`ast::UValue`]
//! literals into the [`crate::instr::Instr`] tree and [`crate::value::Value`]s the interpreter runs,
//! enforcing stack discipline, annotation convergence and the polymorphic-primitive overload tables
//! in [`poly`] along the way.

pub mod ast;
pub mod poly;

use crate::annot::{self, AnnError, FieldAnn, Notes};
use crate::crypto::{KeyHash, PublicKey, Signature};
use crate::ext::{self, ExtError, ExtInstr, FnDecl, FnOutput, PrintArg, StackRef, StackTypePattern, StkPatternElem};
use crate::hst::{Hst, HstEntry, SomeInstr};
use crate::instr::Instr;
use crate::types::{TypeError, CT, T};
use crate::value::{Either, Value};

use ast::{UExtInstr, UFnOutput, UInstr, UPrintArg, UStkPatternElem, UType, UValue};

use std::str::FromStr;

/// Errors raised while lowering an untyped program or value into its typed form.
#[derive(Clone, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum TCError {
    /// instruction `{instr}` expects at least {expected} stack element(s), found {found}.
    StackUnderflow { instr: &'static str, expected: usize, found: usize },
    /// expected type `{expected}`, found `{found}`.
    TypeMismatch { expected: String, found: String },
    /// {0}
    #[from]
    TypeConstruction(TypeError),
    /// {0}
    #[from]
    Annotation(AnnError),
    /// {0}
    #[from]
    Ext(ExtError),
    /// instruction `{instr}` has no overload for its operand types.
    NoPolymorphicOverload { instr: &'static str },
    /// malformed literal for type `{ty}`: {reason}.
    TCFailedOnValue { ty: String, reason: String },
    /// instruction `{instr}` failed to check: {reason}.
    TCFailedOnInstr { instr: &'static str, reason: String },
    /// contract result has type `{found}`, expected `pair (list operation) ({expected})`.
    IllTypedContractResult { expected: String, found: String },
    /// internal checker invariant violated: {0}.
    TCUnreachable(String),
}

fn decode_hex(s: &str) -> Result<Vec<u8>, TCError> {
    if s.len() % 2 != 0 {
        return Err(TCError::TCFailedOnValue { ty: "bytes".into(), reason: "odd number of hex digits".into() });
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| TCError::TCFailedOnValue { ty: "bytes".into(), reason: "invalid hex digit".into() })
        })
        .collect()
}

/// Lowers an untyped type literal into [`T`], enforcing the "no operation under storable"
/// construction rules as it goes.
pub fn lower_type(ut: &UType) -> Result<T, TCError> {
    Ok(match ut {
        UType::Comparable(ct) => T::Comparable(*ct),
        UType::Key => T::Key,
        UType::Unit => T::Unit,
        UType::Signature => T::Signature,
        UType::Operation => T::Operation,
        UType::Option(t) => T::option(lower_type(t)?),
        UType::List(t) => T::list(lower_type(t)?),
        UType::Set(ct) => T::set(*ct)?,
        UType::Contract(t) => T::contract(lower_type(t)?)?,
        UType::Pair(a, b, _, _) => T::pair(lower_type(a)?, lower_type(b)?),
        UType::Or(a, b, _, _) => T::or(lower_type(a)?, lower_type(b)?),
        UType::Lambda(i, o) => T::lambda(lower_type(i)?, lower_type(o)?),
        UType::Map(k, v) => T::map(*k, lower_type(v)?)?,
        UType::BigMap(k, v) => T::big_map(*k, lower_type(v)?)?,
    })
}

/// Lowers an untyped value literal against its expected [`T`], the entry point C4 calls
/// `typecheck_value`.
pub fn typecheck_value(ty: &T, uv: &UValue) -> Result<Value, TCError> {
    let mismatch = || TCError::TCFailedOnValue { ty: ty.to_string(), reason: "literal does not match expected type".into() };
    Ok(match (ty, uv) {
        (T::Comparable(CT::Int), UValue::Int(i)) => Value::Int(*i),
        (T::Comparable(CT::Nat), UValue::Nat(n)) => Value::Nat(*n),
        (T::Comparable(CT::String), UValue::String(s)) => Value::String(s.clone()),
        (T::Comparable(CT::Bytes), UValue::Bytes(b)) => Value::Bytes(b.clone()),
        (T::Comparable(CT::Bool), UValue::Bool(b)) => Value::Bool(*b),
        (T::Comparable(CT::Mutez), UValue::Mutez(m)) => {
            Value::Mutez(crate::value::Mutez::new(*m).map_err(|e| TCError::TCFailedOnValue { ty: ty.to_string(), reason: e.to_string() })?)
        }
        (T::Comparable(CT::Timestamp), UValue::Timestamp(t)) => Value::Timestamp(*t),
        (T::Comparable(CT::Address), UValue::Address(s)) => {
            Value::Address(crate::address::Address::from_str(s).map_err(|e| TCError::TCFailedOnValue { ty: ty.to_string(), reason: e.to_string() })?)
        }
        (T::Comparable(CT::KeyHash), UValue::KeyHash(s)) => Value::KeyHash(KeyHash::new(decode_hex(s)?)),
        (T::Key, UValue::Key(bytes)) => Value::Key(PublicKey::new(bytes.clone())),
        (T::Signature, UValue::Signature(bytes)) => Value::Signature(Signature::new(bytes.clone())),
        (T::Unit, UValue::Unit) => Value::Unit,
        (T::Option(inner), UValue::Some(v)) => Value::Option(ty.clone(), Some(Box::new(typecheck_value(inner, v)?))),
        (T::Option(_), UValue::None) => Value::Option(ty.clone(), None),
        (T::List(inner), UValue::List(items)) => {
            let checked = items.iter().map(|v| typecheck_value(inner, v)).collect::<Result<Vec<_>, _>>()?;
            Value::List((**inner).clone(), checked)
        }
        (T::Set(ct), UValue::Set(items)) => {
            let elem_ty = T::Comparable(*ct);
            let mut set = std::collections::BTreeSet::new();
            for item in items {
                let v = typecheck_value(&elem_ty, item)?;
                set.insert(crate::value::Comparable(v));
            }
            Value::Set(*ct, set)
        }
        (T::Pair(a, b), UValue::Pair(x, y)) => Value::Pair(Box::new(typecheck_value(a, x)?), Box::new(typecheck_value(b, y)?)),
        (T::Or(l, _r), UValue::Left(x)) => {
            Value::Or((**l).clone(), (**_r).clone(), Either::Left(Box::new(typecheck_value(l, x)?)))
        }
        (T::Or(_l, r), UValue::Right(x)) => {
            Value::Or((**_l).clone(), (**r).clone(), Either::Right(Box::new(typecheck_value(r, x)?)))
        }
        (T::Map(k, v), UValue::Map(pairs)) => {
            let key_ty = T::Comparable(*k);
            let mut map = std::collections::BTreeMap::new();
            for (kv, vv) in pairs {
                let key = typecheck_value(&key_ty, kv)?;
                let val = typecheck_value(v, vv)?;
                map.insert(crate::value::Comparable(key), val);
            }
            Value::Map(*k, (**v).clone(), map)
        }
        (T::BigMap(k, v), UValue::Map(pairs)) => {
            let key_ty = T::Comparable(*k);
            let mut map = std::collections::BTreeMap::new();
            for (kv, vv) in pairs {
                let key = typecheck_value(&key_ty, kv)?;
                let val = typecheck_value(v, vv)?;
                map.insert(crate::value::Comparable(key), val);
            }
            Value::BigMap(*k, (**v).clone(), map)
        }
        (T::Lambda(i, o), UValue::Lambda(body)) => {
            let ctx = CheckCtx { self_ty: T::Unit };
            let input = Hst::from_entries(vec![HstEntry::new((**i).clone())]);
            let checked = typecheck_instr(&ctx, input, body)?;
            expect_single(&checked.output, o)?;
            Value::Lambda((**i).clone(), (**o).clone(), checked.instr)
        }
        _ => return Err(mismatch()),
    })
}

fn expect_single(hst: &Hst, expected: &T) -> Result<(), TCError> {
    if hst.len() != 1 {
        return Err(TCError::TCFailedOnInstr {
            instr: "lambda body",
            reason: format!("expected a single result of type {expected}, left {} elements on the stack", hst.len()),
        });
    }
    let found = &hst.0[0].ty;
    if found != expected {
        return Err(TCError::TypeMismatch { expected: expected.to_string(), found: found.to_string() });
    }
    Ok(())
}

/// Threads the type of `SELF` through instruction checking, the one piece of ambient context the
/// reference type-checker's judgment carries beyond the stack itself.
struct CheckCtx {
    self_ty: T,
}

fn pop(hst: &mut Hst, instr: &'static str) -> Result<HstEntry, TCError> {
    hst.pop().ok_or(TCError::StackUnderflow { instr, expected: 1, found: 0 })
}

fn require_comparable(ty: &T, instr: &'static str) -> Result<CT, TCError> {
    ty.as_comparable().ok_or_else(|| TCError::TCFailedOnInstr { instr, reason: format!("type {ty} is not comparable") })
}

/// Checks a sequence or single untyped instruction against an input [`Hst`], producing the typed
/// [`Instr`] and the [`Hst`] it leaves behind.
pub fn typecheck_instr(ctx: &CheckCtx, mut hst: Hst, ui: &UInstr) -> Result<SomeInstr, TCError> {
    match ui {
        UInstr::Seq(items) => {
            let mut checked = Vec::with_capacity(items.len());
            for item in items {
                let step = typecheck_instr(ctx, hst, item)?;
                hst = step.output;
                checked.push(step.instr);
            }
            Ok(SomeInstr::new(Instr::Seq(checked), hst))
        }
        UInstr::Drop(n) => {
            for _ in 0..*n {
                pop(&mut hst, "DROP")?;
            }
            Ok(SomeInstr::new(Instr::Drop(*n), hst))
        }
        UInstr::Dup(n, var) => {
            let idx = (*n as usize).saturating_sub(1);
            let entry = hst.0.get(idx).cloned().ok_or(TCError::StackUnderflow { instr: "DUP", expected: *n as usize, found: hst.len() })?;
            let mut entry = entry;
            if let Some(v) = var {
                entry.var_ann = Some(v.clone());
            }
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Dup(*n), hst))
        }
        UInstr::Swap => {
            if hst.len() < 2 {
                return Err(TCError::StackUnderflow { instr: "SWAP", expected: 2, found: hst.len() });
            }
            hst.0.swap(0, 1);
            Ok(SomeInstr::new(Instr::Swap, hst))
        }
        UInstr::Dig(n) => {
            let idx = *n as usize;
            if idx >= hst.len() {
                return Err(TCError::StackUnderflow { instr: "DIG", expected: idx + 1, found: hst.len() });
            }
            let entry = hst.0.remove(idx);
            hst.0.insert(0, entry);
            Ok(SomeInstr::new(Instr::Dig(*n), hst))
        }
        UInstr::Dug(n) => {
            let idx = *n as usize;
            if hst.is_empty() || idx >= hst.len() {
                return Err(TCError::StackUnderflow { instr: "DUG", expected: idx + 1, found: hst.len() });
            }
            let entry = hst.0.remove(0);
            hst.0.insert(idx, entry);
            Ok(SomeInstr::new(Instr::Dug(*n), hst))
        }
        UInstr::Push(uty, uval, _tyann, var) => {
            let ty = lower_type(uty)?;
            let value = typecheck_value(&ty, uval)?;
            let mut entry = HstEntry::new(ty.clone());
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Push(ty, value), hst))
        }
        UInstr::Dip(n, body) => {
            let n = *n as usize;
            if hst.len() < n {
                return Err(TCError::StackUnderflow { instr: "DIP", expected: n, found: hst.len() });
            }
            let (set_aside, rest) = hst.0.split_at(n);
            let set_aside = set_aside.to_vec();
            let rest_hst = Hst::from_entries(rest.to_vec());
            let checked = typecheck_instr(ctx, rest_hst, body)?;
            let mut output = set_aside;
            output.extend(checked.output.0);
            Ok(SomeInstr::new(Instr::Dip(n as u16, Box::new(checked.instr)), Hst::from_entries(output)))
        }
        UInstr::Pair(pf, qf, var) => {
            let p = pop(&mut hst, "PAIR")?;
            let q = pop(&mut hst, "PAIR")?;
            let (derived_var, derived_pf, derived_qf) =
                annot::derive_pair_annotations(pf.as_ref().or(p.notes.field_ann()), qf.as_ref().or(q.notes.field_ann()), p.var_ann.as_ref(), q.var_ann.as_ref());
            let field_p = pf.clone().or(derived_pf);
            let field_q = qf.clone().or(derived_qf);
            let notes = Notes::node(
                crate::annot::NodeNotes::leaf().with_children(vec![
                    with_optional_field(p.notes.clone(), field_p),
                    with_optional_field(q.notes.clone(), field_q),
                ]),
            );
            let ty = T::pair(p.ty.clone(), q.ty.clone());
            let mut entry = HstEntry::new(ty).with_notes(notes);
            entry.var_ann = var.clone().or(derived_var);
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Pair, hst))
        }
        UInstr::Unpair => {
            let top = pop(&mut hst, "UNPAIR")?;
            let (a, b) = match top.ty {
                T::Pair(a, b) => (*a, *b),
                other => return Err(TCError::TypeMismatch { expected: "pair".into(), found: other.to_string() }),
            };
            hst.push(HstEntry::new(b).with_notes(top.notes.child(1)));
            hst.push(HstEntry::new(a).with_notes(top.notes.child(0)));
            Ok(SomeInstr::new(Instr::Unpair, hst))
        }
        UInstr::Car(req) => {
            let top = pop(&mut hst, "CAR")?;
            let (a, _b) = match top.ty {
                T::Pair(a, b) => (*a, *b),
                other => return Err(TCError::TypeMismatch { expected: "pair".into(), found: other.to_string() }),
            };
            let child_notes = top.notes.child(0);
            let var = annot::derive_car_cdr_var(req, child_notes.field_ann(), top.var_ann.as_ref());
            let mut entry = HstEntry::new(a).with_notes(child_notes);
            entry.var_ann = var;
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Car, hst))
        }
        UInstr::Cdr(req) => {
            let top = pop(&mut hst, "CDR")?;
            let (_a, b) = match top.ty {
                T::Pair(a, b) => (*a, *b),
                other => return Err(TCError::TypeMismatch { expected: "pair".into(), found: other.to_string() }),
            };
            let child_notes = top.notes.child(1);
            let var = annot::derive_car_cdr_var(req, child_notes.field_ann(), top.var_ann.as_ref());
            let mut entry = HstEntry::new(b).with_notes(child_notes);
            entry.var_ann = var;
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Cdr, hst))
        }
        UInstr::Left(right_ty, _lf, _rf, var) => {
            let left = pop(&mut hst, "LEFT")?;
            let right = lower_type(right_ty)?;
            let mut entry = HstEntry::new(T::or(left.ty.clone(), right.clone()));
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Left(right), hst))
        }
        UInstr::Right(left_ty, _lf, _rf, var) => {
            let right = pop(&mut hst, "RIGHT")?;
            let left = lower_type(left_ty)?;
            let mut entry = HstEntry::new(T::or(left.clone(), right.ty.clone()));
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Right(left), hst))
        }
        UInstr::IfLeft(then_branch, else_branch) => {
            let top = pop(&mut hst, "IF_LEFT")?;
            let (l, r) = match top.ty {
                T::Or(l, r) => (*l, *r),
                other => return Err(TCError::TypeMismatch { expected: "or".into(), found: other.to_string() }),
            };
            let (left_notes, right_notes, var_left, var_right) = annot::derive_or_sub(&top.notes, top.var_ann.as_ref());
            let mut then_hst = hst.clone();
            let mut left_entry = HstEntry::new(l).with_notes(left_notes);
            left_entry.var_ann = var_left;
            then_hst.push(left_entry);
            let mut else_hst = hst.clone();
            let mut right_entry = HstEntry::new(r).with_notes(right_notes);
            right_entry.var_ann = var_right;
            else_hst.push(right_entry);
            let then_checked = typecheck_instr(ctx, then_hst, then_branch)?;
            let else_checked = typecheck_instr(ctx, else_hst, else_branch)?;
            let merged = merge_branches(then_checked.output, else_checked.output, "IF_LEFT")?;
            Ok(SomeInstr::new(Instr::IfLeft(Box::new(then_checked.instr), Box::new(else_checked.instr)), merged))
        }
        UInstr::Some_(var) => {
            let top = pop(&mut hst, "SOME")?;
            let mut entry = HstEntry::new(T::option(top.ty));
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Some_, hst))
        }
        UInstr::None_(uty, var) => {
            let ty = lower_type(uty)?;
            let mut entry = HstEntry::new(T::option(ty.clone()));
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::None_(ty), hst))
        }
        UInstr::IfNone(then_branch, else_branch) => {
            let top = pop(&mut hst, "IF_NONE")?;
            let inner = match top.ty {
                T::Option(t) => *t,
                other => return Err(TCError::TypeMismatch { expected: "option".into(), found: other.to_string() }),
            };
            let none_hst = hst.clone();
            let (inner_notes, var_some) = annot::derive_option_sub(&top.notes, top.var_ann.as_ref());
            let mut some_hst = hst.clone();
            let mut entry = HstEntry::new(inner).with_notes(inner_notes);
            entry.var_ann = var_some;
            some_hst.push(entry);
            let none_checked = typecheck_instr(ctx, none_hst, then_branch)?;
            let some_checked = typecheck_instr(ctx, some_hst, else_branch)?;
            let merged = merge_branches(none_checked.output, some_checked.output, "IF_NONE")?;
            Ok(SomeInstr::new(Instr::IfNone(Box::new(none_checked.instr), Box::new(some_checked.instr)), merged))
        }
        UInstr::Cons => {
            let head = pop(&mut hst, "CONS")?;
            let tail = pop(&mut hst, "CONS")?;
            match &tail.ty {
                T::List(elem) if **elem == head.ty => {}
                other => return Err(TCError::TypeMismatch { expected: format!("list ({})", head.ty), found: other.to_string() }),
            }
            hst.push(tail);
            Ok(SomeInstr::new(Instr::Cons, hst))
        }
        UInstr::IfCons(then_branch, else_branch) => {
            let top = pop(&mut hst, "IF_CONS")?;
            let elem = match top.ty.clone() {
                T::List(e) => *e,
                other => return Err(TCError::TypeMismatch { expected: "list".into(), found: other.to_string() }),
            };
            let mut cons_hst = hst.clone();
            cons_hst.push(top.clone());
            cons_hst.push(HstEntry::new(elem));
            let nil_hst = hst.clone();
            let cons_checked = typecheck_instr(ctx, cons_hst, then_branch)?;
            let nil_checked = typecheck_instr(ctx, nil_hst, else_branch)?;
            let merged = merge_branches(cons_checked.output, nil_checked.output, "IF_CONS")?;
            Ok(SomeInstr::new(Instr::IfCons(Box::new(cons_checked.instr), Box::new(nil_checked.instr)), merged))
        }
        UInstr::Nil(uty, var) => {
            let ty = lower_type(uty)?;
            let mut entry = HstEntry::new(T::list(ty.clone()));
            entry.var_ann = var.clone();
            hst.push(entry);
            Ok(SomeInstr::new(Instr::Nil(ty), hst))
        }
        UInstr::If(then_branch, else_branch) => {
            let top = pop(&mut hst, "IF")?;
            if top.ty != T::bool() {
                return Err(TCError::TypeMismatch { expected: "bool".into(), found: top.ty.to_string() });
            }
            let then_checked = typecheck_instr(ctx, hst.clone(), then_branch)?;
            let else_checked = typecheck_instr(ctx, hst, else_branch)?;
            let merged = merge_branches(then_checked.output, else_checked.output, "IF")?;
            Ok(SomeInstr::new(Instr::If(Box::new(then_checked.instr), Box::new(else_checked.instr)), merged))
        }
        UInstr::Eq | UInstr::Neq | UInstr::Lt | UInstr::Gt | UInstr::Le | UInstr::Ge => {
            let top = pop(&mut hst, "comparison")?;
            if top.ty != T::int() {
                return Err(TCError::TypeMismatch { expected: "int".into(), found: top.ty.to_string() });
            }
            hst.push(HstEntry::new(T::bool()));
            let instr = match ui {
                UInstr::Eq => Instr::Eq,
                UInstr::Neq => Instr::Neq,
                UInstr::Lt => Instr::Lt,
                UInstr::Gt => Instr::Gt,
                UInstr::Le => Instr::Le,
                UInstr::Ge => Instr::Ge,
                _ => unreachable!(),
            };
            Ok(SomeInstr::new(instr, hst))
        }
        UInstr::And | UInstr::Or | UInstr::Xor => {
            let b = pop(&mut hst, "boolean op")?;
            let a = pop(&mut hst, "boolean op")?;
            if a.ty != T::bool() || b.ty != T::bool() {
                return Err(TCError::TCFailedOnInstr { instr: "boolean op", reason: "both operands must be bool".into() });
            }
            hst.push(HstEntry::new(T::bool()));
            let instr = match ui {
                UInstr::And => Instr::And,
                UInstr::Or => Instr::Or,
                UInstr::Xor => Instr::Xor,
                _ => unreachable!(),
            };
            Ok(SomeInstr::new(instr, hst))
        }
        UInstr::Not => {
            let top = pop(&mut hst, "NOT")?;
            if top.ty != T::bool() && top.ty != T::int() {
                return Err(TCError::TCFailedOnInstr { instr: "NOT", reason: "operand must be bool or int".into() });
            }
            hst.push(HstEntry::new(if top.ty == T::bool() { T::bool() } else { T::int() }));
            Ok(SomeInstr::new(Instr::Not, hst))
        }
        UInstr::Compare => {
            let b = pop(&mut hst, "COMPARE")?;
            let a = pop(&mut hst, "COMPARE")?;
            let op = poly::ArithOp::resolve_compare(require_comparable(&a.ty, "COMPARE")?, require_comparable(&b.ty, "COMPARE")?)
                .ok_or(TCError::NoPolymorphicOverload { instr: "COMPARE" })?;
            hst.push(HstEntry::new(T::int()));
            Ok(SomeInstr::new(Instr::Compare(op), hst))
        }
        UInstr::Add => {
            let b = pop(&mut hst, "ADD")?;
            let a = pop(&mut hst, "ADD")?;
            let (op, ty) = poly::ArithOp::resolve_add(require_comparable(&a.ty, "ADD")?, require_comparable(&b.ty, "ADD")?)
                .ok_or(TCError::NoPolymorphicOverload { instr: "ADD" })?;
            hst.push(HstEntry::new(ty));
            Ok(SomeInstr::new(Instr::Add(op), hst))
        }
        UInstr::Sub => {
            let b = pop(&mut hst, "SUB")?;
            let a = pop(&mut hst, "SUB")?;
            let (op, ty) = poly::ArithOp::resolve_sub(require_comparable(&a.ty, "SUB")?, require_comparable(&b.ty, "SUB")?)
                .ok_or(TCError::NoPolymorphicOverload { instr: "SUB" })?;
            hst.push(HstEntry::new(ty));
            Ok(SomeInstr::new(Instr::Sub(op), hst))
        }
        UInstr::Mul => {
            let b = pop(&mut hst, "MUL")?;
            let a = pop(&mut hst, "MUL")?;
            let (op, ty) = poly::ArithOp::resolve_mul(require_comparable(&a.ty, "MUL")?, require_comparable(&b.ty, "MUL")?)
                .ok_or(TCError::NoPolymorphicOverload { instr: "MUL" })?;
            hst.push(HstEntry::new(ty));
            Ok(SomeInstr::new(Instr::Mul(op), hst))
        }
        UInstr::EDiv => {
            let b = pop(&mut hst, "EDIV")?;
            let a = pop(&mut hst, "EDIV")?;
            let op = poly::EDivOp::resolve(require_comparable(&a.ty, "EDIV")?, require_comparable(&b.ty, "EDIV")?)
                .ok_or(TCError::NoPolymorphicOverload { instr: "EDIV" })?;
            let (q, r) = op.result_types();
            hst.push(HstEntry::new(T::option(T::pair(q, r))));
            Ok(SomeInstr::new(Instr::EDiv(op), hst))
        }
        UInstr::Abs => {
            let top = pop(&mut hst, "ABS")?;
            let op = poly::UnaryArithOp::resolve(require_comparable(&top.ty, "ABS")?).ok_or(TCError::NoPolymorphicOverload { instr: "ABS" })?;
            hst.push(HstEntry::new(op.abs_result()));
            Ok(SomeInstr::new(Instr::Abs(op), hst))
        }
        UInstr::Neg => {
            let top = pop(&mut hst, "NEG")?;
            let op = poly::UnaryArithOp::resolve(require_comparable(&top.ty, "NEG")?).ok_or(TCError::NoPolymorphicOverload { instr: "NEG" })?;
            hst.push(HstEntry::new(op.neg_result()));
            Ok(SomeInstr::new(Instr::Neg(op), hst))
        }
        UInstr::Concat => {
            let b = pop(&mut hst, "CONCAT")?;
            let a = pop(&mut hst, "CONCAT")?;
            let (op, ty) = match (&a.ty, &b.ty) {
                (T::Comparable(CT::String), T::Comparable(CT::String)) => (poly::ConcatOp::StringString, T::string()),
                (T::Comparable(CT::Bytes), T::Comparable(CT::Bytes)) => (poly::ConcatOp::BytesBytes, T::bytes()),
                (T::List(e), _) if **e == T::string() => (poly::ConcatOp::StringList, T::string()),
                (T::List(e), _) if **e == T::bytes() => (poly::ConcatOp::BytesList, T::bytes()),
                _ => return Err(TCError::NoPolymorphicOverload { instr: "CONCAT" }),
            };
            hst.push(HstEntry::new(ty));
            Ok(SomeInstr::new(Instr::Concat(op), hst))
        }
        UInstr::Slice => {
            let len = pop(&mut hst, "SLICE")?;
            let offset = pop(&mut hst, "SLICE")?;
            let target = pop(&mut hst, "SLICE")?;
            if len.ty != T::nat() || offset.ty != T::nat() {
                return Err(TCError::TCFailedOnInstr { instr: "SLICE", reason: "offset and length must be nat".into() });
            }
            let op = match &target.ty {
                T::Comparable(CT::String) => poly::SliceOp::String,
                T::Comparable(CT::Bytes) => poly::SliceOp::Bytes,
                other => return Err(TCError::TypeMismatch { expected: "string or bytes".into(), found: other.to_string() }),
            };
            hst.push(HstEntry::new(T::option(target.ty)));
            Ok(SomeInstr::new(Instr::Slice(op), hst))
        }
        UInstr::Size => {
            let top = pop(&mut hst, "SIZE")?;
            let op = match top.ty {
                T::Comparable(CT::String) => poly::SizeOp::String,
                T::Comparable(CT::Bytes) => poly::SizeOp::Bytes,
                T::List(e) => poly::SizeOp::List(*e),
                T::Set(ct) => poly::SizeOp::Set(ct),
                T::Map(k, v) => poly::SizeOp::Map(k, *v),
                other => return Err(TCError::TCFailedOnInstr { instr: "SIZE", reason: format!("type {other} has no SIZE overload") }),
            };
            hst.push(HstEntry::new(T::nat()));
            Ok(SomeInstr::new(Instr::Size(op), hst))
        }
        UInstr::Mem => {
            let key = pop(&mut hst, "MEM")?;
            let container = pop(&mut hst, "MEM")?;
            let op = match &container.ty {
                T::Set(ct) if T::Comparable(*ct) == key.ty => poly::MemOp::Set(*ct),
                T::Map(k, _) if T::Comparable(*k) == key.ty => poly::MemOp::Map(*k),
                T::BigMap(k, _) if T::Comparable(*k) == key.ty => poly::MemOp::BigMap(*k),
                other => return Err(TCError::TCFailedOnInstr { instr: "MEM", reason: format!("type {other} has no MEM overload for key {}", key.ty) }),
            };
            hst.push(HstEntry::new(T::bool()));
            Ok(SomeInstr::new(Instr::Mem(op), hst))
        }
        UInstr::Get => {
            let key = pop(&mut hst, "GET")?;
            let container = pop(&mut hst, "GET")?;
            let (op, value_ty) = match container.ty.clone() {
                T::Map(k, v) if T::Comparable(k) == key.ty => (poly::GetOp::Map(k, (*v).clone()), *v),
                T::BigMap(k, v) if T::Comparable(k) == key.ty => (poly::GetOp::BigMap(k, (*v).clone()), *v),
                other => return Err(TCError::TCFailedOnInstr { instr: "GET", reason: format!("type {other} has no GET overload for key {}", key.ty) }),
            };
            hst.push(HstEntry::new(T::option(value_ty)));
            Ok(SomeInstr::new(Instr::Get(op), hst))
        }
        UInstr::Update => {
            let value = pop(&mut hst, "UPDATE")?;
            let key = pop(&mut hst, "UPDATE")?;
            let container = pop(&mut hst, "UPDATE")?;
            let op = match container.ty.clone() {
                T::Set(ct) if T::Comparable(ct) == key.ty && value.ty == T::bool() => poly::UpdOp::Set(ct),
                T::Map(k, v) if T::Comparable(k) == key.ty && value.ty == T::option(*v.clone()) => poly::UpdOp::Map(k, *v),
                T::BigMap(k, v) if T::Comparable(k) == key.ty && value.ty == T::option(*v.clone()) => poly::UpdOp::BigMap(k, *v),
                other => return Err(TCError::TCFailedOnInstr { instr: "UPDATE", reason: format!("type {other} has no UPDATE overload") }),
            };
            hst.push(container);
            Ok(SomeInstr::new(Instr::Update(op), hst))
        }
        UInstr::Loop(body) => {
            let top = pop(&mut hst, "LOOP")?;
            if top.ty != T::bool() {
                return Err(TCError::TypeMismatch { expected: "bool".into(), found: top.ty.to_string() });
            }
            let checked = typecheck_instr(ctx, hst.clone(), body)?;
            let mut reentry = checked.output.clone();
            let cond = pop(&mut reentry, "LOOP")?;
            if cond.ty != T::bool() || reentry != hst {
                return Err(TCError::TCFailedOnInstr { instr: "LOOP", reason: "body must return to the input stack shape, topped with bool".into() });
            }
            Ok(SomeInstr::new(Instr::Loop(Box::new(checked.instr)), hst))
        }
        UInstr::LoopLeft(body) => {
            let top = pop(&mut hst, "LOOP_LEFT")?;
            let (l, r) = match top.ty {
                T::Or(l, r) => (*l, *r),
                other => return Err(TCError::TypeMismatch { expected: "or".into(), found: other.to_string() }),
            };
            let mut body_input = hst.clone();
            body_input.push(HstEntry::new(l.clone()));
            let checked = typecheck_instr(ctx, body_input, body)?;
            let mut reentry = checked.output.clone();
            let cond = pop(&mut reentry, "LOOP_LEFT")?;
            if cond.ty != T::or(l, r.clone()) || reentry != hst {
                return Err(TCError::TCFailedOnInstr { instr: "LOOP_LEFT", reason: "body must return `or` of the loop's own input over the accumulator".into() });
            }
            let mut output = hst;
            output.push(HstEntry::new(r));
            Ok(SomeInstr::new(Instr::LoopLeft(Box::new(checked.instr)), output))
        }
        UInstr::Iter(body) => {
            let top = pop(&mut hst, "ITER")?;
            let elem = match top.ty {
                T::List(e) => *e,
                T::Set(ct) => T::Comparable(ct),
                T::Map(k, v) => T::pair(T::Comparable(k), *v),
                other => return Err(TCError::TCFailedOnInstr { instr: "ITER", reason: format!("type {other} is not iterable") }),
            };
            let mut body_input = hst.clone();
            body_input.push(HstEntry::new(elem));
            let checked = typecheck_instr(ctx, body_input, body)?;
            if checked.output != hst {
                return Err(TCError::TCFailedOnInstr { instr: "ITER", reason: "body must leave the stack as it found it".into() });
            }
            Ok(SomeInstr::new(Instr::Iter(Box::new(checked.instr)), hst))
        }
        UInstr::Map(body) => {
            let top = pop(&mut hst, "MAP")?;
            let (elem, rebuild_list, rebuild_map) = match top.ty.clone() {
                T::List(e) => (*e, true, None),
                T::Map(k, v) => (T::pair(T::Comparable(k), *v), false, Some(k)),
                other => return Err(TCError::TCFailedOnInstr { instr: "MAP", reason: format!("type {other} has no MAP overload") }),
            };
            let mut body_input = hst.clone();
            body_input.push(HstEntry::new(elem));
            let checked = typecheck_instr(ctx, body_input, body)?;
            if checked.output.len() != 1 {
                return Err(TCError::TCFailedOnInstr { instr: "MAP", reason: "body must leave exactly one result on the stack".into() });
            }
            let result_ty = checked.output.0[0].ty.clone();
            let out_ty = if rebuild_list {
                T::list(result_ty)
            } else {
                T::map(rebuild_map.expect("map branch always sets rebuild_map"), result_ty)?
            };
            hst.push(HstEntry::new(out_ty));
            Ok(SomeInstr::new(Instr::Map(Box::new(checked.instr)), hst))
        }
        UInstr::Lambda(i, o, body) => {
            let input_ty = lower_type(i)?;
            let output_ty = lower_type(o)?;
            let body_input = Hst::from_entries(vec![HstEntry::new(input_ty.clone())]);
            let checked = typecheck_instr(ctx, body_input, body)?;
            expect_single(&checked.output, &output_ty)?;
            hst.push(HstEntry::new(T::lambda(input_ty.clone(), output_ty.clone())));
            Ok(SomeInstr::new(Instr::Lambda(input_ty, output_ty, Box::new(checked.instr)), hst))
        }
        UInstr::Exec => {
            let arg = pop(&mut hst, "EXEC")?;
            let lam = pop(&mut hst, "EXEC")?;
            match lam.ty {
                T::Lambda(i, o) if *i == arg.ty => {
                    hst.push(HstEntry::new(*o));
                    Ok(SomeInstr::new(Instr::Exec, hst))
                }
                other => Err(TCError::TypeMismatch { expected: format!("lambda ({}) (_)", arg.ty), found: other.to_string() }),
            }
        }
        UInstr::Apply => {
            let arg = pop(&mut hst, "APPLY")?;
            let lam = pop(&mut hst, "APPLY")?;
            match lam.ty {
                T::Lambda(i, o) => match *i {
                    T::Pair(fst, snd) if *fst == arg.ty => {
                        hst.push(HstEntry::new(T::lambda(*snd, *o)));
                        Ok(SomeInstr::new(Instr::Apply, hst))
                    }
                    other => Err(TCError::TypeMismatch { expected: format!("lambda (pair ({}) _) _", arg.ty), found: other.to_string() }),
                },
                other => Err(TCError::TypeMismatch { expected: "lambda".into(), found: other.to_string() }),
            }
        }
        UInstr::TransferTokens => {
            let dest = pop(&mut hst, "TRANSFER_TOKENS")?;
            let amount = pop(&mut hst, "TRANSFER_TOKENS")?;
            let param = pop(&mut hst, "TRANSFER_TOKENS")?;
            let param_ty = match dest.ty {
                T::Contract(p) => *p,
                other => return Err(TCError::TypeMismatch { expected: "contract".into(), found: other.to_string() }),
            };
            if param_ty != param.ty || amount.ty != T::mutez() {
                return Err(TCError::TCFailedOnInstr { instr: "TRANSFER_TOKENS", reason: "parameter or amount type mismatch".into() });
            }
            hst.push(HstEntry::new(T::Operation));
            Ok(SomeInstr::new(Instr::TransferTokens, hst))
        }
        UInstr::SetDelegate => {
            let top = pop(&mut hst, "SET_DELEGATE")?;
            if top.ty != T::option(T::key_hash()) {
                return Err(TCError::TypeMismatch { expected: "option (key_hash)".into(), found: top.ty.to_string() });
            }
            hst.push(HstEntry::new(T::Operation));
            Ok(SomeInstr::new(Instr::SetDelegate, hst))
        }
        UInstr::CreateContract { storage_ty, parameter_ty, code } => {
            let delegate = pop(&mut hst, "CREATE_CONTRACT")?;
            let balance = pop(&mut hst, "CREATE_CONTRACT")?;
            let storage = pop(&mut hst, "CREATE_CONTRACT")?;
            if delegate.ty != T::option(T::key_hash()) || balance.ty != T::mutez() {
                return Err(TCError::TCFailedOnInstr { instr: "CREATE_CONTRACT", reason: "delegate/balance type mismatch".into() });
            }
            let param_t = lower_type(parameter_ty)?;
            let storage_t = lower_type(storage_ty)?;
            if storage.ty != storage_t {
                return Err(TCError::TypeMismatch { expected: storage_t.to_string(), found: storage.ty.to_string() });
            }
            let nested_ctx = CheckCtx { self_ty: param_t.clone() };
            let nested_input = Hst::from_entries(vec![HstEntry::new(T::pair(param_t.clone(), storage_t.clone()))]);
            let nested_checked = typecheck_instr(&nested_ctx, nested_input, code)?;
            let expected_result = T::pair(T::list(T::Operation), storage_t.clone());
            expect_single(&nested_checked.output, &expected_result)?;
            hst.push(HstEntry::new(T::Operation));
            hst.push(HstEntry::new(T::address()));
            Ok(SomeInstr::new(
                Instr::CreateContract { storage_ty: storage_t, parameter_ty: param_t, code: Box::new(nested_checked.instr) },
                hst,
            ))
        }
        UInstr::Amount => {
            hst.push(HstEntry::new(T::mutez()));
            Ok(SomeInstr::new(Instr::Amount, hst))
        }
        UInstr::Balance => {
            hst.push(HstEntry::new(T::mutez()));
            Ok(SomeInstr::new(Instr::Balance, hst))
        }
        UInstr::Now => {
            hst.push(HstEntry::new(T::timestamp()));
            Ok(SomeInstr::new(Instr::Now, hst))
        }
        UInstr::Source => {
            hst.push(HstEntry::new(T::address()));
            Ok(SomeInstr::new(Instr::Source, hst))
        }
        UInstr::Sender => {
            hst.push(HstEntry::new(T::address()));
            Ok(SomeInstr::new(Instr::Sender, hst))
        }
        UInstr::SelfContract(uty) => {
            let declared = lower_type(uty)?;
            if declared != ctx.self_ty {
                return Err(TCError::TypeMismatch { expected: ctx.self_ty.to_string(), found: declared.to_string() });
            }
            hst.push(HstEntry::new(T::contract(ctx.self_ty.clone())?));
            Ok(SomeInstr::new(Instr::SelfContract(ctx.self_ty.clone()), hst))
        }
        UInstr::Address_ => {
            let top = pop(&mut hst, "ADDRESS")?;
            match top.ty {
                T::Contract(_) => {
                    hst.push(HstEntry::new(T::address()));
                    Ok(SomeInstr::new(Instr::Address_, hst))
                }
                other => Err(TCError::TypeMismatch { expected: "contract".into(), found: other.to_string() }),
            }
        }
        UInstr::ContractOf(uty) => {
            let top = pop(&mut hst, "CONTRACT")?;
            if top.ty != T::address() {
                return Err(TCError::TypeMismatch { expected: "address".into(), found: top.ty.to_string() });
            }
            let param_t = lower_type(uty)?;
            hst.push(HstEntry::new(T::option(T::contract(param_t.clone())?)));
            Ok(SomeInstr::new(Instr::ContractOf(param_t), hst))
        }
        UInstr::ImplicitAccount => {
            let top = pop(&mut hst, "IMPLICIT_ACCOUNT")?;
            if top.ty != T::key_hash() {
                return Err(TCError::TypeMismatch { expected: "key_hash".into(), found: top.ty.to_string() });
            }
            hst.push(HstEntry::new(T::contract(T::Unit)?));
            Ok(SomeInstr::new(Instr::ImplicitAccount, hst))
        }
        UInstr::FailWith => {
            pop(&mut hst, "FAILWITH")?;
            Ok(SomeInstr::new(Instr::FailWith, Hst::empty()))
        }
        UInstr::Unit => {
            hst.push(HstEntry::new(T::Unit));
            Ok(SomeInstr::new(Instr::Unit, hst))
        }
        UInstr::Ext(ext_instr) => typecheck_ext(ctx, hst, ext_instr),
    }
}

/// `IF`/`IF_LEFT`/`IF_NONE`/`IF_CONS` branches must converge to the same output [`Hst`] for the
/// instruction as a whole to have a well-defined result type.
fn merge_branches(a: Hst, b: Hst, instr: &'static str) -> Result<Hst, TCError> {
    if a == b {
        Ok(a)
    } else {
        Err(TCError::TCFailedOnInstr { instr, reason: "branches do not converge to the same stack type".into() })
    }
}

fn with_optional_field(notes: Notes, field: Option<FieldAnn>) -> Notes {
    match (notes, field) {
        (Notes::Star, Some(f)) => Notes::node(crate::annot::NodeNotes::leaf().with_field(f)),
        (Notes::Star, None) => Notes::Star,
        (Notes::Node(mut n), Some(f)) => {
            n.field_ann = Some(f);
            Notes::Node(n)
        }
        (other, None) => other,
    }
}

fn lower_stk_pattern(pattern: &[UStkPatternElem]) -> Result<StackTypePattern, TCError> {
    let elems = pattern
        .iter()
        .map(|e| match e {
            UStkPatternElem::Exact(t) => Ok(StkPatternElem::Exact(lower_type(t)?)),
            UStkPatternElem::Var(name) => Ok(StkPatternElem::Var(name.clone())),
            UStkPatternElem::Rest(name) => Ok(StkPatternElem::Rest(name.clone())),
        })
        .collect::<Result<Vec<_>, TCError>>()?;
    let pattern = StackTypePattern(elems);
    ext::check_pattern_shape(&pattern)?;
    Ok(pattern)
}

fn typecheck_ext(ctx: &CheckCtx, hst: Hst, ui: &UExtInstr) -> Result<SomeInstr, TCError> {
    match ui {
        UExtInstr::StackType(pattern) => {
            let pattern = lower_stk_pattern(pattern)?;
            ext::check_stack_type(&pattern, &hst.types())?;
            Ok(SomeInstr::new(Instr::Ext(ExtInstr::StackType(pattern)), hst))
        }
        UExtInstr::Print(args) => {
            let checked = args
                .iter()
                .map(|a| match a {
                    UPrintArg::Literal(s) => {
                        let r = PrintArg::Literal(s.clone());
                        Ok(r)
                    }
                    UPrintArg::StackSlot(idx) => {
                        ext::check_stack_ref(StackRef(*idx), hst.len())?;
                        Ok(PrintArg::StackSlot(StackRef(*idx)))
                    }
                })
                .collect::<Result<Vec<_>, TCError>>()?;
            Ok(SomeInstr::new(Instr::Ext(ExtInstr::Print(checked)), hst))
        }
        UExtInstr::TestAssert { message, body } => {
            let checked = typecheck_instr(ctx, hst.clone(), body)?;
            if checked.output.len() != 1 || checked.output.0[0].ty != T::bool() {
                return Err(TCError::TCFailedOnInstr { instr: "TEST_ASSERT", reason: "body must leave a single bool on the stack".into() });
            }
            Ok(SomeInstr::new(Instr::Ext(ExtInstr::TestAssert { message: message.clone(), body: Box::new(checked.instr) }), hst))
        }
        UExtInstr::Fn { name, type_vars, input, output, body } => {
            let input_pattern = lower_stk_pattern(input)?;
            ext::check_quantified_vars(type_vars, &input_pattern)?;
            ext::bind_stk_pattern(&input_pattern, &hst.types())?;
            let checked_body = typecheck_instr(ctx, hst.clone(), body)?;
            let has_rest = matches!(input_pattern.0.last(), Some(StkPatternElem::Rest(_)));
            let fixed_len = if has_rest { input_pattern.0.len() - 1 } else { input_pattern.0.len() };
            let fn_output = match output {
                UFnOutput::AnyOutInstr => FnOutput::AnyOutInstr,
                UFnOutput::Concrete(out_ty) => {
                    let out_t = lower_type(out_ty)?;
                    let mut expected: Vec<T> = vec![out_t.clone()];
                    expected.extend(hst.types().into_iter().skip(fixed_len));
                    if checked_body.output.types() != expected {
                        return Err(TCError::TCFailedOnInstr {
                            instr: "FN",
                            reason: "body output does not match the declared FN output".into(),
                        });
                    }
                    FnOutput::Concrete(out_t)
                }
            };
            let decl = FnDecl {
                name: name.clone(),
                type_vars: type_vars.clone(),
                input: input_pattern,
                output: fn_output,
                body: Box::new(checked_body.instr),
            };
            Ok(SomeInstr::new(Instr::Ext(ExtInstr::Fn(decl)), hst))
        }
    }
}

/// Lowers a full contract (`parameter`/`storage` types plus its code) into a typed, checked
/// [`Instr`] lambda from `pair (parameter) (storage)` to `pair (list operation) (storage)`, the
/// entry point C4 calls `typecheck_contract`.
pub fn typecheck_contract(parameter_ty: &UType, storage_ty: &UType, code: &UInstr) -> Result<(T, T, Instr), TCError> {
    let param_t = lower_type(parameter_ty)?;
    let storage_t = lower_type(storage_ty)?;
    let ctx = CheckCtx { self_ty: param_t.clone() };
    let input = Hst::from_entries(vec![HstEntry::new(T::pair(param_t.clone(), storage_t.clone()))]);
    let checked = typecheck_instr(&ctx, input, code)?;
    let expected = T::pair(T::list(T::Operation), storage_t.clone());
    if checked.output.len() != 1 || checked.output.0[0].ty != expected {
        let found = if checked.output.len() == 1 { checked.output.0[0].ty.to_string() } else { format!("{} stack slots", checked.output.len()) };
        return Err(TCError::IllTypedContractResult { expected: expected.to_string(), found });
    }
    Ok((param_t, storage_t, checked.instr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::UInstr as I;

    fn ctx() -> CheckCtx { CheckCtx { self_ty: T::Unit } }

    #[test]
    fn push_then_add_resolves_nat_nat() {
        let program = I::Seq(vec![
            I::Push(UType::Comparable(CT::Nat), UValue::Nat(1), None, None),
            I::Add,
        ]);
        let input = Hst::from_entries(vec![HstEntry::new(T::nat())]);
        let checked = typecheck_instr(&ctx(), input, &program).unwrap();
        assert_eq!(checked.output.0[0].ty, T::nat());
    }

    #[test]
    fn add_rejects_incompatible_types() {
        let program = I::Add;
        let input = Hst::from_entries(vec![HstEntry::new(T::string()), HstEntry::new(T::string())]);
        assert!(matches!(typecheck_instr(&ctx(), input, &program), Err(TCError::NoPolymorphicOverload { instr: "ADD" })));
    }

    #[test]
    fn if_branches_must_converge() {
        let program = I::If(
            Box::new(I::Push(UType::Comparable(CT::Int), UValue::Int(1), None, None)),
            Box::new(I::Push(UType::Comparable(CT::String), UValue::String("x".into()), None, None)),
        );
        let input = Hst::from_entries(vec![HstEntry::new(T::bool())]);
        assert!(typecheck_instr(&ctx(), input, &program).is_err());
    }

    #[test]
    fn typecheck_contract_accepts_identity_on_storage() {
        let code = I::Seq(vec![I::Unpair, I::Drop(1), I::Nil(UType::Operation, None), I::Pair(None, None, None)]);
        let (p, s, _) = typecheck_contract(&UType::Unit, &UType::Comparable(CT::Int), &code).unwrap();
        assert_eq!(p, T::Unit);
        assert_eq!(s, T::int());
    }

    #[test]
    fn typecheck_value_rejects_mismatched_literal() {
        assert!(typecheck_value(&T::int(), &UValue::Bool(true)).is_err());
    }

    #[test]
    fn typecheck_value_recurses_into_pairs() {
        let v = typecheck_value(&T::pair(T::int(), T::bool()), &UValue::Pair(Box::new(UValue::Int(1)), Box::new(UValue::Bool(true)))).unwrap();
        assert_eq!(v, Value::Pair(Box::new(Value::Int(1)), Box::new(Value::Bool(true))));
    }

    #[test]
    fn car_percent_promotes_pairs_field_annotation_to_a_variable_annotation() {
        let program = I::Seq(vec![
            I::Push(UType::Comparable(CT::Int), UValue::Int(1), None, None),
            I::Push(UType::Comparable(CT::Int), UValue::Int(2), None, None),
            I::Pair(Some(FieldAnn::new("x")), Some(FieldAnn::new("y")), None),
            I::Car(annot::CarCdrVarReq::Percent),
        ]);
        let checked = typecheck_instr(&ctx(), Hst::empty(), &program).unwrap();
        assert_eq!(checked.output.0[0].var_ann, Some(crate::annot::VarAnn::new("x")));
    }

    #[test]
    fn fn_checks_body_against_its_declared_generic_signature() {
        let decl = UExtInstr::Fn {
            name: "double_add".into(),
            type_vars: vec!["a".into()],
            input: vec![UStkPatternElem::Var("a".into()), UStkPatternElem::Var("a".into())],
            output: UFnOutput::Concrete(UType::Comparable(CT::Int)),
            body: Box::new(I::Add),
        };
        let input = Hst::from_entries(vec![HstEntry::new(T::int()), HstEntry::new(T::int())]);
        let checked = typecheck_ext(&ctx(), input, &decl).unwrap();
        assert_eq!(checked.output.0[0].ty, T::int());
    }

    #[test]
    fn fn_rejects_inconsistent_type_variable_bindings() {
        let decl = UExtInstr::Fn {
            name: "bad".into(),
            type_vars: vec!["a".into()],
            input: vec![UStkPatternElem::Var("a".into()), UStkPatternElem::Var("a".into())],
            output: UFnOutput::Concrete(UType::Comparable(CT::Int)),
            body: Box::new(I::Add),
        };
        let input = Hst::from_entries(vec![HstEntry::new(T::int()), HstEntry::new(T::nat())]);
        assert!(matches!(typecheck_ext(&ctx(), input, &decl), Err(TCError::Ext(ExtError::TyVarMismatch))));
    }
}
