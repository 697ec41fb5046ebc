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

//! Pure execution of typed instructions (`spec.md` §6, C6), and the transaction loop that drains
//! the operations a contract emits back into further transfers against [`GState`].
//!
//! There is no cost table per opcode (`spec.md` §1 Non-goal: protocol-accurate gas pricing is out
//! of scope); [`RemainingSteps`] is ticked once per interpreted instruction, including each loop
//! iteration and each step inside an invoked lambda, which is enough to make runaway programs fail
//! deterministically in a test without pretending to model the real protocol's cost model.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::address::{originate_address, Address};
use crate::gstate::{AccountState, GState, GStateUpdate};
use crate::instr::Instr;
use crate::types::T;
use crate::value::{Either, Mutez, MutezError, Op, Value};

/// The interpreter's gas budget: ticked once per instruction, never replenished mid-transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemainingSteps(u64);

impl RemainingSteps {
    pub fn new(n: u64) -> Self { RemainingSteps(n) }

    pub fn remaining(self) -> u64 { self.0 }

    fn tick(&mut self) -> Result<(), InterpreterError> {
        match self.0.checked_sub(1) {
            Some(n) => {
                self.0 = n;
                Ok(())
            }
            None => Err(InterpreterError::IEGasExhausted),
        }
    }
}

/// Errors the interpreter or the transaction loop around it can raise.
#[derive(Clone, Debug, Display, Error)]
#[display(doc_comments)]
pub enum InterpreterError {
    /// transfer targets unknown contract `{0}`.
    IEUnknownContract(Address),
    /// transfer originates from an account that does not exist in this state: `{0}`.
    IEUnknownSender(Address),
    /// contract `{0}` failed with `FAILWITH`: {1:?}.
    IEInterpreterFailed(Address, Value),
    /// contract code is not well-typed: {0}.
    IEIllTypedContract(String),
    /// transfer parameter does not match the target contract's parameter type: {0}.
    IEIllTypedParameter(String),
    /// ran out of gas before the transaction could complete.
    IEGasExhausted,
    /// mutez arithmetic failed during interpretation: {0}.
    IEArithmetic(MutezError),
    /// test assertion failed: {0}.
    IETestAssertFailed(String),
}

/// The outcome of successfully draining a transaction's operation queue.
#[derive(Clone, Debug)]
pub struct InterpreterRes {
    pub gstate: GState,
    pub updates: Vec<GStateUpdate>,
    pub remaining_steps: RemainingSteps,
}

/// Runs `code` against `(parameter, storage)`, returning the operations it emits and its new
/// storage. Pure: does not touch `gstate`, callers thread state changes through the returned
/// values and the transaction loop in [`interpret`].
#[allow(clippy::too_many_arguments)]
fn run_contract(
    code: &Instr,
    self_addr: &Address,
    parameter: Value,
    storage: Value,
    amount: Mutez,
    balance: Mutez,
    sender: &Address,
    source: &Address,
    now: i64,
    origination_counter: u64,
    steps: &mut RemainingSteps,
) -> Result<(Vec<Op>, Value), InterpreterError> {
    let input = Value::Pair(Box::new(parameter), Box::new(storage));
    let mut stack = vec![input];
    let mut ctx =
        ExecCtx { self_addr: self_addr.clone(), amount, balance, sender: sender.clone(), source: source.clone(), now, origination_counter };
    exec(code, &mut stack, &mut ctx, steps)?;
    let result = stack.pop().expect("well-typed contract code always leaves exactly one result");
    match result {
        Value::Pair(ops, storage) => {
            let ops = match *ops {
                Value::List(_, items) => items
                    .into_iter()
                    .map(|v| match v {
                        Value::Operation(op) => *op,
                        _ => unreachable!("well-typed contract result always carries `operation` list elements"),
                    })
                    .collect(),
                _ => unreachable!("well-typed contract result always carries a list in its first component"),
            };
            Ok((ops, *storage))
        }
        _ => unreachable!("well-typed contract result is always a pair"),
    }
}

/// Ambient values `NOW`/`AMOUNT`/`BALANCE`/`SENDER`/`SOURCE`/`SELF` read during execution.
struct ExecCtx {
    self_addr: Address,
    amount: Mutez,
    balance: Mutez,
    sender: Address,
    source: Address,
    now: i64,
    /// Originations observed from `self_addr` so far, bumped by one per `CREATE_CONTRACT` this
    /// execution performs; the transaction loop in [`interpret`] starts this from the same
    /// baseline and advances it in the same order while draining emitted operations, so the
    /// address pushed here always matches the one the operation is actually originated under.
    origination_counter: u64,
}

fn pop(stack: &mut Vec<Value>) -> Value { stack.pop().expect("checker guarantees the stack is non-empty here") }

fn exec(instr: &Instr, stack: &mut Vec<Value>, ctx: &mut ExecCtx, steps: &mut RemainingSteps) -> Result<(), InterpreterError> {
    steps.tick()?;
    match instr {
        Instr::Seq(items) => {
            for item in items {
                exec(item, stack, ctx, steps)?;
            }
        }
        Instr::Drop(n) => {
            for _ in 0..*n {
                pop(stack);
            }
        }
        Instr::Dup(n) => {
            let idx = stack.len() - *n as usize;
            stack.push(stack[idx].clone());
        }
        Instr::Swap => {
            let len = stack.len();
            stack.swap(len - 1, len - 2);
        }
        Instr::Dig(n) => {
            let idx = stack.len() - 1 - *n as usize;
            let v = stack.remove(idx);
            stack.push(v);
        }
        Instr::Dug(n) => {
            let v = pop(stack);
            let idx = stack.len() - *n as usize;
            stack.insert(idx, v);
        }
        Instr::Push(_, v) => stack.push(v.clone()),
        Instr::Dip(n, body) => {
            let split = stack.len() - *n as usize;
            let mut set_aside = stack.split_off(split);
            exec(body, stack, ctx, steps)?;
            stack.append(&mut set_aside);
        }
        Instr::Pair => {
            let a = pop(stack);
            let b = pop(stack);
            stack.push(Value::Pair(Box::new(a), Box::new(b)));
        }
        Instr::Unpair => match pop(stack) {
            Value::Pair(a, b) => {
                stack.push(*b);
                stack.push(*a);
            }
            _ => unreachable!(),
        },
        Instr::Car => match pop(stack) {
            Value::Pair(a, _) => stack.push(*a),
            _ => unreachable!(),
        },
        Instr::Cdr => match pop(stack) {
            Value::Pair(_, b) => stack.push(*b),
            _ => unreachable!(),
        },
        Instr::Left(right_ty) => {
            let left = pop(stack);
            let left_ty = left.type_of();
            stack.push(Value::Or(left_ty, right_ty.clone(), Either::Left(Box::new(left))));
        }
        Instr::Right(left_ty) => {
            let right = pop(stack);
            let right_ty = right.type_of();
            stack.push(Value::Or(left_ty.clone(), right_ty, Either::Right(Box::new(right))));
        }
        Instr::IfLeft(then_branch, else_branch) => match pop(stack) {
            Value::Or(_, _, Either::Left(v)) => {
                stack.push(*v);
                exec(then_branch, stack, ctx, steps)?;
            }
            Value::Or(_, _, Either::Right(v)) => {
                stack.push(*v);
                exec(else_branch, stack, ctx, steps)?;
            }
            _ => unreachable!(),
        },
        Instr::Some_ => {
            let v = pop(stack);
            let ty = v.type_of();
            stack.push(Value::Option(ty, Some(Box::new(v))));
        }
        Instr::None_(ty) => stack.push(Value::Option(ty.clone(), None)),
        Instr::IfNone(none_branch, some_branch) => match pop(stack) {
            Value::Option(_, None) => exec(none_branch, stack, ctx, steps)?,
            Value::Option(_, Some(v)) => {
                stack.push(*v);
                exec(some_branch, stack, ctx, steps)?;
            }
            _ => unreachable!(),
        },
        Instr::Cons => {
            let head = pop(stack);
            match pop(stack) {
                Value::List(ty, mut items) => {
                    items.insert(0, head);
                    stack.push(Value::List(ty, items));
                }
                _ => unreachable!(),
            }
        }
        Instr::IfCons(cons_branch, nil_branch) => match pop(stack) {
            Value::List(ty, mut items) if !items.is_empty() => {
                let head = items.remove(0);
                stack.push(Value::List(ty, items));
                stack.push(head);
                exec(cons_branch, stack, ctx, steps)?;
            }
            Value::List(_, _) => exec(nil_branch, stack, ctx, steps)?,
            _ => unreachable!(),
        },
        Instr::Nil(ty) => stack.push(Value::List(ty.clone(), Vec::new())),
        Instr::If(then_branch, else_branch) => match pop(stack) {
            Value::Bool(true) => exec(then_branch, stack, ctx, steps)?,
            Value::Bool(false) => exec(else_branch, stack, ctx, steps)?,
            _ => unreachable!(),
        },
        Instr::Eq | Instr::Neq | Instr::Lt | Instr::Gt | Instr::Le | Instr::Ge => {
            let n = match pop(stack) {
                Value::Int(n) => n,
                _ => unreachable!(),
            };
            let result = match instr {
                Instr::Eq => n == 0,
                Instr::Neq => n != 0,
                Instr::Lt => n < 0,
                Instr::Gt => n > 0,
                Instr::Le => n <= 0,
                Instr::Ge => n >= 0,
                _ => unreachable!(),
            };
            stack.push(Value::Bool(result));
        }
        Instr::And => {
            let (a, b) = (pop(stack), pop(stack));
            stack.push(Value::Bool(as_bool(a) && as_bool(b)));
        }
        Instr::Or => {
            let (a, b) = (pop(stack), pop(stack));
            stack.push(Value::Bool(as_bool(a) || as_bool(b)));
        }
        Instr::Xor => {
            let (a, b) = (pop(stack), pop(stack));
            stack.push(Value::Bool(as_bool(a) ^ as_bool(b)));
        }
        Instr::Not => match pop(stack) {
            Value::Bool(b) => stack.push(Value::Bool(!b)),
            Value::Int(n) => stack.push(Value::Int(-n - 1)),
            _ => unreachable!(),
        },
        Instr::Compare(_) => {
            let (a, b) = (pop(stack), pop(stack));
            stack.push(Value::Int(a.compare(&b) as i128));
        }
        Instr::Add(op) => exec_add(op, stack)?,
        Instr::Sub(op) => exec_sub(op, stack)?,
        Instr::Mul(op) => exec_mul(op, stack)?,
        Instr::EDiv(op) => exec_ediv(op, stack),
        Instr::Abs(_) => match pop(stack) {
            Value::Int(n) => stack.push(Value::Nat(n.unsigned_abs())),
            _ => unreachable!(),
        },
        Instr::Neg(_) => match pop(stack) {
            Value::Int(n) => stack.push(Value::Int(-n)),
            Value::Nat(n) => stack.push(Value::Int(-(n as i128))),
            _ => unreachable!(),
        },
        Instr::Concat(op) => exec_concat(op, stack),
        Instr::Slice(_) => {
            let len = match pop(stack) {
                Value::Nat(n) => n as usize,
                _ => unreachable!(),
            };
            let offset = match pop(stack) {
                Value::Nat(n) => n as usize,
                _ => unreachable!(),
            };
            match pop(stack) {
                Value::String(s) => {
                    let bytes = s.into_bytes();
                    let result = bytes
                        .get(offset..offset.saturating_add(len))
                        .map(|slice| Value::String(String::from_utf8_lossy(slice).into_owned()));
                    let ty = T::string();
                    stack.push(Value::Option(ty, result.map(Box::new)));
                }
                Value::Bytes(b) => {
                    let result = b.get(offset..offset.saturating_add(len)).map(|slice| Value::Bytes(slice.to_vec()));
                    let ty = T::bytes();
                    stack.push(Value::Option(ty, result.map(Box::new)));
                }
                _ => unreachable!(),
            }
        }
        Instr::Size(op) => exec_size(op, stack),
        Instr::Mem(_) => {
            let key = pop(stack);
            let contains = match pop(stack) {
                Value::Set(_, set) => set.contains(&crate::value::Comparable(key)),
                Value::Map(_, _, map) => map.contains_key(&crate::value::Comparable(key)),
                Value::BigMap(_, _, map) => map.contains_key(&crate::value::Comparable(key)),
                _ => unreachable!(),
            };
            stack.push(Value::Bool(contains));
        }
        Instr::Get(_) => {
            let key = pop(stack);
            let value = match pop(stack) {
                Value::Map(_, vt, map) => (map.get(&crate::value::Comparable(key)).cloned(), vt),
                Value::BigMap(_, vt, map) => (map.get(&crate::value::Comparable(key)).cloned(), vt),
                _ => unreachable!(),
            };
            stack.push(Value::Option(value.1, value.0.map(Box::new)));
        }
        Instr::Update(_) => {
            let value = pop(stack);
            let key = pop(stack);
            match pop(stack) {
                Value::Set(ct, mut set) => {
                    let present = matches!(value, Value::Bool(true));
                    if present {
                        set.insert(crate::value::Comparable(key));
                    } else {
                        set.remove(&crate::value::Comparable(key));
                    }
                    stack.push(Value::Set(ct, set));
                }
                Value::Map(kt, vt, mut map) => {
                    match value {
                        Value::Option(_, Some(v)) => {
                            map.insert(crate::value::Comparable(key), *v);
                        }
                        Value::Option(_, None) => {
                            map.remove(&crate::value::Comparable(key));
                        }
                        _ => unreachable!(),
                    }
                    stack.push(Value::Map(kt, vt, map));
                }
                Value::BigMap(kt, vt, mut map) => {
                    match value {
                        Value::Option(_, Some(v)) => {
                            map.insert(crate::value::Comparable(key), *v);
                        }
                        Value::Option(_, None) => {
                            map.remove(&crate::value::Comparable(key));
                        }
                        _ => unreachable!(),
                    }
                    stack.push(Value::BigMap(kt, vt, map));
                }
                _ => unreachable!(),
            }
        }
        Instr::Loop(body) => loop {
            match pop(stack) {
                Value::Bool(true) => exec(body, stack, ctx, steps)?,
                Value::Bool(false) => break,
                _ => unreachable!(),
            }
        },
        Instr::LoopLeft(body) => loop {
            match pop(stack) {
                Value::Or(_, _, Either::Left(v)) => {
                    stack.push(*v);
                    exec(body, stack, ctx, steps)?;
                }
                Value::Or(_, _, Either::Right(v)) => {
                    stack.push(*v);
                    break;
                }
                _ => unreachable!(),
            }
        },
        Instr::Iter(body) => {
            let items = match pop(stack) {
                Value::List(_, items) => items,
                Value::Set(_, set) => set.into_iter().map(|c| c.0).collect(),
                Value::Map(_, _, map) => map.into_iter().map(|(k, v)| Value::Pair(Box::new(k.0), Box::new(v))).collect(),
                _ => unreachable!(),
            };
            for item in items {
                stack.push(item);
                exec(body, stack, ctx, steps)?;
            }
        }
        Instr::Map(body) => match pop(stack) {
            Value::List(elem_ty, items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut result_ty = None;
                for item in items {
                    stack.push(item);
                    exec(body, stack, ctx, steps)?;
                    let r = pop(stack);
                    result_ty.get_or_insert_with(|| r.type_of());
                    out.push(r);
                }
                let _ = elem_ty;
                stack.push(Value::List(result_ty.unwrap_or(T::Unit), out));
            }
            Value::Map(kt, _vt, map) => {
                let mut out = std::collections::BTreeMap::new();
                let mut result_ty = None;
                for (k, v) in map {
                    stack.push(Value::Pair(Box::new(k.0.clone()), Box::new(v)));
                    exec(body, stack, ctx, steps)?;
                    let r = pop(stack);
                    result_ty.get_or_insert_with(|| r.type_of());
                    out.insert(k, r);
                }
                stack.push(Value::Map(kt, result_ty.unwrap_or(T::Unit), out));
            }
            _ => unreachable!(),
        },
        Instr::Lambda(i, o, body) => stack.push(Value::Lambda(i.clone(), o.clone(), (**body).clone())),
        Instr::Exec => {
            let arg = pop(stack);
            match pop(stack) {
                Value::Lambda(_, _, body) => {
                    stack.push(arg);
                    exec(&body, stack, ctx, steps)?;
                }
                _ => unreachable!(),
            }
        }
        Instr::Apply => {
            let arg = pop(stack);
            match pop(stack) {
                Value::Lambda(i, o, body) => {
                    let (fst_ty, snd_ty) = match i {
                        T::Pair(a, b) => (*a, *b),
                        _ => unreachable!(),
                    };
                    let wrapped = Instr::Seq(vec![Instr::Push(fst_ty, arg), Instr::Pair, body]);
                    stack.push(Value::Lambda(snd_ty, o, wrapped));
                }
                _ => unreachable!(),
            }
        }
        Instr::TransferTokens => {
            let dest = pop(stack);
            let amount = pop(stack);
            let param = pop(stack);
            let (dest_addr, param_ty) = match dest {
                Value::Contract(ty, addr) => (addr, ty),
                _ => unreachable!(),
            };
            let amount = match amount {
                Value::Mutez(m) => m,
                _ => unreachable!(),
            };
            stack.push(Value::Operation(Box::new(Op::TransferTokens { parameter: param, parameter_ty: param_ty, amount, dest: dest_addr })));
        }
        Instr::SetDelegate => {
            let delegate = match pop(stack) {
                Value::Option(_, d) => d.map(|v| match *v {
                    Value::KeyHash(kh) => kh,
                    _ => unreachable!(),
                }),
                _ => unreachable!(),
            };
            stack.push(Value::Operation(Box::new(Op::SetDelegate(delegate))));
        }
        Instr::CreateContract { storage_ty, parameter_ty, code } => {
            let delegate = match pop(stack) {
                Value::Option(_, d) => d.map(|v| match *v {
                    Value::KeyHash(kh) => kh,
                    _ => unreachable!(),
                }),
                _ => unreachable!(),
            };
            let balance = match pop(stack) {
                Value::Mutez(m) => m,
                _ => unreachable!(),
            };
            let storage = pop(stack);
            stack.push(Value::Operation(Box::new(Op::CreateContract {
                manager: crate::crypto::PublicKey::new(Vec::new()),
                delegate,
                spendable: true,
                delegatable: true,
                balance,
                initial_storage: storage,
                storage_ty: storage_ty.clone(),
                parameter_ty: parameter_ty.clone(),
                code: (**code).clone(),
            })));
            stack.push(Value::Address(originate_address(&ctx.self_addr, ctx.origination_counter)));
            ctx.origination_counter += 1;
        }
        Instr::Amount => stack.push(Value::Mutez(ctx.amount)),
        Instr::Balance => stack.push(Value::Mutez(ctx.balance)),
        Instr::Now => stack.push(Value::Timestamp(ctx.now)),
        Instr::Source => stack.push(Value::Address(ctx.source.clone())),
        Instr::Sender => stack.push(Value::Address(ctx.sender.clone())),
        Instr::SelfContract(ty) => stack.push(Value::Contract(ty.clone(), ctx.self_addr.clone())),
        Instr::Address_ => match pop(stack) {
            Value::Contract(_, addr) => stack.push(Value::Address(addr)),
            _ => unreachable!(),
        },
        Instr::ContractOf(ty) => match pop(stack) {
            Value::Address(addr) => stack.push(Value::Option(T::contract(ty.clone()).expect("checker validated this contract type"), Some(Box::new(Value::Contract(ty.clone(), addr))))),
            _ => unreachable!(),
        },
        Instr::ImplicitAccount => match pop(stack) {
            Value::KeyHash(kh) => {
                let addr = Address::new(crate::address::AddressTag::Tz1, {
                    let mut h = [0u8; 20];
                    let bytes = kh.as_bytes();
                    for (i, byte) in h.iter_mut().enumerate() {
                        *byte = bytes.get(i).copied().unwrap_or(0);
                    }
                    h
                });
                stack.push(Value::Contract(T::Unit, addr));
            }
            _ => unreachable!(),
        },
        Instr::FailWith => {
            let v = pop(stack);
            return Err(InterpreterError::IEInterpreterFailed(ctx.self_addr.clone(), v));
        }
        Instr::Unit => stack.push(Value::Unit),
        Instr::Ext(ext_instr) => exec_ext(ext_instr, stack, ctx, steps)?,
    }
    Ok(())
}

fn as_bool(v: Value) -> bool {
    match v {
        Value::Bool(b) => b,
        _ => unreachable!(),
    }
}

fn exec_add(op: &crate::checker::poly::ArithOp, stack: &mut Vec<Value>) -> Result<(), InterpreterError> {
    use crate::checker::poly::ArithOp::*;
    let b = pop(stack);
    let a = pop(stack);
    let result = match (op, a, b) {
        (IntInt, Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (IntNat, Value::Int(a), Value::Nat(b)) => Value::Int(a + b as i128),
        (NatInt, Value::Nat(a), Value::Int(b)) => Value::Int(a as i128 + b),
        (NatNat, Value::Nat(a), Value::Nat(b)) => Value::Nat(a + b),
        (MutezMutez, Value::Mutez(a), Value::Mutez(b)) => Value::Mutez(a.checked_add(b).map_err(InterpreterError::IEArithmetic)?),
        (TimestampInt, Value::Timestamp(a), Value::Int(b)) => Value::Timestamp(a + b as i64),
        (IntTimestamp, Value::Int(a), Value::Timestamp(b)) => Value::Timestamp(a as i64 + b),
        _ => unreachable!("checker guarantees operands match the resolved ArithOp"),
    };
    stack.push(result);
    Ok(())
}

fn exec_sub(op: &crate::checker::poly::ArithOp, stack: &mut Vec<Value>) -> Result<(), InterpreterError> {
    use crate::checker::poly::ArithOp::*;
    let b = pop(stack);
    let a = pop(stack);
    let result = match (op, a, b) {
        (IntInt, Value::Int(a), Value::Int(b)) => Value::Int(a - b),
        (IntNat, Value::Int(a), Value::Nat(b)) => Value::Int(a - b as i128),
        (NatInt, Value::Nat(a), Value::Int(b)) => Value::Int(a as i128 - b),
        (NatNat, Value::Nat(a), Value::Nat(b)) => Value::Int(a as i128 - b as i128),
        (MutezMutez, Value::Mutez(a), Value::Mutez(b)) => Value::Mutez(a.checked_sub(b).map_err(InterpreterError::IEArithmetic)?),
        (TimestampInt, Value::Timestamp(a), Value::Int(b)) => Value::Timestamp(a - b as i64),
        (TimestampTimestamp, Value::Timestamp(a), Value::Timestamp(b)) => Value::Int(a as i128 - b as i128),
        _ => unreachable!("checker guarantees operands match the resolved ArithOp"),
    };
    stack.push(result);
    Ok(())
}

fn exec_mul(op: &crate::checker::poly::ArithOp, stack: &mut Vec<Value>) -> Result<(), InterpreterError> {
    use crate::checker::poly::ArithOp::*;
    let b = pop(stack);
    let a = pop(stack);
    let result = match (op, a, b) {
        (IntInt, Value::Int(a), Value::Int(b)) => Value::Int(a * b),
        (IntNat, Value::Int(a), Value::Nat(b)) => Value::Int(a * b as i128),
        (NatInt, Value::Nat(a), Value::Int(b)) => Value::Int(a as i128 * b),
        (NatNat, Value::Nat(a), Value::Nat(b)) => Value::Nat(a * b),
        (NatMutez, Value::Nat(a), Value::Mutez(b)) => Value::Mutez(b.checked_mul_nat(a).map_err(InterpreterError::IEArithmetic)?),
        (MutezNat, Value::Mutez(a), Value::Nat(b)) => Value::Mutez(a.checked_mul_nat(b).map_err(InterpreterError::IEArithmetic)?),
        _ => unreachable!("checker guarantees operands match the resolved ArithOp"),
    };
    stack.push(result);
    Ok(())
}

fn exec_ediv(op: &crate::checker::poly::EDivOp, stack: &mut Vec<Value>) {
    use crate::checker::poly::EDivOp::*;
    let b = pop(stack);
    let a = pop(stack);
    let (q, r) = op.result_types();
    let zero = match &b {
        Value::Int(0) | Value::Nat(0) => true,
        Value::Mutez(m) => m.as_u64() == 0,
        _ => false,
    };
    if zero {
        stack.push(Value::Option(T::pair(q, r), None));
        return;
    }
    let (quot, rem): (Value, Value) = match (op, a, b) {
        (IntInt, Value::Int(a), Value::Int(b)) => (Value::Int(a.div_euclid(b)), Value::Nat(a.rem_euclid(b) as u128)),
        (IntNat, Value::Int(a), Value::Nat(b)) => (Value::Int(a.div_euclid(b as i128)), Value::Nat(a.rem_euclid(b as i128) as u128)),
        (NatInt, Value::Nat(a), Value::Int(b)) => ((Value::Int((a as i128).div_euclid(b))), Value::Nat((a as i128).rem_euclid(b) as u128)),
        (NatNat, Value::Nat(a), Value::Nat(b)) => (Value::Nat(a / b), Value::Nat(a % b)),
        (MutezNat, Value::Mutez(a), Value::Nat(b)) => (Value::Mutez(Mutez::new(a.as_u64() / b as u64).unwrap()), Value::Mutez(Mutez::new(a.as_u64() % b as u64).unwrap())),
        (MutezMutez, Value::Mutez(a), Value::Mutez(b)) => (Value::Nat((a.as_u64() / b.as_u64()) as u128), Value::Mutez(Mutez::new(a.as_u64() % b.as_u64()).unwrap())),
        _ => unreachable!("checker guarantees operands match the resolved EDivOp"),
    };
    stack.push(Value::Option(T::pair(quot.type_of(), rem.type_of()), Some(Box::new(Value::Pair(Box::new(quot), Box::new(rem))))));
}

fn exec_concat(op: &crate::checker::poly::ConcatOp, stack: &mut Vec<Value>) {
    use crate::checker::poly::ConcatOp::*;
    match op {
        StringString => {
            let b = pop(stack);
            let a = pop(stack);
            match (a, b) {
                (Value::String(a), Value::String(b)) => stack.push(Value::String(a + &b)),
                _ => unreachable!(),
            }
        }
        BytesBytes => {
            let b = pop(stack);
            let a = pop(stack);
            match (a, b) {
                (Value::Bytes(mut a), Value::Bytes(b)) => {
                    a.extend(b);
                    stack.push(Value::Bytes(a));
                }
                _ => unreachable!(),
            }
        }
        StringList => match pop(stack) {
            Value::List(_, items) => {
                let joined: String = items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        _ => unreachable!(),
                    })
                    .collect();
                stack.push(Value::String(joined));
            }
            _ => unreachable!(),
        },
        BytesList => match pop(stack) {
            Value::List(_, items) => {
                let mut joined = Vec::new();
                for v in items {
                    match v {
                        Value::Bytes(b) => joined.extend(b),
                        _ => unreachable!(),
                    }
                }
                stack.push(Value::Bytes(joined));
            }
            _ => unreachable!(),
        },
    }
}

fn exec_size(op: &crate::checker::poly::SizeOp, stack: &mut Vec<Value>) {
    use crate::checker::poly::SizeOp::*;
    let n = match (op, pop(stack)) {
        (String, Value::String(s)) => s.len(),
        (Bytes, Value::Bytes(b)) => b.len(),
        (List(_), Value::List(_, items)) => items.len(),
        (Set(_), Value::Set(_, set)) => set.len(),
        (Map(..), Value::Map(_, _, map)) => map.len(),
        _ => unreachable!(),
    };
    stack.push(Value::Nat(n as u128));
}

fn exec_ext(instr: &crate::ext::ExtInstr, stack: &mut [Value], ctx: &mut ExecCtx, steps: &mut RemainingSteps) -> Result<(), InterpreterError> {
    use crate::ext::ExtInstr::*;
    match instr {
        StackType(_) => Ok(()),
        Print(args) => {
            let rendered: String = args
                .iter()
                .map(|a| match a {
                    crate::ext::PrintArg::Literal(s) => s.clone(),
                    crate::ext::PrintArg::StackSlot(r) => format!("{:?}", stack[stack.len() - 1 - r.0]),
                })
                .collect();
            debug!(target: "mitzen::print", "{rendered}");
            Ok(())
        }
        TestAssert { message, body } => {
            let mut local = stack.to_vec();
            exec(body, &mut local, ctx, steps)?;
            match local.pop() {
                Some(Value::Bool(true)) => Ok(()),
                _ => {
                    warn!(target: "mitzen::test_assert", "assertion failed: {message}");
                    Err(InterpreterError::IETestAssertFailed(message.clone()))
                }
            }
        }
        Fn(_) => Ok(()),
    }
}

/// Runs a top-level transfer against `gstate` to completion, draining every `operation` the
/// target contract (and anything it in turn calls) emits, and returning a fresh, mutated clone of
/// `gstate` plus the log of updates that produced it.
///
/// `gstate` is never mutated in place: on any error the caller's original snapshot is untouched
/// (`spec.md` §7's atomic commit-or-rollback), since only a clone was ever touched.
#[allow(clippy::too_many_arguments)]
pub fn interpret(
    gstate: &GState,
    now: i64,
    source: Address,
    sender: Address,
    dest: Address,
    amount: Mutez,
    parameter: Value,
    max_steps: RemainingSteps,
) -> Result<InterpreterRes, InterpreterError> {
    let mut working = gstate.clone();
    let mut updates = Vec::new();
    let mut steps = max_steps;

    let mut queue: VecDeque<(Address, Address, Address, Mutez, Value)> = VecDeque::new();
    queue.push_back((source, sender, dest, amount, parameter));

    while let Some((source, sender, dest, amount, parameter)) = queue.pop_front() {
        let account = working.account(&dest).cloned();
        match account {
            Some(AccountState::Simple { balance, .. }) => {
                let new_balance = balance.checked_add(amount).map_err(InterpreterError::IEArithmetic)?;
                updates.push(GStateUpdate::SetBalance(dest.clone(), new_balance));
                working.apply(GStateUpdate::SetBalance(dest, new_balance));
            }
            Some(AccountState::Contract { balance, parameter_ty, storage, code, .. }) => {
                debug!(target: "mitzen::interpreter", "dispatching transfer to {dest}");
                let new_balance = balance.checked_add(amount).map_err(InterpreterError::IEArithmetic)?;
                if parameter.type_of() != parameter_ty {
                    return Err(InterpreterError::IEIllTypedParameter(format!("expected {parameter_ty}, found {}", parameter.type_of())));
                }
                let origination_counter = working.origination_count(&dest);
                let (ops, new_storage) =
                    run_contract(&code, &dest, parameter, storage, amount, new_balance, &sender, &source, now, origination_counter, &mut steps)?;
                updates.push(GStateUpdate::SetBalance(dest.clone(), new_balance));
                updates.push(GStateUpdate::SetStorage(dest.clone(), new_storage.clone()));
                working.apply(GStateUpdate::SetBalance(dest.clone(), new_balance));
                working.apply(GStateUpdate::SetStorage(dest.clone(), new_storage));
                for op in ops {
                    match op {
                        Op::TransferTokens { parameter, amount, dest: next_dest, .. } => {
                            queue.push_back((source.clone(), dest.clone(), next_dest, amount, parameter));
                        }
                        Op::SetDelegate(delegate) => {
                            updates.push(GStateUpdate::SetDelegate(dest.clone(), delegate.clone()));
                            working.apply(GStateUpdate::SetDelegate(dest.clone(), delegate));
                        }
                        Op::CreateAccount { delegate, balance, .. } => {
                            let counter = working.origination_count(&dest);
                            let new_addr = originate_address(&dest, counter);
                            working.bump_origination_counter(&dest);
                            let state = AccountState::Simple { balance, delegate };
                            updates.push(GStateUpdate::Originate(new_addr.clone(), state.clone()));
                            working.apply(GStateUpdate::Originate(new_addr, state));
                        }
                        Op::CreateContract { balance, initial_storage, storage_ty, parameter_ty, code, delegate, .. } => {
                            let counter = working.origination_count(&dest);
                            let new_addr = originate_address(&dest, counter);
                            working.bump_origination_counter(&dest);
                            let state = AccountState::Contract { balance, delegate, parameter_ty, storage_ty, code, storage: initial_storage };
                            updates.push(GStateUpdate::Originate(new_addr.clone(), state.clone()));
                            working.apply(GStateUpdate::Originate(new_addr, state));
                        }
                    }
                }
            }
            None => return Err(InterpreterError::IEUnknownContract(dest)),
        }
    }

    Ok(InterpreterRes { gstate: working, updates, remaining_steps: steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressTag;

    fn addr(b: u8) -> Address { Address::new(AddressTag::Tz1, [b; 20]) }

    #[test]
    fn remaining_steps_exhausts() {
        let mut steps = RemainingSteps::new(1);
        assert!(steps.tick().is_ok());
        assert!(matches!(steps.tick(), Err(InterpreterError::IEGasExhausted)));
    }

    #[test]
    fn simple_transfer_credits_balance() {
        let mut gstate = GState::new();
        gstate.apply(GStateUpdate::SetBalance(addr(2), Mutez::ZERO));
        let res = interpret(&gstate, 0, addr(1), addr(1), addr(2), Mutez::new(500).unwrap(), Value::Unit, RemainingSteps::new(100)).unwrap();
        assert_eq!(res.gstate.account(&addr(2)).unwrap().balance(), Mutez::new(500).unwrap());
    }

    #[test]
    fn transfer_to_unknown_contract_errors() {
        let gstate = GState::new();
        let err = interpret(&gstate, 0, addr(1), addr(1), addr(9), Mutez::ZERO, Value::Unit, RemainingSteps::new(100)).unwrap_err();
        assert!(matches!(err, InterpreterError::IEUnknownContract(_)));
    }

    #[test]
    fn failwith_propagates_without_mutating_input() {
        let mut gstate = GState::new();
        let code = Instr::Seq(vec![Instr::Cdr, Instr::FailWith]);
        gstate.apply(GStateUpdate::Originate(
            addr(3),
            AccountState::Contract { balance: Mutez::ZERO, delegate: None, parameter_ty: T::Unit, storage_ty: T::int(), code, storage: Value::Int(7) },
        ));
        let snapshot = gstate.clone();
        let err = interpret(&gstate, 0, addr(1), addr(1), addr(3), Mutez::ZERO, Value::Unit, RemainingSteps::new(100)).unwrap_err();
        assert!(matches!(err, InterpreterError::IEInterpreterFailed(_, Value::Int(7))));
        assert_eq!(gstate.account(&addr(3)), snapshot.account(&addr(3)));
    }
}
