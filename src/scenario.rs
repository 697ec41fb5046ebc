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

//! The integrational contract-test driver (`spec.md` §4.8, C8): `originate`/`transfer` build up a
//! pending operation queue against an in-memory [`GState`], and `validate` flushes the whole queue
//! through [`crate::interpreter::interpret`] in one atomic batch, checking the outcome against a
//! caller-supplied [`Validator`].
//!
//! `spec.md` §9 calls for replacing the reference implementation's state-plus-error-effect monad
//! with "an explicit `Scenario` struct holding `(now, max_steps, gstate, pending, maybe_error)`;
//! each operation reads/writes it in place and short-circuits on error." We keep the first four
//! fields verbatim but drop `maybe_error`: nothing here can fail before `validate` runs (`originate`
//! and `transfer` only enqueue already-typed values), so there is never a sticky error to carry
//! between calls — see `DESIGN.md`.

use std::collections::VecDeque;

use log::info;

use crate::address::{originate_address, Address, AddressTag};
use crate::config::ScenarioConfig;
use crate::gstate::{AccountState, GState, GStateUpdate};
use crate::instr::Instr;
use crate::interpreter::{interpret, InterpreterError, RemainingSteps};
use crate::types::T;
use crate::value::{Mutez, Value};

/// A queued-but-not-yet-executed effect against a [`Scenario`]'s [`GState`].
#[derive(Clone, Debug)]
enum PendingOp {
    Originate(Address, AccountState),
    Transfer { sender: Address, dest: Address, amount: Mutez, parameter: Value },
}

/// Errors [`Scenario::validate`] raises when the interpreter's outcome does not match what the
/// supplied [`Validator`] expected (`spec.md` §4.8's outcome table).
#[derive(Clone, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ValidationError {
    /// the interpreter failed, but not the way the validator expected: {0}.
    UnexpectedInterpreterError(InterpreterError),
    /// the validator expected the interpreter to fail, but the transaction succeeded.
    ExpectingInterpreterToFail,
    /// the transaction succeeded, but its updates did not match: {0}.
    IncorrectUpdates(String),
}

/// What a [`Scenario::validate`] call expects of the interpreter's outcome.
///
/// A `Left` validator only ever looks at a failed run's [`InterpreterError`]; a `Right` validator
/// only ever looks at a successful run's resulting [`GState`] plus its [`GStateUpdate`] log — the
/// two arms can never both apply to the same run, which is exactly what the outcome table in
/// `spec.md` §4.8 encodes.
pub enum Validator {
    ExpectError(Box<dyn Fn(&InterpreterError) -> bool>),
    ExpectSuccess(Box<dyn Fn(&GState, &[GStateUpdate]) -> Result<(), String>>),
}

impl Validator {
    /// Builds a [`Validator::ExpectError`] from a predicate over the raised error.
    pub fn expect_error(predicate: impl Fn(&InterpreterError) -> bool + 'static) -> Self {
        Validator::ExpectError(Box::new(predicate))
    }

    /// Builds a [`Validator::ExpectSuccess`] from a predicate over the resulting state and log.
    pub fn expect_success(check: impl Fn(&GState, &[GStateUpdate]) -> Result<(), String> + 'static) -> Self {
        Validator::ExpectSuccess(Box::new(check))
    }
}

/// Accepts a successful run unconditionally; the identity element for [`compose`].
pub fn expect_any_success() -> Validator { Validator::expect_success(|_, _| Ok(())) }

/// Runs every success validator in `validators` in order, failing with the first one's error.
pub fn compose(validators: Vec<Box<dyn Fn(&GState, &[GStateUpdate]) -> Result<(), String>>>) -> Validator {
    Validator::expect_success(move |gstate, updates| {
        for check in &validators {
            check(gstate, updates)?;
        }
        Ok(())
    })
}

/// Succeeds if `addr`'s post-transaction storage satisfies `predicate`.
pub fn expect_storage_update(addr: Address, predicate: impl Fn(&Value) -> bool + 'static) -> Validator {
    Validator::expect_success(move |gstate, _updates| match gstate.account(&addr) {
        Some(AccountState::Contract { storage, .. }) if predicate(storage) => Ok(()),
        Some(AccountState::Contract { storage, .. }) => Err(format!("storage at {addr} did not satisfy predicate: {storage:?}")),
        Some(AccountState::Simple { .. }) => Err(format!("{addr} is not a contract")),
        None => Err(format!("{addr} does not exist")),
    })
}

/// Succeeds if `addr`'s post-transaction storage equals `expected` exactly.
pub fn expect_storage_update_const(addr: Address, expected: Value) -> Validator {
    expect_storage_update(addr, move |v| *v == expected)
}

/// Succeeds if `addr`'s storage in the update log changed to exactly `expected` at some point
/// during the transaction, regardless of its final value (`spec.md` §4.8).
pub fn expect_storage_const(addr: Address, expected: Value) -> Validator {
    Validator::expect_success(move |_gstate, updates| {
        let saw_it = updates.iter().any(|u| matches!(u, GStateUpdate::SetStorage(a, v) if *a == addr && *v == expected));
        if saw_it {
            Ok(())
        } else {
            Err(format!("{addr} was never updated to storage {expected:?}"))
        }
    })
}

/// Succeeds if `addr`'s post-transaction balance equals `expected`.
pub fn expect_balance(addr: Address, expected: Mutez) -> Validator {
    Validator::expect_success(move |gstate, _updates| match gstate.account(&addr) {
        Some(acc) if acc.balance() == expected => Ok(()),
        Some(acc) => Err(format!("{addr} has balance {:?}, expected {expected:?}", acc.balance())),
        None => Err(format!("{addr} does not exist")),
    })
}

/// Succeeds only if the transaction ran out of gas.
pub fn expect_gas_exhaustion() -> Validator { Validator::expect_error(|e| matches!(e, InterpreterError::IEGasExhausted)) }

/// Succeeds if the transaction failed with `FAILWITH` from `addr`, carrying a payload satisfying
/// `predicate`.
pub fn expect_michelson_failed(addr: Address, predicate: impl Fn(&Value) -> bool + 'static) -> Validator {
    Validator::expect_error(move |e| matches!(e, InterpreterError::IEInterpreterFailed(a, v) if *a == addr && predicate(v)))
}

/// The root sender every [`Scenario::originate`] call runs as, for lack of a sender parameter in
/// `spec.md` §4.8's `originate` signature. A scenario is single-actor by construction; tests that
/// need distinct senders to disambiguate originations use distinct `source`/`sender` on
/// [`Scenario::transfer`] instead, which do take explicit addresses.
fn scenario_root() -> Address { Address::new(AddressTag::Tz1, [0u8; 20]) }

/// An in-memory blockchain sandbox, grown one `originate`/`transfer` call at a time and flushed
/// with `validate`.
pub struct Scenario {
    now: i64,
    max_steps: RemainingSteps,
    gstate: GState,
    pending: VecDeque<PendingOp>,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> Self {
        Scenario { now: config.now, max_steps: config.max_steps, gstate: GState::new(), pending: VecDeque::new() }
    }

    pub fn gstate(&self) -> &GState { &self.gstate }

    /// Computes the address a new contract will get, queues its origination, and returns that
    /// address immediately — the contract does not exist in `gstate()` until the queue is flushed
    /// by a successful [`Scenario::validate`] (`spec.md` §4.8).
    pub fn originate(&mut self, code: Instr, parameter_ty: T, storage_ty: T, initial_storage: Value, balance: Mutez) -> Address {
        let sender = scenario_root();
        let already_queued = self.pending.iter().filter(|op| matches!(op, PendingOp::Originate(..))).count() as u64;
        let counter = self.gstate.origination_count(&sender) + already_queued;
        let addr = originate_address(&sender, counter);
        let state = AccountState::Contract { balance, delegate: None, parameter_ty, storage_ty, code, storage: initial_storage };
        self.pending.push_back(PendingOp::Originate(addr.clone(), state));
        addr
    }

    /// Queues a transfer from `sender` to `dest`.
    pub fn transfer(&mut self, sender: Address, dest: Address, amount: Mutez, parameter: Value) {
        self.pending.push_back(PendingOp::Transfer { sender, dest, amount, parameter });
    }

    pub fn set_now(&mut self, now: i64) { self.now = now; }

    pub fn set_max_steps(&mut self, max_steps: u64) { self.max_steps = RemainingSteps::new(max_steps); }

    /// Flushes the pending queue through the interpreter as one atomic batch, feeds the outcome to
    /// `validator`, and on success adopts the resulting state and clears the queue (`spec.md`
    /// §4.8's outcome table). On any failure the scenario's state and queue are left untouched, so
    /// a failed `validate` call can be retried after fixing up the test.
    pub fn validate(&mut self, validator: Validator) -> Result<(), ValidationError> {
        let mut working = self.gstate.clone();
        let mut all_updates = Vec::new();
        let mut steps = self.max_steps;

        let run_result = (|| -> Result<(), InterpreterError> {
            for op in &self.pending {
                match op {
                    PendingOp::Originate(addr, state) => {
                        let sender = scenario_root();
                        working.bump_origination_counter(&sender);
                        let update = GStateUpdate::Originate(addr.clone(), state.clone());
                        working.apply(update.clone());
                        all_updates.push(update);
                    }
                    PendingOp::Transfer { sender, dest, amount, parameter } => {
                        let res = interpret(&working, self.now, sender.clone(), sender.clone(), dest.clone(), *amount, parameter.clone(), steps)?;
                        working = res.gstate;
                        all_updates.extend(res.updates);
                        steps = res.remaining_steps;
                    }
                }
            }
            Ok(())
        })();

        match (run_result, validator) {
            (Err(e), Validator::ExpectError(predicate)) => {
                if predicate(&e) {
                    info!(target: "mitzen::scenario", "validate: expected error observed: {e}");
                    Ok(())
                } else {
                    Err(ValidationError::UnexpectedInterpreterError(e))
                }
            }
            (Err(e), Validator::ExpectSuccess(_)) => Err(ValidationError::UnexpectedInterpreterError(e)),
            (Ok(()), Validator::ExpectError(_)) => Err(ValidationError::ExpectingInterpreterToFail),
            (Ok(()), Validator::ExpectSuccess(check)) => match check(&working, &all_updates) {
                Ok(()) => {
                    self.gstate = working;
                    self.pending.clear();
                    self.max_steps = steps;
                    Ok(())
                }
                Err(msg) => Err(ValidationError::IncorrectUpdates(msg)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address { Address::new(AddressTag::Tz1, [b; 20]) }

    #[test]
    fn originate_then_transfer_updates_storage() {
        let mut scenario = Scenario::new(ScenarioConfig::default());
        let code = Instr::Seq(vec![Instr::Cdr, Instr::Drop(1), Instr::Push(T::int(), Value::Int(42)), Instr::Nil(T::Operation), Instr::Pair]);
        let contract = scenario.originate(code, T::Unit, T::int(), Value::Int(0), Mutez::ZERO);
        scenario.transfer(addr(1), contract.clone(), Mutez::ZERO, Value::Unit);
        scenario.validate(expect_storage_update_const(contract, Value::Int(42))).unwrap();
    }

    #[test]
    fn failing_transfer_leaves_state_untouched() {
        let mut scenario = Scenario::new(ScenarioConfig::default());
        let before = scenario.gstate().clone();
        scenario.transfer(addr(1), addr(9), Mutez::ZERO, Value::Unit);
        let err = scenario.validate(expect_any_success());
        assert!(err.is_err());
        assert_eq!(format!("{:?}", scenario.gstate()), format!("{:?}", before));
    }

    #[test]
    fn gas_exhaustion_is_recognized_by_its_dedicated_validator() {
        let mut scenario = Scenario::new(ScenarioConfig::default());
        let code = Instr::Seq(vec![Instr::Push(T::bool(), Value::Bool(true)), Instr::Loop(Box::new(Instr::Push(T::bool(), Value::Bool(true))))]);
        let contract = scenario.originate(code, T::Unit, T::Unit, Value::Unit, Mutez::ZERO);
        scenario.set_max_steps(5);
        scenario.transfer(addr(1), contract, Mutez::ZERO, Value::Unit);
        scenario.validate(expect_gas_exhaustion()).unwrap();
    }
}
