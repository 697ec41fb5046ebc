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

//! End-to-end scenarios driven entirely through the public [`Scenario`] API, one per outcome in
//! the outcome table: a plain storage update, gas exhaustion, `FAILWITH` propagation, a contract
//! chaining a `TRANSFER_TOKENS` into the operations it returns, and atomic rollback of an entire
//! batch (including an origination) when a later operation in it fails.

use mitzen::address::{Address, AddressTag};
use mitzen::annot::CarCdrVarReq;
use mitzen::checker::ast::{UInstr, UType, UValue};
use mitzen::crypto::KeyHash;
use mitzen::scenario::{expect_any_success, expect_balance, expect_gas_exhaustion, expect_michelson_failed, expect_storage_update_const};
use mitzen::{typecheck_contract, Instr, Mutez, Scenario, ScenarioConfig, Value, CT, T};

fn addr(b: u8) -> Address { Address::new(AddressTag::Tz1, [b; 20]) }

/// `[originate, transfer]` where the contract simply overwrites its storage with the incoming
/// `int` parameter, lowered from [`UInstr`] through [`typecheck_contract`] rather than built as a
/// raw [`Instr`] tree, unlike the other scenarios here.
#[test]
fn originate_then_transfer_sets_storage_to_the_incoming_parameter() {
    let code = UInstr::Seq(vec![
        UInstr::Car(CarCdrVarReq::Default),
        UInstr::Nil(UType::Operation, None),
        UInstr::Pair(None, None, None),
    ]);
    let (parameter_ty, storage_ty, instr) =
        typecheck_contract(&UType::Comparable(CT::Int), &UType::Comparable(CT::Int), &code).unwrap();

    let mut scenario = Scenario::new(ScenarioConfig::default());
    let contract = scenario.originate(instr, parameter_ty, storage_ty, Value::Int(0), Mutez::ZERO);
    scenario.transfer(addr(1), contract.clone(), Mutez::ZERO, Value::Int(7));
    scenario.validate(expect_storage_update_const(contract, Value::Int(7))).unwrap();
}

/// An unconditional `LOOP` that never reaches its exit condition runs out of gas before the
/// contract's body can return, and is reported through the dedicated gas-exhaustion validator
/// rather than as a generic interpreter error.
#[test]
fn an_unconditional_loop_exhausts_its_gas_budget() {
    let code = UInstr::Seq(vec![
        UInstr::Drop(1),
        UInstr::Push(UType::Comparable(CT::Bool), UValue::Bool(true), None, None),
        UInstr::Loop(Box::new(UInstr::Push(UType::Comparable(CT::Bool), UValue::Bool(true), None, None))),
        UInstr::Push(UType::Unit, UValue::Unit, None, None),
        UInstr::Nil(UType::Operation, None),
        UInstr::Pair(None, None, None),
    ]);
    let (parameter_ty, storage_ty, instr) = typecheck_contract(&UType::Unit, &UType::Unit, &code).unwrap();

    let mut scenario = Scenario::new(ScenarioConfig::default());
    let contract = scenario.originate(instr, parameter_ty, storage_ty, Value::Unit, Mutez::ZERO);
    scenario.set_max_steps(20);
    scenario.transfer(addr(1), contract, Mutez::ZERO, Value::Unit);
    scenario.validate(expect_gas_exhaustion()).unwrap();
}

/// `FAILWITH` aborts the transaction and carries the value it was given out to the caller, which
/// can assert on it through a predicate rather than matching the whole [`GState`].
///
/// Built as a raw [`Instr`] tree rather than lowered from [`UInstr`]: a contract whose entire body
/// always fails produces an empty hypothetical stack, which `typecheck_contract`'s final
/// `pair (list operation) storage` check always rejects (see `DESIGN.md`).
#[test]
fn failwith_propagates_its_payload_through_the_validator() {
    let code = Instr::Seq(vec![Instr::Car, Instr::FailWith]);
    let mut scenario = Scenario::new(ScenarioConfig::default());
    let contract = scenario.originate(code, T::int(), T::int(), Value::Int(0), Mutez::ZERO);
    scenario.transfer(addr(1), contract.clone(), Mutez::ZERO, Value::Int(13));
    scenario.validate(expect_michelson_failed(contract, |v| *v == Value::Int(13))).unwrap();
}

/// A contract that unwraps `(key_hash, mutez)`, opens an implicit account for the key hash, and
/// forwards the mutez to it via `TRANSFER_TOKENS`, folding the resulting operation back into the
/// scenario's queue (`spec.md` §4.6) — the beneficiary's balance reflects the forwarded transfer
/// without the test driver touching `GState` directly.
#[test]
fn a_contract_can_chain_a_transfer_tokens_into_its_own_result() {
    let code = UInstr::Seq(vec![
        UInstr::Car(CarCdrVarReq::Default),
        UInstr::Unpair,
        UInstr::ImplicitAccount,
        UInstr::Dip(2, Box::new(UInstr::Unit)),
        UInstr::TransferTokens,
        UInstr::Nil(UType::Operation, None),
        UInstr::Swap,
        UInstr::Cons,
        UInstr::Unit,
        UInstr::Swap,
        UInstr::Pair(None, None, None),
    ]);
    let parameter_ty = UType::pair(UType::Comparable(CT::KeyHash), UType::Comparable(CT::Mutez));
    let (parameter_ty, storage_ty, instr) = typecheck_contract(&parameter_ty, &UType::Unit, &code).unwrap();

    let mut scenario = Scenario::new(ScenarioConfig::default());
    let forwarder = scenario.originate(instr, parameter_ty, storage_ty, Value::Unit, Mutez::ZERO);

    let beneficiary_hash = KeyHash::new(vec![7u8; 20]);
    let beneficiary = addr(7);
    let parameter = Value::Pair(Box::new(Value::KeyHash(beneficiary_hash)), Box::new(Value::Mutez(Mutez::new(500).unwrap())));

    scenario.transfer(addr(1), forwarder, Mutez::ZERO, parameter);
    scenario.validate(expect_balance(beneficiary, Mutez::new(500).unwrap())).unwrap();
}

/// A batch of `[originate, transfer (succeeds), transfer (fails)]` rolls back as one unit: the
/// origination queued earlier in the very same `validate` call never lands in `GState` either,
/// not just the storage update the failed operation would have followed.
#[test]
fn a_failing_operation_rolls_back_every_earlier_operation_in_its_batch_including_an_origination() {
    let code = Instr::Seq(vec![Instr::Cdr, Instr::Drop(1), Instr::Push(T::int(), Value::Int(99)), Instr::Nil(T::Operation), Instr::Pair]);

    let mut scenario = Scenario::new(ScenarioConfig::default());
    let contract = scenario.originate(code, T::Unit, T::int(), Value::Int(0), Mutez::ZERO);
    scenario.transfer(addr(1), contract.clone(), Mutez::ZERO, Value::Unit);
    scenario.transfer(addr(1), addr(9), Mutez::ZERO, Value::Unit);

    let err = scenario.validate(expect_any_success());
    assert!(err.is_err());
    assert!(scenario.gstate().account(&contract).is_none());
}
