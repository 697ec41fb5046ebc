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

//! The mutable-by-transaction global state (`spec.md` §7, C7): every account's balance, and every
//! originated contract's code and storage.
//!
//! There is no cross-run persistence (`spec.md` §1 Non-goal), so [`GState`] is an in-memory
//! snapshot. A transaction runs against a clone; the [`crate::interpreter`] only ever hands the
//! caller a fresh, mutated clone plus the log of [`GStateUpdate`]s that produced it, and a
//! [`crate::scenario::Scenario`] adopts that clone only once the whole transaction has succeeded —
//! a failed transaction's clone, and the partial log behind it, is simply dropped, giving the
//! all-or-nothing commit `spec.md` §7 calls for without needing an explicit undo log.

use std::collections::BTreeMap;

use log::debug;

use crate::address::Address;
use crate::crypto::KeyHash;
use crate::instr::Instr;
use crate::types::T;
use crate::value::{Mutez, Value};

/// One account's on-chain state.
#[derive(Clone, Debug, PartialEq)]
pub enum AccountState {
    /// An implicit (`tz1`/`tz2`/`tz3`) account: just a balance and an optional delegate.
    Simple { balance: Mutez, delegate: Option<KeyHash> },
    /// An originated (`KT1`) smart contract.
    Contract {
        balance: Mutez,
        delegate: Option<KeyHash>,
        parameter_ty: T,
        storage_ty: T,
        code: Instr,
        storage: Value,
    },
}

impl AccountState {
    pub fn balance(&self) -> Mutez {
        match self {
            AccountState::Simple { balance, .. } => *balance,
            AccountState::Contract { balance, .. } => *balance,
        }
    }

    pub fn delegate(&self) -> Option<&KeyHash> {
        match self {
            AccountState::Simple { delegate, .. } => delegate.as_ref(),
            AccountState::Contract { delegate, .. } => delegate.as_ref(),
        }
    }

    pub fn as_contract(&self) -> Option<(&T, &T, &Instr, &Value)> {
        match self {
            AccountState::Contract { parameter_ty, storage_ty, code, storage, .. } => Some((parameter_ty, storage_ty, code, storage)),
            AccountState::Simple { .. } => None,
        }
    }
}

/// One entry in a transaction's update log (`spec.md` §7).
#[derive(Clone, Debug, PartialEq)]
pub enum GStateUpdate {
    SetBalance(Address, Mutez),
    SetStorage(Address, Value),
    SetDelegate(Address, Option<KeyHash>),
    Originate(Address, AccountState),
}

/// The full in-memory blockchain snapshot.
#[derive(Clone, Debug, Default)]
pub struct GState {
    accounts: BTreeMap<Address, AccountState>,
    origination_counters: BTreeMap<Address, u64>,
}

impl GState {
    pub fn new() -> Self { Self::default() }

    pub fn account(&self, addr: &Address) -> Option<&AccountState> { self.accounts.get(addr) }

    pub fn contains(&self, addr: &Address) -> bool { self.accounts.contains_key(addr) }

    /// The number of originations already observed from `sender`, used to derive the next
    /// origination's address (`spec.md` §9, resolved in `crate::address::originate_address`).
    pub fn origination_count(&self, sender: &Address) -> u64 { self.origination_counters.get(sender).copied().unwrap_or(0) }

    pub fn set_simple_balance(&mut self, addr: Address, balance: Mutez) {
        self.accounts
            .entry(addr)
            .and_modify(|acc| acc.set_balance(balance))
            .or_insert(AccountState::Simple { balance, delegate: None });
    }

    /// Applies a single logged update to this snapshot.
    pub fn apply(&mut self, update: GStateUpdate) {
        match update {
            GStateUpdate::SetBalance(addr, balance) => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.set_balance(balance);
                } else {
                    self.accounts.insert(addr, AccountState::Simple { balance, delegate: None });
                }
            }
            GStateUpdate::SetStorage(addr, value) => {
                if let Some(AccountState::Contract { storage, .. }) = self.accounts.get_mut(&addr) {
                    *storage = value;
                }
            }
            GStateUpdate::SetDelegate(addr, delegate) => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.set_delegate(delegate);
                }
            }
            GStateUpdate::Originate(addr, state) => {
                debug!(target: "mitzen::gstate", "originating {addr}");
                self.accounts.insert(addr, state);
            }
        }
    }

    /// Applies a whole update log in order.
    pub fn apply_all(&mut self, updates: impl IntoIterator<Item = GStateUpdate>) {
        for update in updates {
            self.apply(update);
        }
    }

    /// Records that `sender` has originated one more contract, so the next call to
    /// [`GState::origination_count`] reflects it.
    pub fn bump_origination_counter(&mut self, sender: &Address) {
        *self.origination_counters.entry(sender.clone()).or_insert(0) += 1;
    }
}

impl AccountState {
    fn set_balance(&mut self, new_balance: Mutez) {
        match self {
            AccountState::Simple { balance, .. } => *balance = new_balance,
            AccountState::Contract { balance, .. } => *balance = new_balance,
        }
    }

    fn set_delegate(&mut self, new_delegate: Option<KeyHash>) {
        match self {
            AccountState::Simple { delegate, .. } => *delegate = new_delegate,
            AccountState::Contract { delegate, .. } => *delegate = new_delegate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressTag;

    fn addr(byte: u8) -> Address { Address::new(AddressTag::Tz1, [byte; 20]) }

    #[test]
    fn apply_creates_simple_account_on_first_balance_update() {
        let mut gstate = GState::new();
        gstate.apply(GStateUpdate::SetBalance(addr(1), Mutez::new(100).unwrap()));
        assert_eq!(gstate.account(&addr(1)).unwrap().balance(), Mutez::new(100).unwrap());
    }

    #[test]
    fn origination_counter_increments_independently_per_sender() {
        let mut gstate = GState::new();
        gstate.bump_origination_counter(&addr(1));
        gstate.bump_origination_counter(&addr(1));
        gstate.bump_origination_counter(&addr(2));
        assert_eq!(gstate.origination_count(&addr(1)), 2);
        assert_eq!(gstate.origination_count(&addr(2)), 1);
    }

    #[test]
    fn apply_all_replays_a_log_in_order() {
        let mut gstate = GState::new();
        gstate.apply_all(vec![
            GStateUpdate::SetBalance(addr(1), Mutez::new(10).unwrap()),
            GStateUpdate::SetBalance(addr(1), Mutez::new(20).unwrap()),
        ]);
        assert_eq!(gstate.account(&addr(1)).unwrap().balance(), Mutez::new(20).unwrap());
    }

    #[test]
    fn cloned_state_is_independent() {
        let mut gstate = GState::new();
        gstate.apply(GStateUpdate::SetBalance(addr(1), Mutez::new(10).unwrap()));
        let mut clone = gstate.clone();
        clone.apply(GStateUpdate::SetBalance(addr(1), Mutez::new(99).unwrap()));
        assert_eq!(gstate.account(&addr(1)).unwrap().balance(), Mutez::new(10).unwrap());
        assert_eq!(clone.account(&addr(1)).unwrap().balance(), Mutez::new(99).unwrap());
    }
}
