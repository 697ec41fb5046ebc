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

//! Addresses: a tagged byte prefix (`tz1`/`tz2`/`tz3`/`KT1`) plus a 20-byte hash (`spec.md` §6).
//!
//! The human-readable base58-check encoding real Tezos tooling uses belongs to the
//! pretty-printer, which is out of scope here; [`Address`]'s `Display`/`FromStr` below exist only
//! for diagnostics and test fixtures, the same role the teacher's `ArticlesId`/`ContractId`
//! `Display` impls play.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Which kind of account an [`Address`] names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressTag {
    /// Implicit account controlled by an Ed25519 key.
    Tz1,
    /// Implicit account controlled by a secp256k1 key.
    Tz2,
    /// Implicit account controlled by a P-256 key.
    Tz3,
    /// Originated smart-contract account.
    Kt1,
}

impl AddressTag {
    fn prefix(self) -> &'static str {
        match self {
            AddressTag::Tz1 => "tz1",
            AddressTag::Tz2 => "tz2",
            AddressTag::Tz3 => "tz3",
            AddressTag::Kt1 => "KT1",
        }
    }
}

/// Errors parsing an [`Address`] from its diagnostic `Display` form.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum AddressParseError {
    /// address `{0}` has no recognized `tz1`/`tz2`/`tz3`/`KT1` prefix.
    UnknownPrefix(String),
    /// address `{0}` does not carry exactly 20 bytes of hash data.
    BadLength(String),
    /// address `{0}` contains invalid hex data.
    BadHex(String),
}

/// A Tezos-style address: a tag plus a 20-byte hash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub tag: AddressTag,
    pub hash: [u8; 20],
}

impl Address {
    pub fn new(tag: AddressTag, hash: [u8; 20]) -> Self { Self { tag, hash } }

    pub fn is_contract(&self) -> bool { self.tag == AddressTag::Kt1 }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag.prefix())?;
        for byte in &self.hash {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, rest) = if let Some(rest) = s.strip_prefix("tz1") {
            (AddressTag::Tz1, rest)
        } else if let Some(rest) = s.strip_prefix("tz2") {
            (AddressTag::Tz2, rest)
        } else if let Some(rest) = s.strip_prefix("tz3") {
            (AddressTag::Tz3, rest)
        } else if let Some(rest) = s.strip_prefix("KT1") {
            (AddressTag::Kt1, rest)
        } else {
            return Err(AddressParseError::UnknownPrefix(s.to_string()));
        };
        if rest.len() != 40 {
            return Err(AddressParseError::BadLength(s.to_string()));
        }
        let mut hash = [0u8; 20];
        for (i, byte) in hash.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&rest[i * 2..i * 2 + 2], 16)
                .map_err(|_| AddressParseError::BadHex(s.to_string()))?;
        }
        Ok(Address { tag, hash })
    }
}

/// Deterministically derives the address of a newly originated contract.
///
/// `spec.md` §9's first Open Question asks whether the origination payload alone is enough to
/// disambiguate two originations in the same batch, or whether a per-sender counter is needed; we
/// resolved that (see `DESIGN.md`) by hashing `(sender, counter)`, where `counter` is the number of
/// prior originations by `sender` observed in the snapshot the origination runs against. This
/// mirrors the reference Tezos client, which scopes the origination counter per source account.
///
/// The hash itself is a non-cryptographic stand-in (real key-hashing is out of scope, `spec.md`
/// §1): it only needs to be deterministic and collision-free for distinct `(sender, counter)`
/// pairs within a test run, not preimage-resistant.
pub fn originate_address(sender: &Address, counter: u64) -> Address {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    sender.hash(&mut hasher);
    counter.hash(&mut hasher);
    let digest = hasher.finish().to_be_bytes();

    let mut hash = [0u8; 20];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = digest[i % digest.len()] ^ (i as u8);
    }
    Address::new(AddressTag::Kt1, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let addr = Address::new(AddressTag::Tz1, [7u8; 20]);
        let s = addr.to_string();
        assert_eq!(s.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn originate_address_is_deterministic() {
        let sender = Address::new(AddressTag::Tz1, [1u8; 20]);
        assert_eq!(originate_address(&sender, 0), originate_address(&sender, 0));
    }

    #[test]
    fn originate_address_disambiguates_counter() {
        let sender = Address::new(AddressTag::Tz1, [1u8; 20]);
        assert_ne!(originate_address(&sender, 0), originate_address(&sender, 1));
    }

    #[test]
    fn originate_address_is_kt1() {
        let sender = Address::new(AddressTag::Tz1, [1u8; 20]);
        assert!(originate_address(&sender, 0).is_contract());
    }
}
