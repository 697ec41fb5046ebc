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

//! Opaque cryptographic primitives.
//!
//! `spec.md` §1 explicitly keeps signature/key-hash cryptography out of core scope: "whose
//! interface is assumed to exist". We model that the same way the teacher models trust in an
//! external signer (`SigValidator` in its `sigs` module) — a trait collaborators implement, plus
//! plain opaque byte newtypes the interpreter can move around, compare and hash without ever
//! needing to know how a signature was produced or verified.

use std::fmt;

macro_rules! opaque_bytes {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self { Self(bytes.into()) }
            pub fn as_bytes(&self) -> &[u8] { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    };
}

opaque_bytes!(PublicKey);
opaque_bytes!(Signature);
opaque_bytes!(KeyHash);

/// Verifies a signature against a public key and a message digest.
///
/// The core never implements an algorithm for this; `Scenario`/interpreter callers that need
/// signature-checking Michelson programs to actually fail or succeed as expected inject one.
pub trait SigValidator {
    fn validate(&self, key: &PublicKey, message: &[u8], sig: &Signature) -> bool;
}

/// A validator that accepts nothing, usable as a safe default when a scenario never exercises
/// signature checking.
pub struct DenyAllValidator;

impl SigValidator for DenyAllValidator {
    fn validate(&self, _key: &PublicKey, _message: &[u8], _sig: &Signature) -> bool { false }
}
