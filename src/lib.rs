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

//! A typed interpreter for Michelson, the stack-based smart-contract language of Tezos, plus an
//! in-memory blockchain simulator ("scenario driver") used to write integrational contract tests.
//!
//! The crate is organized leaves-first:
//! - [`types`] — the closed universe of Michelson types (C1).
//! - [`annot`] — field/type/variable annotations and their merge rules (C2).
//! - [`value`] — well-typed runtime values and the operations a contract can emit (C3).
//! - [`instr`] / [`hst`] — the typed instruction tree and the hypothetical stack type it is
//!   checked against (C3).
//! - [`checker`] — untyped-to-typed lowering, including the polymorphic primitives and the
//!   `STACKTYPE`/`FN`/`PRINT`/`TEST_ASSERT` extension instructions (C4, C5).
//! - [`interpreter`] — pure execution of typed instructions against a state snapshot (C6).
//! - [`gstate`] — the mutable-by-transaction global state and its update log (C7).
//! - [`scenario`] — the `originate`/`transfer`/`validate` integrational test driver (C8).
//!
//! Out of scope, by design (see `spec.md` §1): parsing Michelson source text, pretty-printing,
//! any CLI, contract-source file I/O, cryptographic primitives (signature/key-hash checking is an
//! injected collaborator, see [`crypto::SigValidator`]), and the bit-level binary contract codec.

#![deny(
    dead_code,
    unused_variables,
    unused_mut,
    unused_imports,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]

#[macro_use]
extern crate amplify;

pub mod address;
pub mod annot;
pub mod checker;
pub mod config;
pub mod crypto;
pub mod ext;
pub mod gstate;
pub mod hst;
pub mod instr;
pub mod interpreter;
pub mod scenario;
pub mod types;
pub mod value;

pub use address::Address;
pub use annot::{AnnError, Notes, VarAnn};
pub use checker::{typecheck_contract, typecheck_value, TCError};
pub use config::ScenarioConfig;
pub use ext::ExtError;
pub use gstate::{AccountState, GState, GStateUpdate};
pub use hst::{Hst, HstEntry, SomeInstr};
pub use instr::Instr;
pub use interpreter::{interpret, InterpreterError, InterpreterRes};
pub use scenario::{Scenario, ValidationError, Validator};
pub use types::{T, CT};
pub use value::{Mutez, Op, Value};
