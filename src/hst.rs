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

//! The hypothetical stack type (`spec.md` §3: `Hst`) the checker threads through a program, and
//! the existential wrapper it returns a checked instruction in.
//!
//! The reference implementation indexes an instruction's type by its input and output stack
//! shapes at the type level, so "check this instruction against this stack" has a result type
//! that is only known once checking succeeds — a textbook use for an existential package. Rust has
//! no sigma types, so [`SomeInstr`] bundles the checked [`Instr`] together with the [`Hst`] it
//! proved the instruction leaves behind, and every checker function that used to return `exists
//! o. Instr i o` returns a `Result<SomeInstr, TCError>` instead.

use crate::annot::{Notes, VarAnn};
use crate::instr::Instr;
use crate::types::T;

/// One stack slot: its type, the annotation tree attached to it, and the variable annotation
/// naming it (if any).
#[derive(Clone, Debug, PartialEq)]
pub struct HstEntry {
    pub ty: T,
    pub notes: Notes,
    pub var_ann: Option<VarAnn>,
}

impl HstEntry {
    pub fn new(ty: T) -> Self { Self { ty, notes: Notes::Star, var_ann: None } }

    pub fn with_notes(mut self, notes: Notes) -> Self {
        self.var_ann = notes.var_ann().cloned();
        self.notes = notes;
        self
    }

    pub fn with_var(mut self, var: VarAnn) -> Self {
        self.var_ann = Some(var);
        self
    }
}

/// The hypothetical stack type: a sequence of [`HstEntry`], top of stack first.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Hst(pub Vec<HstEntry>);

impl Hst {
    pub fn empty() -> Self { Self(Vec::new()) }

    pub fn from_entries(entries: Vec<HstEntry>) -> Self { Self(entries) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn top(&self) -> Option<&HstEntry> { self.0.first() }

    pub fn push(&mut self, entry: HstEntry) { self.0.insert(0, entry); }

    pub fn pop(&mut self) -> Option<HstEntry> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// The plain types of every slot, top-first, for handing to [`crate::ext::check_stack_type`].
    pub fn types(&self) -> Vec<T> { self.0.iter().map(|e| e.ty.clone()).collect() }
}

/// The result of checking an instruction against an input [`Hst`]: the typed instruction itself,
/// packaged with the output stack shape it was proven to leave behind.
#[derive(Clone, Debug, PartialEq)]
pub struct SomeInstr {
    pub instr: Instr,
    pub output: Hst,
}

impl SomeInstr {
    pub fn new(instr: Instr, output: Hst) -> Self { Self { instr, output } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut hst = Hst::empty();
        hst.push(HstEntry::new(T::int()));
        hst.push(HstEntry::new(T::nat()));
        assert_eq!(hst.pop().unwrap().ty, T::nat());
        assert_eq!(hst.pop().unwrap().ty, T::int());
        assert!(hst.pop().is_none());
    }

    #[test]
    fn types_preserves_order() {
        let hst = Hst::from_entries(vec![HstEntry::new(T::bool()), HstEntry::new(T::int())]);
        assert_eq!(hst.types(), vec![T::bool(), T::int()]);
    }
}
