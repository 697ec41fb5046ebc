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

//! Morley-style meta-instructions (`spec.md` §5, C5): `STACKTYPE`, `FN`, `PRINT`, `TEST_ASSERT`.
//!
//! These never touch the blockchain state and exist purely as checker/test-author aids: `STACKTYPE`
//! documents (and asserts) an expected stack shape inline, `FN` declares a reusable named lambda,
//! `PRINT` emits a diagnostic line built from stack contents, and `TEST_ASSERT` fails the containing
//! program unless a sub-expression reduces to `True`. The checker erases all of it down to data
//! [`crate::interpreter`] can act on without re-deriving any of the original surface syntax.

use std::collections::BTreeMap;

use crate::instr::Instr;
use crate::types::T;

/// One element of a `STACKTYPE`/`FN` stack pattern: a concrete type at a fixed position, a named
/// type variable bound to whatever type is found there, or a named "rest of stack" tail that may
/// only appear last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StkPatternElem {
    Exact(T),
    /// Binds the type found at this position to `name`; repeated uses of the same name must bind
    /// the same concrete type (`spec.md` §4.5's `FN` type-variable unification).
    Var(String),
    /// Binds the remaining, unconstrained stack tail to a name for use in `FN` output patterns.
    Rest(String),
}

/// A declared stack shape, read top-to-bottom.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StackTypePattern(pub Vec<StkPatternElem>);

impl StackTypePattern {
    pub fn exact(types: Vec<T>) -> Self { Self(types.into_iter().map(StkPatternElem::Exact).collect()) }

    /// Whether `Rest` appears anywhere but last, which no valid pattern may do.
    fn rest_is_malformed(&self) -> bool {
        self.0.iter().enumerate().any(|(i, e)| matches!(e, StkPatternElem::Rest(_)) && i + 1 != self.0.len())
    }
}

/// What a declared `FN` produces: a single concrete type, or the untouched tail bound by `Rest`
/// in its input pattern (an "any output", used by combinators that are polymorphic in their
/// result).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FnOutput {
    Concrete(T),
    AnyOutInstr,
}

/// A named combinator declared inline and checked, once, against its own declared calling
/// convention: `body` must transform `input` (with `type_vars` bound to whatever concrete types
/// appear at their positions) into `output`, leaving anything below `input`'s fixed prefix
/// untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FnDecl {
    pub name: String,
    pub type_vars: Vec<String>,
    pub input: StackTypePattern,
    pub output: FnOutput,
    pub body: Box<Instr>,
}

/// A reference into the current stack, validated against the stack depth in scope at check time.
///
/// The reference implementation carries this as a Peano-indexed proof that the position is within
/// bounds; we erase it to a checked `usize` the same way [`crate::types::TypeEq`] erases type
/// equality, since the checker is the only place one of these is constructed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackRef(pub usize);

/// A single interpolated fragment of a `PRINT` format string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintArg {
    Literal(String),
    StackSlot(StackRef),
}

/// A checked meta-instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtInstr {
    /// Asserts the current stack matches `pattern`, purely as a checked annotation; a no-op at
    /// runtime.
    StackType(StackTypePattern),
    Print(Vec<PrintArg>),
    /// Runs `body` and fails the containing program with `message` unless it leaves a single
    /// `bool` on top of the stack equal to `true`.
    TestAssert { message: String, body: Box<Instr> },
    /// Declares and checks a named combinator against its own signature; a no-op at runtime (see
    /// [`FnDecl`]).
    Fn(FnDecl),
}

/// Errors raised while checking a meta-instruction.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ExtError {
    /// stack pattern expects {expected} element(s) but the stack has {actual}.
    LengthMismatch { expected: usize, actual: usize },
    /// stack pattern mismatch at position {pos}.
    TypeMismatch { pos: usize },
    /// `Rest` may only appear as the final element of a stack pattern.
    StkRestMismatch,
    /// unbound or duplicate type variable in an `FN` declaration.
    VarError,
    /// inconsistent annotations inside a meta-instruction.
    AnnError,
    /// a declared type variable was instantiated inconsistently across uses.
    TyVarMismatch,
    /// `TEST_ASSERT` body failed: {0}.
    TestAssertError(String),
    /// stack reference {reference} is out of bounds for a stack of size {stack_size}.
    InvalidStackReference { reference: usize, stack_size: usize },
}

/// Validates `pattern` has no misplaced `Rest` element.
pub fn check_pattern_shape(pattern: &StackTypePattern) -> Result<(), ExtError> {
    if pattern.rest_is_malformed() {
        Err(ExtError::StkRestMismatch)
    } else {
        Ok(())
    }
}

/// Checks a `STACKTYPE` pattern against the concrete types currently on the stack, top-first.
pub fn check_stack_type(pattern: &StackTypePattern, stack: &[T]) -> Result<(), ExtError> {
    check_pattern_shape(pattern)?;
    let has_rest = matches!(pattern.0.last(), Some(StkPatternElem::Rest(_)));
    let fixed_len = if has_rest { pattern.0.len() - 1 } else { pattern.0.len() };
    if has_rest {
        if stack.len() < fixed_len {
            return Err(ExtError::LengthMismatch { expected: fixed_len, actual: stack.len() });
        }
    } else if stack.len() != fixed_len {
        return Err(ExtError::LengthMismatch { expected: fixed_len, actual: stack.len() });
    }
    for (pos, (elem, ty)) in pattern.0.iter().zip(stack.iter()).enumerate() {
        if let StkPatternElem::Exact(expected) = elem {
            if expected != ty {
                return Err(ExtError::TypeMismatch { pos });
            }
        }
    }
    Ok(())
}

/// Checks that an `FN`'s declared `type_vars` are each used at least once in its input pattern,
/// and not duplicated among themselves (`spec.md` §4.5 step 2).
pub fn check_quantified_vars(type_vars: &[String], pattern: &StackTypePattern) -> Result<(), ExtError> {
    let mut seen = std::collections::BTreeSet::new();
    for v in type_vars {
        if !seen.insert(v) {
            return Err(ExtError::VarError);
        }
    }
    for v in type_vars {
        let used = pattern.0.iter().any(|e| matches!(e, StkPatternElem::Var(name) if name == v));
        if !used {
            return Err(ExtError::VarError);
        }
    }
    Ok(())
}

/// Matches `pattern` against `stack` like [`check_stack_type`], additionally binding each `Var`
/// element to the concrete type found at its position (`spec.md` §4.5 step 3's variable binding
/// `m`). A `Var` bound twice to different types is a [`ExtError::TyVarMismatch`].
pub fn bind_stk_pattern(pattern: &StackTypePattern, stack: &[T]) -> Result<BTreeMap<String, T>, ExtError> {
    check_pattern_shape(pattern)?;
    let has_rest = matches!(pattern.0.last(), Some(StkPatternElem::Rest(_)));
    let fixed_len = if has_rest { pattern.0.len() - 1 } else { pattern.0.len() };
    if has_rest {
        if stack.len() < fixed_len {
            return Err(ExtError::LengthMismatch { expected: fixed_len, actual: stack.len() });
        }
    } else if stack.len() != fixed_len {
        return Err(ExtError::LengthMismatch { expected: fixed_len, actual: stack.len() });
    }
    let mut bindings = BTreeMap::new();
    for (pos, (elem, ty)) in pattern.0.iter().zip(stack.iter()).enumerate() {
        match elem {
            StkPatternElem::Exact(expected) => {
                if expected != ty {
                    return Err(ExtError::TypeMismatch { pos });
                }
            }
            StkPatternElem::Var(name) => match bindings.get(name) {
                Some(bound) if bound != ty => return Err(ExtError::TyVarMismatch),
                Some(_) => {}
                None => {
                    bindings.insert(name.clone(), ty.clone());
                }
            },
            StkPatternElem::Rest(_) => {}
        }
    }
    Ok(bindings)
}

/// Validates a [`StackRef`] against the depth of the stack it is resolved against.
pub fn check_stack_ref(reference: StackRef, stack_size: usize) -> Result<(), ExtError> {
    if reference.0 < stack_size {
        Ok(())
    } else {
        Err(ExtError::InvalidStackReference { reference: reference.0, stack_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_misplaced_rest() {
        let pattern = StackTypePattern(vec![StkPatternElem::Rest("r".into()), StkPatternElem::Exact(T::int())]);
        assert_eq!(check_pattern_shape(&pattern), Err(ExtError::StkRestMismatch));
    }

    #[test]
    fn exact_pattern_requires_matching_length() {
        let pattern = StackTypePattern::exact(vec![T::int()]);
        assert_eq!(check_stack_type(&pattern, &[]), Err(ExtError::LengthMismatch { expected: 1, actual: 0 }));
    }

    #[test]
    fn exact_pattern_accepts_matching_stack() {
        let pattern = StackTypePattern::exact(vec![T::int(), T::nat()]);
        assert!(check_stack_type(&pattern, &[T::int(), T::nat()]).is_ok());
    }

    #[test]
    fn rest_pattern_allows_extra_depth() {
        let pattern = StackTypePattern(vec![StkPatternElem::Exact(T::int()), StkPatternElem::Rest("r".into())]);
        assert!(check_stack_type(&pattern, &[T::int(), T::nat(), T::bool()]).is_ok());
    }

    #[test]
    fn stack_ref_bounds_checked() {
        assert_eq!(check_stack_ref(StackRef(3), 2), Err(ExtError::InvalidStackReference { reference: 3, stack_size: 2 }));
        assert!(check_stack_ref(StackRef(1), 2).is_ok());
    }

    #[test]
    fn quantified_vars_must_each_appear_in_the_input_pattern() {
        let pattern = StackTypePattern(vec![StkPatternElem::Exact(T::int())]);
        assert_eq!(check_quantified_vars(&["a".to_string()], &pattern), Err(ExtError::VarError));
    }

    #[test]
    fn quantified_vars_reject_duplicate_names() {
        let pattern = StackTypePattern(vec![StkPatternElem::Var("a".into())]);
        assert_eq!(check_quantified_vars(&["a".to_string(), "a".to_string()], &pattern), Err(ExtError::VarError));
    }

    #[test]
    fn bind_stk_pattern_binds_a_variable_to_the_matching_position() {
        let pattern = StackTypePattern(vec![StkPatternElem::Var("a".into())]);
        let bindings = bind_stk_pattern(&pattern, &[T::int()]).unwrap();
        assert_eq!(bindings.get("a"), Some(&T::int()));
    }

    #[test]
    fn bind_stk_pattern_rejects_inconsistent_repeated_variable() {
        let pattern = StackTypePattern(vec![StkPatternElem::Var("a".into()), StkPatternElem::Var("a".into())]);
        assert_eq!(bind_stk_pattern(&pattern, &[T::int(), T::bool()]), Err(ExtError::TyVarMismatch));
    }
}
