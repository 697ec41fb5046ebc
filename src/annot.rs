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

//! Field, type and variable annotations, and the rules for merging ("converging") and deriving
//! them that the checker (C4/C5) leans on at every structured instruction.
//!
//! The three annotation kinds are disjoint by construction (separate newtypes), and a single node
//! of the annotation tree ([`Notes`]) may carry any combination of the three, or be [`Notes::Star`]
//! — entirely unspecified, propagating down to every descendant once merged with something concrete.

use std::fmt;

macro_rules! annotation_newtype {
    ($name:ident, $sigil:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self { Self(s.into()) }
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}{}", $sigil, self.0) }
        }
    };
}

annotation_newtype!(TypeAnn, ":");
annotation_newtype!(FieldAnn, "%");
annotation_newtype!(VarAnn, "@");

impl VarAnn {
    /// Splits a dotted variable annotation (`a.x`) into its leading segments and splits off the
    /// shared prefix between two variables, used by [`derive_pair_annotations`].
    fn common_prefix_and_suffixes(&self, other: &VarAnn) -> Option<(VarAnn, FieldAnn, FieldAnn)> {
        let a: Vec<&str> = self.0.split('.').collect();
        let b: Vec<&str> = other.0.split('.').collect();
        let mut common_len = 0;
        while common_len < a.len() && common_len < b.len() && a[common_len] == b[common_len] {
            common_len += 1;
        }
        if common_len == 0 {
            return None;
        }
        let prefix = a[..common_len].join(".");
        let suffix_a = a[common_len..].join(".");
        let suffix_b = b[common_len..].join(".");
        if suffix_a.is_empty() || suffix_b.is_empty() {
            return None;
        }
        Some((VarAnn::new(prefix), FieldAnn::new(suffix_a), FieldAnn::new(suffix_b)))
    }

    /// Appends a suffix after a `.`, used when a structured instruction derives a child's variable
    /// annotation from its parent's.
    pub fn append_suffix(&self, suffix: &str) -> VarAnn { VarAnn::new(format!("{}.{}", self.0, suffix)) }
}

/// Errors raised by [`converge`] when two annotation trees disagree.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum AnnError {
    /// conflicting type annotations `{0}` and `{1}`.
    TypeAnnMismatch(TypeAnn, TypeAnn),
    /// conflicting field annotations `{0}` and `{1}`.
    FieldAnnMismatch(FieldAnn, FieldAnn),
    /// conflicting variable annotations `{0}` and `{1}`.
    VarAnnMismatch(VarAnn, VarAnn),
    /// annotation trees have a different shape and cannot be converged.
    ShapeMismatch,
}

/// The annotation tree, parallel to a [`crate::types::T`] value: one node per type constructor,
/// carrying the annotations attached at that point plus sub-notes for its children.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NodeNotes {
    pub type_ann: Option<TypeAnn>,
    pub field_ann: Option<FieldAnn>,
    pub var_ann: Option<VarAnn>,
    pub children: Vec<Notes>,
}

impl NodeNotes {
    pub fn leaf() -> Self { Self::default() }

    pub fn with_var(mut self, var: VarAnn) -> Self {
        self.var_ann = Some(var);
        self
    }

    pub fn with_field(mut self, field: FieldAnn) -> Self {
        self.field_ann = Some(field);
        self
    }

    pub fn with_children(mut self, children: Vec<Notes>) -> Self {
        self.children = children;
        self
    }
}

/// One node of the annotation tree: either entirely unspecified (`*`, propagating its sibling's
/// annotations unchanged when converged) or a concrete [`NodeNotes`] record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notes {
    Star,
    Node(NodeNotes),
}

impl Notes {
    pub fn star() -> Notes { Notes::Star }

    pub fn node(notes: NodeNotes) -> Notes { Notes::Node(notes) }

    pub fn var_ann(&self) -> Option<&VarAnn> {
        match self {
            Notes::Star => None,
            Notes::Node(n) => n.var_ann.as_ref(),
        }
    }

    pub fn field_ann(&self) -> Option<&FieldAnn> {
        match self {
            Notes::Star => None,
            Notes::Node(n) => n.field_ann.as_ref(),
        }
    }

    pub fn child(&self, idx: usize) -> Notes {
        match self {
            Notes::Star => Notes::Star,
            Notes::Node(n) => n.children.get(idx).cloned().unwrap_or(Notes::Star),
        }
    }
}

fn merge_opt<T: Clone + PartialEq>(a: &Option<T>, b: &Option<T>, mismatch: impl FnOnce(T, T) -> AnnError) -> Result<Option<T>, AnnError> {
    match (a, b) {
        (None, None) => Ok(None),
        (None, Some(x)) | (Some(x), None) => Ok(Some(x.clone())),
        (Some(x), Some(y)) if x == y => Ok(Some(x.clone())),
        (Some(x), Some(y)) => Err(mismatch(x.clone(), y.clone())),
    }
}

/// Merges two annotation trees, requiring the concrete annotations they each carry to agree.
///
/// `*` always yields to the other side in full (including its sub-notes). Two concrete nodes merge
/// each annotation kind independently and recurse into children positionally; a mismatch at any
/// level is an error, never a silent overwrite.
pub fn converge(a: &Notes, b: &Notes) -> Result<Notes, AnnError> {
    match (a, b) {
        (Notes::Star, Notes::Star) => Ok(Notes::Star),
        (Notes::Star, other) | (other, Notes::Star) => Ok(other.clone()),
        (Notes::Node(na), Notes::Node(nb)) => {
            if na.children.len() != nb.children.len() {
                return Err(AnnError::ShapeMismatch);
            }
            let type_ann = merge_opt(&na.type_ann, &nb.type_ann, AnnError::TypeAnnMismatch)?;
            let field_ann = merge_opt(&na.field_ann, &nb.field_ann, AnnError::FieldAnnMismatch)?;
            let var_ann = merge_opt(&na.var_ann, &nb.var_ann, AnnError::VarAnnMismatch)?;
            let children = na
                .children
                .iter()
                .zip(nb.children.iter())
                .map(|(x, y)| converge(x, y))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Notes::Node(NodeNotes { type_ann, field_ann, var_ann, children }))
        }
    }
}

/// Derives the field annotations a `PAIR` instruction attaches to its two components and the
/// variable annotation it attaches to the resulting pair, from the user-supplied field/variable
/// annotations of the two values being paired (`spec.md` §4.2).
pub fn derive_pair_annotations(
    p_field: Option<&FieldAnn>,
    q_field: Option<&FieldAnn>,
    p_var: Option<&VarAnn>,
    q_var: Option<&VarAnn>,
) -> (Option<VarAnn>, Option<FieldAnn>, Option<FieldAnn>) {
    if p_field.is_none() && q_field.is_none() {
        if let (Some(pv), Some(qv)) = (p_var, q_var) {
            if let Some((prefix, suffix_p, suffix_q)) = pv.common_prefix_and_suffixes(qv) {
                return (Some(prefix), Some(suffix_p), Some(suffix_q));
            }
        }
    }
    match (p_field, q_field) {
        (None, Some(_)) => {
            let promoted = p_var.map(|v| FieldAnn::new(v.as_str().to_string()));
            (None, promoted, q_field.cloned())
        }
        (Some(_), None) => {
            let promoted = q_var.map(|v| FieldAnn::new(v.as_str().to_string()));
            (None, p_field.cloned(), promoted)
        }
        _ => (None, p_field.cloned(), q_field.cloned()),
    }
}

/// A `CAR`/`CDR` user-supplied variable-annotation request: either an explicit `@name`, the `%`
/// sigil (derive from the accessed field), the `%%` sigil (derive from both the pair's and the
/// field's annotation), or nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CarCdrVarReq {
    Default,
    Percent,
    DoublePercent,
    Explicit(VarAnn),
}

/// Derives the variable annotation a `CAR`/`CDR` instruction attaches to the projected value
/// (`spec.md` §4.2).
pub fn derive_car_cdr_var(
    req: &CarCdrVarReq,
    child_field: Option<&FieldAnn>,
    pair_var: Option<&VarAnn>,
) -> Option<VarAnn> {
    match req {
        CarCdrVarReq::Percent => child_field.map(|f| VarAnn::new(f.as_str().to_string())),
        CarCdrVarReq::DoublePercent => match (pair_var, child_field) {
            (Some(pv), Some(cf)) => Some(pv.append_suffix(cf.as_str())),
            _ => None,
        },
        CarCdrVarReq::Default => None,
        CarCdrVarReq::Explicit(v) => Some(v.clone()),
    }
}

/// Appends `suffix` to `input_var` unless `input_var` is absent (the "default" annotation), in
/// which case the result stays absent. Shared by the `or`/`option` sub-annotation derivations.
pub fn derive_var(suffix: &str, input_var: Option<&VarAnn>) -> Option<VarAnn> { input_var.map(|v| v.append_suffix(suffix)) }

/// Splits the notes of an `or(a, b)` node into its two children's notes plus the variable
/// annotations `IF_LEFT`/`IF_LEFT`-style branches should bind, defaulting the suffix to `left`/
/// `right` when the child carries no field annotation of its own.
pub fn derive_or_sub(notes: &Notes, outer_var: Option<&VarAnn>) -> (Notes, Notes, Option<VarAnn>, Option<VarAnn>) {
    let left = notes.child(0);
    let right = notes.child(1);
    let left_suffix = left.field_ann().map(|f| f.as_str().to_string()).unwrap_or_else(|| "left".to_string());
    let right_suffix = right.field_ann().map(|f| f.as_str().to_string()).unwrap_or_else(|| "right".to_string());
    let var_left = derive_var(&left_suffix, outer_var);
    let var_right = derive_var(&right_suffix, outer_var);
    (left, right, var_left, var_right)
}

/// Splits the notes of an `option(a)` node into the wrapped value's notes plus the variable
/// annotation `IF_NONE`'s `Some` branch should bind, defaulting the suffix to `some`.
pub fn derive_option_sub(notes: &Notes, outer_var: Option<&VarAnn>) -> (Notes, Option<VarAnn>) {
    let inner = notes.child(0);
    let suffix = inner.field_ann().map(|f| f.as_str().to_string()).unwrap_or_else(|| "some".to_string());
    let var = derive_var(&suffix, outer_var);
    (inner, var)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> Notes { Notes::Star }

    fn leaf_var(name: &str) -> Notes { Notes::node(NodeNotes::leaf().with_var(VarAnn::new(name))) }

    #[test]
    fn converge_star_star() {
        assert_eq!(converge(&star(), &star()), Ok(star()));
    }

    #[test]
    fn converge_star_yields_other() {
        let concrete = leaf_var("a");
        assert_eq!(converge(&star(), &concrete), Ok(concrete.clone()));
        assert_eq!(converge(&concrete, &star()), Ok(concrete));
    }

    #[test]
    fn converge_is_commutative() {
        let a = leaf_var("a");
        let b = star();
        assert_eq!(converge(&a, &b), converge(&b, &a));
    }

    #[test]
    fn converge_is_idempotent() {
        let a = leaf_var("a");
        assert_eq!(converge(&a, &a), Ok(a));
    }

    #[test]
    fn converge_is_associative_over_random_trees() {
        use rand::prelude::*;
        let mut rng = rand::rng();
        let pool = [star(), leaf_var("a"), leaf_var("b"), Notes::node(NodeNotes::leaf())];
        for _ in 0..200 {
            let a = pool.choose(&mut rng).unwrap().clone();
            let b = pool.choose(&mut rng).unwrap().clone();
            let c = pool.choose(&mut rng).unwrap().clone();
            let left = converge(&a, &b).and_then(|ab| converge(&ab, &c));
            let right = converge(&b, &c).and_then(|bc| converge(&a, &bc));
            assert_eq!(left, right, "converge not associative for {a:?}, {b:?}, {c:?}");
        }
    }

    #[test]
    fn converge_rejects_conflicting_vars() {
        let a = leaf_var("a");
        let b = leaf_var("b");
        assert_eq!(converge(&a, &b), Err(AnnError::VarAnnMismatch(VarAnn::new("a"), VarAnn::new("b"))));
    }

    #[test]
    fn derive_pair_splits_common_prefix() {
        let pv = VarAnn::new("a.x");
        let qv = VarAnn::new("a.y");
        let (var, pf, qf) = derive_pair_annotations(None, None, Some(&pv), Some(&qv));
        assert_eq!(var, Some(VarAnn::new("a")));
        assert_eq!(pf, Some(FieldAnn::new("x")));
        assert_eq!(qf, Some(FieldAnn::new("y")));
    }

    #[test]
    fn derive_pair_promotes_single_var_to_field() {
        let qv = VarAnn::new("y");
        let (var, pf, qf) = derive_pair_annotations(Some(&FieldAnn::new("x")), None, None, Some(&qv));
        assert_eq!(var, None);
        assert_eq!(pf, Some(FieldAnn::new("x")));
        assert_eq!(qf, Some(FieldAnn::new("y")));
    }

    #[test]
    fn derive_pair_keeps_existing_fields() {
        let pf = FieldAnn::new("x");
        let qf = FieldAnn::new("y");
        let (var, rpf, rqf) = derive_pair_annotations(Some(&pf), Some(&qf), None, None);
        assert_eq!(var, None);
        assert_eq!(rpf, Some(pf));
        assert_eq!(rqf, Some(qf));
    }

    #[test]
    fn derive_car_cdr_percent_promotes_field() {
        let field = FieldAnn::new("x");
        let var = derive_car_cdr_var(&CarCdrVarReq::Percent, Some(&field), None);
        assert_eq!(var, Some(VarAnn::new("x")));
    }

    #[test]
    fn derive_car_cdr_double_percent_concatenates() {
        let pair_var = VarAnn::new("p");
        let field = FieldAnn::new("x");
        let var = derive_car_cdr_var(&CarCdrVarReq::DoublePercent, Some(&field), Some(&pair_var));
        assert_eq!(var, Some(VarAnn::new("p.x")));
    }

    #[test]
    fn derive_car_cdr_default_passes_through() {
        let explicit = VarAnn::new("z");
        let var = derive_car_cdr_var(&CarCdrVarReq::Explicit(explicit.clone()), None, None);
        assert_eq!(var, Some(explicit));
    }

    #[test]
    fn derive_or_sub_defaults_left_right() {
        let notes = Notes::node(NodeNotes::leaf().with_children(vec![star(), star()]));
        let outer = VarAnn::new("x");
        let (_, _, var_left, var_right) = derive_or_sub(&notes, Some(&outer));
        assert_eq!(var_left, Some(VarAnn::new("x.left")));
        assert_eq!(var_right, Some(VarAnn::new("x.right")));
    }

    #[test]
    fn derive_option_sub_defaults_some() {
        let notes = Notes::node(NodeNotes::leaf().with_children(vec![star()]));
        let outer = VarAnn::new("x");
        let (_, var) = derive_option_sub(&notes, Some(&outer));
        assert_eq!(var, Some(VarAnn::new("x.some")));
    }
}
