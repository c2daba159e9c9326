//! Term tree storage.
//!
//! Every term of one query lives in a single [`TermArena`]: an
//! append-only store addressed by [`TermId`] handles. Handles stay valid
//! as the arena grows, and the whole tree is released in one step when
//! the arena drops. Parents own the order of their children; sharing a
//! subtree between two parents goes through an explicit reference term,
//! which is always exactly one level deep.

use chrono::Utc;

use crate::backtrace::BacktraceId;
use crate::datum::Datum;

use super::opcode::Opcode;

/// Stable handle to a term within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId(u32);

impl TermId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One of the three term variants
#[derive(Debug)]
enum TermKind {
    /// A literal value; no children
    Datum(Datum),
    /// An operation with positional and named children
    Call {
        opcode: Opcode,
        args: Vec<TermId>,
        optargs: Vec<TermId>,
    },
    /// Non-owning pointer to another term in the same arena.
    /// The target is never itself a reference.
    Reference(TermId),
}

#[derive(Debug)]
struct Term {
    kind: TermKind,
    bt: BacktraceId,
    /// Set only when this term participates as a named child
    optarg_name: Option<String>,
}

/// Owns all terms for one query
#[derive(Debug, Default)]
pub struct TermArena {
    terms: Vec<Term>,
    global_optargs: Vec<TermId>,
    start_time: Option<Datum>,
}

impl TermArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of terms allocated
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True when no terms have been allocated
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append a call term with empty child lists.
    ///
    /// Datum terms are created with [`TermArena::new_datum`]; passing
    /// `Opcode::Datum` here is a programming error.
    pub fn new_call(&mut self, opcode: Opcode, bt: BacktraceId) -> TermId {
        assert!(
            opcode != Opcode::Datum,
            "datum terms are created with new_datum, not new_call"
        );
        self.push(Term {
            kind: TermKind::Call {
                opcode,
                args: Vec::new(),
                optargs: Vec::new(),
            },
            bt,
            optarg_name: None,
        })
    }

    /// Append a datum term
    pub fn new_datum(&mut self, value: Datum, bt: BacktraceId) -> TermId {
        self.push(Term {
            kind: TermKind::Datum(value),
            bt,
            optarg_name: None,
        })
    }

    /// Append a reference to `target`.
    ///
    /// If `target` is itself a reference, the new term points at the
    /// ultimate target, so references never nest.
    pub fn new_ref(&mut self, target: TermId) -> TermId {
        let ultimate = match self.term(target).kind {
            TermKind::Reference(src) => {
                assert!(
                    !matches!(self.term(src).kind, TermKind::Reference(_)),
                    "reference target must not itself be a reference"
                );
                src
            }
            _ => target,
        };
        let bt = self.term(ultimate).bt;
        self.push(Term {
            kind: TermKind::Reference(ultimate),
            bt,
            optarg_name: None,
        })
    }

    /// Append `child` to the positional children of `parent`
    pub fn push_arg(&mut self, parent: TermId, child: TermId) {
        match &mut self.term_mut(parent).kind {
            TermKind::Call { args, .. } => args.push(child),
            _ => panic!("cannot append an arg to a non-call term"),
        }
    }

    /// Append `child` to the named children of `parent` under `name`
    pub fn push_optarg(&mut self, parent: TermId, name: impl Into<String>, child: TermId) {
        self.term_mut(child).optarg_name = Some(name.into());
        match &mut self.term_mut(parent).kind {
            TermKind::Call { optargs, .. } => optargs.push(child),
            _ => panic!("cannot append an optarg to a non-call term"),
        }
    }

    /// Append a wrapped global optarg under `name`; insertion order is
    /// preserved.
    pub fn push_global_optarg(&mut self, name: impl Into<String>, term: TermId) {
        self.term_mut(term).optarg_name = Some(name.into());
        self.global_optargs.push(term);
    }

    /// Named global optargs in insertion order
    pub fn global_optargs(&self) -> impl Iterator<Item = (&str, TermId)> + '_ {
        self.global_optargs.iter().map(|&id| {
            let name = self
                .term(id)
                .optarg_name
                .as_deref()
                .expect("global optarg carries a name");
            (name, id)
        })
    }

    /// The query start time, fixed at first use.
    ///
    /// All invocations within one arena observe the same value, so every
    /// folded NOW term in a query evaluates to the same instant.
    pub fn now(&mut self) -> Datum {
        if let Some(start_time) = &self.start_time {
            return start_time.clone();
        }
        let epoch_seconds = Utc::now().timestamp_millis() as f64 / 1000.0;
        let start_time = Datum::Time(epoch_seconds);
        self.start_time = Some(start_time.clone());
        start_time
    }

    /// Follow at most one reference hop
    pub fn resolve(&self, id: TermId) -> TermId {
        match self.term(id).kind {
            TermKind::Reference(src) => src,
            _ => id,
        }
    }

    /// Opcode of a term; datum terms report `Opcode::Datum`, references
    /// report their target's opcode.
    pub fn opcode(&self, id: TermId) -> Opcode {
        match self.term(self.resolve(id)).kind {
            TermKind::Datum(_) => Opcode::Datum,
            TermKind::Call { opcode, .. } => opcode,
            TermKind::Reference(_) => unreachable!("references never nest"),
        }
    }

    /// Backtrace id the term was parsed under
    pub fn backtrace(&self, id: TermId) -> BacktraceId {
        self.term(id).bt
    }

    /// True if the term (without resolution) is a reference
    pub fn is_reference(&self, id: TermId) -> bool {
        matches!(self.term(id).kind, TermKind::Reference(_))
    }

    /// True if the term resolves to a datum
    pub fn is_datum(&self, id: TermId) -> bool {
        matches!(self.term(self.resolve(id)).kind, TermKind::Datum(_))
    }

    /// Literal value of a datum term
    pub fn datum(&self, id: TermId) -> &Datum {
        match &self.term(self.resolve(id)).kind {
            TermKind::Datum(value) => value,
            _ => panic!("term is not a datum"),
        }
    }

    /// Name under which this term participates as a named child
    pub fn optarg_name(&self, id: TermId) -> Option<&str> {
        self.term(id).optarg_name.as_deref()
    }

    /// Positional children, with reference children resolved to their
    /// targets. Iterating a reference iterates its target's children.
    pub fn args(&self, id: TermId) -> impl Iterator<Item = TermId> + '_ {
        self.child_list(id, false)
            .iter()
            .map(move |&child| self.resolve(child))
    }

    /// Named children as `(name, term)` pairs; the name comes from the
    /// listed child, the term is its resolved target.
    pub fn optargs(&self, id: TermId) -> impl Iterator<Item = (&str, TermId)> + '_ {
        self.child_list(id, true).iter().map(move |&child| {
            let name = self
                .term(child)
                .optarg_name
                .as_deref()
                .expect("optarg child carries a name");
            (name, self.resolve(child))
        })
    }

    /// Number of positional children
    pub fn num_args(&self, id: TermId) -> usize {
        self.child_list(id, false).len()
    }

    /// Number of named children
    pub fn num_optargs(&self, id: TermId) -> usize {
        self.child_list(id, true).len()
    }

    /// Structural equality across arenas: same opcodes, datum values,
    /// child order, and optarg names, with references resolved.
    pub fn terms_equal(&self, a: TermId, other: &TermArena, b: TermId) -> bool {
        let a = self.resolve(a);
        let b = other.resolve(b);
        match (&self.term(a).kind, &other.term(b).kind) {
            (TermKind::Datum(lhs), TermKind::Datum(rhs)) => lhs == rhs,
            (TermKind::Call { opcode: lhs, .. }, TermKind::Call { opcode: rhs, .. }) => {
                if lhs != rhs
                    || self.num_args(a) != other.num_args(b)
                    || self.num_optargs(a) != other.num_optargs(b)
                {
                    return false;
                }
                let args_match = self
                    .args(a)
                    .zip(other.args(b))
                    .all(|(x, y)| self.terms_equal(x, other, y));
                let optargs_match = self
                    .optargs(a)
                    .zip(other.optargs(b))
                    .all(|((name_x, x), (name_y, y))| {
                        name_x == name_y && self.terms_equal(x, other, y)
                    });
                args_match && optargs_match
            }
            _ => false,
        }
    }

    /// Replace a term's payload with a literal datum, keeping its
    /// backtrace and optarg name. Used when folding deterministic calls.
    pub(crate) fn replace_with_datum(&mut self, id: TermId, value: Datum) {
        self.term_mut(id).kind = TermKind::Datum(value);
    }

    fn child_list(&self, id: TermId, optargs: bool) -> &[TermId] {
        match &self.term(self.resolve(id)).kind {
            TermKind::Call { args, optargs: opt, .. } => {
                if optargs {
                    opt
                } else {
                    args
                }
            }
            TermKind::Datum(_) => panic!("datum terms have no children"),
            TermKind::Reference(_) => unreachable!("references never nest"),
        }
    }

    fn push(&mut self, term: Term) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term);
        id
    }

    fn term(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    fn term_mut(&mut self, id: TermId) -> &mut Term {
        &mut self.terms[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_stable_under_growth() {
        let mut arena = TermArena::new();
        let first = arena.new_datum(Datum::Num(1.0), BacktraceId::EMPTY);
        for _ in 0..1_000 {
            arena.new_call(Opcode::MakeArray, BacktraceId::EMPTY);
        }
        assert_eq!(arena.datum(first), &Datum::Num(1.0));
    }

    #[test]
    fn test_reference_never_nests() {
        let mut arena = TermArena::new();
        let datum = arena.new_datum(Datum::Str("x".into()), BacktraceId::EMPTY);
        let first_ref = arena.new_ref(datum);
        let second_ref = arena.new_ref(first_ref);

        // Both references point straight at the datum.
        assert_eq!(arena.resolve(first_ref), datum);
        assert_eq!(arena.resolve(second_ref), datum);
        assert!(arena.is_reference(second_ref));
        assert!(!arena.is_reference(arena.resolve(second_ref)));
    }

    #[test]
    fn test_args_resolve_reference_children() {
        let mut arena = TermArena::new();
        let shared = arena.new_datum(Datum::Num(7.0), BacktraceId::EMPTY);
        let call = arena.new_call(Opcode::MakeArray, BacktraceId::EMPTY);
        let reference = arena.new_ref(shared);
        arena.push_arg(call, reference);

        let children: Vec<TermId> = arena.args(call).collect();
        assert_eq!(children, vec![shared]);
    }

    #[test]
    fn test_iterating_reference_iterates_target_children() {
        let mut arena = TermArena::new();
        let call = arena.new_call(Opcode::MakeArray, BacktraceId::EMPTY);
        let child = arena.new_datum(Datum::Num(1.0), BacktraceId::EMPTY);
        arena.push_arg(call, child);
        let reference = arena.new_ref(call);

        assert_eq!(arena.num_args(reference), 1);
        let children: Vec<TermId> = arena.args(reference).collect();
        assert_eq!(children, vec![child]);
    }

    #[test]
    #[should_panic(expected = "cannot append an arg to a non-call term")]
    fn test_push_arg_on_datum_is_fatal() {
        let mut arena = TermArena::new();
        let datum = arena.new_datum(Datum::Null, BacktraceId::EMPTY);
        let child = arena.new_datum(Datum::Null, BacktraceId::EMPTY);
        arena.push_arg(datum, child);
    }

    #[test]
    #[should_panic(expected = "cannot append an optarg to a non-call term")]
    fn test_push_optarg_on_reference_is_fatal() {
        let mut arena = TermArena::new();
        let datum = arena.new_datum(Datum::Null, BacktraceId::EMPTY);
        let reference = arena.new_ref(datum);
        let child = arena.new_datum(Datum::Null, BacktraceId::EMPTY);
        arena.push_optarg(reference, "key", child);
    }

    #[test]
    fn test_now_is_memoized() {
        let mut arena = TermArena::new();
        let first = arena.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = arena.now();
        assert_eq!(first, second);
    }

    #[test]
    fn test_optarg_names_preserved_in_order() {
        let mut arena = TermArena::new();
        let call = arena.new_call(Opcode::MakeObject, BacktraceId::EMPTY);
        let b = arena.new_datum(Datum::Num(2.0), BacktraceId::EMPTY);
        let a = arena.new_datum(Datum::Num(1.0), BacktraceId::EMPTY);
        arena.push_optarg(call, "b", b);
        arena.push_optarg(call, "a", a);

        let names: Vec<&str> = arena.optargs(call).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_global_optargs_keep_insertion_order() {
        let mut arena = TermArena::new();
        let first = arena.new_call(Opcode::Func, BacktraceId::EMPTY);
        let second = arena.new_call(Opcode::Func, BacktraceId::EMPTY);
        arena.push_global_optarg("profile", first);
        arena.push_global_optarg("db", second);

        let names: Vec<&str> = arena.global_optargs().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["profile", "db"]);
    }

    #[test]
    fn test_structural_equality() {
        let mut left = TermArena::new();
        let call = left.new_call(Opcode::MakeArray, BacktraceId::EMPTY);
        let child = left.new_datum(Datum::Num(1.0), BacktraceId::EMPTY);
        left.push_arg(call, child);

        let mut right = TermArena::new();
        let other_call = right.new_call(Opcode::MakeArray, BacktraceId::from_u32(5));
        let other_child = right.new_datum(Datum::Num(1.0), BacktraceId::EMPTY);
        right.push_arg(other_call, other_child);

        // Backtraces are not part of structural equality.
        assert!(left.terms_equal(call, &right, other_call));

        let mut different = TermArena::new();
        let diff_call = different.new_call(Opcode::MakeArray, BacktraceId::EMPTY);
        let diff_child = different.new_datum(Datum::Num(2.0), BacktraceId::EMPTY);
        different.push_arg(diff_call, diff_child);
        assert!(!left.terms_equal(call, &different, diff_call));
    }
}
