//! Canonical sub-tree construction.
//!
//! A small builder used when the server itself has to synthesize terms:
//! global optargs are wrapped as zero-argument functions, and a default
//! database selection is injected when the client supplied none. Building
//! through one place keeps those shapes canonical for the evaluator.

use crate::backtrace::BacktraceId;
use crate::datum::Datum;

use super::opcode::Opcode;
use super::term::{TermArena, TermId};

/// Builder over an arena for server-synthesized terms
pub struct MiniDriver<'a> {
    arena: &'a mut TermArena,
    bt: BacktraceId,
}

impl<'a> MiniDriver<'a> {
    /// Build into `arena`, stamping every synthesized node with `bt`
    pub fn new(arena: &'a mut TermArena, bt: BacktraceId) -> Self {
        Self { arena, bt }
    }

    /// Incorporate an existing term by reference, so the original keeps
    /// its single owner.
    pub fn expr(&mut self, term: TermId) -> TermId {
        self.arena.new_ref(term)
    }

    /// A literal datum term
    pub fn datum(&mut self, value: Datum) -> TermId {
        self.arena.new_datum(value, self.bt)
    }

    /// `db(<name>)`
    pub fn db(&mut self, name: impl Into<String>) -> TermId {
        let name_term = self.datum(Datum::Str(name.into()));
        let call = self.arena.new_call(Opcode::Db, self.bt);
        self.arena.push_arg(call, name_term);
        call
    }

    /// Wrap `body` as a function of no parameters: `fun() -> body`.
    ///
    /// The function's first child is its (empty) parameter list, the
    /// second is the body.
    pub fn fun(&mut self, body: TermId) -> TermId {
        let params = self.arena.new_call(Opcode::MakeArray, self.bt);
        let func = self.arena.new_call(Opcode::Func, self.bt);
        self.arena.push_arg(func, params);
        self.arena.push_arg(func, body);
        func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_shape() {
        let mut arena = TermArena::new();
        let db = MiniDriver::new(&mut arena, BacktraceId::EMPTY).db("test");

        assert_eq!(arena.opcode(db), Opcode::Db);
        assert_eq!(arena.num_args(db), 1);
        let name = arena.args(db).next().unwrap();
        assert_eq!(arena.datum(name), &Datum::Str("test".into()));
    }

    #[test]
    fn test_fun_wraps_zero_arg_function() {
        let mut arena = TermArena::new();
        let mut driver = MiniDriver::new(&mut arena, BacktraceId::EMPTY);
        let body = driver.datum(Datum::Num(42.0));
        let func = driver.fun(body);

        assert_eq!(arena.opcode(func), Opcode::Func);
        assert_eq!(arena.num_args(func), 2);
        let children: Vec<TermId> = arena.args(func).collect();
        assert_eq!(arena.opcode(children[0]), Opcode::MakeArray);
        assert_eq!(arena.num_args(children[0]), 0);
        assert_eq!(arena.datum(children[1]), &Datum::Num(42.0));
    }

    #[test]
    fn test_expr_shares_by_reference() {
        let mut arena = TermArena::new();
        let original = arena.new_datum(Datum::Str("shared".into()), BacktraceId::EMPTY);
        let mut driver = MiniDriver::new(&mut arena, BacktraceId::EMPTY);
        let shared = driver.expr(original);
        let func = driver.fun(shared);

        // The function body resolves to the original term.
        let body = arena.args(func).nth(1).unwrap();
        assert_eq!(body, original);
    }
}
