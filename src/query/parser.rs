//! Textual term parsing.
//!
//! Translates a decoded client document into arena terms. Three shapes
//! are recognised for any value: the array form `[opcode, args?,
//! optargs?]`, the object form (sugar for a MAKE_OBJECT call), and bare
//! primitives (literal datums). Deterministic special forms are folded
//! during parsing so the evaluator sees a uniform tree.

use serde_json::Value;
use tracing::trace;

use crate::backtrace::{BacktraceId, BacktraceRegistry};
use crate::datum::{Datum, ParseLimits, SchemaVersion};

use super::errors::{QueryError, QueryResult};
use super::minidriver::MiniDriver;
use super::opcode::Opcode;
use super::term::{TermArena, TermId};

/// Name of the JSON type of `v`, for parse error messages
pub(crate) fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOL",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "OBJECT",
    }
}

/// Integral value of a wire number; tolerates integral floats
pub(crate) fn as_wire_int(v: &Value) -> Option<i64> {
    let n = match v {
        Value::Number(n) => n,
        _ => return None,
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| f as i64)
}

/// Parses client documents into terms in a target arena.
///
/// When a backtrace registry is attached, a fresh frame is opened per
/// child descended into; without one, every term inherits the empty
/// backtrace (the binary replay path and global optargs want this).
pub struct TermParser<'a, 'r> {
    arena: &'a mut TermArena,
    registry: Option<&'r mut BacktraceRegistry>,
}

impl<'a, 'r> TermParser<'a, 'r> {
    /// Parser without backtrace tracking
    pub fn new(arena: &'a mut TermArena) -> Self {
        Self {
            arena,
            registry: None,
        }
    }

    /// Parser that records a frame per descended child
    pub fn with_registry(arena: &'a mut TermArena, registry: &'r mut BacktraceRegistry) -> Self {
        Self {
            arena,
            registry: Some(registry),
        }
    }

    /// Parse the root term of a query
    pub fn parse_root(&mut self, v: &Value, bt: BacktraceId) -> QueryResult<TermId> {
        self.parse_value(v, bt, true)
    }

    /// Parse the global-options object.
    ///
    /// Each option value is parsed as a term and wrapped as a
    /// zero-argument function; the wrappers are appended to the arena's
    /// global optarg list in insertion order. When the client supplied no
    /// `db` option, a synthetic `db("test")` wrapper is appended.
    pub fn parse_global_optargs(&mut self, optargs: &Value) -> QueryResult<()> {
        let fields = match optargs {
            Value::Object(fields) => fields,
            other => {
                return Err(QueryError::parse(
                    format!(
                        "Query parse error: expected OBJECT but found {}.",
                        json_type_name(other)
                    ),
                    BacktraceId::EMPTY,
                ))
            }
        };

        let mut has_db = false;
        for (key, value) in fields {
            if key == "db" {
                has_db = true;
            }

            // Global optargs carry no backtrace frames.
            let term = self.parse_value(value, BacktraceId::EMPTY, false)?;
            let mut driver = MiniDriver::new(self.arena, BacktraceId::EMPTY);
            let body = driver.expr(term);
            let wrapped = driver.fun(body);
            self.arena.push_global_optarg(key.clone(), wrapped);
        }

        if !has_db {
            let mut driver = MiniDriver::new(self.arena, BacktraceId::EMPTY);
            let body = driver.db("test");
            let wrapped = driver.fun(body);
            self.arena.push_global_optarg("db", wrapped);
        }
        Ok(())
    }

    fn parse_value(&mut self, v: &Value, bt: BacktraceId, frames: bool) -> QueryResult<TermId> {
        match v {
            Value::Array(items) => {
                trace!(size = items.len(), "parsing array-form term");
                if items.is_empty() || items.len() > 3 {
                    return Err(QueryError::parse(
                        format!(
                            "Expected an array of 1, 2, or 3 elements, but found {}.",
                            items.len()
                        ),
                        bt,
                    ));
                }
                let raw_opcode = as_wire_int(&items[0]).ok_or_else(|| {
                    QueryError::parse(
                        format!(
                            "Query parse error: expected NUMBER but found {}.",
                            json_type_name(&items[0])
                        ),
                        bt,
                    )
                })?;
                let opcode = Opcode::from_wire(raw_opcode).ok_or_else(|| {
                    QueryError::parse(format!("Unrecognized opcode {}.", raw_opcode), bt)
                })?;

                if opcode == Opcode::Datum {
                    if items.len() != 2 {
                        return Err(QueryError::parse(
                            format!("Expected 2 elements in array, but found {}.", items.len()),
                            bt,
                        ));
                    }
                    let value = self.convert_datum(&items[1], bt)?;
                    return Ok(self.arena.new_datum(value, bt));
                }

                let term = self.arena.new_call(opcode, bt);
                if items.len() >= 2 {
                    self.add_args(term, &items[1], bt, frames)?;
                }
                if items.len() == 3 {
                    self.add_optargs(term, &items[2], bt, frames)?;
                }

                // Fold bare NOW calls into a literal, so every occurrence
                // within one query observes the same instant.
                if opcode == Opcode::Now
                    && self.arena.num_args(term) == 0
                    && self.arena.num_optargs(term) == 0
                {
                    let start_time = self.arena.now();
                    self.arena.replace_with_datum(term, start_time);
                }
                Ok(term)
            }
            Value::Object(_) => {
                trace!("parsing object-form term as MAKE_OBJECT");
                let term = self.arena.new_call(Opcode::MakeObject, bt);
                self.add_optargs(term, v, bt, frames)?;
                Ok(term)
            }
            _ => {
                trace!(kind = json_type_name(v), "parsing primitive term as datum");
                let value = self.convert_datum(v, bt)?;
                Ok(self.arena.new_datum(value, bt))
            }
        }
    }

    fn add_args(
        &mut self,
        parent: TermId,
        args: &Value,
        bt: BacktraceId,
        frames: bool,
    ) -> QueryResult<()> {
        let items = match args {
            Value::Array(items) => items,
            other => {
                return Err(QueryError::parse(
                    format!(
                        "Query parse error: expected ARRAY but found {}.",
                        json_type_name(other)
                    ),
                    bt,
                ))
            }
        };
        for (index, item) in items.iter().enumerate() {
            let child_bt = match (frames, self.registry.as_deref_mut()) {
                (true, Some(registry)) => registry.new_frame(bt, Datum::Num(index as f64)),
                _ => BacktraceId::EMPTY,
            };
            let child = self.parse_value(item, child_bt, frames)?;
            self.arena.push_arg(parent, child);
        }
        Ok(())
    }

    fn add_optargs(
        &mut self,
        parent: TermId,
        optargs: &Value,
        bt: BacktraceId,
        frames: bool,
    ) -> QueryResult<()> {
        let fields = match optargs {
            Value::Object(fields) => fields,
            other => {
                return Err(QueryError::parse(
                    format!(
                        "Query parse error: expected OBJECT but found {}.",
                        json_type_name(other)
                    ),
                    bt,
                ))
            }
        };
        for (key, value) in fields {
            let child_bt = match (frames, self.registry.as_deref_mut()) {
                (true, Some(registry)) => registry.new_frame(bt, Datum::Str(key.clone())),
                _ => BacktraceId::EMPTY,
            };
            let child = self.parse_value(value, child_bt, frames)?;
            self.arena.push_optarg(parent, key.clone(), child);
        }
        Ok(())
    }

    fn convert_datum(&mut self, v: &Value, bt: BacktraceId) -> QueryResult<Datum> {
        Datum::from_json(v, &ParseLimits::unlimited(), SchemaVersion::Latest)
            .map_err(|e| QueryError::parse(e.to_string(), bt))
    }
}
