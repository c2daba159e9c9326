//! Query envelope handling.
//!
//! A client query arrives as `[kind, root_term?, global_options?]`.
//! Construction validates the envelope shape, extracts the two
//! pre-evaluation flags, and settles the query-id lifecycle; the term
//! tree itself is compiled into the arena later, on demand, so the
//! caller controls error-reporting context.

use serde_json::Value;

use crate::backtrace::{BacktraceId, BacktraceRegistry};
use crate::datum::{Datum, ParseLimits, SchemaVersion};

use super::errors::{QueryError, QueryResult};
use super::opcode::{Opcode, QueryKind};
use super::parser::{as_wire_int, json_type_name, TermParser};
use super::registry::{QueryId, QueryIdRegistry};
use super::term::{TermArena, TermId};

/// One validated query envelope and its term storage
#[derive(Debug)]
pub struct QueryParams {
    token: i64,
    kind: QueryKind,
    noreply: bool,
    profile: bool,
    doc: Value,
    arena: TermArena,
    root: Option<TermId>,
    compiled: bool,
    id: Option<QueryId>,
    original_bytes: Vec<u8>,
}

impl QueryParams {
    /// Validate an envelope and settle the query-id lifecycle.
    ///
    /// An id is always allocated, so ids stay monotonic across every
    /// query on the connection; it is retained only when the query is
    /// noreply, because only those ids gate a later noreply-wait.
    pub fn new(
        token: i64,
        registry: &QueryIdRegistry,
        original_bytes: Vec<u8>,
        doc: Value,
    ) -> QueryResult<QueryParams> {
        let items = match doc.as_array() {
            Some(items) => items,
            None => {
                return Err(QueryError::client(format!(
                    "Expected a query to be an array, but found {}.",
                    json_type_name(&doc)
                )))
            }
        };
        if items.is_empty() || items.len() > 3 {
            return Err(QueryError::client(format!(
                "Expected 1 to 3 elements in the top-level query, but found {}.",
                items.len()
            )));
        }

        let raw_kind = as_wire_int(&items[0]).ok_or_else(|| {
            QueryError::client(format!(
                "Expected a query type as a number, but found {}.",
                json_type_name(&items[0])
            ))
        })?;
        let kind = QueryKind::from_wire(raw_kind)
            .ok_or_else(|| QueryError::client(format!("Unrecognized query type {}.", raw_kind)))?;

        if let Some(optargs) = items.get(2) {
            if !optargs.is_object() {
                return Err(QueryError::client(format!(
                    "Expected global optargs as an object, but found {}.",
                    json_type_name(optargs)
                )));
            }
        }

        // Flags are read before any term parsing; a malformed flag is a
        // missing flag, not an error.
        let global_optargs = items.get(2);
        let noreply = static_optarg_as_bool(global_optargs, "noreply", false);
        let profile = static_optarg_as_bool(global_optargs, "profile", false);

        let id = registry.allocate();
        let id = if noreply {
            Some(id)
        } else {
            // Reply-expecting queries need no ordering tracking.
            id.release();
            None
        };

        Ok(QueryParams {
            token,
            kind,
            noreply,
            profile,
            doc,
            arena: TermArena::new(),
            root: None,
            compiled: false,
            id,
            original_bytes,
        })
    }

    /// Parse the root term and global optargs into the arena.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn compile(&mut self, registry: &mut BacktraceRegistry) -> QueryResult<()> {
        if self.compiled {
            return Ok(());
        }
        let items = self
            .doc
            .as_array()
            .expect("envelope validated at construction");

        let mut root = None;
        if let Some(root_doc) = items.get(1) {
            let mut parser = TermParser::with_registry(&mut self.arena, registry);
            root = Some(parser.parse_root(root_doc, BacktraceId::EMPTY)?);
        }

        // An absent options object behaves as an empty one, so the
        // default db selection is injected for every query.
        let empty = Value::Object(serde_json::Map::new());
        let optargs_doc = items.get(2).unwrap_or(&empty);
        TermParser::new(&mut self.arena).parse_global_optargs(optargs_doc)?;

        self.root = root;
        self.compiled = true;
        Ok(())
    }

    /// The token echoed back in the response
    pub fn token(&self) -> i64 {
        self.token
    }

    /// The query kind
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// True when the client does not want a response
    pub fn noreply(&self) -> bool {
        self.noreply
    }

    /// True when the client asked for evaluation profiling
    pub fn profile(&self) -> bool {
        self.profile
    }

    /// The compiled root term, if the envelope carried one
    pub fn root_term(&self) -> Option<TermId> {
        self.root
    }

    /// The arena holding the compiled tree
    pub fn arena(&self) -> &TermArena {
        &self.arena
    }

    /// Raw input bytes, retained for diagnostics
    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }

    /// Value of the retained query id, while one is held
    pub fn query_id(&self) -> Option<u64> {
        self.id.as_ref().map(QueryId::value)
    }

    /// Mark the query complete, releasing a retained id
    pub fn finish(&mut self) {
        if let Some(id) = self.id.take() {
            id.release();
        }
    }
}

/// Probe a pre-evaluation boolean option.
///
/// The option is honored only in datum form, `[DATUM, true|false]`;
/// every other shape yields the default.
fn static_optarg_as_bool(optargs: Option<&Value>, key: &str, default: bool) -> bool {
    let Some(Value::Object(fields)) = optargs else {
        return default;
    };
    let Some(Value::Array(option)) = fields.get(key) else {
        return default;
    };
    if option.len() != 2 {
        return default;
    }
    let is_datum_form = as_wire_int(&option[0])
        .and_then(Opcode::from_wire)
        .map(|opcode| opcode == Opcode::Datum)
        .unwrap_or(false);
    if !is_datum_form {
        return default;
    }
    match Datum::from_json(&option[1], &ParseLimits::unlimited(), SchemaVersion::Latest) {
        Ok(datum) => datum.as_bool().unwrap_or(default),
        Err(_) => default,
    }
}
