//! Binary term encoding.
//!
//! Terms travel between nodes in two layouts, selected by the schema
//! version the caller supplies. Legacy versions wrap the whole tree in a
//! 32-bit length-prefixed self-describing message; the latest version
//! streams each node directly. All integers are little-endian; strings
//! and datum payloads are u32 length-prefixed bytes, datums as the JSON
//! encoding of their wire shape.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::backtrace::BacktraceId;
use crate::datum::{Datum, ParseLimits, SchemaVersion};

use super::errors::{QueryError, QueryResult};
use super::opcode::Opcode;
use super::term::{TermArena, TermId};

/// Self-describing node of the legacy nested-message layout
#[derive(Debug, Serialize, Deserialize)]
struct WireTerm {
    /// Opcode
    t: i32,
    /// Datum payload, present only for DATUM nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<Value>,
    /// Positional children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    a: Vec<WireTerm>,
    /// Named children as (key, value) pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    o: Vec<(String, WireTerm)>,
}

/// Decode one term tree from `reader` under `version`, producing terms
/// into `arena` and returning the root.
pub fn decode_term(
    reader: &mut impl Read,
    version: SchemaVersion,
    arena: &mut TermArena,
) -> QueryResult<TermId> {
    if version.is_legacy() {
        decode_nested(reader, version, arena)
    } else {
        decode_streaming(reader, version, arena)
    }
}

/// Encode one term tree in the streaming (latest) layout.
///
/// References are resolved before encoding; the emitted stream contains
/// only datum and call nodes.
pub fn encode_term(
    writer: &mut impl Write,
    arena: &TermArena,
    root: TermId,
) -> QueryResult<()> {
    let root = arena.resolve(root);
    write_i32(writer, arena.opcode(root).as_wire())?;
    write_u32(writer, arena.backtrace(root).as_u32())?;

    if arena.is_datum(root) {
        let payload = serde_json::to_vec(&arena.datum(root).to_json())
            .map_err(|e| QueryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        write_bytes(writer, &payload)?;
        return Ok(());
    }

    let declared_args = arena.num_args(root);
    write_i32(writer, declared_args as i32)?;
    let mut written_args = 0usize;
    for child in arena.args(root) {
        encode_term(writer, arena, child)?;
        written_args += 1;
    }
    assert_eq!(
        written_args, declared_args,
        "arg count mismatch while encoding term tree"
    );

    let declared_optargs = arena.num_optargs(root);
    write_i32(writer, declared_optargs as i32)?;
    let mut written_optargs = 0usize;
    for (name, child) in arena.optargs(root) {
        write_bytes(writer, name.as_bytes())?;
        encode_term(writer, arena, child)?;
        written_optargs += 1;
    }
    assert_eq!(
        written_optargs, declared_optargs,
        "optarg count mismatch while encoding term tree"
    );
    Ok(())
}

fn decode_nested(
    reader: &mut impl Read,
    version: SchemaVersion,
    arena: &mut TermArena,
) -> QueryResult<TermId> {
    let size = read_i32(reader)?;
    if size < 0 {
        return Err(QueryError::range(format!(
            "Negative message length {}.",
            size
        )));
    }
    let mut blob = vec![0u8; size as usize];
    reader.read_exact(&mut blob)?;
    trace!(bytes = blob.len(), "decoding nested term message");

    let message: WireTerm = serde_json::from_slice(&blob)
        .map_err(|e| QueryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    translate_nested(&message, version, arena)
}

fn translate_nested(
    message: &WireTerm,
    version: SchemaVersion,
    arena: &mut TermArena,
) -> QueryResult<TermId> {
    let opcode = Opcode::from_wire(message.t as i64).ok_or_else(|| {
        QueryError::parse(
            format!("Unrecognized opcode {}.", message.t),
            BacktraceId::EMPTY,
        )
    })?;

    if opcode == Opcode::Datum {
        let payload = message.d.as_ref().ok_or_else(|| {
            QueryError::parse(
                "DATUM term carries no datum payload.",
                BacktraceId::EMPTY,
            )
        })?;
        let value = convert_datum(payload, version, BacktraceId::EMPTY)?;
        return Ok(arena.new_datum(value, BacktraceId::EMPTY));
    }

    // Nodes replayed through the legacy layout carry no backtraces.
    let term = arena.new_call(opcode, BacktraceId::EMPTY);
    for child in &message.a {
        let child_term = translate_nested(child, version, arena)?;
        arena.push_arg(term, child_term);
    }
    for (name, child) in &message.o {
        let child_term = translate_nested(child, version, arena)?;
        arena.push_optarg(term, name.clone(), child_term);
    }
    Ok(term)
}

fn decode_streaming(
    reader: &mut impl Read,
    version: SchemaVersion,
    arena: &mut TermArena,
) -> QueryResult<TermId> {
    let raw_opcode = read_i32(reader)?;
    let bt = BacktraceId::from_u32(read_u32(reader)?);
    let opcode = Opcode::from_wire(raw_opcode as i64)
        .ok_or_else(|| QueryError::parse(format!("Unrecognized opcode {}.", raw_opcode), bt))?;

    if opcode == Opcode::Datum {
        let payload = read_length_prefixed(reader)?;
        let value: Value = serde_json::from_slice(&payload)
            .map_err(|e| QueryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let datum = convert_datum(&value, version, bt)?;
        return Ok(arena.new_datum(datum, bt));
    }

    let term = arena.new_call(opcode, bt);

    let num_args = read_i32(reader)?;
    if num_args < 0 {
        return Err(QueryError::range(format!(
            "Negative arg count {}.",
            num_args
        )));
    }
    for _ in 0..num_args {
        let child = decode_streaming(reader, version, arena)?;
        arena.push_arg(term, child);
    }

    let num_optargs = read_i32(reader)?;
    if num_optargs < 0 {
        return Err(QueryError::range(format!(
            "Negative optarg count {}.",
            num_optargs
        )));
    }
    for _ in 0..num_optargs {
        let name = read_string(reader)?;
        let child = decode_streaming(reader, version, arena)?;
        arena.push_optarg(term, name, child);
    }
    Ok(term)
}

fn convert_datum(value: &Value, version: SchemaVersion, bt: BacktraceId) -> QueryResult<Datum> {
    Datum::from_json(value, &ParseLimits::unlimited(), version)
        .map_err(|e| QueryError::parse(e.to_string(), bt))
}

fn read_i32(reader: &mut impl Read) -> QueryResult<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32(reader: &mut impl Read) -> QueryResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_length_prefixed(reader: &mut impl Read) -> QueryResult<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(reader: &mut impl Read) -> QueryResult<String> {
    let bytes = read_length_prefixed(reader)?;
    String::from_utf8(bytes).map_err(|e| {
        QueryError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid UTF-8: {}", e),
        ))
    })
}

fn write_i32(writer: &mut impl Write, value: i32) -> QueryResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_u32(writer: &mut impl Write, value: u32) -> QueryResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_bytes(writer: &mut impl Write, bytes: &[u8]) -> QueryResult<()> {
    write_u32(writer, bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}
