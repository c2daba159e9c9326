//! Protocol opcode and query-kind enumerations.
//!
//! Numeric values are protocol-fixed; clients and peer nodes encode them
//! bit-exactly, so the discriminants here can never change.

/// Operation opcodes carried by call terms.
///
/// `DATUM` is special-cased everywhere: a datum term carries a literal
/// value and no children. References are not an opcode; they are a
/// distinct term variant and never appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    Datum = 1,
    MakeArray = 2,
    MakeObject = 3,
    Var = 10,
    JavaScript = 11,
    Error = 12,
    Now = 13,
    ImplicitVar = 14,
    Table = 15,
    Get = 16,
    Eq = 17,
    Ne = 18,
    Lt = 19,
    Le = 20,
    Gt = 21,
    Ge = 22,
    Not = 23,
    Add = 24,
    Sub = 25,
    Mul = 26,
    Div = 27,
    Mod = 28,
    GetField = 31,
    Filter = 39,
    FuncCall = 64,
    Branch = 65,
    Func = 69,
    Db = 170,
}

impl Opcode {
    /// Decode a wire value; returns None for unknown opcodes
    pub fn from_wire(value: i64) -> Option<Opcode> {
        let opcode = match value {
            1 => Opcode::Datum,
            2 => Opcode::MakeArray,
            3 => Opcode::MakeObject,
            10 => Opcode::Var,
            11 => Opcode::JavaScript,
            12 => Opcode::Error,
            13 => Opcode::Now,
            14 => Opcode::ImplicitVar,
            15 => Opcode::Table,
            16 => Opcode::Get,
            17 => Opcode::Eq,
            18 => Opcode::Ne,
            19 => Opcode::Lt,
            20 => Opcode::Le,
            21 => Opcode::Gt,
            22 => Opcode::Ge,
            23 => Opcode::Not,
            24 => Opcode::Add,
            25 => Opcode::Sub,
            26 => Opcode::Mul,
            27 => Opcode::Div,
            28 => Opcode::Mod,
            31 => Opcode::GetField,
            39 => Opcode::Filter,
            64 => Opcode::FuncCall,
            65 => Opcode::Branch,
            69 => Opcode::Func,
            170 => Opcode::Db,
            _ => return None,
        };
        Some(opcode)
    }

    /// Wire encoding of this opcode
    pub fn as_wire(self) -> i32 {
        self as i32
    }
}

/// Top-level query kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum QueryKind {
    /// Begin evaluating a new query
    Start = 1,
    /// Request the next batch of a streaming result
    Continue = 2,
    /// Abandon a streaming result
    Stop = 3,
    /// Block until all earlier noreply queries on the connection finish
    NoreplyWait = 4,
    /// Report server identity
    ServerInfo = 5,
}

impl QueryKind {
    /// Decode a wire value; returns None for unknown kinds
    pub fn from_wire(value: i64) -> Option<QueryKind> {
        match value {
            1 => Some(QueryKind::Start),
            2 => Some(QueryKind::Continue),
            3 => Some(QueryKind::Stop),
            4 => Some(QueryKind::NoreplyWait),
            5 => Some(QueryKind::ServerInfo),
            _ => None,
        }
    }

    /// Wire encoding of this kind
    pub fn as_wire(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_fixed_values() {
        assert_eq!(Opcode::Datum.as_wire(), 1);
        assert_eq!(Opcode::MakeArray.as_wire(), 2);
        assert_eq!(Opcode::MakeObject.as_wire(), 3);
        assert_eq!(Opcode::Now.as_wire(), 13);
        assert_eq!(Opcode::Db.as_wire(), 170);
    }

    #[test]
    fn test_opcode_wire_round_trip() {
        for opcode in [
            Opcode::Datum,
            Opcode::MakeArray,
            Opcode::Func,
            Opcode::Db,
            Opcode::Now,
        ] {
            assert_eq!(Opcode::from_wire(opcode.as_wire() as i64), Some(opcode));
        }
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        assert_eq!(Opcode::from_wire(0), None);
        assert_eq!(Opcode::from_wire(-1), None);
        assert_eq!(Opcode::from_wire(9_999), None);
    }

    #[test]
    fn test_query_kind_values() {
        assert_eq!(QueryKind::from_wire(1), Some(QueryKind::Start));
        assert_eq!(QueryKind::from_wire(4), Some(QueryKind::NoreplyWait));
        assert_eq!(QueryKind::from_wire(5), Some(QueryKind::ServerInfo));
        assert_eq!(QueryKind::from_wire(6), None);
        assert_eq!(QueryKind::from_wire(0), None);
    }
}
