//! Opcode registry: mnemonics, arity, and scope-ownership contracts for
//! every instruction the dispatcher can execute. A single
//! [`OpCode::info`] function replaces per-opcode static registration with
//! a plain match, avoiding any reliance on global init order.

use num_enum::TryFromPrimitive;

/// Declared argument arity. `Exact(n)` means exactly `n` arguments;
/// `Variadic` means the handler validates its own argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

/// Per-opcode contract: arity, whether it opens a nested scope body, and
/// whether that body is delayed-release.
#[derive(Debug, Clone, Copy)]
pub struct OpCodeInfo {
    pub mnemonic: &'static str,
    pub arity: Arity,
    pub has_scope: bool,
    pub delayed_release: bool,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, strum_macros::Display)]
#[repr(u16)]
pub enum OpCode {
    // flow / control
    EXIT = 0,
    SET,
    JMP,
    JR,
    JT,
    JF,
    REPEAT,
    UNTIL,
    FUNC,
    FUNI,
    CALL,
    IVOK,
    RET,
    ATMP,
    DETECT,
    EXPOSE,
    BREAKPOINT,

    // memory
    ALLOT,
    DELETE,
    PUT,
    COPY,

    // arithmetic / comparison
    ADD,
    OPP,
    MUL,
    DIV,
    POW,
    ROOT,
    MOD,
    CMP,
    CREL,

    // iteration
    ITER_APND,
    ITER_SUB,
    ITER_SIZE,
    ITER_GET,
    ITER_TRAV,
    ITER_REV_TRAV,
    ITER_SET,
    ITER_DEL,
    ITER_INSERT,
    ITER_UNPACK,

    // types
    TP_DEF,
    TP_NEW,
    TP_ADD_INST_FIELD,
    TP_ADD_TP_FIELD,
    TP_SET_FIELD,
    TP_GET_FIELD,
    TP_GET_SUPER_FIELD,
    TP_DERIVE,
    TP_SET,
    TP_GET,

    // scopes
    SP_NEW,
    SP_SET,
    SP_DEL,
    SP_GET,

    // quotes
    QOT,
    QOT_VAL,

    // i/o
    SOUT,
    SIN,
    FILE_GET,
    FILE_READ,
    FILE_WRITE,
    FILE_GET_PATH,
    FILE_GET_MODE,
    FILE_GET_SIZE,
    FILE_SET_MODE,
    FILE_SET_PATH,

    // modules
    LOADIN,
    LINK,
    EXT_GET,
    EXE_RASM,

    // random
    RAND_INT,
    RAND_FLOAT,

    // pair / dict
    PAIR_SET,
    PAIR_SET_KEY,
    PAIR_SET_VALUE,
    PAIR_GET_KEY,
    PAIR_GET_VALUE,
    DICT_SET,
    DICT_GET,
    DICT_DEL,

    // parser-only, closes a scope body; never itself executed
    END,
    // internal jump-landing placeholder appended to the outer InsSet,
    // see instruction::END_MARKER_OPCODE
    EndMarker,
}

impl OpCode {
    pub fn info(self) -> OpCodeInfo {
        use Arity::*;
        let (mnemonic, arity, has_scope, delayed_release) = match self {
            OpCode::EXIT => ("EXIT", Variadic, false, false),
            OpCode::SET => ("SET", Exact(1), false, false),
            OpCode::JMP => ("JMP", Exact(1), false, false),
            OpCode::JR => ("JR", Exact(3), false, false),
            OpCode::JT => ("JT", Exact(2), false, false),
            OpCode::JF => ("JF", Exact(2), false, false),
            OpCode::REPEAT => ("REPEAT", Variadic, true, true),
            OpCode::UNTIL => ("UNTIL", Exact(2), true, true),
            OpCode::FUNC => ("FUNC", Variadic, true, false),
            OpCode::FUNI => ("FUNI", Variadic, true, false),
            OpCode::CALL => ("CALL", Variadic, false, false),
            OpCode::IVOK => ("IVOK", Variadic, false, false),
            OpCode::RET => ("RET", Variadic, false, false),
            OpCode::ATMP => ("ATMP", Exact(0), true, false),
            OpCode::DETECT => ("DETECT", Exact(2), true, false),
            OpCode::EXPOSE => ("EXPOSE", Exact(1), false, false),
            OpCode::BREAKPOINT => ("BREAKPOINT", Variadic, false, false),

            OpCode::ALLOT => ("ALLOT", Variadic, false, false),
            OpCode::DELETE => ("DELETE", Variadic, false, false),
            OpCode::PUT => ("PUT", Exact(2), false, false),
            OpCode::COPY => ("COPY", Exact(2), false, false),

            OpCode::ADD => ("ADD", Exact(3), false, false),
            OpCode::OPP => ("OPP", Exact(2), false, false),
            OpCode::MUL => ("MUL", Exact(3), false, false),
            OpCode::DIV => ("DIV", Exact(3), false, false),
            OpCode::POW => ("POW", Exact(3), false, false),
            OpCode::ROOT => ("ROOT", Exact(3), false, false),
            OpCode::MOD => ("MOD", Exact(3), false, false),
            OpCode::CMP => ("CMP", Exact(3), false, false),
            OpCode::CREL => ("CREL", Exact(3), false, false),

            OpCode::ITER_APND => ("ITER_APND", Variadic, false, false),
            OpCode::ITER_SUB => ("ITER_SUB", Exact(4), false, false),
            OpCode::ITER_SIZE => ("ITER_SIZE", Exact(2), false, false),
            OpCode::ITER_GET => ("ITER_GET", Exact(3), false, false),
            OpCode::ITER_TRAV => ("ITER_TRAV", Exact(3), true, true),
            OpCode::ITER_REV_TRAV => ("ITER_REV_TRAV", Exact(3), true, true),
            OpCode::ITER_SET => ("ITER_SET", Exact(3), false, false),
            OpCode::ITER_DEL => ("ITER_DEL", Variadic, false, false),
            OpCode::ITER_INSERT => ("ITER_INSERT", Exact(3), false, false),
            OpCode::ITER_UNPACK => ("ITER_UNPACK", Variadic, false, false),

            OpCode::TP_DEF => ("TP_DEF", Variadic, false, false),
            OpCode::TP_NEW => ("TP_NEW", Exact(2), false, false),
            OpCode::TP_ADD_INST_FIELD => ("TP_ADD_INST_FIELD", Variadic, false, false),
            OpCode::TP_ADD_TP_FIELD => ("TP_ADD_TP_FIELD", Variadic, false, false),
            OpCode::TP_SET_FIELD => ("TP_SET_FIELD", Exact(3), false, false),
            OpCode::TP_GET_FIELD => ("TP_GET_FIELD", Exact(3), false, false),
            OpCode::TP_GET_SUPER_FIELD => ("TP_GET_SUPER_FIELD", Exact(4), false, false),
            OpCode::TP_DERIVE => ("TP_DERIVE", Exact(2), false, false),
            OpCode::TP_SET => ("TP_SET", Exact(2), false, false),
            OpCode::TP_GET => ("TP_GET", Exact(2), false, false),

            OpCode::SP_NEW => ("SP_NEW", Exact(1), false, false),
            OpCode::SP_SET => ("SP_SET", Exact(1), false, false),
            OpCode::SP_DEL => ("SP_DEL", Exact(1), false, false),
            OpCode::SP_GET => ("SP_GET", Exact(1), false, false),

            OpCode::QOT => ("QOT", Exact(2), false, false),
            OpCode::QOT_VAL => ("QOT_VAL", Exact(2), false, false),

            OpCode::SOUT => ("SOUT", Variadic, false, false),
            OpCode::SIN => ("SIN", Variadic, false, false),
            OpCode::FILE_GET => ("FILE_GET", Exact(3), false, false),
            OpCode::FILE_READ => ("FILE_READ", Exact(2), false, false),
            OpCode::FILE_WRITE => ("FILE_WRITE", Exact(2), false, false),
            OpCode::FILE_GET_PATH => ("FILE_GET_PATH", Exact(2), false, false),
            OpCode::FILE_GET_MODE => ("FILE_GET_MODE", Exact(2), false, false),
            OpCode::FILE_GET_SIZE => ("FILE_GET_SIZE", Exact(2), false, false),
            OpCode::FILE_SET_MODE => ("FILE_SET_MODE", Exact(2), false, false),
            OpCode::FILE_SET_PATH => ("FILE_SET_PATH", Exact(2), false, false),

            OpCode::LOADIN => ("LOADIN", Variadic, false, false),
            OpCode::LINK => ("LINK", Variadic, false, false),
            OpCode::EXT_GET => ("EXT_GET", Exact(3), false, false),
            OpCode::EXE_RASM => ("EXE_RASM", Variadic, false, false),

            OpCode::RAND_INT => ("RAND_INT", Exact(3), false, false),
            OpCode::RAND_FLOAT => ("RAND_FLOAT", Exact(4), false, false),

            OpCode::PAIR_SET => ("PAIR_SET", Exact(3), false, false),
            OpCode::PAIR_SET_KEY => ("PAIR_SET_KEY", Exact(2), false, false),
            OpCode::PAIR_SET_VALUE => ("PAIR_SET_VALUE", Exact(2), false, false),
            OpCode::PAIR_GET_KEY => ("PAIR_GET_KEY", Exact(2), false, false),
            OpCode::PAIR_GET_VALUE => ("PAIR_GET_VALUE", Exact(2), false, false),
            OpCode::DICT_SET => ("DICT_SET", Exact(3), false, false),
            OpCode::DICT_GET => ("DICT_GET", Exact(3), false, false),
            OpCode::DICT_DEL => ("DICT_DEL", Variadic, false, false),

            OpCode::END => ("END", Variadic, false, false),
            OpCode::EndMarker => ("<end-marker>", Exact(0), false, false),
        };
        OpCodeInfo { mnemonic, arity, has_scope, delayed_release }
    }

    /// Looks up an opcode by its RA mnemonic (case-insensitive, per the
    /// parser's uppercasing of registered instruction names).
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        let upper = mnemonic.to_ascii_uppercase();
        ALL_OPCODES.iter().find(|op| op.info().mnemonic == upper).copied()
    }
}

pub const ALL_OPCODES: &[OpCode] = &[
    OpCode::EXIT, OpCode::SET, OpCode::JMP, OpCode::JR, OpCode::JT, OpCode::JF,
    OpCode::REPEAT, OpCode::UNTIL, OpCode::FUNC, OpCode::FUNI, OpCode::CALL,
    OpCode::IVOK, OpCode::RET, OpCode::ATMP, OpCode::DETECT, OpCode::EXPOSE,
    OpCode::BREAKPOINT, OpCode::ALLOT, OpCode::DELETE, OpCode::PUT, OpCode::COPY,
    OpCode::ADD, OpCode::OPP, OpCode::MUL, OpCode::DIV, OpCode::POW, OpCode::ROOT,
    OpCode::MOD, OpCode::CMP, OpCode::CREL, OpCode::ITER_APND, OpCode::ITER_SUB,
    OpCode::ITER_SIZE, OpCode::ITER_GET, OpCode::ITER_TRAV, OpCode::ITER_REV_TRAV,
    OpCode::ITER_SET, OpCode::ITER_DEL, OpCode::ITER_INSERT, OpCode::ITER_UNPACK,
    OpCode::TP_DEF, OpCode::TP_NEW, OpCode::TP_ADD_INST_FIELD, OpCode::TP_ADD_TP_FIELD,
    OpCode::TP_SET_FIELD, OpCode::TP_GET_FIELD, OpCode::TP_GET_SUPER_FIELD,
    OpCode::TP_DERIVE, OpCode::TP_SET, OpCode::TP_GET, OpCode::SP_NEW, OpCode::SP_SET,
    OpCode::SP_DEL, OpCode::SP_GET, OpCode::QOT, OpCode::QOT_VAL, OpCode::SOUT,
    OpCode::SIN, OpCode::FILE_GET, OpCode::FILE_READ, OpCode::FILE_WRITE,
    OpCode::FILE_GET_PATH, OpCode::FILE_GET_MODE, OpCode::FILE_GET_SIZE,
    OpCode::FILE_SET_MODE, OpCode::FILE_SET_PATH, OpCode::LOADIN, OpCode::LINK,
    OpCode::EXT_GET, OpCode::EXE_RASM, OpCode::RAND_INT, OpCode::RAND_FLOAT,
    OpCode::PAIR_SET, OpCode::PAIR_SET_KEY, OpCode::PAIR_SET_VALUE,
    OpCode::PAIR_GET_KEY, OpCode::PAIR_GET_VALUE, OpCode::DICT_SET, OpCode::DICT_GET,
    OpCode::DICT_DEL, OpCode::END,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(OpCode::from_mnemonic("add"), Some(OpCode::ADD));
        assert_eq!(OpCode::from_mnemonic("Repeat"), Some(OpCode::REPEAT));
        assert_eq!(OpCode::from_mnemonic("nonsense"), None);
    }

    #[test]
    fn repeat_is_a_delayed_release_scope() {
        let info = OpCode::REPEAT.info();
        assert!(info.has_scope);
        assert!(info.delayed_release);
    }

    #[test]
    fn func_scope_is_not_delayed_release() {
        let info = OpCode::FUNC.info();
        assert!(info.has_scope);
        assert!(!info.delayed_release);
    }
}
