//! Opcode handlers (H): one function per opcode family, uniform signature
//! `(dispatcher, ins_set, ins) -> HandlerResult`. [`dispatch`] is the single
//! match that replaces the source's per-opcode static registration (§9).

mod arith;
mod atmp;
mod control;
mod io;
mod iter;
mod memory;
mod misc;
mod modules;
mod quotes;
mod scopes;
mod types;

use std::rc::Rc;

use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::{Arg, ArgLiteral, Ins, InsSet};
use crate::opcode::OpCode;
use crate::value::Value;

pub fn dispatch(disp: &mut Dispatcher, ins_set: &InsSet, ins: &Ins) -> HandlerResult {
    use OpCode::*;
    match ins.opcode {
        EXIT => control::exit(disp, ins),
        SET => Ok(Flow::Normal),
        JMP => control::jmp(disp, ins_set, ins),
        JR => control::jr(disp, ins_set, ins),
        JT => control::jt(disp, ins_set, ins),
        JF => control::jf(disp, ins_set, ins),
        REPEAT => control::repeat(disp, ins),
        UNTIL => control::until(disp, ins),
        FUNC => control::func(disp, ins, false),
        FUNI => control::func(disp, ins, true),
        CALL => control::call(disp, ins, None),
        IVOK => control::ivok(disp, ins),
        RET => control::ret(disp, ins),
        ATMP => atmp::atmp(disp, ins),
        DETECT => Err(fatal(ins, "DETECT may only appear inside an ATMP body")),
        EXPOSE => atmp::expose(disp, ins),
        BREAKPOINT => {
            disp.debug.on_step(&ins.pos, ins);
            Ok(Flow::Normal)
        }

        ALLOT => memory::allot(disp, ins),
        DELETE => memory::delete(disp, ins),
        PUT => memory::put(disp, ins),
        COPY => memory::copy(disp, ins),

        ADD => arith::binop(disp, ins, Value::add),
        OPP => arith::opp(disp, ins),
        MUL => arith::binop(disp, ins, Value::mul),
        DIV => arith::binop(disp, ins, Value::div),
        POW => arith::binop(disp, ins, Value::pow),
        ROOT => arith::binop(disp, ins, Value::root),
        MOD => arith::binop(disp, ins, Value::modulo),
        CMP => arith::cmp(disp, ins),
        CREL => arith::crel(disp, ins),

        ITER_APND => iter::append(disp, ins),
        ITER_SUB => iter::sub(disp, ins),
        ITER_SIZE => iter::size(disp, ins),
        ITER_GET => iter::get(disp, ins),
        ITER_TRAV => iter::travel(disp, ins, false),
        ITER_REV_TRAV => iter::travel(disp, ins, true),
        ITER_SET => iter::set(disp, ins),
        ITER_DEL => iter::del(disp, ins),
        ITER_INSERT => iter::insert(disp, ins),
        ITER_UNPACK => iter::unpack(disp, ins),

        TP_DEF => types::tp_def(disp, ins),
        TP_NEW => types::tp_new(disp, ins),
        TP_ADD_INST_FIELD => types::tp_add_inst_field(disp, ins),
        TP_ADD_TP_FIELD => types::tp_add_tp_field(disp, ins),
        TP_SET_FIELD => types::tp_set_field(disp, ins),
        TP_GET_FIELD => types::tp_get_field(disp, ins),
        TP_GET_SUPER_FIELD => types::tp_get_super_field(disp, ins),
        TP_DERIVE => types::tp_derive(disp, ins),
        TP_SET => types::tp_set(disp, ins),
        TP_GET => types::tp_get(disp, ins),

        SP_NEW => scopes::sp_new(disp, ins),
        SP_SET => scopes::sp_set(disp, ins),
        SP_DEL => scopes::sp_del(disp, ins),
        SP_GET => scopes::sp_get(disp, ins),

        QOT => quotes::qot(disp, ins),
        QOT_VAL => quotes::qot_val(disp, ins),

        SOUT => io::sout(disp, ins),
        SIN => io::sin(disp, ins),
        FILE_GET => io::file_get(disp, ins),
        FILE_READ => io::file_read(disp, ins),
        FILE_WRITE => io::file_write(disp, ins),
        FILE_GET_PATH => io::file_get_path(disp, ins),
        FILE_GET_MODE => io::file_get_mode(disp, ins),
        FILE_GET_SIZE => io::file_get_size(disp, ins),
        FILE_SET_MODE => io::file_set_mode(disp, ins),
        FILE_SET_PATH => io::file_set_path(disp, ins),

        LOADIN => modules::loadin(disp, ins),
        LINK => Ok(Flow::Normal), // spliced at parse time; a no-op if ever reached
        EXT_GET => modules::ext_get(disp, ins),
        EXE_RASM => modules::exe_rasm(disp, ins),

        RAND_INT => misc::rand_int(disp, ins),
        RAND_FLOAT => misc::rand_float(disp, ins),

        PAIR_SET => misc::pair_set(disp, ins),
        PAIR_SET_KEY => misc::pair_set_key(disp, ins),
        PAIR_SET_VALUE => misc::pair_set_value(disp, ins),
        PAIR_GET_KEY => misc::pair_get_key(disp, ins),
        PAIR_GET_VALUE => misc::pair_get_value(disp, ins),
        DICT_SET => misc::dict_set(disp, ins),
        DICT_GET => misc::dict_get(disp, ins),
        DICT_DEL => misc::dict_del(disp, ins),

        END | EndMarker => Ok(Flow::Normal),
    }
}

fn fatal(ins: &Ins, msg: impl Into<String>) -> RvmError {
    RvmError::new(ErrorKind::RuntimeError, ins.pos.clone(), ins.raw_src.clone(), msg.into())
}

/// Resolves an argument to a value: literals convert directly, identifiers
/// and keywords (both carry `ArgLiteral::Name`) resolve through the current
/// scope chain — this covers both variable names and the root-scope
/// built-ins (`tp-int`, `true`, …), which are ordinary named slots.
pub(crate) fn arg_value(disp: &Dispatcher, ins: &Ins, arg: &Arg) -> Result<Value, RvmError> {
    match &arg.literal {
        ArgLiteral::Int(i) => Ok(Value::Int(*i)),
        ArgLiteral::Float(f) => Ok(Value::Float(*f)),
        ArgLiteral::Str(s) => Ok(Value::String(Rc::from(s.as_str()))),
        ArgLiteral::Name(n) => disp
            .memory
            .find_by_name(n)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{n}'"))),
    }
}

/// Raw literal name of a keyword/identifier argument, without resolving it
/// through the scope — used for syntactic tokens that are never variables:
/// relation keywords (`RE`/`AND`/…), `SOUT`/`SIN` mode selectors, file modes.
pub(crate) fn arg_name<'a>(ins: &Ins, arg: &'a Arg) -> Result<&'a str, RvmError> {
    arg.name().ok_or_else(|| RvmError::new(ErrorKind::ArgumentError, ins.pos.clone(), ins.raw_src.clone(), "expected a name/keyword argument"))
}

/// Writes `value` into the slot named by `arg`, which must already exist
/// (§3.3 — ALLOT is required before assignment) and be a name-kind arg, not
/// a literal.
pub(crate) fn store(disp: &mut Dispatcher, ins: &Ins, arg: &Arg, value: Value) -> Result<(), RvmError> {
    if !arg.is_assignable() {
        return Err(RvmError::new(ErrorKind::ArgumentError, ins.pos.clone(), ins.raw_src.clone(), "destination must be an identifier"));
    }
    let name = arg_name(ins, arg)?;
    disp.memory.update_by_name(name, value).map(|_| ())
}

pub(crate) fn arg_at(ins: &Ins, n: usize) -> Result<&Arg, RvmError> {
    ins.args.get(n).ok_or_else(|| {
        RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), format!("missing argument #{n}"))
    })
}
