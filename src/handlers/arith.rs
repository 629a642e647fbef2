//! `ADD`/`OPP`/`MUL`/`DIV`/`POW`/`ROOT`/`MOD`/`CMP`/`CREL` — numeric and
//! iterable arithmetic, plus the two-phase compare/relate pair.

use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::value::{Relation, Value, ValueOpError};

fn map_err(ins: &Ins, e: ValueOpError) -> RvmError {
    let kind = match e {
        ValueOpError::DataTypeMismatch => ErrorKind::DataTypeMismatchError,
        ValueOpError::ArgTypeMismatch => ErrorKind::ArgTypeMismatchError,
        ValueOpError::DivideByZero => ErrorKind::DivideByZeroError,
        ValueOpError::RangeError => ErrorKind::RangeError,
        ValueOpError::KeyNotFound => ErrorKind::KeyNotFoundError,
        ValueOpError::FieldNotFound => ErrorKind::FieldNotFoundError,
    };
    RvmError::new(kind, ins.pos.clone(), ins.raw_src.clone(), e.to_string())
}

pub fn binop(disp: &mut Dispatcher, ins: &Ins, op: fn(&Value, &Value) -> Result<Value, ValueOpError>) -> HandlerResult {
    let a = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let b = arg_value(disp, ins, arg_at(ins, 1)?)?;
    let result = op(&a, &b).map_err(|e| map_err(ins, e))?;
    store(disp, ins, arg_at(ins, 2)?, result)?;
    Ok(Flow::Normal)
}

pub fn opp(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let a = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let result = a.opp().map_err(|e| map_err(ins, e))?;
    store(disp, ins, arg_at(ins, 1)?, result)?;
    Ok(Flow::Normal)
}

/// `CMP a, b, dst` — packages two slot IDs (not values) into a
/// `CompareGroup`, resolved lazily when `CREL`/`JR`/`UNTIL` evaluate it.
pub fn cmp(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let a_name = arg_name(ins, arg_at(ins, 0)?)?;
    let b_name = arg_name(ins, arg_at(ins, 1)?)?;
    let (a_id, _) = disp
        .memory
        .find_by_name(a_name)
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{a_name}'")))?;
    let (b_id, _) = disp
        .memory
        .find_by_name(b_name)
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{b_name}'")))?;
    store(disp, ins, arg_at(ins, 2)?, Value::CompareGroup(a_id, b_id))?;
    Ok(Flow::Normal)
}

pub(crate) fn relation_of(ins: &Ins, arg: &crate::instruction::Arg) -> Result<Relation, RvmError> {
    let kw = arg_name(ins, arg)?;
    Relation::from_keyword(kw).ok_or_else(|| RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), format!("unknown relation '{kw}'")))
}

pub(crate) fn eval_compare_group(disp: &Dispatcher, ins: &Ins, group: &Value, rel: Relation) -> Result<bool, RvmError> {
    let Value::CompareGroup(a_id, b_id) = group else {
        return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a CompareGroup"));
    };
    let a = disp
        .memory
        .find_by_id(a_id)
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), "compared slot released"))?;
    let b = disp
        .memory
        .find_by_id(b_id)
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), "compared slot released"))?;
    a.compare(b, rel).map_err(|e| map_err(ins, e))
}

/// `CREL group, rel, dst` — evaluates a previously-built `CompareGroup`
/// against a relation keyword, storing the boolean result.
pub fn crel(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let group = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let rel = relation_of(ins, arg_at(ins, 1)?)?;
    let result = eval_compare_group(disp, ins, &group, rel)?;
    store(disp, ins, arg_at(ins, 2)?, Value::Bool(result))?;
    Ok(Flow::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::instruction::{Arg, ArgKind, ArgLiteral, Pos};
    use crate::opcode::OpCode;

    fn name_arg(n: &str) -> Arg {
        Arg { pos: Pos::unknown(), kind: ArgKind::Identifier, literal: ArgLiteral::Name(n.to_string()) }
    }

    #[test]
    fn cmp_then_crel_round_trips() {
        let mut disp = Dispatcher::new(".");
        disp.memory.add("a", Value::Int(3)).unwrap();
        disp.memory.add("b", Value::Int(5)).unwrap();
        disp.memory.add("g", Value::Null).unwrap();
        disp.memory.add("out", Value::Null).unwrap();
        let cmp_ins = Ins::new(Pos::unknown(), OpCode::CMP, vec![name_arg("a"), name_arg("b"), name_arg("g")], String::new());
        cmp(&mut disp, &cmp_ins).unwrap();
        let rel_arg = Arg { pos: Pos::unknown(), kind: ArgKind::Keyword, literal: ArgLiteral::Name("RL".to_string()) };
        let crel_ins = Ins::new(Pos::unknown(), OpCode::CREL, vec![name_arg("g"), rel_arg, name_arg("out")], String::new());
        crel(&mut disp, &crel_ins).unwrap();
        assert!(matches!(disp.memory.find_by_name("out").unwrap().1, Value::Bool(true)));
    }
}
