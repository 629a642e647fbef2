//! `ITER_*` — append/slice/size/get/traverse/set/delete/insert/unpack over
//! Lists, Series, Strings and Dicts.

use super::{arg_at, arg_value, store};
use crate::dispatcher::{absorbs, Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::{Arg, Ins};
use crate::value::{IterKey, Value, ValueOpError};

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

fn fatal(ins: &Ins, msg: impl Into<String>) -> RvmError {
    RvmError::new(ErrorKind::RuntimeError, ins.pos.clone(), ins.raw_src.clone(), msg.into())
}

fn key_of(disp: &Dispatcher, ins: &Ins, arg: &Arg) -> Result<IterKey, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::Int(i) if i >= 0 => Ok(IterKey::Index(i as usize)),
        Value::String(s) => Ok(IterKey::Key(s.to_string())),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a non-negative index or a string key")),
    }
}

fn as_index(disp: &Dispatcher, ins: &Ins, arg: &Arg) -> Result<usize, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::Int(i) if i >= 0 => Ok(i as usize),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a non-negative index")),
    }
}

/// `ITER_APND v1, …, iter` — the last argument is the destination, mirroring
/// `ALLOT`'s variadic-then-target shape (§4.4).
pub fn append(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "ITER_APND requires at least one value and a destination"));
    }
    let dst = ins.args.last().unwrap();
    let mut target = arg_value(disp, ins, dst)?;
    for v in &ins.args[..ins.args.len() - 1] {
        let value = arg_value(disp, ins, v)?;
        target.iter_append(value).map_err(|e| map_err(ins, e))?;
    }
    store(disp, ins, dst, target)?;
    Ok(Flow::Normal)
}

pub fn sub(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let begin = as_index(disp, ins, arg_at(ins, 1)?)?;
    let end = as_index(disp, ins, arg_at(ins, 2)?)?;
    let result = iter.iter_subpart(begin, end).map_err(|e| map_err(ins, e))?;
    store(disp, ins, arg_at(ins, 3)?, result)?;
    Ok(Flow::Normal)
}

pub fn size(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let n = iter.iter_size().map_err(|e| map_err(ins, e))?;
    store(disp, ins, arg_at(ins, 1)?, Value::Int(n as i64))?;
    Ok(Flow::Normal)
}

pub fn get(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let key = key_of(disp, ins, arg_at(ins, 1)?)?;
    let v = iter.iter_get(&key).map_err(|e| map_err(ins, e))?;
    store(disp, ins, arg_at(ins, 2)?, v)?;
    Ok(Flow::Normal)
}

pub fn set(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let key = key_of(disp, ins, arg_at(ins, 1)?)?;
    let value = arg_value(disp, ins, arg_at(ins, 2)?)?;
    iter.iter_set(&key, value).map_err(|e| map_err(ins, e))?;
    Ok(Flow::Normal)
}

pub fn insert(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let key = key_of(disp, ins, arg_at(ins, 1)?)?;
    let value = arg_value(disp, ins, arg_at(ins, 2)?)?;
    iter.iter_insert(&key, value).map_err(|e| map_err(ins, e))?;
    Ok(Flow::Normal)
}

/// `ITER_DEL iter, k1, k2, …` — erases indices in *original-order* terms:
/// deleting `[2, 4]` from a 5-element list removes what were originally
/// indices 2 and 4, regardless of the shift a lower erase would cause.
/// Implemented by erasing from the highest index down (§9 `ri_iter_del`).
pub fn del(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "ITER_DEL requires an iterable and at least one key"));
    }
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let mut keys = Vec::new();
    for arg in &ins.args[1..] {
        keys.push(key_of(disp, ins, arg)?);
    }
    keys.sort_by(|a, b| match (a, b) {
        (IterKey::Index(x), IterKey::Index(y)) => y.cmp(x),
        _ => std::cmp::Ordering::Equal,
    });
    for key in keys {
        iter.iter_erase(&key).map_err(|e| map_err(ins, e))?;
    }
    Ok(Flow::Normal)
}

pub fn unpack(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "ITER_UNPACK requires an iterable and at least one destination"));
    }
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let dsts = &ins.args[1..];
    let size = iter.iter_size().map_err(|e| map_err(ins, e))?;
    if size != dsts.len() {
        return Err(RvmError::new(
            ErrorKind::ArgumentError,
            ins.pos.clone(),
            ins.raw_src.clone(),
            format!("ITER_UNPACK expected {} element(s), iterable has {size}", dsts.len()),
        ));
    }
    for (i, dst) in dsts.iter().enumerate() {
        let v = iter.iter_get(&IterKey::Index(i)).map_err(|e| map_err(ins, e))?;
        store(disp, ins, dst, v)?;
    }
    Ok(Flow::Normal)
}

/// `ITER_TRAV`/`ITER_REV_TRAV iter, elem, idx` — forward/reverse traversal
/// in a delayed-release scope, rebinding `elem`/`idx` each pass.
pub fn travel(disp: &mut Dispatcher, ins: &Ins, reverse: bool) -> HandlerResult {
    let body = ins.body.as_ref().ok_or_else(|| fatal(ins, "ITER_TRAV requires a body"))?;
    let iter = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let elem_arg = arg_at(ins, 1)?;
    let idx_arg = arg_at(ins, 2)?;
    let size = iter.iter_size().map_err(|e| map_err(ins, e))?;
    let indices: Vec<usize> = if reverse { (0..size).rev().collect() } else { (0..size).collect() };
    let (scope, prev) = disp.memory.acquire(&body.scope_prefix, true);
    for i in indices {
        let elem = match iter.iter_get(&IterKey::Index(i)) {
            Ok(v) => v,
            Err(e) => {
                disp.memory.release(scope, prev);
                return Err(map_err(ins, e));
            }
        };
        if let Err(e) = store(disp, ins, elem_arg, elem) {
            disp.memory.release(scope, prev);
            return Err(e);
        }
        if let Err(e) = store(disp, ins, idx_arg, Value::Int(i as i64)) {
            disp.memory.release(scope, prev);
            return Err(e);
        }
        match disp.execute(body) {
            Ok(Flow::Normal) => {}
            Ok(Flow::Aborted(label)) if absorbs(body, &label) => break,
            Ok(other) => {
                disp.memory.release(scope, prev);
                return Ok(other);
            }
            Err(e) => {
                disp.memory.release(scope, prev);
                return Err(e);
            }
        }
        disp.memory.clear_in_place(&scope);
    }
    disp.memory.release(scope, prev);
    Ok(Flow::Normal)
}
