//! `RAND_*`/`PAIR_*`/`DICT_*` — supplemental opcodes present in the original
//! but dropped from the distilled spec (SPEC_FULL §11), reinstated here.

use std::cell::RefCell;
use std::rc::Rc;

use super::{arg_at, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::value::{IterKey, Value};

fn as_f64(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<f64, RvmError> {
    arg_value(disp, ins, arg)?
        .as_numeric()
        .map(|n| n.as_f64())
        .ok_or_else(|| RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a numeric value"))
}

fn as_usize(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<usize, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::Int(i) if i >= 0 => Ok(i as usize),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a non-negative integer")),
    }
}

/// `RAND_INT lo, hi, dst` — uniform integer in the half-open range `[lo, hi)`.
pub fn rand_int(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let lo = as_f64(disp, ins, arg_at(ins, 0)?)? as i64;
    let hi = as_f64(disp, ins, arg_at(ins, 1)?)? as i64;
    if hi <= lo {
        return Err(RvmError::new(ErrorKind::RangeError, ins.pos.clone(), ins.raw_src.clone(), "RAND_INT requires lo < hi"));
    }
    let span = (hi - lo) as u64;
    let v = lo + (disp.next_random() % span) as i64;
    store(disp, ins, arg_at(ins, 2)?, Value::Int(v))?;
    Ok(Flow::Normal)
}

/// `RAND_FLOAT lo, hi, decimals, dst` — uniform float in `[lo, hi)`, rounded
/// to `decimals` decimal places.
pub fn rand_float(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let lo = as_f64(disp, ins, arg_at(ins, 0)?)?;
    let hi = as_f64(disp, ins, arg_at(ins, 1)?)?;
    if hi <= lo {
        return Err(RvmError::new(ErrorKind::RangeError, ins.pos.clone(), ins.raw_src.clone(), "RAND_FLOAT requires lo < hi"));
    }
    let decimals = as_usize(disp, ins, arg_at(ins, 2)?)?;
    let frac = disp.next_random() as f64 / u64::MAX as f64;
    let raw = lo + frac * (hi - lo);
    let scale = 10f64.powi(decimals as i32);
    let rounded = (raw * scale).round() / scale;
    store(disp, ins, arg_at(ins, 3)?, Value::Float(rounded))?;
    Ok(Flow::Normal)
}

pub fn pair_set(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let key = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let value = arg_value(disp, ins, arg_at(ins, 1)?)?;
    store(disp, ins, arg_at(ins, 2)?, Value::KeyValuePair(Rc::new(RefCell::new((key, value)))))?;
    Ok(Flow::Normal)
}

fn expect_pair(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<Rc<RefCell<(Value, Value)>>, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::KeyValuePair(p) => Ok(p),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a KeyValuePair")),
    }
}

pub fn pair_set_key(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let pair = expect_pair(disp, ins, arg_at(ins, 0)?)?;
    let key = arg_value(disp, ins, arg_at(ins, 1)?)?;
    pair.borrow_mut().0 = key;
    Ok(Flow::Normal)
}

pub fn pair_set_value(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let pair = expect_pair(disp, ins, arg_at(ins, 0)?)?;
    let value = arg_value(disp, ins, arg_at(ins, 1)?)?;
    pair.borrow_mut().1 = value;
    Ok(Flow::Normal)
}

pub fn pair_get_key(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let pair = expect_pair(disp, ins, arg_at(ins, 0)?)?;
    let key = pair.borrow().0.clone();
    store(disp, ins, arg_at(ins, 1)?, key)?;
    Ok(Flow::Normal)
}

pub fn pair_get_value(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let pair = expect_pair(disp, ins, arg_at(ins, 0)?)?;
    let value = pair.borrow().1.clone();
    store(disp, ins, arg_at(ins, 1)?, value)?;
    Ok(Flow::Normal)
}

fn dict_err(ins: &Ins, e: crate::value::ValueOpError) -> RvmError {
    let kind = match e {
        crate::value::ValueOpError::DataTypeMismatch => ErrorKind::DataTypeMismatchError,
        crate::value::ValueOpError::ArgTypeMismatch => ErrorKind::ArgTypeMismatchError,
        crate::value::ValueOpError::DivideByZero => ErrorKind::DivideByZeroError,
        crate::value::ValueOpError::RangeError => ErrorKind::RangeError,
        crate::value::ValueOpError::KeyNotFound => ErrorKind::KeyNotFoundError,
        crate::value::ValueOpError::FieldNotFound => ErrorKind::FieldNotFoundError,
    };
    RvmError::new(kind, ins.pos.clone(), ins.raw_src.clone(), e.to_string())
}

fn string_key(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<String, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::String(s) => Ok(s.to_string()),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a string key")),
    }
}

pub fn dict_set(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let dict = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let key = string_key(disp, ins, arg_at(ins, 1)?)?;
    let value = arg_value(disp, ins, arg_at(ins, 2)?)?;
    dict.iter_set(&IterKey::Key(key), value).map_err(|e| dict_err(ins, e))?;
    Ok(Flow::Normal)
}

pub fn dict_get(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let dict = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let key = string_key(disp, ins, arg_at(ins, 1)?)?;
    let value = dict.iter_get(&IterKey::Key(key)).map_err(|e| dict_err(ins, e))?;
    store(disp, ins, arg_at(ins, 2)?, value)?;
    Ok(Flow::Normal)
}

pub fn dict_del(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "DICT_DEL requires a dict and at least one key"));
    }
    let dict = arg_value(disp, ins, arg_at(ins, 0)?)?;
    for arg in &ins.args[1..] {
        let key = string_key(disp, ins, arg)?;
        dict.iter_erase(&IterKey::Key(key)).map_err(|e| dict_err(ins, e))?;
    }
    Ok(Flow::Normal)
}
