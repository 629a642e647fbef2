//! Control flow: jumps, counted/conditional loops, function definition and
//! invocation, `RET`/`EXIT`.

use std::rc::Rc;

use super::arith::{eval_compare_group, relation_of};
use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{absorbs, Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::value::{FunctionDef, Value};

pub fn exit(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let _ = disp;
    let label = ins.args.first().map(|a| arg_name(ins, a)).transpose()?.map(str::to_string);
    Ok(Flow::Aborted(label))
}

pub fn jmp(disp: &mut Dispatcher, ins_set: &crate::instruction::InsSet, ins: &Ins) -> HandlerResult {
    let label = arg_name(ins, arg_at(ins, 0)?)?;
    let idx = disp.resolve_label(ins_set, ins, label)?;
    Ok(Flow::Jump(idx))
}

pub fn jr(disp: &mut Dispatcher, ins_set: &crate::instruction::InsSet, ins: &Ins) -> HandlerResult {
    let group = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let rel = relation_of(ins, arg_at(ins, 1)?)?;
    let label = arg_name(ins, arg_at(ins, 2)?)?;
    if eval_compare_group(disp, ins, &group, rel)? {
        let idx = disp.resolve_label(ins_set, ins, label)?;
        return Ok(Flow::Jump(idx));
    }
    Ok(Flow::Normal)
}

pub fn jt(disp: &mut Dispatcher, ins_set: &crate::instruction::InsSet, ins: &Ins) -> HandlerResult {
    let v = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let label = arg_name(ins, arg_at(ins, 1)?)?;
    if v.convert_to_bool() {
        let idx = disp.resolve_label(ins_set, ins, label)?;
        return Ok(Flow::Jump(idx));
    }
    Ok(Flow::Normal)
}

pub fn jf(disp: &mut Dispatcher, ins_set: &crate::instruction::InsSet, ins: &Ins) -> HandlerResult {
    let v = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let label = arg_name(ins, arg_at(ins, 1)?)?;
    if !v.convert_to_bool() {
        let idx = disp.resolve_label(ins_set, ins, label)?;
        return Ok(Flow::Jump(idx));
    }
    Ok(Flow::Normal)
}

pub fn repeat(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let body = ins.body.as_ref().ok_or_else(|| fatal(ins, "REPEAT requires a body"))?;
    let count_arg = arg_at(ins, 0)?;
    let n = match arg_value(disp, ins, count_arg)? {
        Value::Int(i) => i,
        other => other.as_numeric().map(|n| n.as_f64() as i64).ok_or_else(|| {
            RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "REPEAT count must be numeric")
        })?,
    };
    let idx_arg = ins.args.get(1);
    let (scope, prev) = disp.memory.acquire(&body.scope_prefix, true);
    for i in 0..n.max(0) {
        if let Some(idx_arg) = idx_arg {
            store(disp, ins, idx_arg, Value::Int(i))?;
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

pub fn until(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let body = ins.body.as_ref().ok_or_else(|| fatal(ins, "UNTIL requires a body"))?;
    let group_arg = arg_at(ins, 0)?;
    let rel = relation_of(ins, arg_at(ins, 1)?)?;
    let (scope, prev) = disp.memory.acquire(&body.scope_prefix, true);
    loop {
        let group = match arg_value(disp, ins, group_arg) {
            Ok(v) => v,
            Err(e) => {
                disp.memory.release(scope, prev);
                return Err(e);
            }
        };
        let done = match eval_compare_group(disp, ins, &group, rel) {
            Ok(v) => v,
            Err(e) => {
                disp.memory.release(scope, prev);
                return Err(e);
            }
        };
        if done {
            break;
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

/// `FUNC`/`FUNI name, p1, ...` — registers a callable under `name` in the
/// current scope; the body only executes later, via `CALL`/`IVOK`.
pub fn func(disp: &mut Dispatcher, ins: &Ins, is_ret: bool) -> HandlerResult {
    let body = ins.body.as_ref().ok_or_else(|| fatal(ins, "FUNC/FUNI requires a body"))?.clone();
    let name_arg = arg_at(ins, 0)?;
    let name = arg_name(ins, name_arg)?.to_string();
    let params = ins.args[1..].iter().map(|a| arg_name(ins, a).map(str::to_string)).collect::<Result<Vec<_>, _>>()?;
    let def = Rc::new(FunctionDef { name: name.clone(), params, body, is_ret });
    let value = if is_ret { Value::RetFunction(def) } else { Value::Function(def) };
    disp.memory.add(&name, value)?;
    Ok(Flow::Normal)
}

fn find_callable(disp: &Dispatcher, ins: &Ins, name: &str) -> Result<Rc<FunctionDef>, RvmError> {
    match disp.memory.find_by_name(name) {
        Some((_, Value::Function(f))) | Some((_, Value::RetFunction(f))) => Ok(f.clone()),
        Some(_) => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), format!("'{name}' is not callable"))),
        None => Err(RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{name}'"))),
    }
}

/// Spreads `Series`-typed arguments in place (§4.3) and binds the resulting
/// flat list to `def`'s formal parameters by name.
fn bind_args(disp: &mut Dispatcher, ins: &Ins, def: &FunctionDef, scope: &crate::scope::ScopeId, call_args: &[crate::instruction::Arg]) -> Result<(), RvmError> {
    let mut flat = Vec::new();
    for arg in call_args {
        let v = arg_value(disp, ins, arg)?;
        match v {
            Value::Series(items) => flat.extend(items.borrow().iter().cloned()),
            other => flat.push(other),
        }
    }
    if flat.len() != def.params.len() {
        return Err(RvmError::new(
            ErrorKind::ArgumentNumberError,
            ins.pos.clone(),
            ins.raw_src.clone(),
            format!("'{}' expects {} argument(s), got {}", def.name, def.params.len(), flat.len()),
        ));
    }
    for (param, value) in def.params.iter().zip(flat) {
        disp.memory.add_in_scope(scope, param, value)?;
    }
    Ok(())
}

/// Runs a call: acquires a `FUNC-<name>` scope, binds arguments, executes
/// the body, and releases the scope regardless of outcome.
fn invoke(disp: &mut Dispatcher, ins: &Ins, def: &FunctionDef, call_args: &[crate::instruction::Arg]) -> Result<Flow, RvmError> {
    let (scope, prev) = disp.memory.acquire(&format!("FUNC-{}-", def.name), true);
    let result = bind_args(disp, ins, def, &scope, call_args).and_then(|_| disp.execute(&def.body));
    disp.memory.release(scope, prev);
    match result? {
        Flow::Normal | Flow::Aborted(_) | Flow::AbortedFunction => Ok(Flow::Normal),
        other => Ok(other), // an uncaught Exposed keeps propagating past the call boundary
    }
}

pub fn call(disp: &mut Dispatcher, ins: &Ins, _unused: Option<()>) -> HandlerResult {
    let name = arg_name(ins, arg_at(ins, 0)?)?.to_string();
    let def = find_callable(disp, ins, &name)?;
    invoke(disp, ins, &def, &ins.args[1..])
}

/// `IVOK name, arg…, ret` — like `CALL`, but additionally copies `SR` into
/// the caller-specified slot after the call unwinds.
pub fn ivok(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "IVOK requires a name and a return slot"));
    }
    let name = arg_name(ins, arg_at(ins, 0)?)?.to_string();
    let def = find_callable(disp, ins, &name)?;
    let ret_arg = ins.args.last().unwrap();
    let call_args = &ins.args[1..ins.args.len() - 1];
    let flow = invoke(disp, ins, &def, call_args)?;
    let sr = disp.memory.find_by_id(&disp.memory.sr_slot).cloned().unwrap_or(Value::Null);
    store(disp, ins, ret_arg, sr)?;
    Ok(flow)
}

pub fn ret(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if let Some(arg) = ins.args.first() {
        let v = arg_value(disp, ins, arg)?;
        disp.memory.update_by_id(&disp.memory.sr_slot.clone(), v)?;
    }
    Ok(Flow::AbortedFunction)
}

fn fatal(ins: &Ins, msg: impl Into<String>) -> RvmError {
    RvmError::new(ErrorKind::RuntimeError, ins.pos.clone(), ins.raw_src.clone(), msg.into())
}
