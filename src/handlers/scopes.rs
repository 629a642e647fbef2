//! `SP_*` — named-scope lifecycle driven explicitly from RA source, distinct
//! from the delayed-release scopes loops/functions acquire implicitly.

use super::{arg_at, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::value::Value;

pub fn sp_new(disp: &mut Dispatcher, ins: &crate::instruction::Ins) -> HandlerResult {
    let arg = arg_at(ins, 0)?;
    let (scope, _prev) = disp.memory.acquire("SP-", false);
    let display = disp.memory.scope_display(&scope);
    store(disp, ins, arg, Value::String(display.into()))?;
    Ok(Flow::Normal)
}

pub fn sp_set(disp: &mut Dispatcher, ins: &crate::instruction::Ins) -> HandlerResult {
    let v = super::arg_value(disp, ins, arg_at(ins, 0)?)?;
    let display = match v {
        Value::String(s) => s,
        _ => {
            return Err(crate::error::RvmError::new(
                crate::error::ErrorKind::ArgTypeMismatchError,
                ins.pos.clone(),
                ins.raw_src.clone(),
                "SP_SET requires a scope-ID string",
            ))
        }
    };
    disp.memory.set_current_by_display(&display)?;
    Ok(Flow::Normal)
}

pub fn sp_del(disp: &mut Dispatcher, ins: &crate::instruction::Ins) -> HandlerResult {
    let v = super::arg_value(disp, ins, arg_at(ins, 0)?)?;
    let display = match v {
        Value::String(s) => s,
        _ => {
            return Err(crate::error::RvmError::new(
                crate::error::ErrorKind::ArgTypeMismatchError,
                ins.pos.clone(),
                ins.raw_src.clone(),
                "SP_DEL requires a scope-ID string",
            ))
        }
    };
    let current = disp.memory.current();
    let id = disp.memory.resolve_display(&display).ok_or_else(|| {
        crate::error::RvmError::new(crate::error::ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("no such scope '{display}'"))
    })?;
    disp.memory.release(id, current);
    Ok(Flow::Normal)
}

pub fn sp_get(disp: &mut Dispatcher, ins: &crate::instruction::Ins) -> HandlerResult {
    let arg = arg_at(ins, 0)?;
    let display = disp.memory.scope_display(&disp.memory.current());
    store(disp, ins, arg, Value::String(display.into()))?;
    Ok(Flow::Normal)
}
