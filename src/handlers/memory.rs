//! `ALLOT`/`DELETE`/`PUT`/`COPY` — slot lifecycle and assignment.

use super::{arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::instruction::Ins;
use crate::value::Value;

pub fn allot(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    for arg in &ins.args {
        let name = arg_name(ins, arg)?;
        disp.memory.add(name, Value::Null)?;
    }
    Ok(Flow::Normal)
}

pub fn delete(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    for arg in &ins.args {
        let name = arg_name(ins, arg)?;
        disp.memory.remove_by_name(name)?;
    }
    Ok(Flow::Normal)
}

/// `PUT src, dst` — `Value::clone` aliases the `Rc`-backed iterable
/// variants (so mutations through either name are observed by both) while
/// copying scalars by value; `COPY` below always deep-copies instead.
pub fn put(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let src = super::arg_at(ins, 0)?;
    let dst = super::arg_at(ins, 1)?;
    let value = arg_value(disp, ins, src)?;
    store(disp, ins, dst, value).map(|_| Flow::Normal)
}

pub fn copy(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let src = super::arg_at(ins, 0)?;
    let dst = super::arg_at(ins, 1)?;
    let value = arg_value(disp, ins, src)?.deep_copy();
    store(disp, ins, dst, value).map(|_| Flow::Normal)
}
