//! `QOT`/`QOT_VAL` — slot references, dereferenced lazily through `Memory`.

use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::value::Value;

/// `QOT src, dst` — writes a `Quote` of `src`'s own slot ID, not its value.
pub fn qot(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let src = arg_at(ins, 0)?;
    let name = arg_name(ins, src)?;
    let (slot_id, _) = disp
        .memory
        .find_by_name(name)
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{name}'")))?;
    store(disp, ins, arg_at(ins, 1)?, Value::Quote(slot_id))?;
    Ok(Flow::Normal)
}

/// `QOT_VAL v, q` — writes `v` through `q`'s quoted slot into its referent.
pub fn qot_val(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let v = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let q = arg_value(disp, ins, arg_at(ins, 1)?)?;
    let slot_id = match q {
        Value::Quote(id) => id,
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "QOT_VAL requires a Quote")),
    };
    disp.memory.update_by_id(&slot_id, v)?;
    Ok(Flow::Normal)
}
