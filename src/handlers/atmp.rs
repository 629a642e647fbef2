//! `ATMP`/`DETECT`/`EXPOSE` — the error-propagation mechanism (§4.5).
//!
//! An `ATMP`'s body is one flat `InsSet`: instructions up to the first
//! `DETECT` form the try body, consecutive `(DETECT, END_MARKER)` pairs form
//! handler blocks, and everything after the last such pair forms finally.

use super::{arg_at, arg_name, arg_value};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::{Ins, InsSet, END_MARKER_OPCODE};
use crate::opcode::OpCode;
use crate::value::custom_type::CustomTypeDef;
use crate::value::Value;

/// Returns (try_end, handlers_end): `ins[0..try_end]` is the try body,
/// `ins[try_end..handlers_end]` holds the `DETECT`/marker pairs, and
/// `ins[handlers_end..]` is finally.
fn split(body: &InsSet) -> (usize, usize) {
    let mut i = 0;
    while i < body.ins.len() && body.ins[i].opcode != OpCode::DETECT {
        i += 1;
    }
    let try_end = i;
    while i < body.ins.len() && body.ins[i].opcode == OpCode::DETECT {
        i += 1;
        if i < body.ins.len() && body.ins[i].opcode == END_MARKER_OPCODE {
            i += 1;
        }
    }
    (try_end, i)
}

fn fatal(ins: &Ins, msg: impl Into<String>) -> RvmError {
    RvmError::new(ErrorKind::RuntimeError, ins.pos.clone(), ins.raw_src.clone(), msg.into())
}

pub fn atmp(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let body = ins.body.as_ref().ok_or_else(|| fatal(ins, "ATMP requires a body"))?;
    let (try_end, handlers_end) = split(body);

    let mut try_ptr = 0usize;
    let try_outcome = disp.run_range(body, &mut try_ptr, 0, try_end);

    let body_outcome = match try_outcome {
        Ok(Flow::Exposed(inst)) => {
            let type_def = inst.borrow().type_def.clone();
            let mut matched = None;
            for detect in body.ins[try_end..handlers_end].iter().filter(|i| i.opcode == OpCode::DETECT) {
                let target = match arg_value(disp, detect, arg_at(detect, 0)?)? {
                    Value::CustomType(t) => t,
                    _ => return Err(fatal(detect, "DETECT's first argument must be a type")),
                };
                if CustomTypeDef::belongs_to(&type_def, &target) {
                    matched = Some(detect);
                    break;
                }
            }
            match matched {
                Some(detect) => {
                    let handler_body = detect.body.as_ref().ok_or_else(|| fatal(detect, "DETECT requires a body"))?;
                    let err_name = arg_name(detect, arg_at(detect, 1)?)?;
                    let (scope, prev) = disp.memory.acquire(&handler_body.scope_prefix, false);
                    let result = disp
                        .memory
                        .add_in_scope(&scope, err_name, Value::CustomInst(inst.clone()))
                        .and_then(|_| disp.execute(handler_body));
                    disp.memory.release(scope, prev);
                    result
                }
                None => Ok(Flow::Exposed(inst)),
            }
        }
        other => other,
    };

    let mut finally_ptr = 0usize;
    let finally_outcome = disp.run_range(body, &mut finally_ptr, handlers_end, body.ins.len());

    match finally_outcome {
        Ok(Flow::Normal) => body_outcome,
        other => other,
    }
}

/// `EXPOSE inst` — raises `inst` (which must be a `CustomInst`) toward the
/// nearest enclosing `ATMP`.
pub fn expose(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    match arg_value(disp, ins, arg_at(ins, 0)?)? {
        Value::CustomInst(inst) => Ok(Flow::Exposed(inst)),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "EXPOSE requires a CustomInst value")),
    }
}
