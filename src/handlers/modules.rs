//! `LOADIN`/`EXT_GET`/`EXE_RASM` — loading and inlining RA source at runtime.
//! `LINK` is handled entirely at parse time (see [`crate::parser`]).

use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::parser::Parser;
use crate::value::Value;

fn expect_path(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<String, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::String(s) => Ok(s.to_string()),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a path string")),
    }
}

/// `LOADIN path [, name]` — parses and runs `path`'s top-level code in its
/// own scope. Without `name` the scope is released once the file finishes;
/// with `name`, the scope survives and is bound as an `Extension` so later
/// code can reach its top-level names via `EXT_GET`.
pub fn loadin(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.is_empty() || ins.args.len() > 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "LOADIN takes a path and an optional extension name"));
    }
    let path = expect_path(disp, ins, arg_at(ins, 0)?)?;
    let full_path = disp.base_dir.join(&path);
    let ins_set = Parser::parse_file(&full_path)?;

    let (scope, prev) = disp.memory.acquire("LOADIN-", false);
    let result = disp.execute(&ins_set);
    match result {
        Ok(Flow::Normal) => {}
        Ok(other) => {
            disp.memory.release(scope, prev);
            return Ok(other);
        }
        Err(e) => {
            disp.memory.release(scope, prev);
            return Err(e);
        }
    }

    match ins.args.get(1) {
        Some(name_arg) => {
            let name = arg_name(ins, name_arg)?.to_string();
            disp.memory.set_current(prev);
            disp.memory.add(&name, Value::Extension(scope))?;
        }
        None => disp.memory.release(scope, prev),
    }
    Ok(Flow::Normal)
}

/// `EXT_GET ext, name, dst` — reads `name` directly out of a mounted
/// extension scope, without walking its ancestor chain.
pub fn ext_get(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let ext = match arg_value(disp, ins, arg_at(ins, 0)?)? {
        Value::Extension(scope) => scope,
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "EXT_GET requires an Extension value")),
    };
    let name = arg_name(ins, arg_at(ins, 1)?)?;
    let value = disp
        .memory
        .find_in_scope(&ext, name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, ins.pos.clone(), ins.raw_src.clone(), format!("nonexistent space '{name}'")))?;
    store(disp, ins, arg_at(ins, 2)?, value)?;
    Ok(Flow::Normal)
}

/// `EXE_RASM s1, …, sn` — concatenates operand values as RA source and
/// executes it in the current scope.
pub fn exe_rasm(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.is_empty() {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "EXE_RASM requires at least one operand"));
    }
    let mut src = String::new();
    for arg in &ins.args {
        src.push_str(&arg_value(disp, ins, arg)?.to_display_string());
    }
    let mut parser = Parser::new(None, disp.base_dir.clone());
    let ins_set = parser.parse(&src)?;
    disp.execute(&ins_set)
}
