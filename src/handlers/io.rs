//! `SOUT`/`SIN`/`FILE_*` — console and raw-file I/O, delegated to the
//! [`crate::host`] collaborators so the dispatcher stays deterministic.

use std::cell::RefCell;
use std::rc::Rc;

use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::instruction::Ins;
use crate::value::{FileHandle, Value};

fn io_err(ins: &Ins, kind: ErrorKind, e: std::io::Error) -> RvmError {
    RvmError::new(kind, ins.pos.clone(), ins.raw_src.clone(), e.to_string())
}

fn expect_file(disp: &Dispatcher, ins: &Ins, arg: &crate::instruction::Arg) -> Result<Rc<RefCell<FileHandle>>, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::File(f) => Ok(f),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a File value")),
    }
}

/// `SOUT mode, v1, …` — `s-l` writes each value's literal display text with
/// no added newline; `s-m` writes each value's display text followed by one.
pub fn sout(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.is_empty() {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "SOUT requires a mode"));
    }
    let mode = arg_name(ins, arg_at(ins, 0)?)?;
    for arg in &ins.args[1..] {
        let v = arg_value(disp, ins, arg)?;
        let text = match mode {
            "s-l" => v.to_display_string(),
            "s-m" => format!("{}\n", v.to_display_string()),
            _ => return Err(RvmError::new(ErrorKind::ArgumentError, ins.pos.clone(), ins.raw_src.clone(), format!("unknown SOUT mode '{mode}'"))),
        };
        disp.console.write(&text).map_err(|e| io_err(ins, ErrorKind::RuntimeError, e))?;
    }
    Ok(Flow::Normal)
}

/// `SIN dst1, …` — reads one line per destination, converting it per that
/// slot's currently-declared type (its current value's own `type_id()`).
pub fn sin(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.is_empty() {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "SIN requires at least one destination"));
    }
    for dst in &ins.args {
        let declared = arg_value(disp, ins, dst)?.type_id();
        let line = disp.console.read_line().map_err(|e| io_err(ins, ErrorKind::RuntimeError, e))?;
        let converted = Value::String(Rc::from(line.as_str())).convert_to(&declared).map_err(|e| {
            RvmError::new(ErrorKind::DataTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), e.to_string())
        })?;
        store(disp, ins, dst, converted)?;
    }
    Ok(Flow::Normal)
}

pub fn file_get(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let path = match arg_value(disp, ins, arg_at(ins, 0)?)? {
        Value::String(s) => s.to_string(),
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "FILE_GET requires a path string")),
    };
    let mode = arg_name(ins, arg_at(ins, 1)?)?.to_string();
    let handle = FileHandle { path, mode, handle: None };
    store(disp, ins, arg_at(ins, 2)?, Value::File(Rc::new(RefCell::new(handle))))?;
    Ok(Flow::Normal)
}

pub fn file_read(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let path = file.borrow().path.clone();
    let contents = disp.fileio.open_read(&path).map_err(|e| io_err(ins, ErrorKind::FileReadError, e))?;
    store(disp, ins, arg_at(ins, 1)?, Value::String(Rc::from(contents.as_str())))?;
    Ok(Flow::Normal)
}

pub fn file_write(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let contents = arg_value(disp, ins, arg_at(ins, 1)?)?.to_display_string();
    let path = file.borrow().path.clone();
    disp.fileio.open_write(&path, &contents).map_err(|e| io_err(ins, ErrorKind::FileWriteError, e))?;
    Ok(Flow::Normal)
}

pub fn file_get_path(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let path = file.borrow().path.clone();
    store(disp, ins, arg_at(ins, 1)?, Value::String(Rc::from(path.as_str())))?;
    Ok(Flow::Normal)
}

pub fn file_get_mode(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let mode = file.borrow().mode.clone();
    store(disp, ins, arg_at(ins, 1)?, Value::String(Rc::from(mode.as_str())))?;
    Ok(Flow::Normal)
}

pub fn file_get_size(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let path = file.borrow().path.clone();
    let contents = disp.fileio.open_read(&path).map_err(|e| io_err(ins, ErrorKind::FileReadError, e))?;
    store(disp, ins, arg_at(ins, 1)?, Value::Int(contents.len() as i64))?;
    Ok(Flow::Normal)
}

pub fn file_set_mode(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let mode = arg_name(ins, arg_at(ins, 1)?)?.to_string();
    file.borrow_mut().mode = mode;
    Ok(Flow::Normal)
}

pub fn file_set_path(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let file = expect_file(disp, ins, arg_at(ins, 0)?)?;
    let path = match arg_value(disp, ins, arg_at(ins, 1)?)? {
        Value::String(s) => s.to_string(),
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "FILE_SET_PATH requires a path string")),
    };
    file.borrow_mut().path = path;
    Ok(Flow::Normal)
}
