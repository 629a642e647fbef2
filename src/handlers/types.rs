//! `TP_*` — user-defined types with single inheritance, plus the built-in
//! `DType` conversion matrix (`TP_SET`/`TP_GET`).

use std::cell::RefCell;
use std::rc::Rc;

use super::{arg_at, arg_name, arg_value, store};
use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::error::{ErrorKind, RvmError};
use crate::id::TAG_TYPE;
use crate::instruction::{Arg, Ins};
use crate::value::custom_type::{CustomInstData, CustomTypeDef};
use crate::value::{Value, ValueOpError};

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

fn expect_type(disp: &Dispatcher, ins: &Ins, arg: &Arg) -> Result<Rc<RefCell<CustomTypeDef>>, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::CustomType(t) => Ok(t),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a type")),
    }
}

fn expect_inst(disp: &Dispatcher, ins: &Ins, arg: &Arg) -> Result<Rc<RefCell<CustomInstData>>, RvmError> {
    match arg_value(disp, ins, arg)? {
        Value::CustomInst(i) => Ok(i),
        _ => Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "expected a type instance")),
    }
}

fn field_not_found(ins: &Ins, field: &str) -> RvmError {
    RvmError::new(ErrorKind::FieldNotFoundError, ins.pos.clone(), ins.raw_src.clone(), format!("no such field '{field}'"))
}

pub fn tp_def(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.is_empty() || ins.args.len() > 2 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "TP_DEF takes a name and an optional parent"));
    }
    let name = arg_name(ins, arg_at(ins, 0)?)?.to_string();
    let parent = match ins.args.get(1) {
        Some(arg) => Some(expect_type(disp, ins, arg)?),
        None => None,
    };
    let id = disp.memory.mint(TAG_TYPE);
    let def = Rc::new(RefCell::new(CustomTypeDef::new(id, name.clone(), parent)));
    disp.memory.add(&name, Value::CustomType(def))?;
    Ok(Flow::Normal)
}

pub fn tp_new(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let t = expect_type(disp, ins, arg_at(ins, 0)?)?;
    let inst = CustomInstData::new(t);
    store(disp, ins, arg_at(ins, 1)?, Value::CustomInst(Rc::new(RefCell::new(inst))))?;
    Ok(Flow::Normal)
}

pub fn tp_add_inst_field(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 || ins.args.len() > 3 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "TP_ADD_INST_FIELD takes a type, a field name, and an optional default"));
    }
    let t = expect_type(disp, ins, arg_at(ins, 0)?)?;
    let field = arg_name(ins, arg_at(ins, 1)?)?.to_string();
    let default = match ins.args.get(2) {
        Some(a) => arg_value(disp, ins, a)?,
        None => Value::Null,
    };
    let mut t = t.borrow_mut();
    if t.inst_field_defaults.contains_key(&field) {
        return Err(RvmError::new(ErrorKind::DuplicateKeyError, ins.pos.clone(), ins.raw_src.clone(), format!("field '{field}' already declared")));
    }
    t.inst_field_defaults.insert(field, default);
    Ok(Flow::Normal)
}

pub fn tp_add_tp_field(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    if ins.args.len() < 2 || ins.args.len() > 3 {
        return Err(RvmError::new(ErrorKind::ArgumentNumberError, ins.pos.clone(), ins.raw_src.clone(), "TP_ADD_TP_FIELD takes a type, a field name, and an optional initial value"));
    }
    let t = expect_type(disp, ins, arg_at(ins, 0)?)?;
    let field = arg_name(ins, arg_at(ins, 1)?)?.to_string();
    let init = match ins.args.get(2) {
        Some(a) => arg_value(disp, ins, a)?,
        None => Value::Null,
    };
    let mut t = t.borrow_mut();
    if t.type_fields.contains_key(&field) {
        return Err(RvmError::new(ErrorKind::DuplicateKeyError, ins.pos.clone(), ins.raw_src.clone(), format!("field '{field}' already declared")));
    }
    t.type_fields.insert(field, init);
    Ok(Flow::Normal)
}

pub fn tp_set_field(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let obj = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let field = arg_name(ins, arg_at(ins, 1)?)?.to_string();
    let value = arg_value(disp, ins, arg_at(ins, 2)?)?;
    match obj {
        Value::CustomType(t) => {
            let mut t = t.borrow_mut();
            if !t.type_fields.contains_key(&field) {
                return Err(field_not_found(ins, &field));
            }
            t.type_fields.insert(field, value);
        }
        Value::CustomInst(inst) => {
            let mut inst = inst.borrow_mut();
            if !inst.fields.contains_key(&field) {
                return Err(field_not_found(ins, &field));
            }
            inst.fields.insert(field, value);
        }
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "TP_SET_FIELD requires a type or a type instance")),
    }
    Ok(Flow::Normal)
}

pub fn tp_get_field(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let obj = arg_value(disp, ins, arg_at(ins, 0)?)?;
    let field = arg_name(ins, arg_at(ins, 1)?)?;
    let value = match &obj {
        Value::CustomType(t) => CustomTypeDef::type_field(t, field).ok_or_else(|| field_not_found(ins, field))?,
        Value::CustomInst(inst) => inst.borrow().field(field).cloned().ok_or_else(|| field_not_found(ins, field))?,
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "TP_GET_FIELD requires a type or a type instance")),
    };
    store(disp, ins, arg_at(ins, 2)?, value)?;
    Ok(Flow::Normal)
}

/// Walks `start`'s own ancestor chain for a declared instance-field
/// *template* value, ignoring whatever an instance's live field map
/// currently holds (`TP_GET_SUPER_FIELD`'s "explicitly walks to parent_T's
/// slice", §4.4).
fn inst_template_field(start: &Rc<RefCell<CustomTypeDef>>, field: &str) -> Option<Value> {
    let mut cur = Some(start.clone());
    while let Some(t) = cur {
        if let Some(v) = t.borrow().inst_field_defaults.get(field) {
            return Some(v.clone());
        }
        cur = t.borrow().parent.clone();
    }
    None
}

pub fn tp_get_super_field(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let inst = expect_inst(disp, ins, arg_at(ins, 0)?)?;
    let parent = expect_type(disp, ins, arg_at(ins, 1)?)?;
    let field = arg_name(ins, arg_at(ins, 2)?)?;
    if !CustomTypeDef::belongs_to(&inst.borrow().type_def, &parent) {
        return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "instance does not derive from the given type"));
    }
    let value = inst_template_field(&parent, field).ok_or_else(|| field_not_found(ins, field))?;
    store(disp, ins, arg_at(ins, 3)?, value)?;
    Ok(Flow::Normal)
}

pub fn tp_derive(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let inst = expect_inst(disp, ins, arg_at(ins, 0)?)?;
    let child = expect_type(disp, ins, arg_at(ins, 1)?)?;
    inst.borrow_mut().derive(child);
    Ok(Flow::Normal)
}

/// `TP_SET type, dst` — converts `dst`'s current value per the built-in
/// conversion matrix (§4.1) and writes the result back in place.
pub fn tp_set(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let target = match arg_value(disp, ins, arg_at(ins, 0)?)? {
        Value::DType(t) => t,
        _ => return Err(RvmError::new(ErrorKind::ArgTypeMismatchError, ins.pos.clone(), ins.raw_src.clone(), "TP_SET requires a DType")),
    };
    let dst = arg_at(ins, 1)?;
    let current = arg_value(disp, ins, dst)?;
    let converted = current.convert_to(&target).map_err(|e| map_err(ins, e))?;
    store(disp, ins, dst, converted)?;
    Ok(Flow::Normal)
}

/// `TP_GET obj, dst` — stores `obj`'s runtime `DType` into `dst`.
pub fn tp_get(disp: &mut Dispatcher, ins: &Ins) -> HandlerResult {
    let v = arg_value(disp, ins, arg_at(ins, 0)?)?;
    store(disp, ins, arg_at(ins, 1)?, Value::DType(v.type_id()))?;
    Ok(Flow::Normal)
}
