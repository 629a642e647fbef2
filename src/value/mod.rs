//! Value model: tagged dynamic values and their capability operations
//! (arithmetic, comparison, iteration, conversion).

pub mod custom_type;
pub mod time;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::id::Id;
use crate::instruction::InsSet;
use crate::scope::ScopeId;
use crate::value::custom_type::{CustomInstData, CustomTypeDef};
use crate::value::time::RaTime;

pub type SlotId = Id;

/// Errors produced by value-level operations (arithmetic, conversion,
/// iteration) before a handler attaches position/source-line context and
/// turns them into an [`crate::error::RvmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ValueOpError {
    DataTypeMismatch,
    ArgTypeMismatch,
    DivideByZero,
    RangeError,
    KeyNotFound,
    FieldNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Int,
    Float,
    Char,
    Bool,
    Str,
    Null,
    List,
    Dict,
    Series,
    Pair,
    Time,
    Qot,
    Tp,
}

impl BuiltinType {
    pub fn scope_name(self) -> &'static str {
        match self {
            BuiltinType::Int => "tp-int",
            BuiltinType::Float => "tp-float",
            BuiltinType::Char => "tp-char",
            BuiltinType::Bool => "tp-bool",
            BuiltinType::Str => "tp-str",
            BuiltinType::Null => "tp-null",
            BuiltinType::List => "tp-list",
            BuiltinType::Dict => "tp-dict",
            BuiltinType::Series => "tp-series",
            BuiltinType::Pair => "tp-pair",
            BuiltinType::Time => "tp-time",
            BuiltinType::Qot => "tp-qot",
            BuiltinType::Tp => "tp",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeRef {
    Builtin(BuiltinType),
    Custom(Rc<RefCell<CustomTypeDef>>),
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Builtin(a), TypeRef::Builtin(b)) => a == b,
            (TypeRef::Custom(a), TypeRef::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: InsSet,
    pub is_ret: bool,
}

/// A dynamically-typed value. Iterable/shared variants (`List`, `Series`,
/// `Dict`, `KeyValuePair`) hold an `Rc<RefCell<..>>` so `PUT` can alias them
/// into another slot while `COPY` deep-clones the contents.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Series(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<IndexMap<String, Value>>>),
    KeyValuePair(Rc<RefCell<(Value, Value)>>),
    DType(TypeRef),
    Time(RaTime),
    Quote(SlotId),
    Function(Rc<FunctionDef>),
    RetFunction(Rc<FunctionDef>),
    CustomType(Rc<RefCell<CustomTypeDef>>),
    CustomInst(Rc<RefCell<CustomInstData>>),
    Extension(ScopeId),
    Error(Box<crate::error::RvmError>),
    CompareGroup(SlotId, SlotId),
    File(Rc<RefCell<FileHandle>>),
}

#[derive(Debug)]
pub struct FileHandle {
    pub path: String,
    pub mode: String,
    pub handle: Option<std::fs::File>,
}

impl Value {
    pub fn type_id(&self) -> TypeRef {
        match self {
            Value::Null => TypeRef::Builtin(BuiltinType::Null),
            Value::Bool(_) => TypeRef::Builtin(BuiltinType::Bool),
            Value::Int(_) => TypeRef::Builtin(BuiltinType::Int),
            Value::Float(_) => TypeRef::Builtin(BuiltinType::Float),
            Value::Char(_) => TypeRef::Builtin(BuiltinType::Char),
            Value::String(_) => TypeRef::Builtin(BuiltinType::Str),
            Value::List(_) => TypeRef::Builtin(BuiltinType::List),
            Value::Series(_) => TypeRef::Builtin(BuiltinType::Series),
            Value::Dict(_) => TypeRef::Builtin(BuiltinType::Dict),
            Value::KeyValuePair(_) => TypeRef::Builtin(BuiltinType::Pair),
            Value::Time(_) => TypeRef::Builtin(BuiltinType::Time),
            Value::Quote(_) => TypeRef::Builtin(BuiltinType::Qot),
            Value::DType(_) => TypeRef::Builtin(BuiltinType::Tp),
            Value::Function(_) | Value::RetFunction(_) => TypeRef::Builtin(BuiltinType::Tp),
            Value::CustomType(_) => TypeRef::Builtin(BuiltinType::Tp),
            Value::CustomInst(i) => TypeRef::Custom(i.borrow().type_def.clone()),
            Value::Extension(_) => TypeRef::Builtin(BuiltinType::Tp),
            Value::Error(_) => TypeRef::Builtin(BuiltinType::Tp),
            Value::CompareGroup(_, _) => TypeRef::Builtin(BuiltinType::Tp),
            Value::File(_) => TypeRef::Builtin(BuiltinType::Tp),
        }
    }

    /// Deep copy: iterables/dicts get a fresh backing store, scalars clone
    /// trivially. Used by `COPY` and by instance-field template materialization.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(v) => Value::List(Rc::new(RefCell::new(v.borrow().iter().map(Value::deep_copy).collect()))),
            Value::Series(v) => Value::Series(Rc::new(RefCell::new(v.borrow().iter().map(Value::deep_copy).collect()))),
            Value::Dict(d) => Value::Dict(Rc::new(RefCell::new(
                d.borrow().iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
            ))),
            Value::KeyValuePair(p) => {
                let (k, v) = &*p.borrow();
                Value::KeyValuePair(Rc::new(RefCell::new((k.deep_copy(), v.deep_copy()))))
            }
            Value::CustomInst(inst) => {
                let inst = inst.borrow();
                Value::CustomInst(Rc::new(RefCell::new(CustomInstData {
                    type_def: inst.type_def.clone(),
                    fields: inst.fields.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
                })))
            }
            other => other.clone(),
        }
    }

    /// Attempts to replace the occupant of a slot in place (used to
    /// preserve identity across assignment to aliased slots, §3.2). Returns
    /// `true` on success (both sides are the same shared variant), `false`
    /// when the caller must instead replace the whole slot.
    pub fn update_in_place(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) | (Value::Series(a), Value::Series(b)) => {
                if !Rc::ptr_eq(a, b) {
                    *a.borrow_mut() = b.borrow().clone();
                }
                true
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if !Rc::ptr_eq(a, b) {
                    *a.borrow_mut() = b.borrow().clone();
                }
                true
            }
            (Value::KeyValuePair(a), Value::KeyValuePair(b)) => {
                if !Rc::ptr_eq(a, b) {
                    *a.borrow_mut() = b.borrow().clone();
                }
                true
            }
            _ => false,
        }
    }

    pub fn convert_to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Char(c) => *c != '\0',
            Value::String(s) => !s.is_empty(),
            Value::List(v) | Value::Series(v) => !v.borrow().is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Char(c) => c.to_string(),
            Value::String(s) => s.to_string(),
            Value::List(v) => format!("[{}]", v.borrow().iter().map(Value::to_display_string).collect::<Vec<_>>().join(", ")),
            Value::Series(v) => format!("(series: {})", v.borrow().iter().map(Value::to_display_string).collect::<Vec<_>>().join(", ")),
            Value::Dict(d) => format!(
                "{{{}}}",
                d.borrow().iter().map(|(k, v)| format!("{k}: {}", v.to_display_string())).collect::<Vec<_>>().join(", ")
            ),
            Value::KeyValuePair(p) => {
                let (k, v) = &*p.borrow();
                format!("{}: {}", k.to_display_string(), v.to_display_string())
            }
            Value::DType(t) => match t {
                TypeRef::Builtin(b) => b.scope_name().to_string(),
                TypeRef::Custom(c) => c.borrow().name.clone(),
            },
            Value::Time(t) => t.format(),
            Value::Quote(id) => format!("@{id}"),
            Value::Function(f) => format!("[Function: {}({})]", f.name, f.params.join(", ")),
            Value::RetFunction(f) => format!("[RetFunction: {}({})]", f.name, f.params.join(", ")),
            Value::CustomType(t) => format!("[Type: {}]", t.borrow().name),
            Value::CustomInst(i) => format!("[{} instance]", i.borrow().type_def.borrow().name),
            Value::Extension(id) => format!("[Extension: {id}]"),
            Value::Error(e) => format!("!{}", e.render_summary()),
            Value::CompareGroup(a, b) => format!("[Compare: {a}, {b}]"),
            Value::File(f) => format!("[File: {}]", f.borrow().path),
        }
    }

    pub fn to_escaped_string(&self) -> String {
        match self {
            Value::String(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        '\\' => out.push_str("\\\\"),
                        '"' => out.push_str("\\\""),
                        '\0' => out.push_str("\\0"),
                        c => out.push(c),
                    }
                }
                out.push('"');
                out
            }
            other => other.to_display_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

mod arithmetic;
mod comparison;
mod convert;
mod iterable;

pub use arithmetic::Numeric;
pub use comparison::Relation;
pub use iterable::IterKey;
