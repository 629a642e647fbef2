//! Type conversion matrix: selects a handler by the target type's id and
//! converts between numeric, string, and iterable representations.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::time::RaTime;
use super::{BuiltinType, TypeRef, Value, ValueOpError};

impl Value {
    /// Converts `self` to the target type. Unsupported combinations fail
    /// with `DataTypeMismatch`.
    pub fn convert_to(&self, target: &TypeRef) -> Result<Value, ValueOpError> {
        let target = match target {
            TypeRef::Builtin(b) => *b,
            TypeRef::Custom(_) => return Err(ValueOpError::DataTypeMismatch),
        };
        match target {
            BuiltinType::Int => self.to_int(),
            BuiltinType::Float => self.to_float(),
            BuiltinType::Bool => self.to_bool(),
            BuiltinType::Char => self.to_char(),
            BuiltinType::Str => Ok(Value::String(Rc::from(self.to_display_string().as_str()))),
            BuiltinType::Null => Ok(Value::Null),
            BuiltinType::List => self.to_list(),
            BuiltinType::Series => self.to_series(),
            BuiltinType::Dict => self.to_dict(),
            BuiltinType::Time => self.to_time(),
            BuiltinType::Pair | BuiltinType::Qot | BuiltinType::Tp => Err(ValueOpError::DataTypeMismatch),
        }
    }

    /// Unlike `convert_to_bool` (general truthiness, used by `AND`/`OR` and
    /// `JT`/`JF`), a `TP_SET`/`SIN` conversion to `tp-bool` only accepts the
    /// literal strings `"true"`/`"false"` — any other string is a type
    /// mismatch, not "truthy".
    fn to_bool(&self) -> Result<Value, ValueOpError> {
        Ok(Value::Bool(match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Char(c) => *c != '\0',
            Value::String(s) => match s.as_ref() {
                "true" => true,
                "false" => false,
                _ => return Err(ValueOpError::DataTypeMismatch),
            },
            _ => return Err(ValueOpError::DataTypeMismatch),
        }))
    }

    fn to_int(&self) -> Result<Value, ValueOpError> {
        Ok(Value::Int(match self {
            Value::Null => 0,
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => *b as i64,
            Value::Char(c) => *c as i64,
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| ValueOpError::DataTypeMismatch)?,
            _ => return Err(ValueOpError::DataTypeMismatch),
        }))
    }

    fn to_float(&self) -> Result<Value, ValueOpError> {
        Ok(Value::Float(match self {
            Value::Null => 0.0,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => *b as i64 as f64,
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| ValueOpError::DataTypeMismatch)?,
            _ => return Err(ValueOpError::DataTypeMismatch),
        }))
    }

    fn to_char(&self) -> Result<Value, ValueOpError> {
        Ok(Value::Char(match self {
            Value::Null => '\0',
            Value::Char(c) => *c,
            Value::Int(i) => char::from_u32(*i as u32).ok_or(ValueOpError::DataTypeMismatch)?,
            Value::String(s) if s.chars().count() == 1 => s.chars().next().unwrap(),
            _ => return Err(ValueOpError::DataTypeMismatch),
        }))
    }

    fn to_list(&self) -> Result<Value, ValueOpError> {
        match self {
            Value::Null => Ok(Value::List(Rc::new(RefCell::new(Vec::new())))),
            Value::List(v) => Ok(Value::List(Rc::new(RefCell::new(v.borrow().clone())))),
            Value::Series(v) => Ok(Value::List(Rc::new(RefCell::new(v.borrow().clone())))),
            Value::String(s) => Ok(Value::List(Rc::new(RefCell::new(s.chars().map(Value::Char).collect())))),
            Value::Dict(d) => Ok(Value::List(Rc::new(RefCell::new(
                d.borrow().iter().map(|(k, v)| Value::KeyValuePair(Rc::new(RefCell::new((Value::String(Rc::from(k.as_str())), v.clone()))))).collect(),
            )))),
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    fn to_series(&self) -> Result<Value, ValueOpError> {
        match self.to_list()? {
            Value::List(v) => Ok(Value::Series(v)),
            _ => unreachable!(),
        }
    }

    fn to_dict(&self) -> Result<Value, ValueOpError> {
        match self {
            Value::Null => Ok(Value::Dict(Rc::new(RefCell::new(IndexMap::new())))),
            Value::Dict(d) => Ok(Value::Dict(Rc::new(RefCell::new(d.borrow().clone())))),
            Value::List(v) | Value::Series(v) => {
                let mut map = IndexMap::new();
                for (i, item) in v.borrow().iter().enumerate() {
                    if let Value::KeyValuePair(p) = item {
                        let (k, val) = &*p.borrow();
                        map.insert(k.to_escaped_string(), val.clone());
                    } else {
                        map.insert(i.to_string(), item.clone());
                    }
                }
                Ok(Value::Dict(Rc::new(RefCell::new(map))))
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    fn to_time(&self) -> Result<Value, ValueOpError> {
        match self {
            Value::Time(t) => Ok(Value::Time(t.clone())),
            Value::String(s) => {
                RaTime::parse(s, super::time::DEFAULT_FORMAT).map(Value::Time).ok_or(ValueOpError::DataTypeMismatch)
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_list_splits_into_characters() {
        let v = Value::String(Rc::from("ab")).convert_to(&TypeRef::Builtin(BuiltinType::List)).unwrap();
        assert_eq!(v.iter_size().unwrap(), 2);
    }

    #[test]
    fn null_to_list_is_empty() {
        let v = Value::Null.convert_to(&TypeRef::Builtin(BuiltinType::List)).unwrap();
        assert_eq!(v.iter_size().unwrap(), 0);
    }

    #[test]
    fn unsupported_conversion_fails() {
        let v = Value::Bool(true).convert_to(&TypeRef::Builtin(BuiltinType::Time));
        assert_eq!(v.unwrap_err(), ValueOpError::DataTypeMismatch);
    }
}
