//! Iteration capability: `size`, `get`, `set`, `insert`, `erase`, `append`,
//! `splice`, `subpart` over lists, series, strings, and dicts.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Value, ValueOpError};

#[derive(Debug, Clone)]
pub enum IterKey {
    Index(usize),
    Key(String),
}

impl Value {
    pub fn iter_size(&self) -> Result<usize, ValueOpError> {
        match self {
            Value::List(v) | Value::Series(v) => Ok(v.borrow().len()),
            Value::String(s) => Ok(s.chars().count()),
            Value::Dict(d) => Ok(d.borrow().len()),
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    pub fn iter_get(&self, key: &IterKey) -> Result<Value, ValueOpError> {
        match (self, key) {
            (Value::List(v) | Value::Series(v), IterKey::Index(i)) => {
                v.borrow().get(*i).cloned().ok_or(ValueOpError::RangeError)
            }
            (Value::String(s), IterKey::Index(i)) => {
                s.chars().nth(*i).map(Value::Char).ok_or(ValueOpError::RangeError)
            }
            (Value::Dict(d), IterKey::Key(k)) => d.borrow().get(k).cloned().ok_or(ValueOpError::KeyNotFound),
            (Value::Dict(d), IterKey::Index(i)) => {
                d.borrow().get_index(*i).map(|(_, v)| v.clone()).ok_or(ValueOpError::RangeError)
            }
            _ => Err(ValueOpError::ArgTypeMismatch),
        }
    }

    pub fn iter_set(&self, key: &IterKey, value: Value) -> Result<(), ValueOpError> {
        match (self, key) {
            (Value::List(v) | Value::Series(v), IterKey::Index(i)) => {
                let mut v = v.borrow_mut();
                let slot = v.get_mut(*i).ok_or(ValueOpError::RangeError)?;
                *slot = value;
                Ok(())
            }
            (Value::Dict(d), IterKey::Key(k)) => {
                d.borrow_mut().insert(k.clone(), value);
                Ok(())
            }
            _ => Err(ValueOpError::ArgTypeMismatch),
        }
    }

    pub fn iter_insert(&self, key: &IterKey, value: Value) -> Result<(), ValueOpError> {
        match (self, key) {
            (Value::List(v) | Value::Series(v), IterKey::Index(i)) => {
                let mut v = v.borrow_mut();
                if *i > v.len() {
                    return Err(ValueOpError::RangeError);
                }
                v.insert(*i, value);
                Ok(())
            }
            (Value::Dict(d), IterKey::Key(k)) => {
                d.borrow_mut().insert(k.clone(), value);
                Ok(())
            }
            _ => Err(ValueOpError::ArgTypeMismatch),
        }
    }

    pub fn iter_erase(&self, key: &IterKey) -> Result<(), ValueOpError> {
        match (self, key) {
            (Value::List(v) | Value::Series(v), IterKey::Index(i)) => {
                let mut v = v.borrow_mut();
                if *i >= v.len() {
                    return Err(ValueOpError::RangeError);
                }
                v.remove(*i);
                Ok(())
            }
            (Value::Dict(d), IterKey::Key(k)) => {
                d.borrow_mut().shift_remove(k).ok_or(ValueOpError::KeyNotFound)?;
                Ok(())
            }
            _ => Err(ValueOpError::ArgTypeMismatch),
        }
    }

    pub fn iter_append(&mut self, value: Value) -> Result<(), ValueOpError> {
        match self {
            Value::List(v) | Value::Series(v) => {
                v.borrow_mut().push(value);
                Ok(())
            }
            Value::String(s) => {
                let appended = format!("{s}{}", value.to_display_string());
                *s = Rc::from(appended.as_str());
                Ok(())
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    pub fn iter_append_front(&mut self, value: Value) -> Result<(), ValueOpError> {
        match self {
            Value::List(v) | Value::Series(v) => {
                v.borrow_mut().insert(0, value);
                Ok(())
            }
            Value::String(s) => {
                let prefixed = format!("{}{s}", value.to_display_string());
                *s = Rc::from(prefixed.as_str());
                Ok(())
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    /// Aliases `other`'s backing store into `self` for shared iterables
    /// when possible (splice concatenates in place), consuming `other`.
    pub fn iter_splice(&self, other: &Value) -> Result<(), ValueOpError> {
        match (self, other) {
            (Value::List(a), Value::List(b)) | (Value::Series(a), Value::Series(b)) => {
                let extra: Vec<Value> = b.borrow().iter().map(Value::deep_copy).collect();
                a.borrow_mut().extend(extra);
                Ok(())
            }
            (Value::Dict(a), Value::Dict(b)) => {
                for (k, v) in b.borrow().iter() {
                    a.borrow_mut().insert(k.clone(), v.deep_copy());
                }
                Ok(())
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }

    /// Half-open slice `[begin, end)`.
    pub fn iter_subpart(&self, begin: usize, end: usize) -> Result<Value, ValueOpError> {
        let size = self.iter_size()?;
        if begin >= size || begin > end {
            return Err(ValueOpError::RangeError);
        }
        // No upper bound on `end` is enforced (ground truth), so clamp
        // rather than index out of bounds.
        let end = end.min(size);
        match self {
            Value::List(v) => Ok(Value::List(Rc::new(RefCell::new(v.borrow()[begin..end].to_vec())))),
            Value::Series(v) => Ok(Value::Series(Rc::new(RefCell::new(v.borrow()[begin..end].to_vec())))),
            Value::String(s) => Ok(Value::String(Rc::from(s.chars().skip(begin).take(end - begin).collect::<String>()))),
            Value::Dict(d) => {
                let mut out = IndexMap::new();
                for (k, v) in d.borrow().iter().skip(begin).take(end - begin) {
                    out.insert(k.clone(), v.clone());
                }
                Ok(Value::Dict(Rc::new(RefCell::new(out))))
            }
            _ => Err(ValueOpError::DataTypeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpart_is_half_open() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)])));
        let sub = list.iter_subpart(0, 2).unwrap();
        assert_eq!(sub.iter_size().unwrap(), 2);
    }

    #[test]
    fn subpart_rejects_begin_after_end() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Int(1)])));
        assert_eq!(list.iter_subpart(1, 0).unwrap_err(), ValueOpError::RangeError);
    }

    #[test]
    fn iterable_size_matches_traversal_count() {
        let list = Value::List(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        let mut count = 0;
        for i in 0..list.iter_size().unwrap() {
            list.iter_get(&IterKey::Index(i)).unwrap();
            count += 1;
        }
        assert_eq!(count, list.iter_size().unwrap());
    }
}
