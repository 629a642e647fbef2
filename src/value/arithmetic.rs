//! Arithmetic over the Numeric super-tag (Bool/Char/Int/Float unified) and
//! the iterable-concatenation rule for `ADD`.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Value, ValueOpError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }

    fn widen_pair(a: Numeric, b: Numeric) -> (Numeric, Numeric, bool) {
        match (a, b) {
            (Numeric::Int(_), Numeric::Int(_)) => (a, b, false),
            _ => (Numeric::Float(a.as_f64()), Numeric::Float(b.as_f64()), true),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Numeric::Int(i) => Value::Int(i),
            Numeric::Float(f) => Value::Float(f),
        }
    }
}

impl Value {
    pub fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Value::Bool(b) => Some(Numeric::Int(*b as i64)),
            Value::Char(c) => Some(Numeric::Int(*c as i64)),
            Value::Int(i) => Some(Numeric::Int(*i)),
            Value::Float(f) => Some(Numeric::Float(*f)),
            _ => None,
        }
    }

    fn is_iterable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Series(_) | Value::String(_) | Value::Dict(_))
    }

    fn same_iterable_kind(&self, other: &Value) -> bool {
        matches!(
            (self, other),
            (Value::List(_), Value::List(_))
                | (Value::Series(_), Value::Series(_))
                | (Value::String(_), Value::String(_))
                | (Value::Dict(_), Value::Dict(_))
        )
    }

    /// `ADD`: numeric addition, same-kind iterable concatenation, or
    /// scalar-onto-iterable append.
    pub fn add(&self, other: &Value) -> Result<Value, ValueOpError> {
        if let (Some(a), Some(b)) = (self.as_numeric(), other.as_numeric()) {
            let (a, b, is_float) = Numeric::widen_pair(a, b);
            return Ok(if is_float {
                Numeric::Float(a.as_f64() + b.as_f64()).into_value()
            } else {
                match (a, b) {
                    (Numeric::Int(x), Numeric::Int(y)) => Value::Int(x + y),
                    _ => unreachable!(),
                }
            });
        }
        if self.same_iterable_kind(other) {
            return concat_same_kind(self, other);
        }
        if self.is_iterable() && !other.is_iterable() {
            let mut copy = self.deep_copy();
            copy.iter_append(other.deep_copy())?;
            return Ok(copy);
        }
        if other.is_iterable() && !self.is_iterable() {
            let mut copy = other.deep_copy();
            copy.iter_append_front(self.deep_copy())?;
            return Ok(copy);
        }
        Err(ValueOpError::DataTypeMismatch)
    }

    pub fn opp(&self) -> Result<Value, ValueOpError> {
        match self.as_numeric().ok_or(ValueOpError::DataTypeMismatch)? {
            Numeric::Int(i) => Ok(Value::Int(-i)),
            Numeric::Float(f) => Ok(Value::Float(-f)),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueOpError> {
        numeric_binop(self, other, |a, b| a * b, |a, b| a * b)
    }

    pub fn div(&self, other: &Value) -> Result<Value, ValueOpError> {
        let b = other.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        if b.as_f64() == 0.0 {
            return Err(ValueOpError::DivideByZero);
        }
        numeric_binop(self, other, |a, b| if b != 0 { a / b } else { 0 }, |a, b| a / b)
    }

    pub fn pow(&self, other: &Value) -> Result<Value, ValueOpError> {
        let a = self.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        let b = other.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        Ok(Value::Float(a.as_f64().powf(b.as_f64())))
    }

    pub fn root(&self, other: &Value) -> Result<Value, ValueOpError> {
        let a = self.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        let b = other.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        if b.as_f64() == 0.0 {
            return Err(ValueOpError::DivideByZero);
        }
        Ok(Value::Float(a.as_f64().powf(1.0 / b.as_f64())))
    }

    pub fn modulo(&self, other: &Value) -> Result<Value, ValueOpError> {
        let b = other.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
        if b.as_f64() == 0.0 {
            return Err(ValueOpError::DivideByZero);
        }
        numeric_binop(self, other, |a, b| a % b, |a, b| a % b)
    }
}

fn numeric_binop(
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, ValueOpError> {
    let a = a.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
    let b = b.as_numeric().ok_or(ValueOpError::DataTypeMismatch)?;
    let (a, b, is_float) = Numeric::widen_pair(a, b);
    Ok(if is_float {
        Value::Float(float_op(a.as_f64(), b.as_f64()))
    } else {
        match (a, b) {
            (Numeric::Int(x), Numeric::Int(y)) => Value::Int(int_op(x, y)),
            _ => unreachable!(),
        }
    })
}

fn concat_same_kind(a: &Value, b: &Value) -> Result<Value, ValueOpError> {
    match (a, b) {
        (Value::List(x), Value::List(y)) => {
            let mut merged = x.borrow().clone();
            merged.extend(y.borrow().iter().map(Value::deep_copy));
            Ok(Value::List(Rc::new(RefCell::new(merged))))
        }
        (Value::Series(x), Value::Series(y)) => {
            let mut merged = x.borrow().clone();
            merged.extend(y.borrow().iter().map(Value::deep_copy));
            Ok(Value::Series(Rc::new(RefCell::new(merged))))
        }
        (Value::String(x), Value::String(y)) => Ok(Value::String(Rc::from(format!("{x}{y}")))),
        (Value::Dict(x), Value::Dict(y)) => {
            let mut merged = x.borrow().clone();
            for (k, v) in y.borrow().iter() {
                merged.insert(k.clone(), v.deep_copy());
            }
            Ok(Value::Dict(Rc::new(RefCell::new(merged))))
        }
        _ => Err(ValueOpError::DataTypeMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_float_widens_to_float() {
        let r = Value::Int(2).add(&Value::Float(1.5)).unwrap();
        assert!(matches!(r, Value::Float(f) if (f - 3.5).abs() < 1e-9));
    }

    #[test]
    fn list_concatenation_preserves_order_and_size() {
        let x = Value::List(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        let y = Value::List(Rc::new(RefCell::new(vec![Value::Int(3)])));
        let z = x.add(&y).unwrap();
        if let Value::List(v) = z {
            let v = v.borrow();
            assert_eq!(v.len(), 3);
            assert!(matches!(v[2], Value::Int(3)));
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn divide_by_zero_errors() {
        assert_eq!(Value::Int(1).div(&Value::Int(0)).unwrap_err(), ValueOpError::DivideByZero);
    }
}
