//! Comparison/equality: numeric arithmetic comparison, string lexicographic
//! comparison, identity comparison for Function/RetFunction, and the
//! Null-equals-only-Null rule.

use std::cmp::Ordering;

use super::{Value, ValueOpError};

/// The relation keywords `CREL`/`JR`/`UNTIL` evaluate a `CompareGroup`
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl Relation {
    pub fn from_keyword(kw: &str) -> Option<Relation> {
        Some(match kw {
            "RE" => Relation::Eq,
            "RNE" => Relation::Ne,
            "RG" => Relation::Gt,
            "RGE" => Relation::Ge,
            "RL" => Relation::Lt,
            "RLE" => Relation::Le,
            "AND" => Relation::And,
            "OR" => Relation::Or,
            _ => return None,
        })
    }
}

impl Value {
    /// Function/RetFunction compare by identity of *type ID*, not
    /// per-instance identity: any two `Function`s are RE-equal to each
    /// other, and likewise for `RetFunction`, but the two kinds never
    /// compare equal to each other.
    fn identity_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Function(_), Value::Function(_)) => Some(true),
            (Value::RetFunction(_), Value::RetFunction(_)) => Some(true),
            (Value::Function(_), Value::RetFunction(_)) | (Value::RetFunction(_), Value::Function(_)) => Some(false),
            (Value::Null, Value::Null) => Some(true),
            (Value::Null, _) | (_, Value::Null) => Some(false),
            _ => None,
        }
    }

    fn partial_ordering(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_numeric(), other.as_numeric()) {
            return a.as_f64().partial_cmp(&b.as_f64());
        }
        if let (Value::String(a), Value::String(b)) = (self, other) {
            return Some(a.as_ref().cmp(b.as_ref()));
        }
        None
    }

    fn structural_eq(&self, other: &Value) -> bool {
        if let Some(ord) = self.partial_ordering(other) {
            return ord == Ordering::Equal;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Series(a), Value::Series(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.structural_eq(bv)))
            }
            _ => self.identity_eq(other).unwrap_or(false),
        }
    }

    /// Evaluates `self 'rel' other`, failing with `ArgTypeMismatch` for
    /// relations undefined on a value's kind (only RE/RNE/AND/OR are
    /// defined outside numeric/string pairs).
    pub fn compare(&self, other: &Value, rel: Relation) -> Result<bool, ValueOpError> {
        match rel {
            Relation::Eq => Ok(self.structural_eq(other)),
            Relation::Ne => Ok(!self.structural_eq(other)),
            Relation::And => Ok(self.convert_to_bool() && other.convert_to_bool()),
            Relation::Or => Ok(self.convert_to_bool() || other.convert_to_bool()),
            Relation::Gt | Relation::Ge | Relation::Lt | Relation::Le => {
                let ord = self.partial_ordering(other).ok_or(ValueOpError::ArgTypeMismatch)?;
                Ok(match rel {
                    Relation::Gt => ord == Ordering::Greater,
                    Relation::Ge => ord != Ordering::Less,
                    Relation::Lt => ord == Ordering::Less,
                    Relation::Le => ord != Ordering::Greater,
                    _ => unreachable!(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_only_null() {
        assert!(Value::Null.compare(&Value::Null, Relation::Eq).unwrap());
        assert!(!Value::Null.compare(&Value::Int(0), Relation::Eq).unwrap());
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        let a = Value::String(std::rc::Rc::from("abc"));
        let b = Value::String(std::rc::Rc::from("abd"));
        assert!(a.compare(&b, Relation::Lt).unwrap());
    }

    #[test]
    fn unordered_kinds_reject_relational_ops() {
        let a = Value::List(std::rc::Rc::new(std::cell::RefCell::new(vec![])));
        let b = Value::List(std::rc::Rc::new(std::cell::RefCell::new(vec![])));
        assert_eq!(a.compare(&b, Relation::Gt).unwrap_err(), ValueOpError::ArgTypeMismatch);
    }
}
