//! User-defined types with single inheritance: a shared-pointer type
//! descriptor with a parent chain, type-level fields, and per-instance
//! field defaults.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::id::Id;
use crate::value::Value;

#[derive(Debug)]
pub struct CustomTypeDef {
    pub id: Id,
    pub name: String,
    pub parent: Option<Rc<RefCell<CustomTypeDef>>>,
    /// Type-level fields (shared by all instances, set via `TP_SET_FIELD`
    /// on the type itself).
    pub type_fields: IndexMap<String, Value>,
    /// Instance-field templates: name -> default value, copied fresh into
    /// every new instance.
    pub inst_field_defaults: IndexMap<String, Value>,
}

impl CustomTypeDef {
    pub fn new(id: Id, name: String, parent: Option<Rc<RefCell<CustomTypeDef>>>) -> Self {
        CustomTypeDef { id, name, parent, type_fields: IndexMap::new(), inst_field_defaults: IndexMap::new() }
    }

    /// Walks the parent chain checking whether `self` is `other` or
    /// descends from it (`belongs_to`, used by `TP_DERIVE`/EXPOSE-DETECT
    /// matching).
    pub fn belongs_to(this: &Rc<RefCell<CustomTypeDef>>, other: &Rc<RefCell<CustomTypeDef>>) -> bool {
        let mut cur = this.clone();
        loop {
            if Rc::ptr_eq(&cur, other) {
                return true;
            }
            let next = cur.borrow().parent.clone();
            match next {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// All ancestor instance-field templates, outermost ancestor first, so
    /// a child's own defaults override an ancestor's of the same name when
    /// folded in order (`TP_NEW`/`TP_DERIVE`).
    pub fn ancestor_chain(this: &Rc<RefCell<CustomTypeDef>>) -> Vec<Rc<RefCell<CustomTypeDef>>> {
        let mut chain = Vec::new();
        let mut cur = Some(this.clone());
        while let Some(t) = cur {
            let parent = t.borrow().parent.clone();
            chain.push(t);
            cur = parent;
        }
        chain.reverse();
        chain
    }

    pub fn type_field(this: &Rc<RefCell<CustomTypeDef>>, field: &str) -> Option<Value> {
        let mut cur = Some(this.clone());
        while let Some(t) = cur {
            if let Some(v) = t.borrow().type_fields.get(field) {
                return Some(v.clone());
            }
            cur = t.borrow().parent.clone();
        }
        None
    }
}

#[derive(Debug)]
pub struct CustomInstData {
    pub type_def: Rc<RefCell<CustomTypeDef>>,
    pub fields: IndexMap<String, Value>,
}

impl CustomInstData {
    /// Instantiates a new instance of `type_def`, copying every ancestor's
    /// instance-field defaults into the field map (never shared).
    pub fn new(type_def: Rc<RefCell<CustomTypeDef>>) -> Self {
        let mut fields = IndexMap::new();
        for ancestor in CustomTypeDef::ancestor_chain(&type_def) {
            for (name, default) in &ancestor.borrow().inst_field_defaults {
                fields.insert(name.clone(), default.deep_copy());
            }
        }
        CustomInstData { type_def, fields }
    }

    /// Finds the nearest ancestor (including self) defining `field`,
    /// walking the parent chain (`TP_GET_FIELD`).
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// In-place re-classification used by `TP_DERIVE`: merges `child`'s
    /// instance-field template atop the existing fields without touching
    /// fields already present.
    pub fn derive(&mut self, child: Rc<RefCell<CustomTypeDef>>) {
        for (name, default) in &child.borrow().inst_field_defaults {
            self.fields.entry(name.clone()).or_insert_with(|| default.deep_copy());
        }
        self.type_def = child;
    }
}
