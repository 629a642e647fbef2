//! Scope & memory: named slots, scope lifecycle, and name resolution across
//! ancestor scopes.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{ErrorKind, RvmError};
use crate::id::{Id, IdMinter, Tag, TAG_DATA, TAG_SCOPE};
use crate::instruction::Pos;
use crate::value::{BuiltinType, TypeRef, Value};

pub type ScopeId = Id;
pub type SlotId = Id;

/// A named mapping from identifier to slot, with a parent chain captured at
/// acquire time and an ordered slot list for release-order bookkeeping.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub releasable: bool,
    names: IndexMap<String, SlotId>,
    slot_order: Vec<SlotId>,
}

impl Scope {
    fn new(id: ScopeId, parent: Option<ScopeId>, releasable: bool) -> Self {
        Scope { id, parent, releasable, names: IndexMap::new(), slot_order: Vec::new() }
    }

    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|s| s.as_str())
    }
}

/// Global memory: the scope pool, a root scope and its well-known slots,
/// and the single "current scope" pointer the dispatcher saves/restores
/// around nested `execute` calls.
pub struct Memory {
    minter: IdMinter,
    pool: HashMap<ScopeId, Scope>,
    by_display: HashMap<String, ScopeId>,
    slots: HashMap<SlotId, Value>,
    current: ScopeId,
    pub root: ScopeId,
    pub sr_slot: SlotId,
    pub se_slot: SlotId,
    pub last_se_slot: SlotId,
}

impl Memory {
    pub fn new() -> Self {
        let minter = IdMinter::new();
        let root_id = minter.mint(TAG_SCOPE);
        let mut pool = HashMap::new();
        let mut by_display = HashMap::new();
        by_display.insert(root_id.display().to_string(), root_id.clone());
        pool.insert(root_id.clone(), Scope::new(root_id.clone(), None, false));
        let mut mem = Memory {
            minter,
            pool,
            by_display,
            slots: HashMap::new(),
            current: root_id.clone(),
            root: root_id.clone(),
            sr_slot: root_id.clone(),
            se_slot: root_id.clone(),
            last_se_slot: root_id.clone(),
        };
        mem.install_globals();
        mem
    }

    fn install_globals(&mut self) {
        let (sr, _) = self.add("SR", Value::Null).expect("root scope is fresh");
        self.sr_slot = sr;
        let (se, _) = self.add("SE", Value::Null).expect("root scope is fresh");
        self.se_slot = se;
        let (last_se, _) = self.add("_SE", Value::Null).expect("root scope is fresh");
        self.last_se_slot = last_se;
        self.add("SN", Value::Null).unwrap();
        self.add("SS", Value::Null).unwrap();
        self.add("true", Value::Bool(true)).unwrap();
        self.add("false", Value::Bool(false)).unwrap();
        self.add("null", Value::Null).unwrap();
        for builtin in [
            BuiltinType::Int,
            BuiltinType::Float,
            BuiltinType::Char,
            BuiltinType::Bool,
            BuiltinType::Str,
            BuiltinType::Null,
            BuiltinType::List,
            BuiltinType::Dict,
            BuiltinType::Series,
            BuiltinType::Pair,
            BuiltinType::Time,
            BuiltinType::Qot,
            BuiltinType::Tp,
        ] {
            self.add(builtin.scope_name(), Value::DType(TypeRef::Builtin(builtin))).unwrap();
        }
    }

    /// Mints a fresh ID under an arbitrary tag (used by `TP_DEF` for custom
    /// type IDs, which otherwise have no natural home in `Memory`).
    pub fn mint(&self, tag: Tag) -> Id {
        self.minter.mint(tag)
    }

    pub fn current(&self) -> ScopeId {
        self.current.clone()
    }

    pub fn set_current(&mut self, scope: ScopeId) {
        self.current = scope;
    }

    /// Mints a fresh scope named `prefix + counter`, pushes it as current.
    /// Returns the previous current scope so the caller (the dispatcher)
    /// can restore it later.
    pub fn acquire(&mut self, prefix: &str, releasable: bool) -> (ScopeId, ScopeId) {
        let previous = self.current.clone();
        let id = self.minter.mint_named(TAG_SCOPE, prefix);
        let scope = Scope::new(id.clone(), Some(previous.clone()), releasable);
        self.by_display.insert(id.display().to_string(), id.clone());
        self.pool.insert(id.clone(), scope);
        self.current = id.clone();
        (id, previous)
    }

    /// Removes `scope` from the pool, dropping every local slot. If `scope`
    /// was current, restores `restore_to`.
    pub fn release(&mut self, scope: ScopeId, restore_to: ScopeId) {
        if let Some(removed) = self.pool.remove(&scope) {
            for slot in removed.slot_order.iter().rev() {
                self.slots.remove(slot);
            }
            self.by_display.remove(removed.id.display());
        }
        if self.current == scope {
            self.current = restore_to;
        }
    }

    /// Clears a delayed-release scope's slot values in place without
    /// dropping the slot IDs, so identity survives across loop iterations.
    pub fn clear_in_place(&mut self, scope: &ScopeId) {
        if let Some(s) = self.pool.get(scope) {
            let ids: Vec<SlotId> = s.slot_order.clone();
            for id in ids {
                if let Some(v) = self.slots.get_mut(&id) {
                    *v = Value::Null;
                }
            }
        }
    }

    fn ancestor_chain(&self, scope: &ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut cur = Some(scope.clone());
        while let Some(id) = cur {
            let Some(s) = self.pool.get(&id) else { break };
            chain.push(id.clone());
            cur = s.parent.clone();
        }
        chain
    }

    pub fn find_by_name(&self, name: &str) -> Option<(SlotId, &Value)> {
        for scope_id in self.ancestor_chain(&self.current) {
            let scope = self.pool.get(&scope_id)?;
            if let Some(id) = scope.names.get(name) {
                return self.slots.get(id).map(|v| (id.clone(), v));
            }
        }
        None
    }

    pub fn find_by_id(&self, slot_id: &SlotId) -> Option<&Value> {
        self.slots.get(slot_id)
    }

    /// Looks up `name` in exactly `scope`, without walking ancestors (used
    /// by `EXT_GET` to read a specific mounted extension's own names).
    pub fn find_in_scope(&self, scope: &ScopeId, name: &str) -> Option<(SlotId, &Value)> {
        let scope = self.pool.get(scope)?;
        let id = scope.names.get(name)?;
        self.slots.get(id).map(|v| (id.clone(), v))
    }

    /// Adds `name` into a specific scope rather than the current one (used
    /// to bind function arguments and DETECT's caught-error slot).
    pub fn add_in_scope(&mut self, scope: &ScopeId, name: &str, value: Value) -> Result<SlotId, RvmError> {
        let s = self.pool.get(scope).expect("scope exists");
        if s.names.contains_key(name) {
            return Err(RvmError::new(ErrorKind::DuplicateKeyError, Pos::unknown(), "", format!("slot '{name}' already exists")));
        }
        let id = self.minter.mint(TAG_DATA);
        let s = self.pool.get_mut(scope).expect("scope exists");
        s.names.insert(name.to_string(), id.clone());
        s.slot_order.push(id.clone());
        self.slots.insert(id.clone(), value);
        Ok(id)
    }

    pub fn add(&mut self, name: &str, value: Value) -> Result<(SlotId, &Value), RvmError> {
        let scope = self.pool.get(&self.current).expect("current scope always exists");
        if scope.names.contains_key(name) {
            return Err(RvmError::new(ErrorKind::DuplicateKeyError, Pos::unknown(), "", format!("slot '{name}' already exists")));
        }
        let id = self.minter.mint(TAG_DATA);
        let scope = self.pool.get_mut(&self.current).expect("current scope always exists");
        scope.names.insert(name.to_string(), id.clone());
        scope.slot_order.push(id.clone());
        self.slots.insert(id.clone(), value);
        Ok((id.clone(), self.slots.get(&id).unwrap()))
    }

    pub fn update_by_name(&mut self, name: &str, value: Value) -> Result<SlotId, RvmError> {
        let slot_id = self
            .find_by_name(name)
            .map(|(id, _)| id)
            .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, Pos::unknown(), "", format!("nonexistent space '{name}'")))?;
        self.update_by_id(&slot_id, value)?;
        Ok(slot_id)
    }

    pub fn update_by_id(&mut self, slot_id: &SlotId, value: Value) -> Result<(), RvmError> {
        let existing = self.slots.get(slot_id).ok_or_else(|| RvmError::new(ErrorKind::MemoryError, Pos::unknown(), "", "slot released"))?;
        if existing.update_in_place(&value) {
            return Ok(());
        }
        self.slots.insert(slot_id.clone(), value);
        Ok(())
    }

    pub fn remove_by_name(&mut self, name: &str) -> Result<(), RvmError> {
        let scope = self.pool.get_mut(&self.current).expect("current scope always exists");
        let id = scope
            .names
            .shift_remove(name)
            .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, Pos::unknown(), "", format!("no such slot '{name}'")))?;
        scope.slot_order.retain(|s| s != &id);
        self.slots.remove(&id);
        Ok(())
    }

    /// Switches current scope by a stored scope-ID display string (SP_SET).
    pub fn set_current_by_display(&mut self, display: &str) -> Result<(), RvmError> {
        let id = self
            .by_display
            .get(display)
            .cloned()
            .ok_or_else(|| RvmError::new(ErrorKind::MemoryError, Pos::unknown(), "", format!("no such scope '{display}'")))?;
        self.current = id;
        Ok(())
    }

    pub fn scope_display(&self, id: &ScopeId) -> String {
        id.display().to_string()
    }

    /// Looks up a scope by its stored display string (`SP_DEL`'s argument
    /// is a name, not an `Id` value).
    pub fn resolve_display(&self, display: &str) -> Option<ScopeId> {
        self.by_display.get(display).cloned()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_find_round_trips() {
        let mut mem = Memory::new();
        let (id, _) = mem.add("x", Value::Int(5)).unwrap();
        let (found_id, v) = mem.find_by_name("x").unwrap();
        assert_eq!(found_id, id);
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn duplicate_name_in_same_scope_errors() {
        let mut mem = Memory::new();
        mem.add("x", Value::Null).unwrap();
        assert_eq!(mem.add("x", Value::Null).unwrap_err().kind, ErrorKind::DuplicateKeyError);
    }

    #[test]
    fn child_scope_resolves_parent_names() {
        let mut mem = Memory::new();
        mem.add("outer", Value::Int(1)).unwrap();
        let (child, parent) = mem.acquire("F-", true);
        assert!(mem.find_by_name("outer").is_some());
        mem.release(child, parent);
    }

    #[test]
    fn release_drops_slots_but_keeps_parent_reachable() {
        let mut mem = Memory::new();
        let (child, parent) = mem.acquire("F-", true);
        mem.add("local", Value::Int(1)).unwrap();
        mem.release(child, parent);
        assert!(mem.find_by_name("local").is_none());
    }

    #[test]
    fn update_by_name_preserves_slot_id() {
        let mut mem = Memory::new();
        let (id, _) = mem.add("x", Value::Int(1)).unwrap();
        let id2 = mem.update_by_name("x", Value::Int(2)).unwrap();
        assert_eq!(id, id2);
    }
}
