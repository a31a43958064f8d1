//! Object containers and slot hooks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::Value;

/// Identifies the installer of a hook.
///
/// A slot may be observed by more than one manager (a child context usually
/// shares objects with its parent), so hooks are keyed by the manager that
/// installed them and the identifier they serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookTag {
    pub manager: u64,
    pub identifier: Rc<str>,
}

impl HookTag {
    pub fn new(manager: u64, identifier: &str) -> Self {
        Self {
            manager,
            identifier: Rc::from(identifier),
        }
    }
}

/// Callback pair installed on one container slot.
pub trait SlotHook {
    /// Called after a tracked read with the value being returned.
    fn on_read(&self, _value: &Value) {}

    /// Called after a write has been stored.
    fn on_write(&self, old: &Value, new: &Value);
}

pub(crate) type HookList = SmallVec<[(HookTag, Rc<dyn SlotHook>); 1]>;

struct Slot {
    value: Value,
    hooks: HookList,
}

impl Slot {
    fn plain(value: Value) -> Self {
        Self {
            value,
            hooks: SmallVec::new(),
        }
    }
}

/// Shared handle to a mutable object.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<IndexMap<String, Slot>>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Slot::plain(v)))
            .collect();
        Self(Rc::new(RefCell::new(map)))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property, notifying read hooks.
    pub fn get(&self, key: &str) -> Value {
        let (value, hooks) = {
            let map = self.0.borrow();
            match map.get(key) {
                Some(slot) => (slot.value.clone(), slot.hooks.clone()),
                None => return Value::Undefined,
            }
        };
        for (_, hook) in &hooks {
            hook.on_read(&value);
        }
        value
    }

    /// Read a property without notifying read hooks.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.0
            .borrow()
            .get(key)
            .map(|slot| slot.value.clone())
            .unwrap_or_default()
    }

    /// Write a property. Installed hooks run after the value is stored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let (old, hooks) = {
            let mut map = self.0.borrow_mut();
            match map.get_mut(key) {
                Some(slot) => (
                    std::mem::replace(&mut slot.value, value.clone()),
                    slot.hooks.clone(),
                ),
                None => {
                    map.insert(key.to_string(), Slot::plain(value));
                    return;
                }
            }
        };
        for (_, hook) in &hooks {
            hook.on_write(&old, &value);
        }
    }

    /// Delete a property.
    ///
    /// An intercepted slot stays in place and is written as `Undefined` so
    /// its observers see the removal.
    pub fn remove(&self, key: &str) -> Value {
        let intercepted = self.is_intercepted(key);
        if intercepted {
            let old = self.get_untracked(key);
            self.set(key, Value::Undefined);
            return old;
        }
        self.0
            .borrow_mut()
            .shift_remove(key)
            .map(|slot| slot.value)
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of all entries, read untracked.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, slot)| (k.clone(), slot.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Install a hook on `key`, creating the slot as `Undefined` if absent.
    /// Re-installing under the same tag replaces the previous hook.
    pub fn intercept(&self, key: &str, tag: HookTag, hook: Rc<dyn SlotHook>) {
        let mut map = self.0.borrow_mut();
        let slot = map
            .entry(key.to_string())
            .or_insert_with(|| Slot::plain(Value::Undefined));
        match slot.hooks.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = hook,
            None => slot.hooks.push((tag, hook)),
        }
    }

    /// Remove the hook installed under `tag`. Returns whether one was found.
    pub fn release(&self, key: &str, tag: &HookTag) -> bool {
        let mut map = self.0.borrow_mut();
        match map.get_mut(key) {
            Some(slot) => {
                let before = slot.hooks.len();
                slot.hooks.retain(|(t, _)| t != tag);
                slot.hooks.len() != before
            }
            None => false,
        }
    }

    pub fn is_intercepted(&self, key: &str) -> bool {
        self.0
            .borrow()
            .get(key)
            .map(|slot| !slot.hooks.is_empty())
            .unwrap_or(false)
    }

    pub fn is_intercepted_by(&self, key: &str, tag: &HookTag) -> bool {
        self.0
            .borrow()
            .get(key)
            .map(|slot| slot.hooks.iter().any(|(t, _)| t == tag))
            .unwrap_or(false)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}
