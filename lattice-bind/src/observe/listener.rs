//! Listener bookkeeping.
//!
//! Listeners are stored per identifier in descending priority order, ties
//! kept in registration order. A notification pass iterates over a snapshot
//! of the list, so listeners may add or remove listeners (including
//! themselves) while it runs:
//!
//! - a listener removed mid-pass is skipped if the pass has not reached it
//!   yet;
//! - a listener added mid-pass first runs on the next notification.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::value::{ArrayRef, ChangeRecord, Value};

/// Priority reserved for "the owner's own context pointer changed". It runs
/// before any listener on a property of that context.
pub const CONTEXT_PRIORITY: i32 = i32::MAX;

/// Unique identifier of a context owner.
///
/// Every owner gets one when created. Listeners are registered under the
/// uid of the owner that installed them, which is what lets disposal find
/// them again across managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

impl Uid {
    /// Generate a new unique owner id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registration parameters for [`ContextManager::observe`].
///
/// [`ContextManager::observe`]: super::ContextManager::observe
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    pub uid: Uid,
    pub priority: i32,
    /// Remove the listener after it first sees a defined value.
    pub one_time: bool,
}

impl ListenerOptions {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            priority: 0,
            one_time: false,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn one_time(mut self, one_time: bool) -> Self {
        self.one_time = one_time;
        self
    }
}

/// Callback for value changes: `(new, old)`.
pub(crate) type ValueCallback = dyn Fn(&Value, &Value);
/// Callback for sequence mutations.
pub(crate) type SequenceCallback = dyn Fn(&ArrayRef, &ChangeRecord);

pub(crate) struct Entry<F: ?Sized> {
    pub(crate) id: ListenerId,
    pub(crate) priority: i32,
    pub(crate) one_time: bool,
    active: Cell<bool>,
    pub(crate) callback: Box<F>,
}

impl<F: ?Sized> Entry<F> {
    pub(crate) fn new(priority: i32, one_time: bool, callback: Box<F>) -> Self {
        Self {
            id: ListenerId::new(),
            priority,
            one_time,
            active: Cell::new(true),
            callback,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn deactivate(&self) {
        self.active.set(false);
    }
}

/// Listeners of one identifier.
pub(crate) struct ListenerList<F: ?Sized> {
    entries: Vec<Rc<Entry<F>>>,
}

impl<F: ?Sized> Default for ListenerList<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> ListenerList<F> {
    /// Insert after every entry of equal or higher priority.
    pub(crate) fn insert(&mut self, entry: Rc<Entry<F>>) {
        let at = self
            .entries
            .iter()
            .position(|existing| existing.priority < entry.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
    }

    /// Deactivate and drop the entry. Returns whether it was present.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if entry.id == id {
                entry.deactivate();
                false
            } else {
                true
            }
        });
        self.entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<Entry<F>>> {
        self.entries.clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn deactivate_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.deactivate();
        }
    }
}

struct HandleInner {
    removed: Cell<bool>,
    remove: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Returned by every `observe*` call.
///
/// Dropping the handle does not unregister anything: the removal registry
/// keeps a clone so the owner's disposal can still reach it. [`remove`] may be
/// called any number of times, from anywhere, including from inside a
/// listener that is currently firing.
///
/// [`remove`]: ListenerHandle::remove
#[derive(Clone)]
pub struct ListenerHandle {
    inner: Option<Rc<HandleInner>>,
}

impl ListenerHandle {
    pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Some(Rc::new(HandleInner {
                removed: Cell::new(false),
                remove: RefCell::new(Some(Box::new(remove))),
            })),
        }
    }

    /// A handle with nothing behind it.
    pub fn inert() -> Self {
        Self { inner: None }
    }

    /// Stop all future delivery to the listener.
    pub fn remove(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        if inner.removed.replace(true) {
            return;
        }
        let remove = inner.remove.borrow_mut().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether the listener can still fire.
    pub fn is_active(&self) -> bool {
        self.inner
            .as_ref()
            .map(|inner| !inner.removed.get())
            .unwrap_or(false)
    }

    pub fn is_inert(&self) -> bool {
        self.inner.is_none()
    }

    pub(crate) fn ptr_eq(&self, other: &ListenerHandle) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Mark removed without running the removal closure. Used when the
    /// listener has already been dropped by its manager.
    pub(crate) fn retire(&self) {
        if let Some(inner) = &self.inner {
            inner.removed.set(true);
            inner.remove.borrow_mut().take();
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("inert", &self.is_inert())
            .field("active", &self.is_active())
            .finish()
    }
}

type HandlesByIdentifier = IndexMap<String, Vec<ListenerHandle>>;

/// Per-owner record of every handle installed on the owner's behalf, shared
/// by all managers of one runtime.
#[derive(Clone, Default)]
pub(crate) struct RemovalRegistry(Rc<RefCell<HashMap<Uid, HandlesByIdentifier>>>);

impl RemovalRegistry {
    pub(crate) fn record(&self, uid: Uid, identifier: &str, handle: &ListenerHandle) {
        if handle.is_inert() {
            return;
        }
        self.0
            .borrow_mut()
            .entry(uid)
            .or_default()
            .entry(identifier.to_string())
            .or_default()
            .push(handle.clone());
    }

    /// Drop the entries of handles that have been removed.
    pub(crate) fn prune(&self, uid: Uid, identifier: &str) {
        let mut owners = self.0.borrow_mut();
        let Some(by_id) = owners.get_mut(&uid) else {
            return;
        };
        if let Some(handles) = by_id.get_mut(identifier) {
            handles.retain(ListenerHandle::is_active);
            if handles.is_empty() {
                by_id.shift_remove(identifier);
            }
        }
        if by_id.is_empty() {
            owners.remove(&uid);
        }
    }

    /// Take every handle recorded for `uid`.
    pub(crate) fn take(&self, uid: Uid) -> Vec<ListenerHandle> {
        self.0
            .borrow_mut()
            .remove(&uid)
            .map(|by_id| by_id.into_values().flatten().collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, uid: Uid) -> usize {
        self.0
            .borrow()
            .get(&uid)
            .map(|by_id| by_id.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<HashMap<Uid, HandlesByIdentifier>>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<RefCell<HashMap<Uid, HandlesByIdentifier>>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: i32) -> Rc<Entry<ValueCallback>> {
        let callback: Box<ValueCallback> = Box::new(|_: &Value, _: &Value| {});
        Rc::new(Entry::new(priority, false, callback))
    }

    #[test]
    fn uids_are_unique() {
        let a = Uid::new();
        let b = Uid::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn priority_then_insertion_order() {
        let mut list = ListenerList::default();
        let low = entry(0);
        let high = entry(10);
        let low2 = entry(0);
        let top = entry(CONTEXT_PRIORITY);
        list.insert(low.clone());
        list.insert(high.clone());
        list.insert(low2.clone());
        list.insert(top.clone());

        let order: Vec<ListenerId> = list.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![top.id, high.id, low.id, low2.id]);
    }

    #[test]
    fn removal_deactivates_snapshot_entries() {
        let mut list = ListenerList::default();
        let a = entry(0);
        list.insert(a.clone());
        let snapshot = list.snapshot();

        assert!(list.remove(a.id));
        assert!(!list.remove(a.id));
        assert!(list.is_empty());
        assert!(!snapshot[0].is_active());
    }

    #[test]
    fn handle_removal_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let handle = ListenerHandle::new(move || counter.set(counter.get() + 1));
        let clone = handle.clone();

        assert!(handle.is_active());
        handle.remove();
        clone.remove();
        handle.remove();
        assert_eq!(calls.get(), 1);
        assert!(!clone.is_active());

        let inert = ListenerHandle::inert();
        inert.remove();
        assert!(inert.is_inert());
        assert!(!inert.is_active());
    }

    #[test]
    fn registry_takes_everything_for_an_owner() {
        let registry = RemovalRegistry::default();
        let owner = Uid::new();
        let other = Uid::new();
        let a = ListenerHandle::new(|| {});
        let b = ListenerHandle::new(|| {});
        registry.record(owner, "x", &a);
        registry.record(owner, "y", &b);
        registry.record(other, "x", &ListenerHandle::new(|| {}));
        registry.record(owner, "z", &ListenerHandle::inert());
        assert_eq!(registry.count(owner), 2);

        a.remove();
        registry.prune(owner, "x");
        assert_eq!(registry.count(owner), 1);

        let taken = registry.take(owner);
        assert_eq!(taken.len(), 1);
        assert!(taken[0].ptr_eq(&b));
        assert_eq!(registry.count(owner), 0);
        assert_eq!(registry.count(other), 1);
    }
}
