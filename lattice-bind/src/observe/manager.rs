//! Context Manager
//!
//! Watches one owner's object graph and dispatches changes to listeners
//! registered by absolute identifier.
//!
//! # How It Works
//!
//! 1. `observe("a.b.c")` walks the path from the root and installs a slot
//!    hook on every prefix it can reach (`a`, `a.b`, `a.b.c`). Arrays met on
//!    the way are wrapped so their sequence operations report back. The
//!    identifier is recorded under each of its ancestors in the reverse
//!    index.
//!
//! 2. A write to a hooked slot:
//!    a. is dropped if old and new are the same value;
//!    b. reverts the slot to plain data if nothing observes it or anything
//!       below it any more;
//!    c. otherwise fires the identifier's own listeners, then revisits every
//!       observed descendant, re-hooking the slots that now live on new
//!       containers and firing those whose value actually changed.
//!
//! 3. A parent that is `undefined` or `null` defers the observation: the
//!    hooks above it are in place, so the listener fires once a write makes
//!    the path reachable.
//!
//! 4. An array mutation notifies the array's sequence listeners. `push` and
//!    `pop` only refresh `<array>.length`; operations that move existing
//!    items refresh every observed index below the array.
//!
//! # Re-entrancy
//!
//! The manager never holds its state borrow while calling a listener or
//! writing a container, so listeners may freely read, write, observe and
//! remove, including on the identifier that is firing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use super::array::{length_path, replacement, ArrayWatch};
use super::index::DescendantIndex;
use super::listener::{
    Entry, ListenerHandle, ListenerId, ListenerList, ListenerOptions, RemovalRegistry,
    SequenceCallback, Uid, ValueCallback,
};
use super::path::{is_index_segment, join_path, parent_and_key, split_path};
use crate::config::RuntimeConfig;
use crate::error::ObserveError;
use crate::value::{ArrayRef, ChangeRecord, HookTag, ObjectRef, SlotHook, Value};

/// A container slot a hook is installed on.
#[derive(Clone)]
enum Holder {
    Property(ObjectRef, String),
    Element(ArrayRef, usize),
}

impl Holder {
    fn same(&self, other: &Holder) -> bool {
        match (self, other) {
            (Holder::Property(a, ka), Holder::Property(b, kb)) => a.ptr_eq(b) && ka == kb,
            (Holder::Element(a, ia), Holder::Element(b, ib)) => a.ptr_eq(b) && ia == ib,
            _ => false,
        }
    }

    fn intercept(&self, tag: HookTag, hook: Rc<dyn SlotHook>) {
        match self {
            Holder::Property(object, key) => object.intercept(key, tag, hook),
            Holder::Element(array, index) => array.intercept(*index, tag, hook),
        }
    }

    fn release(&self, tag: &HookTag) -> bool {
        match self {
            Holder::Property(object, key) => object.release(key, tag),
            Holder::Element(array, index) => array.release(*index, tag),
        }
    }
}

/// A listener's handle and where the registry filed it.
struct Registration {
    uid: Uid,
    identifier: String,
    handle: ListenerHandle,
}

struct Installed {
    holder: Holder,
    generation: u64,
}

/// Slot hook installed for one identifier.
struct SlotWatch {
    manager: Weak<ManagerInner>,
    identifier: Rc<str>,
    generation: u64,
}

impl SlotHook for SlotWatch {
    fn on_read(&self, _value: &Value) {
        if let Some(manager) = self.manager.upgrade() {
            if let Ok(mut state) = manager.state.try_borrow_mut() {
                state.observed_identifier = Some(self.identifier.to_string());
            }
        }
    }

    fn on_write(&self, old: &Value, new: &Value) {
        if let Some(manager) = self.manager.upgrade() {
            manager.slot_written(&self.identifier, self.generation, old, new);
        }
    }
}

#[derive(Default)]
struct State {
    listeners: HashMap<String, ListenerList<ValueCallback>>,
    sequence_listeners: HashMap<String, ListenerList<SequenceCallback>>,
    handles: HashMap<ListenerId, Registration>,
    descendants: DescendantIndex,
    last_values: HashMap<String, Value>,
    installed: HashMap<String, Installed>,
    wrapped: HashMap<String, ArrayRef>,
    /// Resolved parents of observed identifiers. Every slot on the way to a
    /// cached parent is hooked, so any write that could change it clears the
    /// cache.
    parents: HashMap<String, Value>,
    observed_identifier: Option<String>,
    generation: u64,
    disposed: bool,
}

impl State {
    fn in_use(&self, identifier: &str) -> bool {
        self.listeners.contains_key(identifier) || self.sequence_listeners.contains_key(identifier)
    }
}

pub(crate) struct ManagerInner {
    id: u64,
    owner: Uid,
    root: Value,
    revert_unused: bool,
    registry: RemovalRegistry,
    state: RefCell<State>,
}

/// Observes one context root. Cloning shares the same manager.
#[derive(Clone)]
pub struct ContextManager {
    inner: Rc<ManagerInner>,
}

impl ContextManager {
    /// A manager for `root` outside any runtime.
    pub fn new(root: Value) -> Self {
        Self::attached(
            Uid::new(),
            root,
            &RuntimeConfig::default(),
            RemovalRegistry::default(),
        )
    }

    pub(crate) fn attached(
        owner: Uid,
        root: Value,
        config: &RuntimeConfig,
        registry: RemovalRegistry,
    ) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        debug!(manager = id, owner = %owner, "created context manager");
        Self {
            inner: Rc::new(ManagerInner {
                id,
                owner,
                root,
                revert_unused: config.revert_unused_slots,
                registry,
                state: RefCell::new(State::default()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn owner(&self) -> Uid {
        self.inner.owner
    }

    pub fn root(&self) -> &Value {
        &self.inner.root
    }

    /// The tag this manager's hooks carry for `identifier`.
    pub fn hook_tag(&self, identifier: &str) -> HookTag {
        self.inner.tag(identifier)
    }

    /// Register `listener` for changes of `identifier`.
    ///
    /// Addressing errors are logged and yield an inert handle.
    pub fn observe<F>(&self, identifier: &str, options: ListenerOptions, listener: F) -> ListenerHandle
    where
        F: Fn(&Value, &Value) + 'static,
    {
        match self.try_observe(identifier, options, listener) {
            Ok(handle) => handle,
            Err(ObserveError::EmptyIdentifier) => {
                debug!(manager = self.inner.id, "ignoring empty identifier");
                ListenerHandle::inert()
            }
            Err(err) => {
                warn!(manager = self.inner.id, error = %err, "observation not installed");
                ListenerHandle::inert()
            }
        }
    }

    /// Like [`ContextManager::observe`] but reports addressing errors.
    pub fn try_observe<F>(
        &self,
        identifier: &str,
        options: ListenerOptions,
        listener: F,
    ) -> Result<ListenerHandle, ObserveError>
    where
        F: Fn(&Value, &Value) + 'static,
    {
        let identifier = join_path(&split_path(identifier));
        if identifier.is_empty() {
            return Err(ObserveError::EmptyIdentifier);
        }

        let current = self.inner.probe(&identifier)?;
        if options.one_time && current.is_defined() {
            debug!(identifier = %identifier, "one-time identifier already defined");
            return Ok(ListenerHandle::inert());
        }

        let current = self.inner.resolve(&identifier, true);
        let entry = Rc::new(Entry::new(
            options.priority,
            options.one_time,
            Box::new(listener) as Box<ValueCallback>,
        ));
        let id = entry.id;
        let handle = self
            .inner
            .removal_handle(&identifier, options.uid, move |manager, identifier| {
                manager.remove_listener(identifier, id)
            });
        {
            let mut state = self.inner.state.borrow_mut();
            state
                .listeners
                .entry(identifier.clone())
                .or_default()
                .insert(entry);
            state.descendants.add(&identifier);
            state.last_values.insert(identifier.clone(), current);
            state.handles.insert(
                id,
                Registration {
                    uid: options.uid,
                    identifier: identifier.clone(),
                    handle: handle.clone(),
                },
            );
        }
        self.inner.registry.record(options.uid, &identifier, &handle);
        trace!(manager = self.inner.id, identifier = %identifier, "listener registered");
        Ok(handle)
    }

    /// Register `listener` for sequence mutations of the array observed at
    /// `identifier`.
    ///
    /// `old_array` is the instance previously registered for the same
    /// identifier, if any; its operations are restored before `array` is
    /// wrapped.
    pub fn observe_array_mutation<F>(
        &self,
        uid: Uid,
        identifier: &str,
        array: &ArrayRef,
        old_array: Option<&ArrayRef>,
        listener: F,
    ) -> ListenerHandle
    where
        F: Fn(&ArrayRef, &ChangeRecord) + 'static,
    {
        let identifier = join_path(&split_path(identifier));
        if identifier.is_empty() {
            debug!(manager = self.inner.id, "ignoring empty identifier");
            return ListenerHandle::inert();
        }

        let inner = &self.inner;
        if let Some(old) = old_array {
            if !old.ptr_eq(array) {
                old.unwrap(&inner.tag(&identifier));
            }
        }
        inner.wrap(&identifier, array);
        let current = match inner.probe(&identifier) {
            Ok(_) => inner.resolve(&identifier, true),
            Err(_) => Value::Array(array.clone()),
        };

        let entry = Rc::new(Entry::new(
            0,
            false,
            Box::new(listener) as Box<SequenceCallback>,
        ));
        let id = entry.id;
        let handle = inner.removal_handle(&identifier, uid, move |manager, identifier| {
            manager.remove_sequence_listener(identifier, id)
        });
        {
            let mut state = inner.state.borrow_mut();
            state
                .sequence_listeners
                .entry(identifier.clone())
                .or_default()
                .insert(entry);
            state.descendants.add(&identifier);
            state.last_values.entry(identifier.clone()).or_insert(current);
            state.handles.insert(
                id,
                Registration {
                    uid,
                    identifier: identifier.clone(),
                    handle: handle.clone(),
                },
            );
        }
        inner.registry.record(uid, &identifier, &handle);
        trace!(manager = inner.id, identifier = %identifier, "array listener registered");
        handle
    }

    /// Resolve a path from the root. With `observe` set, every slot on the
    /// way is hooked and the identifier becomes the observed identifier.
    pub fn get_context(&self, segments: &[&str], observe: bool) -> Value {
        let identifier = join_path(segments);
        if identifier.is_empty() {
            return self.inner.root.clone();
        }
        if !observe {
            return self.inner.probe(&identifier).unwrap_or_default();
        }
        let value = self.inner.resolve(&identifier, true);
        self.inner.state.borrow_mut().observed_identifier = Some(identifier);
        value
    }

    /// The identifier behind the most recent tracked read of a hooked slot.
    ///
    /// Evaluating an expression reads through the hooks, so after evaluating
    /// `@item.name` this names the absolute slot the value came from.
    pub fn observed_identifier(&self) -> Option<String> {
        self.inner.state.borrow().observed_identifier.clone()
    }

    pub fn take_observed_identifier(&self) -> Option<String> {
        self.inner.state.borrow_mut().observed_identifier.take()
    }

    /// Value and sequence listeners registered for `identifier`.
    pub fn listener_count(&self, identifier: &str) -> usize {
        let state = self.inner.state.borrow();
        state.listeners.get(identifier).map_or(0, ListenerList::len)
            + state.sequence_listeners.get(identifier).map_or(0, ListenerList::len)
    }

    /// Whether this manager currently has a hook on `identifier`'s slot.
    pub fn is_installed(&self, identifier: &str) -> bool {
        self.inner.state.borrow().installed.contains_key(identifier)
    }

    /// Whether this manager currently wraps the array at `identifier`.
    pub fn is_wrapping(&self, identifier: &str) -> bool {
        self.inner.state.borrow().wrapped.contains_key(identifier)
    }

    pub fn has_descendants(&self, identifier: &str) -> bool {
        self.inner.state.borrow().descendants.has_descendants(identifier)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Create missing containers along `path` below `root` and return the
    /// container at its end. A segment becomes an array when the segment
    /// after it is numeric, otherwise an object.
    pub fn create_context(root: &Value, path: &str) -> Value {
        let segments = split_path(path);
        let mut current = root.clone();
        for (i, segment) in segments.iter().enumerate() {
            let existing = current.get_member_untracked(segment);
            if existing.is_container() {
                current = existing;
                continue;
            }
            if !existing.is_nullish() {
                warn!(path, segment = *segment, kind = existing.type_name(), "cannot create context over a value");
                return Value::Undefined;
            }

            let next_is_index = segments.get(i + 1).is_some_and(|next| is_index_segment(next));
            let created = if next_is_index {
                Value::Array(ArrayRef::new())
            } else {
                Value::Object(ObjectRef::new())
            };
            match &current {
                Value::Object(object) => object.set(segment, created.clone()),
                Value::Array(array) if is_index_segment(segment) => {
                    let written = segment
                        .parse::<usize>()
                        .is_ok_and(|index| array.set(index, created.clone()));
                    if !written {
                        warn!(path, segment = *segment, "index out of range for context creation");
                        return Value::Undefined;
                    }
                }
                other => {
                    warn!(path, segment = *segment, kind = other.type_name(), "cannot create context below a primitive");
                    return Value::Undefined;
                }
            }
            current = created;
        }
        current
    }

    /// Release every hook this manager installed, restore every array it
    /// wrapped and drop all of its listeners.
    pub fn dispose(&self) {
        self.inner.teardown();
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ContextManager")
            .field("id", &self.inner.id)
            .field("owner", &self.inner.owner)
            .field("listeners", &state.listeners.len())
            .field("installed", &state.installed.len())
            .field("wrapped", &state.wrapped.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl ManagerInner {
    fn tag(&self, identifier: &str) -> HookTag {
        HookTag::new(self.id, identifier)
    }

    /// Read `identifier` without installing anything, failing when the path
    /// runs through a primitive.
    fn probe(&self, identifier: &str) -> Result<Value, ObserveError> {
        if let (Some(parent), key) = parent_and_key(identifier) {
            let cached = self.state.borrow().parents.get(parent).cloned();
            if let Some(holder) = cached {
                return Ok(holder.get_member_untracked(key));
            }
        }

        let segments = split_path(identifier);
        let mut current = self.root.clone();
        for (i, segment) in segments.iter().enumerate() {
            match &current {
                Value::Object(_) | Value::Array(_) => {}
                Value::Undefined | Value::Null => return Ok(Value::Undefined),
                Value::String(_) if *segment == "length" || is_index_segment(segment) => {}
                other => {
                    return Err(ObserveError::PrimitiveParent {
                        identifier: identifier.to_string(),
                        parent: join_path(&segments[..i]),
                        kind: other.type_name(),
                    })
                }
            }
            current = current.get_member_untracked(segment);
        }
        Ok(current)
    }

    /// Walk `identifier` from the root. With `install`, hook every reachable
    /// prefix and wrap every array on the way; prefixes that are no longer
    /// reachable lose their hooks.
    fn resolve(self: &Rc<Self>, identifier: &str, install: bool) -> Value {
        let segments = split_path(identifier);
        let mut current = self.root.clone();
        let mut prefix = String::with_capacity(identifier.len());

        for (i, segment) in segments.iter().enumerate() {
            let parent = prefix.clone();
            if i > 0 {
                prefix.push('.');
            }
            prefix.push_str(segment);

            if install && i + 1 == segments.len() && current.is_container() {
                self.state
                    .borrow_mut()
                    .parents
                    .insert(parent.clone(), current.clone());
            }

            let step = match &current {
                Value::Object(object) => Some((
                    Some(Holder::Property(object.clone(), segment.to_string())),
                    object.get_untracked(segment),
                )),
                Value::Array(array) => {
                    if install && !parent.is_empty() {
                        self.wrap(&parent, array);
                    }
                    if *segment == "length" {
                        Some((None, Value::from(array.len())))
                    } else {
                        segment.parse::<usize>().ok().map(|index| {
                            (
                                Some(Holder::Element(array.clone(), index)),
                                array.get_untracked(index),
                            )
                        })
                    }
                }
                Value::String(_) => Some((None, current.get_member_untracked(segment))),
                _ => None,
            };

            let Some((holder, value)) = step else {
                if install {
                    for depth in i..segments.len() {
                        self.release_slot(&join_path(&segments[..=depth]));
                    }
                }
                return Value::Undefined;
            };
            if install {
                match holder {
                    Some(holder) => self.install(&prefix, holder),
                    None => self.release_slot(&prefix),
                }
            }
            current = value;
        }
        current
    }

    fn install(self: &Rc<Self>, identifier: &str, holder: Holder) {
        let (previous, generation) = {
            let mut state = self.state.borrow_mut();
            if let Some(existing) = state.installed.get(identifier) {
                if existing.holder.same(&holder) {
                    return;
                }
            }
            state.generation += 1;
            let generation = state.generation;
            let previous = state.installed.insert(
                identifier.to_string(),
                Installed {
                    holder: holder.clone(),
                    generation,
                },
            );
            (previous, generation)
        };

        let tag = self.tag(identifier);
        if let Some(previous) = previous {
            previous.holder.release(&tag);
        }
        holder.intercept(
            tag,
            Rc::new(SlotWatch {
                manager: Rc::downgrade(self),
                identifier: Rc::from(identifier),
                generation,
            }),
        );
        trace!(manager = self.id, identifier, "installed slot hook");
    }

    fn release_slot(&self, identifier: &str) {
        let installed = {
            let mut state = self.state.borrow_mut();
            state.parents.clear();
            state.installed.remove(identifier)
        };
        if let Some(installed) = installed {
            installed.holder.release(&self.tag(identifier));
            trace!(manager = self.id, identifier, "released slot hook");
        }
    }

    fn wrap(self: &Rc<Self>, identifier: &str, array: &ArrayRef) {
        let previous = {
            let mut state = self.state.borrow_mut();
            if let Some(existing) = state.wrapped.get(identifier) {
                if existing.ptr_eq(array) {
                    return;
                }
            }
            state.wrapped.insert(identifier.to_string(), array.clone())
        };

        let tag = self.tag(identifier);
        if let Some(previous) = previous {
            previous.unwrap(&tag);
        }
        array.wrap(tag, Rc::new(ArrayWatch::new(Rc::downgrade(self), identifier)));
        trace!(manager = self.id, identifier, "wrapped array");
    }

    fn unwrap_at(&self, identifier: &str) {
        let wrapped = self.state.borrow_mut().wrapped.remove(identifier);
        if let Some(array) = wrapped {
            array.unwrap(&self.tag(identifier));
            trace!(manager = self.id, identifier, "restored array");
        }
    }

    /// Drop the hooks of an identifier nothing depends on any more.
    fn revert(&self, identifier: &str) {
        self.state.borrow_mut().last_values.remove(identifier);
        self.release_slot(identifier);
        self.unwrap_at(identifier);
        debug!(manager = self.id, identifier, "reverted unused slot to plain data");
    }

    fn slot_written(self: &Rc<Self>, identifier: &str, generation: u64, old: &Value, new: &Value) {
        if old.same(new) {
            return;
        }
        let (in_use, has_descendants) = {
            let state = self.state.borrow();
            let current = state
                .installed
                .get(identifier)
                .is_some_and(|installed| installed.generation == generation);
            if !current || state.disposed {
                return;
            }
            (state.in_use(identifier), state.descendants.has_descendants(identifier))
        };

        if !in_use && !has_descendants {
            if self.revert_unused {
                self.revert(identifier);
            }
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            state.parents.clear();
            if in_use {
                state.last_values.insert(identifier.to_string(), new.clone());
            }
        }
        self.hand_off_array(identifier, old, new);
        self.notify(identifier, new, old);
        if has_descendants {
            self.propagate(identifier);
        }
    }

    pub(crate) fn sequence_mutated(
        self: &Rc<Self>,
        identifier: &str,
        array: &ArrayRef,
        record: &ChangeRecord,
    ) {
        let (current, in_use, has_descendants) = {
            let state = self.state.borrow();
            (
                state
                    .wrapped
                    .get(identifier)
                    .is_some_and(|wrapped| wrapped.ptr_eq(array)),
                state.in_use(identifier),
                state.descendants.has_descendants(identifier),
            )
        };
        if !current {
            array.unwrap(&self.tag(identifier));
            return;
        }
        if !in_use && !has_descendants {
            if self.revert_unused {
                self.unwrap_at(identifier);
            }
            return;
        }

        self.state.borrow_mut().parents.clear();
        trace!(manager = self.id, identifier, kind = ?record.kind, "array mutated");
        self.notify_sequence(identifier, array, record);
        if record.kind.shifts_indices() {
            self.propagate(identifier);
        } else {
            self.refresh(&length_path(identifier));
        }
    }

    /// Move the array wrapping at `identifier` from `old` to `new`, telling
    /// sequence listeners about the swap.
    fn hand_off_array(self: &Rc<Self>, identifier: &str, old: &Value, new: &Value) {
        let (sequence_listeners, has_descendants) = {
            let state = self.state.borrow();
            (
                state.sequence_listeners.contains_key(identifier),
                state.descendants.has_descendants(identifier),
            )
        };
        match new {
            Value::Array(array) if sequence_listeners || has_descendants => {
                self.wrap(identifier, array);
                if sequence_listeners {
                    self.notify_sequence(identifier, array, &replacement(old, array));
                }
            }
            _ => self.unwrap_at(identifier),
        }
    }

    /// Revisit every observed identifier below `ancestor`.
    fn propagate(self: &Rc<Self>, ancestor: &str) {
        let descendants = self.state.borrow().descendants.descendants(ancestor);
        trace!(manager = self.id, ancestor, count = descendants.len(), "propagating");
        for identifier in descendants {
            self.refresh(&identifier);
        }
    }

    /// Re-resolve one identifier and fire its listeners if its value changed.
    fn refresh(self: &Rc<Self>, identifier: &str) {
        if !self.state.borrow().in_use(identifier) {
            return;
        }
        let value = self.resolve(identifier, true);
        let old = self
            .state
            .borrow_mut()
            .last_values
            .insert(identifier.to_string(), value.clone())
            .unwrap_or_default();
        if old.same(&value) {
            return;
        }
        self.hand_off_array(identifier, &old, &value);
        self.notify(identifier, &value, &old);
    }

    fn notify(&self, identifier: &str, new: &Value, old: &Value) {
        let snapshot = match self.state.borrow().listeners.get(identifier) {
            Some(list) => list.snapshot(),
            None => return,
        };
        trace!(manager = self.id, identifier, listeners = snapshot.len(), "notifying");
        for entry in snapshot {
            if !entry.is_active() {
                continue;
            }
            if entry.one_time {
                if new.is_undefined() {
                    continue;
                }
                let handle = self
                    .state
                    .borrow()
                    .handles
                    .get(&entry.id)
                    .map(|registration| registration.handle.clone());
                match handle {
                    Some(handle) => handle.remove(),
                    None => entry.deactivate(),
                }
            }
            (entry.callback)(new, old);
        }
    }

    fn notify_sequence(&self, identifier: &str, array: &ArrayRef, record: &ChangeRecord) {
        let snapshot = match self.state.borrow().sequence_listeners.get(identifier) {
            Some(list) => list.snapshot(),
            None => return,
        };
        for entry in snapshot {
            if entry.is_active() {
                (entry.callback)(array, record);
            }
        }
    }

    /// A handle whose removal runs `remove` on this manager and drops the
    /// registry entry.
    fn removal_handle<F>(self: &Rc<Self>, identifier: &str, uid: Uid, remove: F) -> ListenerHandle
    where
        F: FnOnce(&ManagerInner, &str) + 'static,
    {
        let manager = Rc::downgrade(self);
        let registry = self.registry.downgrade();
        let identifier = identifier.to_string();
        ListenerHandle::new(move || {
            if let Some(manager) = manager.upgrade() {
                remove(&*manager, identifier.as_str());
            }
            if let Some(registry) = RemovalRegistry::upgrade(&registry) {
                registry.prune(uid, &identifier);
            }
        })
    }

    fn remove_listener(&self, identifier: &str, id: ListenerId) {
        let mut state = self.state.borrow_mut();
        let emptied = match state.listeners.get_mut(identifier) {
            Some(list) => {
                list.remove(id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            state.listeners.remove(identifier);
        }
        state.handles.remove(&id);
        Self::forget_if_unused(&mut state, identifier);
    }

    fn remove_sequence_listener(&self, identifier: &str, id: ListenerId) {
        let mut state = self.state.borrow_mut();
        let emptied = match state.sequence_listeners.get_mut(identifier) {
            Some(list) => {
                list.remove(id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            state.sequence_listeners.remove(identifier);
        }
        state.handles.remove(&id);
        Self::forget_if_unused(&mut state, identifier);
    }

    /// Hooks stay in place until the next write reaches them; only the
    /// bookkeeping goes now.
    fn forget_if_unused(state: &mut State, identifier: &str) {
        if !state.in_use(identifier) {
            state.descendants.remove(identifier);
            state.last_values.remove(identifier);
        }
    }

    fn teardown(&self) {
        let (installed, wrapped, handles) = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            for list in state.listeners.values_mut() {
                list.deactivate_all();
            }
            for list in state.sequence_listeners.values_mut() {
                list.deactivate_all();
            }
            state.listeners.clear();
            state.sequence_listeners.clear();
            state.descendants.clear();
            state.last_values.clear();
            state.parents.clear();
            state.observed_identifier = None;
            (
                std::mem::take(&mut state.installed),
                std::mem::take(&mut state.wrapped),
                std::mem::take(&mut state.handles),
            )
        };

        for (identifier, slot) in &installed {
            slot.holder.release(&self.tag(identifier));
        }
        for (identifier, array) in &wrapped {
            array.unwrap(&self.tag(identifier));
        }
        for registration in handles.values() {
            registration.handle.retire();
            self.registry.prune(registration.uid, &registration.identifier);
        }
        debug!(
            manager = self.id,
            owner = %self.owner,
            slots = installed.len(),
            arrays = wrapped.len(),
            "context manager disposed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::listener::CONTEXT_PRIORITY;
    use crate::value::ChangeKind;
    use serde_json::json;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<(Value, Value)>>>;

    fn recorder() -> (Log, impl Fn(&Value, &Value) + 'static) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |new: &Value, old: &Value| {
            sink.borrow_mut().push((new.clone(), old.clone()))
        })
    }

    fn manager_for(json: serde_json::Value) -> (ContextManager, ObjectRef) {
        let root = Value::from(json);
        let object = root.as_object().cloned().unwrap();
        (ContextManager::new(root), object)
    }

    fn opts() -> ListenerOptions {
        ListenerOptions::new(Uid::new())
    }

    // -------------------------------------------------------------------------
    // Slot writes
    // -------------------------------------------------------------------------

    #[test]
    fn identical_writes_are_suppressed() {
        let (manager, root) = manager_for(json!({"a": {"b": 1}}));
        let (log, listener) = recorder();
        manager.observe("a.b", opts(), listener);

        let a = root.get("a").as_object().cloned().unwrap();
        a.set("b", 1);
        assert!(log.borrow().is_empty());

        a.set("b", 2);
        assert_eq!(*log.borrow(), vec![(Value::from(2), Value::from(1))]);
    }

    #[test]
    fn every_prefix_is_hooked() {
        let (manager, root) = manager_for(json!({"a": {"b": {"c": 1}}}));
        manager.observe("a.b.c", opts(), |_, _| {});

        assert!(manager.is_installed("a"));
        assert!(manager.is_installed("a.b"));
        assert!(manager.is_installed("a.b.c"));
        assert!(root.is_intercepted("a"));
        assert!(manager.has_descendants("a"));
    }

    #[test]
    fn hooks_carry_the_manager_tag() {
        let (manager, root) = manager_for(json!({"list": [1, 2]}));
        let other = ContextManager::new(Value::Object(root.clone()));
        manager.observe("list.0", opts(), |_, _| {});

        let list = root.get("list").as_array().cloned().unwrap();
        assert!(list.is_wrapped_by(&manager.hook_tag("list")));
        assert!(!list.is_wrapped_by(&other.hook_tag("list")));
        assert!(root.is_intercepted_by("list", &manager.hook_tag("list")));

        manager.dispose();
        assert!(!list.is_wrapped_by(&manager.hook_tag("list")));
    }

    #[test]
    fn descendants_follow_replaced_parents() {
        let (manager, root) = manager_for(json!({"a": {"b": {"c": 1}}}));
        let (parent_log, parent) = recorder();
        let (child_log, child) = recorder();
        manager.observe("a.b", opts(), parent);
        manager.observe("a.b.c", opts(), child);

        let a = root.get("a").as_object().cloned().unwrap();
        let old_b = a.get("b").as_object().cloned().unwrap();
        a.set("b", Value::from(json!({"c": 2})));

        assert_eq!(parent_log.borrow().len(), 1);
        assert_eq!(*child_log.borrow(), vec![(Value::from(2), Value::from(1))]);

        // the detached object no longer reports
        assert!(!old_b.is_intercepted("c"));
        old_b.set("c", 7);
        assert_eq!(child_log.borrow().len(), 1);

        a.get("b").as_object().unwrap().set("c", 3);
        assert_eq!(child_log.borrow().len(), 2);
    }

    #[test]
    fn unchanged_descendants_stay_quiet() {
        let (manager, root) = manager_for(json!({"a": {"x": 1, "y": 2}}));
        let (x_log, x) = recorder();
        let (y_log, y) = recorder();
        manager.observe("a.x", opts(), x);
        manager.observe("a.y", opts(), y);

        root.set("a", Value::from(json!({"x": 1, "y": 5})));
        assert!(x_log.borrow().is_empty());
        assert_eq!(*y_log.borrow(), vec![(Value::from(5), Value::from(2))]);
    }

    #[test]
    fn deferred_paths_fire_once_reachable() {
        let (manager, root) = manager_for(json!({}));
        let (log, listener) = recorder();
        manager.observe("user.name", opts(), listener);
        assert!(log.borrow().is_empty());

        root.set("user", Value::from(json!({"name": "Ada"})));
        assert_eq!(*log.borrow(), vec![(Value::from("Ada"), Value::Undefined)]);

        root.set("user", Value::Null);
        assert_eq!(log.borrow().len(), 2);
        assert!(log.borrow()[1].0.is_undefined());
    }

    #[test]
    fn primitive_parents_are_rejected() {
        let (manager, root) = manager_for(json!({"count": 3, "name": "Ada"}));
        let err = manager
            .try_observe("count.value", opts(), |_, _| {})
            .unwrap_err();
        assert_eq!(
            err,
            ObserveError::PrimitiveParent {
                identifier: "count.value".into(),
                parent: "count".into(),
                kind: "number",
            }
        );

        let handle = manager.observe("count.value", opts(), |_, _| panic!("never fires"));
        assert!(handle.is_inert());
        root.set("count", 4);

        let (log, listener) = recorder();
        manager.observe("name.length", opts(), listener);
        root.set("name", "Grace");
        assert_eq!(*log.borrow(), vec![(Value::from(5), Value::from(3))]);
    }

    #[test]
    fn empty_identifiers_are_inert() {
        let (manager, _) = manager_for(json!({}));
        assert!(manager.observe("", opts(), |_, _| {}).is_inert());
        assert_eq!(
            manager.try_observe("..", opts(), |_, _| {}).unwrap_err(),
            ObserveError::EmptyIdentifier
        );
    }

    // -------------------------------------------------------------------------
    // Removal and revert
    // -------------------------------------------------------------------------

    #[test]
    fn unused_slots_revert_on_next_write() {
        let (manager, root) = manager_for(json!({"v": 1}));
        let (log, listener) = recorder();
        let handle = manager.observe("v", opts(), listener);
        assert!(root.is_intercepted("v"));

        handle.remove();
        handle.remove();
        assert!(root.is_intercepted("v"));

        root.set("v", 2);
        assert!(log.borrow().is_empty());
        assert!(!root.is_intercepted("v"));
        assert!(!manager.is_installed("v"));
    }

    #[test]
    fn revert_can_be_disabled() {
        let config = RuntimeConfig {
            revert_unused_slots: false,
            ..RuntimeConfig::default()
        };
        let root = Value::from(json!({"v": 1}));
        let manager = ContextManager::attached(Uid::new(), root.clone(), &config, RemovalRegistry::default());
        manager.observe("v", opts(), |_, _| {}).remove();

        root.as_object().unwrap().set("v", 2);
        assert!(manager.is_installed("v"));
    }

    #[test]
    fn priorities_order_listeners() {
        let (manager, root) = manager_for(json!({"v": 0}));
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, priority) in [("low", 0), ("high", 5), ("low2", 0), ("context", CONTEXT_PRIORITY)] {
            let order = order.clone();
            manager.observe("v", opts().priority(priority), move |_, _| {
                order.borrow_mut().push(name)
            });
        }

        root.set("v", 1);
        assert_eq!(*order.borrow(), vec!["context", "high", "low", "low2"]);
    }

    #[test]
    fn one_time_listeners_fire_once() {
        let (manager, root) = manager_for(json!({}));
        let (log, listener) = recorder();
        let handle = manager.observe("x", opts().one_time(true), listener);

        root.set("x", 5);
        root.set("x", 6);
        assert_eq!(*log.borrow(), vec![(Value::from(5), Value::Undefined)]);
        assert!(!handle.is_active());
        assert_eq!(manager.listener_count("x"), 0);
    }

    #[test]
    fn one_time_on_defined_value_is_not_registered() {
        let (manager, root) = manager_for(json!({"x": 1}));
        let handle = manager.observe("x", opts().one_time(true), |_, _| panic!("never fires"));
        assert!(handle.is_inert());
        assert!(!root.is_intercepted("x"));
        root.set("x", 2);
    }

    // -------------------------------------------------------------------------
    // Arrays
    // -------------------------------------------------------------------------

    #[test]
    fn length_follows_push_and_pop() {
        let (manager, root) = manager_for(json!({"list": [1, 2]}));
        let (log, listener) = recorder();
        manager.observe("list.length", opts(), listener);
        assert!(manager.is_wrapping("list"));

        let list = root.get("list").as_array().cloned().unwrap();
        list.push(3);
        list.pop();
        assert_eq!(
            *log.borrow(),
            vec![(Value::from(3), Value::from(2)), (Value::from(2), Value::from(3))]
        );
    }

    #[test]
    fn replacing_an_array_moves_the_wrapping() {
        let (manager, root) = manager_for(json!({"list": [1]}));
        let old = root.get("list").as_array().cloned().unwrap();
        let records = Rc::new(RefCell::new(Vec::new()));
        let sink = records.clone();
        manager.observe_array_mutation(Uid::new(), "list", &old, None, move |_, record| {
            sink.borrow_mut().push(record.kind)
        });
        assert!(old.is_wrapped());

        let new = ArrayRef::from_vec(vec![Value::from(1), Value::from(2)]);
        root.set("list", new.clone());
        assert!(!old.is_wrapped());
        assert!(new.is_wrapped());

        old.push(9);
        new.push(3);
        assert_eq!(
            *records.borrow(),
            vec![ChangeKind::Replace, ChangeKind::Push]
        );
    }

    // -------------------------------------------------------------------------
    // Context helpers
    // -------------------------------------------------------------------------

    #[test]
    fn get_context_records_the_identifier() {
        let (manager, root) = manager_for(json!({"a": {"b": 1}}));
        assert_eq!(manager.get_context(&["a", "b"], false), Value::from(1));
        assert!(!root.is_intercepted("a"));

        assert_eq!(manager.get_context(&["a", "b"], true), Value::from(1));
        assert!(root.is_intercepted("a"));
        assert_eq!(manager.take_observed_identifier().as_deref(), Some("a.b"));

        manager.observe("a.b", opts(), |_, _| {});
        let _ = root.get("a").get_member("b");
        assert_eq!(manager.observed_identifier().as_deref(), Some("a.b"));
        assert!(manager.get_context(&[], false).same(manager.root()));
    }

    #[test]
    fn create_context_builds_missing_containers() {
        let root = Value::from(json!({"keep": {"x": 1}}));
        let created = ContextManager::create_context(&root, "items.0.meta");
        assert!(created.as_object().is_some());
        assert_eq!(root.to_json(), json!({"keep": {"x": 1}, "items": [{"meta": {}}]}));

        let existing = ContextManager::create_context(&root, "keep");
        assert_eq!(existing.to_json(), json!({"x": 1}));

        assert!(ContextManager::create_context(&root, "keep.x.y").is_undefined());
    }

    #[test]
    fn create_context_refuses_huge_indexes() {
        let root = Value::from(json!({}));
        assert!(ContextManager::create_context(&root, "rows.18446744073709551615.x").is_undefined());
        assert!(ContextManager::create_context(&root, "rows.4000000000").is_undefined());
        assert_eq!(root.to_json(), json!({"rows": []}));

        assert!(ContextManager::create_context(&root, "rows.2").as_object().is_some());
        assert_eq!(root.to_json(), json!({"rows": [null, null, {}]}));
    }

    #[test]
    fn dispose_restores_plain_data() {
        let (manager, root) = manager_for(json!({"a": {"b": 1}, "list": [1]}));
        let (log, listener) = recorder();
        let handle = manager.observe("a.b", opts(), listener);
        let list = root.get("list").as_array().cloned().unwrap();
        manager.observe_array_mutation(Uid::new(), "list", &list, None, |_, _| panic!("restored"));

        manager.dispose();
        manager.dispose();

        assert!(manager.is_disposed());
        assert!(!handle.is_active());
        assert!(!root.is_intercepted("a"));
        assert!(!list.is_wrapped());
        root.get("a").as_object().unwrap().set("b", 2);
        list.push(2);
        assert!(log.borrow().is_empty());
        handle.remove();
    }
}
