//! Array containers, element hooks and sequence hooks.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::warn;

use super::object::{HookList, HookTag, SlotHook};
use super::Value;

/// How far past the current end a single write may pad with `Undefined`.
pub const MAX_PADDING: usize = 1 << 16;

/// The sequence operation that produced a [`ChangeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Push,
    Pop,
    Shift,
    Unshift,
    Reverse,
    Sort,
    Splice,
    /// The whole array was swapped for another instance.
    Replace,
}

impl ChangeKind {
    /// Whether the operation moves items that were already in the array to
    /// different indexes.
    pub fn shifts_indices(self) -> bool {
        !matches!(self, ChangeKind::Push | ChangeKind::Pop)
    }
}

/// Structured description of one sequence mutation.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// First index touched by the operation.
    pub index: usize,
    /// Number of items inserted.
    pub added_count: usize,
    /// Items taken out, in their original order.
    pub removed: Vec<Value>,
    /// Contents before the operation, kept for reorderings and replacements.
    pub old_array: Option<Vec<Value>>,
}

impl ChangeRecord {
    fn new(kind: ChangeKind, index: usize, added_count: usize, removed: Vec<Value>) -> Self {
        Self {
            kind,
            index,
            added_count,
            removed,
            old_array: None,
        }
    }
}

/// Receives a [`ChangeRecord`] after every mutating sequence operation.
pub trait SequenceHook {
    fn on_mutation(&self, array: &ArrayRef, record: &ChangeRecord);
}

#[derive(Default)]
struct ArrayData {
    items: Vec<Value>,
    element_hooks: HashMap<usize, HookList>,
    sequence_hooks: SmallVec<[(HookTag, Rc<dyn SequenceHook>); 1]>,
}

/// Shared handle to a mutable array.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<ArrayData>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayData {
            items,
            ..ArrayData::default()
        })))
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    /// Snapshot of the current items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Read an element, notifying read hooks on that index.
    pub fn get(&self, index: usize) -> Value {
        let (value, hooks) = {
            let data = self.0.borrow();
            (
                data.items.get(index).cloned().unwrap_or_default(),
                data.element_hooks.get(&index).cloned().unwrap_or_default(),
            )
        };
        for (_, hook) in &hooks {
            hook.on_read(&value);
        }
        value
    }

    pub fn get_untracked(&self, index: usize) -> Value {
        self.0.borrow().items.get(index).cloned().unwrap_or_default()
    }

    /// Write an element. Writing past the end pads with `Undefined`, up to
    /// [`MAX_PADDING`] slots; further writes are refused and return `false`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let value = value.into();
        let (old, hooks) = {
            let mut data = self.0.borrow_mut();
            let len = data.items.len();
            if index >= len {
                match index.checked_add(1) {
                    Some(new_len) if new_len - len <= MAX_PADDING => {
                        data.items.resize(new_len, Value::Undefined)
                    }
                    _ => {
                        warn!(index, len, "refusing to write far past the end of an array");
                        return false;
                    }
                }
            }
            let old = std::mem::replace(&mut data.items[index], value.clone());
            (old, data.element_hooks.get(&index).cloned().unwrap_or_default())
        };
        for (_, hook) in &hooks {
            hook.on_write(&old, &value);
        }
        true
    }

    pub fn intercept(&self, index: usize, tag: HookTag, hook: Rc<dyn SlotHook>) {
        let mut data = self.0.borrow_mut();
        let hooks = data.element_hooks.entry(index).or_default();
        match hooks.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = hook,
            None => hooks.push((tag, hook)),
        }
    }

    pub fn release(&self, index: usize, tag: &HookTag) -> bool {
        let mut data = self.0.borrow_mut();
        let Some(hooks) = data.element_hooks.get_mut(&index) else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|(t, _)| t != tag);
        let found = hooks.len() != before;
        if hooks.is_empty() {
            data.element_hooks.remove(&index);
        }
        found
    }

    pub fn is_intercepted(&self, index: usize) -> bool {
        self.0.borrow().element_hooks.contains_key(&index)
    }

    pub fn is_intercepted_by(&self, index: usize, tag: &HookTag) -> bool {
        self.0
            .borrow()
            .element_hooks
            .get(&index)
            .map(|hooks| hooks.iter().any(|(t, _)| t == tag))
            .unwrap_or(false)
    }

    /// Route this instance's mutating operations through `hook`.
    pub fn wrap(&self, tag: HookTag, hook: Rc<dyn SequenceHook>) {
        let mut data = self.0.borrow_mut();
        match data.sequence_hooks.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = hook,
            None => data.sequence_hooks.push((tag, hook)),
        }
    }

    /// Restore plain sequence operations for `tag`.
    pub fn unwrap(&self, tag: &HookTag) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.sequence_hooks.len();
        data.sequence_hooks.retain(|(t, _)| t != tag);
        data.sequence_hooks.len() != before
    }

    pub fn is_wrapped(&self) -> bool {
        !self.0.borrow().sequence_hooks.is_empty()
    }

    pub fn is_wrapped_by(&self, tag: &HookTag) -> bool {
        self.0.borrow().sequence_hooks.iter().any(|(t, _)| t == tag)
    }

    pub fn push(&self, value: impl Into<Value>) -> usize {
        let (len, record) = {
            let mut data = self.0.borrow_mut();
            let index = data.items.len();
            data.items.push(value.into());
            (index + 1, ChangeRecord::new(ChangeKind::Push, index, 1, Vec::new()))
        };
        self.report(record);
        len
    }

    pub fn pop(&self) -> Value {
        let popped = {
            let mut data = self.0.borrow_mut();
            data.items.pop().map(|v| (data.items.len(), v))
        };
        match popped {
            Some((index, value)) => {
                self.report(ChangeRecord::new(ChangeKind::Pop, index, 0, vec![value.clone()]));
                value
            }
            None => Value::Undefined,
        }
    }

    pub fn shift(&self) -> Value {
        let shifted = {
            let mut data = self.0.borrow_mut();
            if data.items.is_empty() {
                None
            } else {
                Some(data.items.remove(0))
            }
        };
        match shifted {
            Some(value) => {
                self.report(ChangeRecord::new(ChangeKind::Shift, 0, 0, vec![value.clone()]));
                value
            }
            None => Value::Undefined,
        }
    }

    pub fn unshift<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        let (len, added) = {
            let mut data = self.0.borrow_mut();
            let mut items: Vec<Value> = values.into_iter().collect();
            let added = items.len();
            items.append(&mut data.items);
            data.items = items;
            (data.items.len(), added)
        };
        if added > 0 {
            self.report(ChangeRecord::new(ChangeKind::Unshift, 0, added, Vec::new()));
        }
        len
    }

    pub fn reverse(&self) {
        let old = {
            let mut data = self.0.borrow_mut();
            let old = data.items.clone();
            data.items.reverse();
            old
        };
        let mut record = ChangeRecord::new(ChangeKind::Reverse, 0, 0, Vec::new());
        record.old_array = Some(old);
        self.report(record);
    }

    /// Sort in place with the default template ordering (string form,
    /// `Undefined` last).
    pub fn sort(&self) {
        self.sort_by(Value::default_sort_order);
    }

    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let old = {
            let mut data = self.0.borrow_mut();
            let old = data.items.clone();
            data.items.sort_by(compare);
            old
        };
        let mut record = ChangeRecord::new(ChangeKind::Sort, 0, 0, Vec::new());
        record.old_array = Some(old);
        self.report(record);
    }

    /// Remove `delete_count` items at `start` and insert `items` in their
    /// place. Returns the removed items.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let (record, removed) = {
            let mut data = self.0.borrow_mut();
            let start = start.min(data.items.len());
            let end = start.saturating_add(delete_count).min(data.items.len());
            let inserted: Vec<Value> = items.into_iter().collect();
            let added = inserted.len();
            let removed: Vec<Value> = data.items.splice(start..end, inserted).collect();
            (
                ChangeRecord::new(ChangeKind::Splice, start, added, removed.clone()),
                removed,
            )
        };
        if record.added_count > 0 || !record.removed.is_empty() {
            self.report(record);
        }
        removed
    }

    fn report(&self, record: ChangeRecord) {
        let hooks: Vec<Rc<dyn SequenceHook>> = self
            .0
            .borrow()
            .sequence_hooks
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook.on_mutation(self, &record);
        }
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<ChangeRecord>>);

    impl SequenceHook for Recorder {
        fn on_mutation(&self, _array: &ArrayRef, record: &ChangeRecord) {
            self.0.borrow_mut().push(record.clone());
        }
    }

    fn numbers(items: &[i32]) -> ArrayRef {
        ArrayRef::from_vec(items.iter().map(|n| Value::from(*n)).collect())
    }

    fn as_numbers(array: &ArrayRef) -> Vec<f64> {
        array.to_vec().iter().map(Value::to_number).collect()
    }

    #[test]
    fn unwrapped_operations_behave_like_vec() {
        let array = numbers(&[3, 1, 2]);
        array.push(Value::from(4));
        assert_eq!(array.pop(), Value::from(4));
        assert_eq!(array.shift(), Value::from(3));
        array.unshift([Value::from(9)]);
        array.sort();
        assert_eq!(as_numbers(&array), vec![1.0, 2.0, 9.0]);
        array.reverse();
        assert_eq!(as_numbers(&array), vec![9.0, 2.0, 1.0]);
    }

    #[test]
    fn wrapped_operations_report_change_records() {
        let array = numbers(&[1, 2, 3]);
        let recorder = Rc::new(Recorder::default());
        array.wrap(HookTag::new(1, "list"), recorder.clone());

        array.push(Value::from(4));
        array.shift();
        let removed = array.splice(1, 1, [Value::from(7), Value::from(8)]);

        let records = recorder.0.borrow();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].kind, ChangeKind::Push);
        assert_eq!(records[0].index, 3);
        assert_eq!(records[0].added_count, 1);
        assert!(records[0].removed.is_empty());

        assert_eq!(records[1].kind, ChangeKind::Shift);
        assert_eq!(records[1].removed, vec![Value::from(1)]);

        assert_eq!(records[2].kind, ChangeKind::Splice);
        assert_eq!(records[2].index, 1);
        assert_eq!(records[2].added_count, 2);
        assert_eq!(removed, vec![Value::from(3)]);
        assert_eq!(as_numbers(&array), vec![2.0, 7.0, 8.0, 4.0]);
    }

    #[test]
    fn reorderings_carry_the_old_contents() {
        let array = numbers(&[2, 1]);
        let recorder = Rc::new(Recorder::default());
        array.wrap(HookTag::new(1, "list"), recorder.clone());

        array.sort();
        let records = recorder.0.borrow();
        assert_eq!(records[0].kind, ChangeKind::Sort);
        assert_eq!(
            records[0].old_array.as_deref(),
            Some(&[Value::from(2), Value::from(1)][..])
        );
    }

    #[test]
    fn unwrap_restores_plain_operations() {
        let array = numbers(&[]);
        let tag = HookTag::new(1, "list");
        let recorder = Rc::new(Recorder::default());
        array.wrap(tag.clone(), recorder.clone());

        assert!(array.unwrap(&tag));
        assert!(!array.unwrap(&tag));
        assert!(!array.is_wrapped());

        array.push(Value::from(1));
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn empty_removals_do_not_report() {
        let array = numbers(&[]);
        let recorder = Rc::new(Recorder::default());
        array.wrap(HookTag::new(1, "list"), recorder.clone());

        assert!(array.pop().is_undefined());
        assert!(array.shift().is_undefined());
        assert!(array.splice(0, 3, []).is_empty());
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn set_past_the_end_pads() {
        let array = numbers(&[1]);
        assert!(array.set(3, "x"));
        assert_eq!(array.len(), 4);
        assert!(array.get(2).is_undefined());
    }

    #[test]
    fn far_writes_are_refused() {
        let array = numbers(&[1]);
        assert!(!array.set(usize::MAX, "x"));
        assert!(!array.set(4_000_000_000, "x"));
        assert!(!array.set(MAX_PADDING + 1, "x"));
        assert_eq!(array.len(), 1);

        assert!(array.set(MAX_PADDING, "x"));
        assert_eq!(array.len(), MAX_PADDING + 1);
    }
}
