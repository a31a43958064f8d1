//! Sequence observation.
//!
//! Array elements cannot be tracked through slot hooks alone: `shift` or
//! `splice` move every following item without writing any element slot. The
//! manager therefore wraps each array it reaches with an [`ArrayWatch`], which
//! forwards the [`ChangeRecord`] of every mutation back to the manager.

use std::rc::{Rc, Weak};

use crate::value::{ArrayRef, ChangeKind, ChangeRecord, SequenceHook, Value};

use super::manager::ManagerInner;

pub(crate) struct ArrayWatch {
    manager: Weak<ManagerInner>,
    identifier: Rc<str>,
}

impl ArrayWatch {
    pub(crate) fn new(manager: Weak<ManagerInner>, identifier: &str) -> Self {
        Self {
            manager,
            identifier: Rc::from(identifier),
        }
    }
}

impl SequenceHook for ArrayWatch {
    fn on_mutation(&self, array: &ArrayRef, record: &ChangeRecord) {
        if let Some(manager) = self.manager.upgrade() {
            manager.sequence_mutated(&self.identifier, array, record);
        }
    }
}

/// The record delivered when an observed array is swapped for another one.
pub(crate) fn replacement(old: &Value, new: &ArrayRef) -> ChangeRecord {
    let old_items = old.as_array().map(ArrayRef::to_vec);
    ChangeRecord {
        kind: ChangeKind::Replace,
        index: 0,
        added_count: new.len(),
        removed: old_items.clone().unwrap_or_default(),
        old_array: old_items,
    }
}

/// Identifier of an array's `length`.
pub(crate) fn length_path(identifier: &str) -> String {
    format!("{}.length", identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_records_old_contents() {
        let old = Value::array([Value::from(1), Value::from(2)]);
        let new = ArrayRef::from_vec(vec![Value::from(9)]);
        let record = replacement(&old, &new);

        assert_eq!(record.kind, ChangeKind::Replace);
        assert_eq!(record.added_count, 1);
        assert_eq!(record.removed, vec![Value::from(1), Value::from(2)]);
        assert_eq!(record.old_array.map(|items| items.len()), Some(2));
    }

    #[test]
    fn replacing_a_non_array() {
        let new = ArrayRef::new();
        let record = replacement(&Value::Undefined, &new);
        assert!(record.removed.is_empty());
        assert!(record.old_array.is_none());
        assert_eq!(length_path("list"), "list.length");
    }
}
