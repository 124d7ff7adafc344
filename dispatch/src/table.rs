//! Hook storage grouped by opcode and kept in execution order.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::hook::{HookFilter, HookHandle, HookKind};

/// Group key: an opcode, or `None` for hooks on every message.
pub(crate) type GroupKey = Option<u16>;

#[derive(Debug)]
pub(crate) struct Hook {
    pub(crate) handle: HookHandle,
    pub(crate) order: i32,
    pub(crate) owner: Option<String>,
    pub(crate) target: String,
    pub(crate) filter: HookFilter,
    pub(crate) once: bool,
    pub(crate) kind: HookKind,
}

impl Hook {
    // Handles grow with registration, so they double as the sequence number.
    fn rank(&self) -> (i32, u64) {
        (self.order, self.handle.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct HookTable {
    groups: HashMap<GroupKey, Vec<Hook>>,
    next: u64,
}

impl HookTable {
    pub(crate) fn next_handle(&mut self) -> HookHandle {
        self.next += 1;
        HookHandle(self.next)
    }

    pub(crate) fn insert(&mut self, key: GroupKey, hook: Hook) {
        let group = self.groups.entry(key).or_default();
        let rank = hook.rank();
        let index = group.partition_point(|existing| existing.rank() < rank);
        group.insert(index, hook);
    }

    pub(crate) fn remove(&mut self, handle: HookHandle) -> bool {
        for group in self.groups.values_mut() {
            if let Some(index) = group.iter().position(|hook| hook.handle == handle) {
                group.remove(index);
                return true;
            }
        }
        false
    }

    /// Removes `handle` only if it was registered by `module`.
    pub(crate) fn remove_if_owned(&mut self, handle: HookHandle, module: &str) -> bool {
        for group in self.groups.values_mut() {
            if let Some(index) = group.iter().position(|hook| hook.handle == handle) {
                if group[index].owner.as_deref() != Some(module) {
                    return false;
                }
                group.remove(index);
                return true;
            }
        }
        false
    }

    pub(crate) fn remove_owned_by(&mut self, module: &str) -> usize {
        let mut removed = 0;
        for group in self.groups.values_mut() {
            let before = group.len();
            group.retain(|hook| hook.owner.as_deref() != Some(module));
            removed += before - group.len();
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub(crate) fn count_owned_by(&self, module: &str) -> usize {
        self.groups
            .values()
            .flatten()
            .filter(|hook| hook.owner.as_deref() == Some(module))
            .count()
    }

    /// Hooks that see `opcode`, wildcard and specific groups merged by
    /// ascending `(order, registration)`.
    pub(crate) fn schedule(&self, opcode: u16) -> Vec<(GroupKey, HookHandle)> {
        let wildcard = self.groups.get(&None).map_or(&[][..], Vec::as_slice);
        let specific = self.groups.get(&Some(opcode)).map_or(&[][..], Vec::as_slice);

        let mut merged = Vec::with_capacity(wildcard.len() + specific.len());
        let (mut w, mut s) = (0, 0);
        while w < wildcard.len() || s < specific.len() {
            let take_wildcard = match (wildcard.get(w), specific.get(s)) {
                (Some(a), Some(b)) => a.rank().cmp(&b.rank()) != Ordering::Greater,
                (Some(_), None) => true,
                _ => false,
            };
            if take_wildcard {
                merged.push((None, wildcard[w].handle));
                w += 1;
            } else {
                merged.push((Some(opcode), specific[s].handle));
                s += 1;
            }
        }
        merged
    }

    pub(crate) fn get_mut(&mut self, key: GroupKey, handle: HookHandle) -> Option<&mut Hook> {
        self.groups
            .get_mut(&key)?
            .iter_mut()
            .find(|hook| hook.handle == handle)
    }
}
