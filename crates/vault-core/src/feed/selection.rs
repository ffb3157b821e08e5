use std::collections::BTreeSet;

/// Multi-select state for bulk deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    active: bool,
    ids: BTreeSet<i64>,
}

impl Selection {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn ids(&self) -> &BTreeSet<i64> {
        &self.ids
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Enter or leave selection mode. Leaving drops the current selection.
    pub fn toggle_mode(&mut self) {
        self.active = !self.active;
        if !self.active {
            self.ids.clear();
        }
    }

    /// Long-press entry: turn selection mode on and flip `id`.
    pub fn activate(&mut self, id: i64) {
        self.active = true;
        self.toggle(id);
    }

    /// Flip `id`. No-op outside selection mode.
    pub fn toggle(&mut self, id: i64) {
        if !self.active {
            return;
        }
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Replace the selection with `ids`. Mode turns on only if something got selected.
    pub fn select_all<I: IntoIterator<Item = i64>>(&mut self, ids: I) {
        self.ids = ids.into_iter().collect();
        if !self.ids.is_empty() {
            self.active = true;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Hand over the selected ids and leave selection mode.
    pub fn take_for_delete(&mut self) -> Vec<i64> {
        self.active = false;
        std::mem::take(&mut self.ids).into_iter().collect()
    }
}
