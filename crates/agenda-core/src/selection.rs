use std::collections::BTreeSet;

use uuid::Uuid;

/// Ids picked for a bulk operation over the current view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.ids.iter().copied().collect()
    }
}

impl FromIterator<Uuid> for Selection {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

pub fn toggle_selection(selection: &Selection, id: Uuid) -> Selection {
    let mut ids = selection.ids.clone();
    if !ids.remove(&id) {
        ids.insert(id);
    }
    Selection { ids }
}

pub fn clear_selection() -> Selection {
    Selection::default()
}

/// Empty when every visible id is already selected, otherwise all of them.
pub fn toggle_all(selection: &Selection, visible: &[Uuid]) -> Selection {
    let all_selected =
        !visible.is_empty() && visible.iter().all(|id| selection.contains(id));
    if all_selected {
        clear_selection()
    } else {
        visible.iter().copied().collect()
    }
}
