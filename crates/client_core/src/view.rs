use crate::query::Filters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    List,
    Detail,
    SubDetail,
}

/// Navigation state of one tab.
///
/// The visible view is derived from the trail of selected ids, so exactly one
/// view is active and `pop` can only ever step to the immediate parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    trail: Vec<i64>,
    pub filters: Filters,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_view(&self) -> ActiveView {
        match self.trail.len() {
            0 => ActiveView::List,
            1 => ActiveView::Detail,
            _ => ActiveView::SubDetail,
        }
    }

    pub fn active_entity_id(&self) -> Option<i64> {
        self.trail.last().copied()
    }

    /// Id selected on the list view, while a detail view is open.
    pub fn detail_id(&self) -> Option<i64> {
        self.trail.first().copied()
    }

    pub fn trail(&self) -> &[i64] {
        &self.trail
    }

    /// Returns false when already at the deepest view.
    pub(crate) fn push(&mut self, id: i64) -> bool {
        if self.trail.len() >= 2 {
            return false;
        }
        self.trail.push(id);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<i64> {
        self.trail.pop()
    }

    pub(crate) fn reset(&mut self) {
        self.trail.clear();
    }
}
