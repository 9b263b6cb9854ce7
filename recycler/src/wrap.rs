//! Flow layout: items packed into rows up to the available cross extent.
//!
//! Rows form their own chain parallel to the item chain. A row's `length` is
//! its extent along the layout orientation (the longest member); items inside
//! a row advance along the cross axis.

use std::collections::HashMap;

use crate::window::Window;
use crate::{ItemId, WrapLineAlignment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RowId(u32);

#[derive(Clone, Debug, Default)]
pub(crate) struct WrapRow {
    pub(crate) first_item: Option<ItemId>,
    pub(crate) last_item: Option<ItemId>,
    pub(crate) length: f64,
    pub(crate) offset: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct WrapState {
    pub(crate) line_alignment: WrapLineAlignment,
    rows: Vec<WrapRow>,
    live: Vec<bool>,
    free: Vec<RowId>,
    /// Main-axis-ordered rows, top first.
    pub(crate) order: Vec<RowId>,
    /// Item membership side table; every realized item maps to exactly one
    /// live row.
    pub(crate) row_of: HashMap<ItemId, RowId>,
    pub(crate) all_items_extent: f64,
    pub(crate) average_items_per_row: f64,
    pub(crate) guessed_row_count: usize,
}

impl WrapState {
    pub(crate) fn new(line_alignment: WrapLineAlignment) -> Self {
        Self {
            line_alignment,
            rows: Vec::new(),
            live: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            row_of: HashMap::new(),
            all_items_extent: 0.0,
            average_items_per_row: 0.0,
            guessed_row_count: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.rows.clear();
        self.live.clear();
        self.free.clear();
        self.order.clear();
        self.row_of.clear();
        self.all_items_extent = 0.0;
        self.average_items_per_row = 0.0;
        self.guessed_row_count = 0;
    }

    pub(crate) fn row(&self, id: RowId) -> &WrapRow {
        debug_assert!(self.live[id.0 as usize], "reading a dead row id");
        &self.rows[id.0 as usize]
    }

    pub(crate) fn row_mut(&mut self, id: RowId) -> &mut WrapRow {
        debug_assert!(self.live[id.0 as usize], "writing a dead row id");
        &mut self.rows[id.0 as usize]
    }

    pub(crate) fn first_row(&self) -> Option<RowId> {
        self.order.first().copied()
    }

    pub(crate) fn last_row(&self) -> Option<RowId> {
        self.order.last().copied()
    }

    pub(crate) fn row_position(&self, id: RowId) -> Option<usize> {
        self.order.iter().position(|&r| r == id)
    }

    pub(crate) fn insert_row_at(&mut self, position: usize) -> RowId {
        let id = if let Some(id) = self.free.pop() {
            self.rows[id.0 as usize] = WrapRow::default();
            self.live[id.0 as usize] = true;
            id
        } else {
            let id = RowId(self.rows.len() as u32);
            self.rows.push(WrapRow::default());
            self.live.push(true);
            id
        };
        self.order.insert(position, id);
        id
    }

    pub(crate) fn remove_row_at(&mut self, position: usize) {
        let id = self.order.remove(position);
        self.live[id.0 as usize] = false;
        self.free.push(id);
    }

    /// The row before `id`, in main-axis order.
    fn prev_row(&self, id: RowId) -> Option<RowId> {
        let pos = self.row_position(id)?;
        (pos > 0).then(|| self.order[pos - 1])
    }

    fn next_row(&self, id: RowId) -> Option<RowId> {
        let pos = self.row_position(id)?;
        self.order.get(pos + 1).copied()
    }
}

/// Main-axis start for a row: its predecessor's end, or its own cached offset
/// for the head row.
fn row_offset(st: &WrapState, id: RowId) -> f64 {
    match st.prev_row(id) {
        Some(prev) => st.row(prev).offset + st.row(prev).length,
        None => st.row(id).offset,
    }
}

fn row_extent(st: &WrapState, win: &Window, id: RowId) -> f64 {
    let row = st.row(id);
    match (row.first_item, row.last_item) {
        (Some(first), Some(last)) => {
            win.cross_offset(last) + win.item_extent(last) - win.cross_offset(first)
        }
        _ => 0.0,
    }
}

/// Whether `item` still fits the row, appending at the cross-axis end
/// (`appending`) or prepending before the row's first member.
fn has_space_for(st: &WrapState, win: &Window, id: RowId, item: ItemId, appending: bool) -> bool {
    let row = st.row(id);
    if appending {
        let (Some(first), Some(last)) = (row.first_item, row.last_item) else {
            return true;
        };
        let used = win.cross_offset(last) + win.item_extent(last) - win.cross_offset(first);
        win.viewport_extent() - used >= win.item_extent(item)
    } else {
        match row.first_item {
            Some(first) => win.cross_offset(first) >= win.item_extent(item),
            None => true,
        }
    }
}

fn for_each_row_member(st: &WrapState, win: &Window, id: RowId, mut f: impl FnMut(ItemId)) {
    let row = st.row(id);
    let mut current = row.first_item;
    while let Some(item) = current {
        if st.row_of.get(&item) != Some(&id) {
            break;
        }
        f(item);
        current = win.next_of(item);
    }
}

/// Row completion: record the row length as every member's measured length,
/// and apply the configured alignment. A still-growing trailing row with
/// `Near` alignment needs neither.
pub(crate) fn on_row_filled(st: &mut WrapState, win: &mut Window, id: RowId, is_last: bool) {
    if st.line_alignment != WrapLineAlignment::Near || !is_last {
        correct_row_cross_offsets(st, win, id);
    }

    let length = st.row(id).length;
    let mut members = Vec::new();
    for_each_row_member(st, win, id, |item| members.push(item));
    for item in members {
        let index = win.data_index(item);
        win.record_measured_length(index, length);
    }
}

fn correct_row_cross_offsets(st: &WrapState, win: &mut Window, id: RowId) {
    let extent = row_extent(st, win, id);
    let mut position = match st.line_alignment {
        WrapLineAlignment::Near => 0.0,
        WrapLineAlignment::Center => (win.viewport_extent() - extent) / 2.0,
        WrapLineAlignment::Far => win.viewport_extent() - extent,
    };
    let mut members = Vec::new();
    for_each_row_member(st, win, id, |item| members.push(item));
    for item in members {
        win.set_cross_offset(item, position);
        position += win.item_extent(item);
    }
}

/// Re-synchronizes every member's main offset with the row offset (after the
/// row grew while realizing upward).
fn sync_row_main_offsets(st: &WrapState, win: &mut Window, id: RowId) {
    let offset = st.row(id).offset;
    let mut members = Vec::new();
    for_each_row_member(st, win, id, |item| members.push(item));
    for item in members {
        win.set_main_offset(item, offset);
    }
}

pub(crate) fn recycle_item(st: &mut WrapState, win: &mut Window, id: ItemId) {
    st.all_items_extent -= win.item_extent(id);
    let prev = win.prev_of(id);
    let next = win.next_of(id);
    win.detach(id);

    let Some(rid) = st.row_of.remove(&id) else {
        return;
    };
    if !st.live.get(rid.0 as usize).copied().unwrap_or(false) {
        return;
    }
    let row = st.row(rid);
    if row.first_item == Some(id) && row.last_item == Some(id) {
        if let Some(pos) = st.row_position(rid) {
            st.remove_row_at(pos);
        }
    } else if row.first_item == Some(id) {
        st.row_mut(rid).first_item = next;
    } else if row.last_item == Some(id) {
        st.row_mut(rid).last_item = prev;
    }
}

pub(crate) fn realized_items_bottom(st: &WrapState, win: &Window) -> f64 {
    match st.last_row() {
        Some(rid) => {
            let row = st.row(rid);
            match row.first_item {
                Some(first) => win.main_offset(first) + row.length,
                None => 0.0,
            }
        }
        None => 0.0,
    }
}

pub(crate) fn realized_items_top(st: &WrapState, win: &Window) -> f64 {
    match st.first_row().and_then(|rid| st.row(rid).first_item) {
        Some(first) => win.main_offset(first),
        None => 0.0,
    }
}

pub(crate) fn can_recycle_top(st: &WrapState, win: &Window, visible_top: f64) -> bool {
    st.order.len() > 1
        && match st.first_row() {
            Some(rid) => {
                visible_top + st.row(rid).length - win.scroll_offset < win.top_threshold
            }
            None => false,
        }
}

pub(crate) fn recycle_top(st: &mut WrapState, win: &mut Window, visible_top: &mut f64) {
    let Some(rid) = st.first_row() else {
        return;
    };
    let length = st.row(rid).length;
    let mut members = Vec::new();
    for_each_row_member(st, win, rid, |item| members.push(item));
    st.remove_row_at(0);
    for item in members {
        st.row_of.remove(&item);
        st.all_items_extent -= win.item_extent(item);
        win.detach(item);
    }
    *visible_top += length;
}

pub(crate) fn can_recycle_bottom(st: &WrapState, win: &Window, visible_bottom: f64) -> bool {
    st.order.len() > 1
        && match st.last_row() {
            Some(rid) => {
                visible_bottom - st.row(rid).length - win.scroll_offset
                    > win.viewport_length() + win.bottom_threshold
            }
            None => false,
        }
}

pub(crate) fn recycle_bottom(st: &mut WrapState, win: &mut Window, visible_bottom: &mut f64) {
    let Some(rid) = st.last_row() else {
        return;
    };
    let length = st.row(rid).length;
    let mut members = Vec::new();
    for_each_row_member(st, win, rid, |item| members.push(item));
    st.remove_row_at(st.order.len() - 1);
    for item in members {
        st.row_of.remove(&item);
        st.all_items_extent -= win.item_extent(item);
        win.detach(item);
    }
    *visible_bottom -= length;
}

pub(crate) fn can_realize_bottom(win: &Window, visible_bottom: f64) -> bool {
    visible_bottom - win.scroll_offset < win.viewport_length() + win.bottom_threshold
}

pub(crate) fn can_realize_top(win: &Window, visible_top: f64) -> bool {
    visible_top - win.scroll_offset > win.top_threshold
}

pub(crate) fn is_viewport_filled(st: &WrapState, win: &Window, visible_bottom: f64) -> bool {
    match st.last_row() {
        Some(rid) => {
            visible_bottom - st.row(rid).length - win.scroll_offset > win.viewport_length()
        }
        None => false,
    }
}

/// Packs the freshly realized tail item into the trailing row, opening a new
/// row when it does not fit. Fails (for rollback) when a new row would start
/// beyond the realizable bound.
pub(crate) fn position_bottom(
    st: &mut WrapState,
    win: &mut Window,
    id: ItemId,
    visible_bottom: &mut f64,
) -> bool {
    let item_length = win.item_length(id);
    let mut last_row = st.last_row();

    let fits = match last_row {
        Some(rid) => has_space_for(st, win, rid, id, true),
        None => false,
    };

    if last_row.is_none() || !fits {
        if let Some(rid) = last_row.filter(|_| !fits) {
            *visible_bottom += st.row(rid).length;
            on_row_filled(st, win, rid, true);
            if !can_realize_bottom(win, *visible_bottom) {
                return false;
            }
        }

        let rid = st.insert_row_at(st.order.len());
        st.row_mut(rid).first_item = Some(id);
        let offset = match st.prev_row(rid) {
            Some(prev) => st.row(prev).offset + st.row(prev).length,
            None => {
                let default_position = if win.scroll_scheduled {
                    win.scroll_offset
                } else {
                    0.0
                };
                if win.average_item_length > 0.0 && st.average_items_per_row > 0.0 {
                    win.data_index(id) as f64 / st.average_items_per_row
                        * win.average_item_length
                } else {
                    default_position
                }
            }
        };
        let row = st.row_mut(rid);
        row.offset = offset;
        row.length = item_length;
        last_row = Some(rid);
    }

    let Some(rid) = last_row else {
        return false;
    };

    let current_length = st.row(rid).length;
    if current_length < item_length {
        st.row_mut(rid).length = item_length;
        *visible_bottom += item_length - current_length;
    }
    let offset = st.row(rid).offset;
    win.set_main_offset(id, offset);
    let cross = match st.row(rid).last_item {
        Some(last) => win.cross_offset(last) + win.item_extent(last),
        None => 0.0,
    };
    win.set_cross_offset(id, cross);

    st.row_mut(rid).last_item = Some(id);
    st.row_of.insert(id, rid);

    if win.is_last_realized_last_in_source() {
        on_row_filled(st, win, rid, true);
    }

    true
}

/// Packs the freshly realized head item into the leading row, right-to-left
/// from the available extent.
pub(crate) fn position_top(st: &mut WrapState, win: &mut Window, visible_top: &mut f64) -> bool {
    let Some(id) = win.first else {
        return false;
    };
    let item_length = win.item_length(id);
    let mut first_row = st.first_row();

    let fits = match first_row {
        Some(rid) => has_space_for(st, win, rid, id, false),
        None => false,
    };

    if first_row.is_none() || !fits {
        if let Some(rid) = first_row.filter(|_| !fits) {
            *visible_top -= st.row(rid).length;
            on_row_filled(st, win, rid, false);
            if !can_realize_top(win, *visible_top) {
                return false;
            }
        }

        let rid = st.insert_row_at(0);
        {
            let next_offset = st.next_row(rid).map(|n| st.row(n).offset);
            let row = st.row_mut(rid);
            row.last_item = Some(id);
            row.length = item_length;
            row.offset = next_offset.map(|o| o - item_length).unwrap_or(0.0);
        }
        first_row = Some(rid);
    }

    let Some(rid) = first_row else {
        return false;
    };

    let current_length = st.row(rid).length;
    let difference = item_length - current_length;
    if current_length < item_length {
        let row = st.row_mut(rid);
        row.length = item_length;
        row.offset -= difference;
        *visible_top -= difference;
    }
    let offset = st.row(rid).offset;
    win.set_main_offset(id, offset);

    let previous_first = st.row(rid).first_item;
    let cross = match previous_first {
        Some(first) => win.cross_offset(first) - win.item_extent(id),
        None => win.viewport_extent() - win.item_extent(id),
    };
    win.set_cross_offset(id, cross);
    if previous_first.is_some() && difference != 0.0 {
        sync_row_main_offsets(st, win, rid);
    }

    st.row_mut(rid).first_item = Some(id);
    st.row_of.insert(id, rid);

    if win.is_first_realized_first_in_source() {
        on_row_filled(st, win, rid, false);
    }

    true
}

/// Replays the packing algorithm forward from `start`, rebuilding row
/// boundaries and trimming rows that lost all members.
///
/// Callers preset `start`'s length (0 for insert/replace, the first member's
/// length after a removal) so the replay can only grow it.
pub(crate) fn reorder_from_row(st: &mut WrapState, win: &mut Window, start: RowId) {
    let mut parent = start;
    let Some(mut processed) = st.row(parent).first_item else {
        return;
    };
    st.row_mut(parent).last_item = Some(processed);
    st.row_of.insert(processed, parent);
    let offset = row_offset(st, parent);
    st.row_mut(parent).offset = offset;
    let mut cross = 0.0;

    loop {
        let offset = st.row(parent).offset;
        win.set_main_offset(processed, offset);
        st.row_of.insert(processed, parent);
        win.set_cross_offset(processed, cross);
        cross += win.item_extent(processed);

        let length = win.item_length(processed);
        if length > st.row(parent).length {
            st.row_mut(parent).length = length;
        }

        let Some(next) = win.next_of(processed) else {
            on_row_filled(st, win, parent, true);
            while st.last_row() != Some(parent) {
                st.remove_row_at(st.order.len() - 1);
            }
            break;
        };

        if !has_space_for(st, win, parent, next, true) {
            st.row_mut(parent).last_item = Some(processed);
            cross = 0.0;
            on_row_filled(st, win, parent, false);

            parent = match st.next_row(parent) {
                Some(rid) => rid,
                None => st.insert_row_at(st.order.len()),
            };
            let offset = row_offset(st, parent);
            let row = st.row_mut(parent);
            row.offset = offset;
            row.first_item = Some(next);
            row.last_item = Some(next);
            row.length = win.item_length(next);
            processed = next;
        } else {
            st.row_mut(parent).last_item = Some(next);
            processed = next;
        }
    }
}

/// Picks the row a mutation reflow starts from: the row of the changed
/// position's predecessor, or the head row re-anchored on the new item.
pub(crate) fn row_to_reorder_from(
    st: &mut WrapState,
    win: &Window,
    change_index: usize,
    adding: bool,
) -> Option<RowId> {
    if win.order.is_empty() {
        return None;
    }
    let index = if change_index > win.order.len() - 1 {
        0
    } else {
        change_index
    };
    let container = win.order[index];

    if let Some(prev) = win.prev_of(container) {
        return st.row_of.get(&prev).copied();
    }
    let rid = if adding {
        let next = win.next_of(container)?;
        st.row_of.get(&next).copied()?
    } else {
        st.row_of.get(&container).copied()?
    };
    st.row_mut(rid).first_item = Some(container);
    Some(rid)
}

pub(crate) fn reorder_on_item_removed(st: &mut WrapState, win: &mut Window, removed_at: usize) {
    if win.order.is_empty() {
        st.clear();
        return;
    }
    let Some(rid) = row_to_reorder_from(st, win, removed_at, false) else {
        return;
    };
    let first_length = st.row(rid).first_item.map(|f| win.item_length(f)).unwrap_or(0.0);
    st.row_mut(rid).length = first_length;
    reorder_from_row(st, win, rid);
}

pub(crate) fn reorder_on_item_added(st: &mut WrapState, win: &mut Window, physical: usize) {
    let Some(rid) = row_to_reorder_from(st, win, physical, true) else {
        return;
    };
    st.row_mut(rid).length = 0.0;
    reorder_from_row(st, win, rid);
}

pub(crate) fn reorder_on_item_replaced(st: &mut WrapState, win: &mut Window, id: ItemId) {
    let Some(own) = st.row_of.get(&id).copied() else {
        return;
    };
    let rid = if st.row(own).first_item == Some(id) {
        st.prev_row(own).unwrap_or(own)
    } else {
        own
    };
    st.row_mut(rid).length = 0.0;
    reorder_from_row(st, win, rid);
}

/// Estimates the viewport head by rows, then walks to correct.
pub(crate) fn top_visible(st: &WrapState, win: &Window) -> Option<ItemId> {
    let first_row = st.first_row()?;
    let first_item = st.row(first_row).first_item?;
    if win.average_item_length == 0.0 {
        return win.first;
    }

    let above = (win.scroll_offset - win.main_offset(first_item)).max(0.0);
    let mut i = ((above / win.average_item_length) as usize).min(st.order.len() - 1);

    while i + 1 < st.order.len() {
        let row = st.row(st.order[i]);
        if row.offset + row.length <= win.scroll_offset {
            i += 1;
        } else {
            break;
        }
    }
    while i > 0 {
        let prev = st.row(st.order[i - 1]);
        if prev.offset + prev.length > win.scroll_offset {
            i -= 1;
        } else {
            break;
        }
    }
    st.row(st.order[i]).first_item
}

pub(crate) fn calculate_item_offset(st: &WrapState, win: &Window, index: usize) -> f64 {
    if st.average_items_per_row > 0.0 {
        win.average_item_length * index as f64 / st.average_items_per_row
    } else {
        win.average_item_length * index as f64
    }
}

pub(crate) fn recalculate_measurements(st: &mut WrapState, win: &mut Window) {
    if win.order.is_empty() || st.order.is_empty() {
        return;
    }

    st.average_items_per_row =
        (win.order.len() as f64 / st.order.len() as f64 + st.average_items_per_row) / 2.0;

    let last_index = win.last_index().unwrap_or(0);
    let remaining = win.count.saturating_sub(last_index).saturating_add(1);
    st.guessed_row_count = if st.average_items_per_row > 0.0 {
        (remaining as f64 / st.average_items_per_row) as usize
    } else {
        0
    };

    let bottom = realized_items_bottom(st, win);
    win.scrollable_items_length =
        bottom + win.average_item_length * st.guessed_row_count as f64;
    if let Some(first) = win.first {
        win.realized_items_length = bottom - win.main_offset(first);
    }
}
