//! Fixed-column layout: a fixed number of parallel columns, each item placed
//! into the column with the nearest completion.
//!
//! Column assignment is a greedy bin-selection heuristic over the realized
//! chain, not a globally optimal packing.

use std::collections::HashMap;

use crate::window::Window;
use crate::{ItemId, are_close_with};

/// One column candidate collected while scanning the chain: where the column
/// currently ends and how wide its latest occupant is.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    cross: f64,
    main: f64,
    length: f64,
}

impl Candidate {
    fn end(&self) -> f64 {
        self.main + self.length
    }
}

#[derive(Clone, Debug)]
pub(crate) struct GridState {
    pub(crate) stack_count: usize,
    /// Cross extent of one column; refreshed from the viewport on measure.
    pub(crate) item_extent: f64,
    /// Column assignment by item identity. Entries are removed eagerly on
    /// recycle/reorder and re-derived lazily on the next reflow.
    pub(crate) slots: HashMap<u64, usize>,
    /// Items realized upward; they resize against their column's top edge.
    pub(crate) top_realized: Vec<ItemId>,
}

impl GridState {
    pub(crate) fn new(stack_count: usize) -> Self {
        Self {
            stack_count,
            item_extent: 0.0,
            slots: HashMap::new(),
            top_realized: Vec::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.top_realized.clear();
    }

    pub(crate) fn refresh_item_extent(&mut self, viewport_extent: f64) {
        if self.stack_count > 0 {
            self.item_extent = viewport_extent / self.stack_count as f64;
        }
    }

    fn column_of_offset(&self, cross: f64) -> usize {
        if self.item_extent <= 0.0 {
            return 0;
        }
        (cross / self.item_extent).round().max(0.0) as usize
    }
}

pub(crate) fn recycle_item(st: &mut GridState, win: &mut Window, id: ItemId) {
    st.top_realized.retain(|&t| t != id);
    let key = win.arena.get(id).key;
    st.slots.remove(&key);
    win.detach(id);
}

pub(crate) fn realized_items_bottom(win: &Window) -> f64 {
    let mut bottom = f64::MIN;
    for &id in &win.order {
        bottom = bottom.max(win.item_end(id));
    }
    if win.order.is_empty() { 0.0 } else { bottom }
}

pub(crate) fn realized_items_top(win: &Window) -> f64 {
    let mut top = f64::MAX;
    for &id in &win.order {
        top = top.min(win.main_offset(id));
    }
    if win.order.is_empty() { 0.0 } else { top }
}

pub(crate) fn can_recycle_top(win: &Window) -> bool {
    win.order.len() > 1
        && match win.first {
            Some(first) => {
                win.item_end(first) - win.scroll_offset < win.top_threshold
            }
            None => false,
        }
}

pub(crate) fn can_recycle_bottom(win: &Window, visible_bottom: f64) -> bool {
    win.order.len() > 1
        && match win.last {
            Some(last) => {
                visible_bottom - win.item_length(last)
                    > win.viewport_length() + win.bottom_threshold + win.scroll_offset
            }
            None => false,
        }
}

pub(crate) fn recycle_top(st: &mut GridState, win: &mut Window, visible_top: &mut f64) {
    if let Some(first) = win.first {
        recycle_item(st, win, first);
    }
    *visible_top = realized_items_top(win);
}

pub(crate) fn recycle_bottom(st: &mut GridState, win: &mut Window, visible_bottom: &mut f64) {
    if let Some(last) = win.last {
        recycle_item(st, win, last);
    }
    *visible_bottom = realized_items_bottom(win);
}

pub(crate) fn can_realize_bottom(win: &Window) -> bool {
    match win.last {
        Some(last) => {
            win.item_end(last) - win.scroll_offset
                < win.viewport_length() + win.bottom_threshold
        }
        None => true,
    }
}

pub(crate) fn can_realize_top(win: &Window) -> bool {
    match win.first {
        Some(first) => win.main_offset(first) - win.scroll_offset > win.top_threshold,
        None => true,
    }
}

pub(crate) fn is_viewport_filled(win: &Window, visible_bottom: f64) -> bool {
    !win.order.is_empty()
        && visible_bottom > win.viewport_length() + win.scroll_offset
}

/// Collects one end-of-column candidate per column by scanning the chain in
/// `backward` (bottom placement) or forward (top placement) direction.
fn collect_candidates(
    st: &GridState,
    win: &Window,
    from: ItemId,
    backward: bool,
) -> HashMap<usize, Candidate> {
    let mut slots = HashMap::new();
    let mut scan = if backward {
        win.prev_of(from)
    } else {
        win.next_of(from)
    };
    while let Some(id) = scan {
        let column = st.column_of_offset(win.cross_offset(id));
        slots.entry(column).or_insert(Candidate {
            cross: win.cross_offset(id),
            main: win.main_offset(id),
            length: win.item_length(id),
        });
        if slots.len() == st.stack_count {
            break;
        }
        scan = if backward {
            win.prev_of(id)
        } else {
            win.next_of(id)
        };
    }
    slots
}

fn first_free_column(st: &GridState, taken: &HashMap<usize, Candidate>) -> usize {
    (0..st.stack_count).find(|c| !taken.contains_key(c)).unwrap_or(0)
}

/// Chooses where a bottom-realized item goes: one candidate per column,
/// synthesized placeholders for empty columns, then the strictly shortest
/// projected end wins (lowest column on ties).
fn find_free_spot_bottom(st: &GridState, win: &Window, id: ItemId) -> (f64, f64) {
    let mut slots = collect_candidates(st, win, id, true);
    let mut candidates: Vec<Candidate> = slots.values().copied().collect();
    candidates.sort_by(|a, b| a.cross.total_cmp(&b.cross));

    if candidates.len() < st.stack_count {
        let approximate = if win.average_item_length > 0.0 {
            (win.data_index(id) / st.stack_count) as f64 * win.average_item_length
        } else {
            win.scroll_offset
        };
        while slots.len() < st.stack_count {
            let column = first_free_column(st, &slots);
            let candidate = Candidate {
                cross: column as f64 * st.item_extent,
                main: approximate,
                length: 0.0,
            };
            slots.insert(column, candidate);
            candidates.push(candidate);
        }
    }

    let mut pick: Option<Candidate> = None;
    for candidate in candidates {
        match pick {
            None => pick = Some(candidate),
            Some(current) if candidate.end() < current.end() => pick = Some(candidate),
            _ => {}
        }
    }

    match pick {
        Some(p) => (p.cross, p.end()),
        None => (0.0, 0.0),
    }
}

/// Mirror of [`find_free_spot_bottom`] for upward realization: the furthest
/// trailing column start wins, and the item is placed above it.
fn find_free_spot_top(st: &GridState, win: &Window, id: ItemId) -> (f64, f64) {
    let mut slots = collect_candidates(st, win, id, false);
    let mut candidates: Vec<Candidate> = slots.values().copied().collect();
    candidates.sort_by(|a, b| b.cross.total_cmp(&a.cross));

    if candidates.len() < st.stack_count {
        let approximate = (win.scroll_offset + win.top_threshold).max(0.0);
        while slots.len() < st.stack_count {
            let column = first_free_column(st, &slots);
            let candidate = Candidate {
                cross: column as f64 * st.item_extent,
                main: approximate,
                length: 0.0,
            };
            slots.insert(column, candidate);
            candidates.push(candidate);
        }
    }

    let mut pick: Option<Candidate> = None;
    for candidate in candidates {
        match pick {
            None => pick = Some(candidate),
            Some(current) if candidate.main > current.main => pick = Some(candidate),
            _ => {}
        }
    }

    match pick {
        Some(p) => (p.cross, p.main - win.item_length(id)),
        None => (0.0, 0.0),
    }
}

pub(crate) fn position_bottom(
    st: &mut GridState,
    win: &mut Window,
    id: ItemId,
    visible_bottom: &mut f64,
) -> bool {
    let (cross, main) = find_free_spot_bottom(st, win, id);
    win.set_cross_offset(id, cross);
    win.set_main_offset(id, main);
    *visible_bottom = main + win.item_length(id);
    let key = win.arena.get(id).key;
    st.slots.insert(key, st.column_of_offset(cross));
    true
}

pub(crate) fn position_top(st: &mut GridState, win: &mut Window, visible_top: &mut f64) -> bool {
    let Some(id) = win.first else {
        return false;
    };
    st.top_realized.push(id);
    let (cross, main) = find_free_spot_top(st, win, id);
    win.set_cross_offset(id, cross);
    win.set_main_offset(id, main);
    *visible_top = main;
    let key = win.arena.get(id).key;
    st.slots.insert(key, st.column_of_offset(cross));
    true
}

/// Re-derives the spot of every realized item in chain order. Runs after slot
/// invalidation; earlier items reposition first so later spot searches see
/// fresh offsets.
pub(crate) fn reorder_on_items_changed(st: &mut GridState, win: &mut Window) {
    for i in 0..win.order.len() {
        let id = win.order[i];
        let (cross, main) = find_free_spot_bottom(st, win, id);
        win.set_cross_offset(id, cross);
        win.set_main_offset(id, main);
        let key = win.arena.get(id).key;
        st.slots.insert(key, st.column_of_offset(cross));
    }
}

/// Clears slot entries for the pivot's successors beyond the first
/// `stack_count` containers; those keep their columns and everything after is
/// re-derived lazily.
fn invalidate_after(st: &mut GridState, win: &Window, pivot: Option<ItemId>) {
    let mut to_skip = match pivot {
        Some(p) => {
            let position = win
                .order
                .iter()
                .position(|&o| o == p)
                .unwrap_or(win.order.len());
            st.stack_count.saturating_sub(position)
        }
        None => return,
    };
    let mut current = pivot;
    while let Some(id) = current {
        if to_skip > 0 {
            to_skip -= 1;
        } else {
            let key = win.arena.get(id).key;
            st.slots.remove(&key);
        }
        current = win.next_of(id);
    }
}

pub(crate) fn reorder_on_item_added(st: &mut GridState, win: &mut Window, id: ItemId) {
    if let Some(next) = win.next_of(id) {
        let next_key = win.arena.get(next).key;
        if let Some(column) = st.slots.remove(&next_key) {
            let key = win.arena.get(id).key;
            st.slots.insert(key, column);
            let cross = win.cross_offset(next);
            let main = win.main_offset(next);
            win.set_cross_offset(id, cross);
            win.set_main_offset(id, main);
        }
    }
    invalidate_after(st, win, win.next_of(id));
    reorder_on_items_changed(st, win);
}

pub(crate) fn reorder_on_item_removed(st: &mut GridState, win: &mut Window, removed_at: usize) {
    if removed_at >= win.order.len() {
        return;
    }
    for i in removed_at..win.order.len() {
        let key = win.arena.get(win.order[i]).key;
        st.slots.remove(&key);
    }
    reorder_on_items_changed(st, win);
}

pub(crate) fn reorder_on_item_replaced(st: &mut GridState, win: &mut Window, id: ItemId) {
    invalidate_after(st, win, win.next_of(id));
    reorder_on_items_changed(st, win);
}

pub(crate) fn reorder_on_item_resized(st: &mut GridState, win: &mut Window, id: ItemId) {
    invalidate_after(st, win, win.next_of(id));
    reorder_on_items_changed(st, win);
}

/// The realized item with the smallest main offset among the head region
/// (columns end unevenly, so this scans instead of trusting chain order).
pub(crate) fn top_visible(st: &GridState, win: &Window) -> Option<ItemId> {
    let first = win.first?;
    if win.average_item_length == 0.0 {
        return Some(first);
    }

    let above = (win.scroll_offset - realized_items_top(win)).max(0.0);
    let bound = (((above / win.average_item_length) + 1.0) * st.stack_count as f64) as usize;
    let bound = bound.min(win.order.len() - 1);

    let mut pick = first;
    let mut offset = f64::MAX;
    for i in 0..=bound {
        let id = win.order[i];
        if win.main_offset(id) <= offset {
            pick = id;
            offset = win.main_offset(id);
        }
    }
    Some(pick)
}

pub(crate) fn calculate_item_offset(st: &GridState, win: &Window, index: usize) -> f64 {
    win.average_item_length * index as f64 / st.stack_count as f64
}

/// Detects row-zero drift and re-stacks the whole window when found.
///
/// Returns `true` when a full re-stack was performed.
pub(crate) fn ensure_correct_layout(st: &mut GridState, win: &mut Window) -> bool {
    if win.order.is_empty() {
        return false;
    }

    let mut layout_correct = true;
    let mut item = win.first;
    for _ in 0..st.stack_count {
        let Some(id) = item else {
            return false;
        };
        if win.data_index(id) / st.stack_count == 0 {
            layout_correct = are_close_with(win.main_offset(id), 0.0, 0.01);
            if !layout_correct {
                break;
            }
        }
        item = win.next_of(id);
    }

    let Some(top) = top_visible(st, win) else {
        return false;
    };
    let start_position = win.main_offset(top);
    let scroll = win.scroll_offset;

    if !layout_correct || (start_position + scroll < 0.0 && scroll < win.average_item_length) {
        rwarn!("column layout drifted, restacking the realized window");
        for i in 0..win.order.len() {
            let id = win.order[i];
            win.set_main_offset(id, 0.0);
            win.set_cross_offset(id, 0.0);
        }
        let mut size = 0.0;
        for i in 0..win.order.len() {
            let id = win.order[i];
            position_bottom(st, win, id, &mut size);
        }
        return true;
    }
    false
}

/// Column-relative resize handling for items realized upward: the container
/// grows against the column's top edge, so it and every earlier item in the
/// same column shift up by the delta.
pub(crate) fn resize_top_realized(win: &mut Window, id: ItemId, delta: f64) {
    let offset = win.main_offset(id) - delta;
    win.set_main_offset(id, offset);
    let cross = win.cross_offset(id);
    let mut current = win.prev_of(id);
    while let Some(c) = current {
        if win.cross_offset(c) == cross {
            let offset = win.main_offset(c) - delta;
            win.set_main_offset(c, offset);
        }
        current = win.prev_of(c);
    }
}

pub(crate) fn recalculate_measurements(st: &mut GridState, win: &mut Window) {
    if win.order.is_empty() {
        return;
    }

    ensure_correct_layout(st, win);

    if let (Some(first), Some(last)) = (win.first, win.last) {
        let realized_length = win.item_end(last) - win.main_offset(first);
        if realized_length >= 0.0 {
            win.realized_items_length = realized_length;
            win.scrollable_items_length =
                win.average_item_length * (win.count / st.stack_count) as f64;
        }
    }
}
