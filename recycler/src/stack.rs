//! Linear layout: items placed end-to-end along the layout orientation.

use crate::window::Window;
use crate::{AnimationTicket, ItemId, ReorderMode, are_close};

#[derive(Clone, Debug)]
pub(crate) struct StackState {
    pub(crate) reorder_mode: ReorderMode,
}

impl StackState {
    pub(crate) fn new(reorder_mode: ReorderMode) -> Self {
        Self { reorder_mode }
    }
}

/// Rounded to one decimal, the precision used when walking offsets to find
/// the viewport head (absorbs sub-pixel drift without an epsilon per step).
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn recycle_item(win: &mut Window, id: ItemId) {
    let length = win.item_length(id);
    win.detach(id);
    win.realized_items_length -= length;
}

pub(crate) fn realized_items_bottom(win: &Window) -> f64 {
    match win.last {
        Some(last) => win.item_end(last),
        None => 0.0,
    }
}

pub(crate) fn realized_items_top(win: &Window) -> f64 {
    match win.first {
        Some(first) => win.main_offset(first),
        None => 0.0,
    }
}

pub(crate) fn can_recycle_top(win: &Window, visible_top: f64) -> bool {
    win.first != win.last
        && match win.first {
            Some(first) => {
                visible_top + win.item_length(first) < win.top_threshold + win.scroll_offset
            }
            None => false,
        }
}

pub(crate) fn recycle_top(win: &mut Window, visible_top: &mut f64) {
    if let Some(first) = win.first {
        let length = win.item_length(first);
        recycle_item(win, first);
        *visible_top += length;
    }
}

pub(crate) fn can_realize_bottom(win: &Window, visible_bottom: f64) -> bool {
    visible_bottom < win.viewport_length() + win.bottom_threshold + win.scroll_offset
}

pub(crate) fn can_recycle_bottom(win: &Window, visible_bottom: f64) -> bool {
    win.first != win.last
        && match win.last {
            Some(last) => {
                visible_bottom - win.item_length(last)
                    > win.viewport_length() + win.bottom_threshold + win.scroll_offset
            }
            None => false,
        }
}

pub(crate) fn recycle_bottom(win: &mut Window, visible_bottom: &mut f64) {
    if let Some(last) = win.last {
        let length = win.item_length(last);
        recycle_item(win, last);
        *visible_bottom -= length;
    }
}

pub(crate) fn can_realize_top(win: &Window, visible_top: f64) -> bool {
    visible_top > (win.scroll_offset + win.top_threshold).max(0.0)
}

pub(crate) fn position_bottom(win: &mut Window, id: ItemId, visible_bottom: &mut f64) -> bool {
    let offset = match win.prev_of(id) {
        Some(prev) => win.main_offset(prev) + win.item_length(prev),
        None => win.scroll_offset,
    };
    win.set_main_offset(id, offset);
    win.set_cross_offset(id, 0.0);
    *visible_bottom += win.item_length(id);
    true
}

/// Positions the freshly realized head item above its successor.
///
/// Returns `(positioned, needs_full_rebuild)`; a rebuild is requested when
/// the window walked past the content origin, which means accumulated offsets
/// no longer agree with the index arithmetic.
pub(crate) fn position_top(win: &mut Window, visible_top: &mut f64) -> (bool, bool) {
    let Some(first) = win.first else {
        return (false, false);
    };
    let offset = match win.next_of(first) {
        Some(next) => win.main_offset(next) - win.item_length(first),
        None => 0.0,
    };
    win.set_main_offset(first, offset);
    win.set_cross_offset(first, 0.0);
    *visible_top -= win.item_length(first);

    (true, *visible_top < 0.0)
}

pub(crate) fn is_viewport_filled(win: &Window, visible_bottom: f64) -> bool {
    visible_bottom - win.scroll_offset >= win.viewport_length() - crate::EPSILON
}

/// Estimates the viewport head via `distance / averageItemLength`, then walks
/// to correct for non-uniform extents.
pub(crate) fn top_visible(win: &Window) -> Option<ItemId> {
    let first = win.first?;
    if win.average_item_length == 0.0 {
        return Some(first);
    }

    let above = (win.scroll_offset - win.main_offset(first)).max(0.0);
    let mut i = ((above / win.average_item_length) as usize).min(win.order.len() - 1);

    // Walk forward while the candidate still ends above the viewport top,
    // backward while its predecessor does not.
    while i + 1 < win.order.len()
        && round1(win.item_end(win.order[i])) <= round1(win.scroll_offset)
    {
        i += 1;
    }
    while i > 0 && round1(win.item_end(win.order[i - 1])) > round1(win.scroll_offset) {
        i -= 1;
    }
    Some(win.order[i])
}

pub(crate) fn calculate_item_offset(win: &Window, index: usize) -> f64 {
    win.average_item_length * index as f64
}

pub(crate) fn recalculate_measurements(win: &mut Window) {
    if win.order.is_empty() {
        return;
    }
    win.scrollable_items_length = win.average_item_length * win.count as f64;
}

pub(crate) fn reorder_on_item_added(
    win: &mut Window,
    mode: ReorderMode,
    physical: usize,
    id: ItemId,
) {
    let mut starting_offset = match win.next_of(id) {
        Some(next) => win.main_offset(next),
        None => 0.0,
    };
    let new_length = win.item_length(id);
    if mode == ReorderMode::ShiftUp {
        starting_offset -= new_length;
    }
    win.set_main_offset(id, starting_offset);
    win.set_cross_offset(id, 0.0);

    match mode {
        ReorderMode::ShiftDown => {
            for i in physical + 1..win.order.len() {
                let other = win.order[i];
                let offset = win.main_offset(other);
                win.set_main_offset(other, offset + new_length);
            }
        }
        ReorderMode::ShiftUp => {
            for i in (0..physical).rev() {
                let other = win.order[i];
                let offset = win.main_offset(other);
                win.set_main_offset(other, offset - new_length);
            }
        }
    }

    win.translate_remove_animated(starting_offset, new_length);
}

pub(crate) fn reorder_on_item_removed(
    win: &mut Window,
    mode: ReorderMode,
    removed_at: usize,
    removed_length: f64,
) {
    match mode {
        ReorderMode::ShiftDown => {
            for i in removed_at..win.order.len() {
                let other = win.order[i];
                let offset = win.main_offset(other);
                win.set_main_offset(other, offset - removed_length);
            }
        }
        ReorderMode::ShiftUp => {
            for i in 0..removed_at.min(win.order.len()) {
                let other = win.order[i];
                let offset = win.main_offset(other);
                win.set_main_offset(other, offset + removed_length);
            }
        }
    }
}

pub(crate) fn reorder_on_item_replaced(win: &mut Window, mode: ReorderMode, id: ItemId) {
    match mode {
        ReorderMode::ShiftDown => {
            let mut next = win.next_of(id);
            while let Some(current) = next {
                let prev = match win.prev_of(current) {
                    Some(p) => p,
                    None => break,
                };
                let offset = win.main_offset(prev) + win.item_length(prev);
                win.set_main_offset(current, offset);
                next = win.next_of(current);
            }
        }
        ReorderMode::ShiftUp => {
            let mut processed = Some(id);
            while let Some(current) = processed {
                if let Some(next) = win.next_of(current) {
                    let offset = win.main_offset(next) - win.item_length(current);
                    win.set_main_offset(current, offset);
                }
                processed = win.prev_of(current);
            }
        }
    }
}

/// Applies the aggregated correction once a remove animation has finished and
/// its container's length is really gone from the viewport.
pub(crate) fn apply_removed_animation_correction(win: &mut Window, ticket: &AnimationTicket) {
    let starting_offset = ticket.offset;
    let length = ticket.realized_length;

    for i in 0..win.order.len() {
        let id = win.order[i];
        let offset = win.main_offset(id);
        if offset <= starting_offset {
            continue;
        }
        let clear_behind = match win.prev_of(id) {
            None => true,
            Some(prev) => win.main_offset(prev) + win.item_length(prev) <= offset - length,
        };
        if clear_behind {
            win.set_main_offset(id, offset - length);
        } else {
            break;
        }
    }

    win.translate_remove_animated(starting_offset, -length);
}

/// Shifts every successor of a resized container by the measured delta.
pub(crate) fn apply_container_resize(win: &mut Window, id: ItemId, delta: f64) {
    win.realized_items_length += delta;
    if delta == 0.0 {
        return;
    }
    win.translate_remove_animated(win.main_offset(id), delta);
    let mut next = win.next_of(id);
    while let Some(current) = next {
        let offset = win.main_offset(current);
        win.set_main_offset(current, offset + delta);
        next = win.next_of(current);
    }
}

/// Re-stacks every realized item end-to-end from the current head offset,
/// re-measuring each container (cross-axis constraint changed).
pub(crate) fn restack_all(win: &mut Window) {
    let Some(first) = win.first else {
        return;
    };
    let mut bottom = win.main_offset(first);
    let mut current = Some(first);
    win.realized_items_length = 0.0;
    while let Some(id) = current {
        let length = win.item_length(id);
        win.set_main_offset(id, bottom);
        bottom += length;
        win.realized_items_length += length;
        current = win.next_of(id);
    }
}

/// Whether the first realized item drifted away from the content origin.
pub(crate) fn needs_layout_correction(win: &Window, top_visible: ItemId) -> bool {
    let start_position = win.main_offset(top_visible);
    let scroll = win.scroll_offset;
    (start_position != 0.0 && win.data_index(top_visible) == 0 && !are_close(start_position, 0.0))
        || (start_position + scroll < 0.0 && scroll < win.average_item_length)
}
