use crate::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        let span = (end_exclusive - start) as u64;
        start + (self.next_u64() % span) as usize
    }

    fn gen_f64(&mut self, start: f64, end: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        start + unit * (end - start)
    }
}

fn stack_engine(count: usize, item: Size, viewport: Size, buffer_scale: f64) -> Recycler {
    let opts = RecyclerOptions::new(count, move |_, _| item)
        .with_buffer_scale(buffer_scale)
        .with_initial_viewport(Some(viewport));
    Recycler::new(opts).unwrap()
}

fn wrap_engine(count: usize, item: Size, viewport: Size, alignment: WrapLineAlignment) -> Recycler {
    let opts = RecyclerOptions::new(count, move |_, _| item)
        .with_orientation(Orientation::Horizontal)
        .with_layout(LayoutConfig::Wrap {
            line_alignment: alignment,
        })
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(viewport));
    Recycler::new(opts).unwrap()
}

fn grid_engine(count: usize, stack_count: usize, viewport: Size) -> Recycler {
    let opts = RecyclerOptions::new(count, |_, constraint: Size| {
        Size::new(constraint.width, 20.0)
    })
    .with_orientation(Orientation::Horizontal)
    .with_layout(LayoutConfig::Grid { stack_count })
    .with_buffer_scale(0.0)
    .with_initial_viewport(Some(viewport));
    Recycler::new(opts).unwrap()
}

fn snapshots(r: &Recycler) -> Vec<RealizedSnapshot> {
    let mut out = Vec::new();
    r.collect_realized(&mut out);
    out
}

fn vertical_offsets(r: &Recycler) -> Vec<f64> {
    snapshots(r).iter().map(|s| s.vertical_offset).collect()
}

fn assert_window_contiguous(r: &Recycler) {
    let items = snapshots(r);
    assert_eq!(r.realized_count(), items.len());
    if items.is_empty() {
        assert_eq!(r.first_realized_index(), None);
        assert_eq!(r.last_realized_index(), None);
        return;
    }
    for pair in items.windows(2) {
        assert_eq!(
            pair[1].index,
            pair[0].index + 1,
            "realized indices must be consecutive"
        );
    }
    assert_eq!(r.first_realized_index(), Some(items[0].index));
    assert_eq!(r.last_realized_index(), Some(items[items.len() - 1].index));
}

/// Stack invariant: every realized item starts exactly where its predecessor
/// ends (vertical orientation).
fn assert_stacked_end_to_end(r: &Recycler) {
    let items = snapshots(r);
    for pair in items.windows(2) {
        let end = pair[0].vertical_offset + pair[0].height;
        assert!(
            (pair[1].vertical_offset - end).abs() < 1e-6,
            "item {} at {} does not abut predecessor end {}",
            pair[1].index,
            pair[1].vertical_offset,
            end
        );
    }
}

/// Wrap invariant: sorting realized items by (row offset, in-row offset)
/// reproduces data order, so every item sits in exactly one row and rows span
/// contiguous chain runs.
fn assert_row_partition(r: &Recycler) {
    let mut items = snapshots(r);
    items.sort_by(|a, b| {
        a.vertical_offset
            .total_cmp(&b.vertical_offset)
            .then(a.horizontal_offset.total_cmp(&b.horizontal_offset))
    });
    let first = match items.first() {
        Some(s) => s.index,
        None => return,
    };
    for (i, s) in items.iter().enumerate() {
        assert_eq!(
            s.index,
            first + i,
            "row packing must preserve data order (item at row {} slot {})",
            s.vertical_offset,
            s.horizontal_offset
        );
    }
}

#[test]
fn stack_fills_viewport_with_zero_buffer() {
    let mut r = stack_engine(10, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();

    assert_eq!(r.realized_count(), 3);
    assert_eq!(r.first_realized_index(), Some(0));
    assert_eq!(r.last_realized_index(), Some(2));
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0]);
    assert_window_contiguous(&r);

    // Unrealized tail is estimated from the running average.
    assert_eq!(r.average_item_length(), 20.0);
    assert_eq!(r.scrollable_content_length(), 200.0);
}

#[test]
fn stack_shift_down_insert_shifts_successors() {
    let keys = Arc::new(Mutex::new((0..10).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0]);

    keys.lock().unwrap().insert(1, 999);
    r.refresh_on_item_added(1);

    assert_eq!(r.realized_count(), 4);
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0, 60.0]);
    assert_eq!(r.snapshot_at(1).unwrap().key, 999);
    assert_eq!(r.snapshot_at(2).unwrap().key, 101);
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);
}

#[test]
fn stack_shift_up_insert_shifts_predecessors() {
    let keys = Arc::new(Mutex::new((0..10).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_layout(LayoutConfig::Stack {
            reorder_mode: ReorderMode::ShiftUp,
        })
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    keys.lock().unwrap().insert(1, 999);
    r.refresh_on_item_added(1);

    // The new item takes its successor's boundary; everything before it gives
    // way upward instead of pushing the tail down.
    assert_eq!(vertical_offsets(&r), vec![-20.0, 0.0, 20.0, 40.0]);
    assert_eq!(r.snapshot_at(1).unwrap().key, 999);
    assert_stacked_end_to_end(&r);
}

#[test]
fn stack_remove_inside_window_shifts_back_and_refills() {
    let keys = Arc::new(Mutex::new((0..10).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    keys.lock().unwrap().remove(1);
    r.refresh_on_item_removed(1);

    assert_eq!(r.realized_count(), 3);
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0]);
    let realized_keys: Vec<u64> = snapshots(&r).iter().map(|s| s.key).collect();
    assert_eq!(realized_keys, vec![100, 102, 103]);
    assert_window_contiguous(&r);
}

#[test]
fn stack_mutation_above_window_compensates_scroll() {
    let mut r = stack_engine(50, Size::new(100.0, 20.0), Size::new(100.0, 60.0), 0.0);
    r.set_initial_item(20);
    r.set_scroll_offset(400.0);
    r.balance_visual_space();
    assert_eq!(r.first_realized_index(), Some(20));
    assert_eq!(r.snapshot_at(20).unwrap().vertical_offset, 400.0);

    // Removal above the window: the content above shrank, the engine moves
    // the scroll offset so the visible items do not jump.
    r.refresh_on_item_removed(5);
    assert_eq!(r.scroll_offset(), 420.0);
    assert_eq!(r.first_realized_index(), Some(19));
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);

    // And the mirror move for an insertion above the window.
    r.refresh_on_item_added(5);
    assert_eq!(r.scroll_offset(), 400.0);
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);
}

#[test]
fn recycled_containers_return_to_the_pool_exactly_once() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_on_item_state(Some(move |c: ContainerId, i: usize, s: ItemState| {
            sink.lock().unwrap().push((c, i, s));
        }));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    assert_eq!(r.realized_count(), 3);
    assert_eq!(r.pool_len(), 0);

    r.on_viewport_size_changed(Size::new(100.0, 10.0));
    assert_eq!(r.realized_count(), 1);
    assert_eq!(r.pool_len(), 2);

    let events = events.lock().unwrap();
    for index in [1usize, 2] {
        let recycling = events
            .iter()
            .filter(|(_, i, s)| *i == index && *s == ItemState::Recycling)
            .count();
        let recycled = events
            .iter()
            .filter(|(_, i, s)| *i == index && *s == ItemState::Recycled)
            .count();
        assert_eq!(recycling, 1, "item {index} must recycle exactly once");
        assert_eq!(recycled, 1, "item {index} must pool-return exactly once");
    }
}

#[test]
fn item_state_lifecycle_fires_in_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_on_item_state(Some(move |_c: ContainerId, i: usize, s: ItemState| {
            sink.lock().unwrap().push((i, s));
        }));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            (0, ItemState::Realizing),
            (0, ItemState::Realized),
            (1, ItemState::Realizing),
            (1, ItemState::Realized),
            (2, ItemState::Realizing),
            (2, ItemState::Realized),
        ]
    );
}

#[test]
fn round_trip_windowing_reproduces_the_same_range() {
    let mut r = stack_engine(10, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();
    let before = snapshots(&r);
    assert_eq!(before.len(), 3);

    // Collapse to a single anchor, then restore the viewport.
    r.on_viewport_size_changed(Size::new(100.0, 10.0));
    assert_eq!(r.realized_count(), 1);
    r.on_viewport_size_changed(Size::new(100.0, 50.0));

    let after = snapshots(&r);
    assert_eq!(
        before.iter().map(|s| s.index).collect::<Vec<_>>(),
        after.iter().map(|s| s.index).collect::<Vec<_>>()
    );
    assert_eq!(
        before.iter().map(|s| s.vertical_offset).collect::<Vec<_>>(),
        after.iter().map(|s| s.vertical_offset).collect::<Vec<_>>()
    );
}

#[test]
fn single_anchor_regrow_at_least_doubles_the_window() {
    let mut r = stack_engine(100, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();
    r.on_viewport_size_changed(Size::new(100.0, 10.0));
    assert_eq!(r.realized_count(), 1);

    r.on_viewport_size_changed(Size::new(100.0, 100.0));
    assert!(
        r.realized_count() >= 2,
        "regrow from a single anchor realized only {}",
        r.realized_count()
    );
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);
}

#[test]
fn scrolling_back_re_realizes_upward() {
    let mut r = stack_engine(10, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();

    r.set_scroll_offset(25.0);
    r.balance_visual_space();
    assert_eq!(r.first_realized_index(), Some(1));
    assert_eq!(r.top_visible_index(), Some(1));

    r.set_scroll_offset(0.0);
    r.balance_visual_space();
    assert_eq!(r.first_realized_index(), Some(0));
    assert_eq!(r.snapshot_at(0).unwrap().vertical_offset, 0.0);
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);
}

#[test]
fn is_item_in_viewport_honors_partial_visibility() {
    let mut r = stack_engine(10, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();

    assert!(r.is_item_in_viewport(0, false));
    assert!(r.is_item_in_viewport(2, true));
    // Item 2 spans 40..60 against a 50-long viewport.
    assert!(!r.is_item_in_viewport(2, false));
    assert!(!r.is_item_in_viewport(3, true));
}

#[test]
fn replace_remeasures_and_reflows_successors() {
    let heights = Arc::new(Mutex::new(vec![20.0f64; 10]));
    let heights_cb = Arc::clone(&heights);
    let opts = RecyclerOptions::new(10, move |i, _| Size::new(100.0, heights_cb.lock().unwrap()[i]))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    heights.lock().unwrap()[1] = 40.0;
    r.refresh_on_item_replaced(1);

    assert_eq!(r.snapshot_at(1).unwrap().height, 40.0);
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 60.0]);
    assert_stacked_end_to_end(&r);
}

#[test]
fn container_resize_shifts_successors_by_the_delta() {
    let mut r = stack_engine(10, Size::new(100.0, 20.0), Size::new(100.0, 60.0), 0.0);
    r.balance_visual_space();

    r.on_container_size_changed(1, Size::new(100.0, 50.0));
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 70.0]);
    assert_stacked_end_to_end(&r);

    // A cross-axis-only change is irrelevant to the stack and ignored.
    let before = vertical_offsets(&r);
    r.on_container_size_changed(0, Size::new(500.0, 20.0));
    assert_eq!(vertical_offsets(&r), before);
}

#[test]
fn source_reset_recycles_everything_and_rebuilds() {
    let mut r = stack_engine(50, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.set_initial_item(20);
    r.set_scroll_offset(400.0);
    r.balance_visual_space();
    assert_eq!(r.first_realized_index(), Some(20));
    let old_containers: Vec<ContainerId> = snapshots(&r).iter().map(|s| s.container).collect();

    r.refresh_on_source_reset(5);
    assert_eq!(r.scroll_offset(), 0.0);
    assert_eq!(r.count(), 5);
    assert_eq!(r.first_realized_index(), Some(0));
    assert_eq!(r.realized_count(), 3);
    // The rebuild is fed from the pool, not from fresh containers.
    let new_containers: Vec<ContainerId> = snapshots(&r).iter().map(|s| s.container).collect();
    assert_eq!(new_containers, old_containers);
    assert_window_contiguous(&r);
}

#[test]
fn emptying_the_source_resets_scroll() {
    let mut r = stack_engine(1, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.set_scroll_offset(10.0);
    r.balance_visual_space();
    r.refresh_on_item_removed(0);
    assert_eq!(r.count(), 0);
    assert_eq!(r.scroll_offset(), 0.0);
}

#[test]
fn measure_with_unconstrained_axis_infers_length_from_content() {
    let mut r = stack_engine(5, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    let measured = r.measure(Size::new(100.0, f64::INFINITY));
    assert_eq!(measured, Size::new(100.0, 100.0));
    assert_eq!(r.realized_count(), 5);
}

#[test]
fn buffer_scale_is_validated_not_clamped() {
    let opts = |scale: f64| {
        RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0)).with_buffer_scale(scale)
    };
    assert!(matches!(
        Recycler::new(opts(0.5)),
        Err(ConfigError::BufferScaleOutOfRange(_))
    ));
    assert!(matches!(
        Recycler::new(opts(4.5)),
        Err(ConfigError::BufferScaleOutOfRange(_))
    ));
    assert!(Recycler::new(opts(0.0)).is_ok());
    assert!(Recycler::new(opts(4.0)).is_ok());

    let mut r = Recycler::new(opts(2.0)).unwrap();
    assert!(r.set_buffer_scale(0.1).is_err());
    assert_eq!(r.buffer_scale(), 2.0);
}

#[test]
fn grid_stack_count_is_validated_not_clamped() {
    let opts = RecyclerOptions::new(10, |_, _| Size::new(30.0, 20.0))
        .with_layout(LayoutConfig::Grid { stack_count: 1 });
    assert!(matches!(
        Recycler::new(opts),
        Err(ConfigError::StackCountTooSmall(1))
    ));

    let mut r = grid_engine(10, 3, Size::new(90.0, 50.0));
    assert!(r.set_stack_count(0).is_err());
    assert!(r.set_stack_count(4).is_ok());
}

#[test]
fn growing_the_buffer_scale_realizes_more_items() {
    let mut r = stack_engine(100, Size::new(100.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();
    assert_eq!(r.realized_count(), 3);

    r.set_buffer_scale(1.0).unwrap();
    assert_eq!(r.realized_count(), 5);
    assert_window_contiguous(&r);
}

#[test]
fn batch_update_coalesces_change_notifications() {
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notifications);
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_on_change(Some(move |_: &Recycler| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    let mut r = Recycler::new(opts).unwrap();

    r.balance_visual_space();
    assert_eq!(notifications.load(Ordering::SeqCst), 1);

    r.batch_update(|r| {
        r.set_scroll_offset(5.0);
        r.set_scroll_offset(10.0);
    });
    assert_eq!(notifications.load(Ordering::SeqCst), 2);

    // Unchanged offset notifies nothing.
    r.set_scroll_offset(10.0);
    assert_eq!(notifications.load(Ordering::SeqCst), 2);
}

#[test]
fn async_balance_fill_viewport_first_defers_only_buffer_work() {
    let opts = RecyclerOptions::new(100, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(2.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_async_balance(true, AsyncBalanceMode::FillViewportFirst);
    let mut r = Recycler::new(opts).unwrap();

    r.begin_async_balance();
    r.balance_visual_space();
    // The viewport itself fills synchronously; the buffer is deferred.
    assert_eq!(r.realized_count(), 3);
    assert!(r.has_pending_balance());

    let mut ticks = 0;
    while r.has_pending_balance() {
        assert!(r.tick());
        ticks += 1;
        assert!(ticks < 20, "deferred balance never converged");
    }
    assert_eq!(r.realized_count(), 8);
    assert!(!r.tick());
    assert_window_contiguous(&r);
}

#[test]
fn async_balance_standard_defers_after_the_first_item() {
    let opts = RecyclerOptions::new(100, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(2.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_async_balance(true, AsyncBalanceMode::Standard);
    let mut r = Recycler::new(opts).unwrap();

    r.begin_async_balance();
    r.balance_visual_space();
    assert_eq!(r.realized_count(), 1);
    assert!(r.has_pending_balance());
}

#[test]
fn orientation_change_tears_down_and_rebuilds() {
    let mut r = stack_engine(50, Size::new(20.0, 20.0), Size::new(100.0, 50.0), 0.0);
    r.balance_visual_space();
    assert_eq!(r.realized_count(), 3);

    r.set_orientation(Orientation::Horizontal);
    let items = snapshots(&r);
    assert_eq!(r.realized_count(), 5);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, i as f64 * 20.0);
        assert_eq!(s.vertical_offset, 0.0);
    }
    assert_window_contiguous(&r);
}

#[test]
fn layout_swap_rebuilds_from_scratch() {
    let mut r = wrap_engine(
        12,
        Size::new(30.0, 20.0),
        Size::new(100.0, 50.0),
        WrapLineAlignment::Near,
    );
    r.balance_visual_space();
    assert!(r.realized_count() > 0);

    r.set_layout(LayoutConfig::Stack {
        reorder_mode: ReorderMode::ShiftDown,
    })
    .unwrap();
    assert_eq!(
        r.layout_config(),
        LayoutConfig::Stack {
            reorder_mode: ReorderMode::ShiftDown
        }
    );
    // Horizontal stack: items now run end-to-end along the width.
    let items = snapshots(&r);
    assert_eq!(items.len(), 4);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, i as f64 * 30.0);
        assert_eq!(s.vertical_offset, 0.0);
    }
}

#[test]
fn add_animation_schedules_a_ticket() {
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_animations(true, false, ItemAnimationMode::PLAY_ON_ADD);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    assert!(r.scheduled_add_animations().is_empty());

    r.refresh_on_item_added(1);
    let tickets = r.scheduled_add_animations().to_vec();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].container, r.snapshot_at(1).unwrap().container);

    assert!(r.complete_add_animation(tickets[0].id));
    assert!(!r.complete_add_animation(tickets[0].id));
    assert!(r.scheduled_add_animations().is_empty());
}

#[test]
fn remove_animation_defers_reflow_until_completion() {
    let opts = RecyclerOptions::new(10, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_animations(false, true, ItemAnimationMode::PLAY_ON_REMOVE);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0]);

    r.refresh_on_item_removed(1);
    let tickets = r.scheduled_remove_animations().to_vec();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].offset, 20.0);
    // The gap is held open while the removal animates.
    assert_eq!(vertical_offsets(&r), vec![0.0, 40.0]);

    assert!(r.complete_remove_animation(tickets[0].id));
    assert_eq!(vertical_offsets(&r), vec![0.0, 20.0, 40.0]);
    assert_eq!(r.last_realized_index(), Some(2));
    assert!(r.scheduled_remove_animations().is_empty());
    assert!(!r.complete_remove_animation(tickets[0].id));
    assert_window_contiguous(&r);
    assert_stacked_end_to_end(&r);
}

#[test]
fn new_source_batch_arms_add_animations() {
    let opts = RecyclerOptions::new(0, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 50.0)))
        .with_animations(true, false, ItemAnimationMode::PLAY_ALL);
    let mut r = Recycler::new(opts).unwrap();

    r.refresh_on_source_reset(10);
    assert_eq!(r.realized_count(), 3);
    assert_eq!(r.scheduled_add_animations().len(), 3);
}

#[test]
fn wrap_packs_rows_up_to_the_available_extent() {
    let mut r = wrap_engine(
        4,
        Size::new(30.0, 20.0),
        Size::new(100.0, 50.0),
        WrapLineAlignment::Near,
    );
    r.balance_visual_space();

    let items = snapshots(&r);
    assert_eq!(items.len(), 4);
    // Three 30-wide items fill a 100-wide row; the fourth opens row 1.
    assert_eq!(items[0].horizontal_offset, 0.0);
    assert_eq!(items[1].horizontal_offset, 30.0);
    assert_eq!(items[2].horizontal_offset, 60.0);
    assert_eq!(items[3].horizontal_offset, 0.0);
    assert_eq!(items[0].vertical_offset, 0.0);
    assert_eq!(items[1].vertical_offset, 0.0);
    assert_eq!(items[2].vertical_offset, 0.0);
    assert_eq!(items[3].vertical_offset, 20.0);
    assert_row_partition(&r);
}

#[test]
fn wrap_center_alignment_shifts_full_rows() {
    let mut r = wrap_engine(
        4,
        Size::new(30.0, 20.0),
        Size::new(100.0, 50.0),
        WrapLineAlignment::Center,
    );
    r.balance_visual_space();

    let items = snapshots(&r);
    assert_eq!(items[0].horizontal_offset, 5.0);
    assert_eq!(items[1].horizontal_offset, 35.0);
    assert_eq!(items[2].horizontal_offset, 65.0);
    // The trailing single-member row centers on its own extent.
    assert_eq!(items[3].horizontal_offset, 35.0);
}

#[test]
fn wrap_insert_replays_packing_from_the_affected_row() {
    let keys = Arc::new(Mutex::new((0..12).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(12, |_, _| Size::new(30.0, 20.0))
        .with_orientation(Orientation::Horizontal)
        .with_layout(LayoutConfig::Wrap {
            line_alignment: WrapLineAlignment::Near,
        })
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    // Two full rows fit the 60-long viewport; a third would start at its edge.
    assert_eq!(r.realized_count(), 6);

    keys.lock().unwrap().insert(4, 999);
    r.refresh_on_item_added(4);

    // The replay pushes the tail of row 1 into a fresh row below.
    let items = snapshots(&r);
    assert_eq!(items.len(), 7);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, (i % 3) as f64 * 30.0);
        assert_eq!(s.vertical_offset, (i / 3) as f64 * 20.0);
    }
    assert_eq!(r.snapshot_at(4).unwrap().key, 999);
    assert_row_partition(&r);
    assert_window_contiguous(&r);
}

#[test]
fn wrap_removal_merges_rows_and_keeps_the_partition() {
    let keys = Arc::new(Mutex::new((0..12).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(12, |_, _| Size::new(30.0, 20.0))
        .with_orientation(Orientation::Horizontal)
        .with_layout(LayoutConfig::Wrap {
            line_alignment: WrapLineAlignment::Near,
        })
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(100.0, 60.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();
    assert_eq!(r.realized_count(), 6);

    keys.lock().unwrap().remove(1);
    r.refresh_on_item_removed(1);

    // Row 0 pulls the head of row 1 up to refill its free slot, and the
    // rebalance realizes one more item into the freed trailing slot.
    let items = snapshots(&r);
    assert_eq!(items.len(), 6);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, (i % 3) as f64 * 30.0);
        assert_eq!(s.vertical_offset, (i / 3) as f64 * 20.0);
    }
    let realized_keys: Vec<u64> = items.iter().map(|s| s.key).collect();
    assert_eq!(realized_keys, vec![100, 102, 103, 104, 105, 106]);
    assert_row_partition(&r);
    assert_window_contiguous(&r);
}

#[test]
fn grid_assigns_items_to_the_shortest_column() {
    let mut r = grid_engine(7, 3, Size::new(90.0, 50.0));
    r.balance_visual_space();

    let items = snapshots(&r);
    assert_eq!(items.len(), 7);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, (i % 3) as f64 * 30.0, "column of {i}");
        assert_eq!(s.vertical_offset, (i / 3) as f64 * 20.0, "row of {i}");
    }
    // Item 6 lands in column 6 mod 3 = 0.
    assert_eq!(items[6].horizontal_offset, 0.0);
    assert_eq!(items[6].vertical_offset, 40.0);
    assert_window_contiguous(&r);
}

#[test]
fn grid_removal_invalidates_and_rederives_downstream_slots() {
    let keys = Arc::new(Mutex::new((0..7).map(|i| 100 + i as u64).collect::<Vec<_>>()));
    let keys_cb = Arc::clone(&keys);
    let opts = RecyclerOptions::new(7, |_, constraint: Size| Size::new(constraint.width, 20.0))
        .with_orientation(Orientation::Horizontal)
        .with_layout(LayoutConfig::Grid { stack_count: 3 })
        .with_buffer_scale(0.0)
        .with_initial_viewport(Some(Size::new(90.0, 50.0)))
        .with_get_item_key(move |i| keys_cb.lock().unwrap()[i]);
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    keys.lock().unwrap().remove(3);
    r.refresh_on_item_removed(3);

    let items = snapshots(&r);
    assert_eq!(items.len(), 6);
    for (i, s) in items.iter().enumerate() {
        assert_eq!(s.horizontal_offset, (i % 3) as f64 * 30.0);
        assert_eq!(s.vertical_offset, (i / 3) as f64 * 20.0);
    }
    let realized_keys: Vec<u64> = items.iter().map(|s| s.key).collect();
    assert_eq!(realized_keys, vec![100, 101, 102, 104, 105, 106]);

    // At most one live item per (column, row) cell.
    let mut cells: Vec<(i64, i64)> = items
        .iter()
        .map(|s| (s.horizontal_offset as i64, s.vertical_offset as i64))
        .collect();
    cells.sort_unstable();
    cells.dedup();
    assert_eq!(cells.len(), items.len());
    assert_window_contiguous(&r);
}

#[test]
fn property_random_scroll_keeps_stack_window_consistent() {
    let count = 500;
    let opts = RecyclerOptions::new(count, |i, _| {
        Size::new(100.0, 10.0 + (i * 7 % 30) as f64)
    })
    .with_buffer_scale(1.0)
    .with_initial_viewport(Some(Size::new(100.0, 120.0)));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    let viewport = 120.0;
    let threshold = 120.0;
    let mut rng = Lcg::new(0x5eed);
    for _ in 0..120 {
        let scroll = rng.gen_f64(0.0, 4000.0);
        r.set_scroll_offset(scroll);
        r.balance_visual_space();
        r.balance_visual_space();

        assert_window_contiguous(&r);
        assert_stacked_end_to_end(&r);

        let items = snapshots(&r);
        let (first, last) = (items[0], items[items.len() - 1]);
        if last.index < count - 1 {
            assert!(
                last.vertical_offset + last.height >= scroll + viewport + threshold - 1e-3,
                "window bottom {} does not cover the buffered viewport at scroll {scroll}",
                last.vertical_offset + last.height
            );
        }
        if first.index > 0 {
            assert!(
                first.vertical_offset <= (scroll - threshold).max(0.0) + 1e-3,
                "window top {} does not cover the buffered viewport at scroll {scroll}",
                first.vertical_offset
            );
        }
    }
}

#[test]
fn property_random_mutations_keep_stack_window_consistent() {
    let mut count = 200;
    let opts = RecyclerOptions::new(count, |_, _| Size::new(100.0, 20.0))
        .with_buffer_scale(1.0)
        .with_initial_viewport(Some(Size::new(100.0, 100.0)));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    let mut rng = Lcg::new(0xfeed);
    for _ in 0..150 {
        match rng.gen_range_usize(0, 4) {
            0 => {
                let at = rng.gen_range_usize(0, count + 1);
                r.refresh_on_item_added(at);
                count += 1;
            }
            1 if count > 0 => {
                let at = rng.gen_range_usize(0, count);
                r.refresh_on_item_removed(at);
                count -= 1;
            }
            2 if count > 0 => {
                let at = rng.gen_range_usize(0, count);
                r.refresh_on_item_replaced(at);
            }
            _ => {
                r.set_scroll_offset(rng.gen_f64(0.0, 2000.0));
            }
        }
        r.balance_visual_space();
        r.balance_visual_space();

        assert_eq!(r.count(), count);
        assert_window_contiguous(&r);
        assert_stacked_end_to_end(&r);
    }
}

#[test]
fn property_random_scroll_keeps_wrap_rows_partitioned() {
    let count = 300;
    let opts = RecyclerOptions::new(count, |i, _| {
        Size::new(25.0 + (i * 13 % 40) as f64, 18.0)
    })
    .with_orientation(Orientation::Horizontal)
    .with_layout(LayoutConfig::Wrap {
        line_alignment: WrapLineAlignment::Near,
    })
    .with_buffer_scale(1.0)
    .with_initial_viewport(Some(Size::new(100.0, 80.0)));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    let mut rng = Lcg::new(0xab1e);
    for _ in 0..120 {
        let scroll = rng.gen_f64(0.0, 1500.0);
        r.set_scroll_offset(scroll);
        r.balance_visual_space();
        r.balance_visual_space();

        assert_window_contiguous(&r);
        assert_row_partition(&r);

        let items = snapshots(&r);
        if let (Some(first), Some(last)) = (items.first(), items.last()) {
            if first.index > 0 {
                assert!(
                    first.vertical_offset <= scroll + 1e-3,
                    "head row {} below scroll {scroll}",
                    first.vertical_offset
                );
            }
            if last.index < count - 1 {
                let bottom = items
                    .iter()
                    .map(|s| s.vertical_offset)
                    .fold(f64::MIN, f64::max)
                    + 18.0;
                // A row that would start at the buffered edge is rolled back,
                // so coverage may stop one row length short of the bound.
                assert!(
                    bottom >= scroll + 80.0 + 80.0 - 18.0 - 1e-3,
                    "wrap bottom {bottom} does not cover the buffered viewport at scroll {scroll}"
                );
            }
        }
    }
}

#[test]
fn property_random_scroll_keeps_grid_columns_disjoint() {
    let count = 300;
    let opts = RecyclerOptions::new(count, |i, constraint: Size| {
        Size::new(constraint.width, 20.0 + (i % 3) as f64 * 10.0)
    })
    .with_orientation(Orientation::Horizontal)
    .with_layout(LayoutConfig::Grid { stack_count: 3 })
    .with_buffer_scale(1.0)
    .with_initial_viewport(Some(Size::new(90.0, 100.0)));
    let mut r = Recycler::new(opts).unwrap();
    r.balance_visual_space();

    let mut rng = Lcg::new(0xca11);
    for _ in 0..120 {
        let scroll = rng.gen_f64(0.0, 2500.0);
        r.set_scroll_offset(scroll);
        r.balance_visual_space();
        r.balance_visual_space();

        assert_window_contiguous(&r);

        let items = snapshots(&r);
        for column in 0..3 {
            let expected_cross = column as f64 * 30.0;
            let mut members: Vec<&RealizedSnapshot> = items
                .iter()
                .filter(|s| (s.horizontal_offset - expected_cross).abs() < 1e-6)
                .collect();
            members.sort_by(|a, b| a.vertical_offset.total_cmp(&b.vertical_offset));
            for pair in members.windows(2) {
                assert!(
                    pair[1].vertical_offset >= pair[0].vertical_offset + pair[0].height - 1e-6,
                    "column {column} items overlap at {} and {}",
                    pair[0].vertical_offset,
                    pair[1].vertical_offset
                );
            }
        }
        let total: usize = (0..3)
            .map(|c| {
                items
                    .iter()
                    .filter(|s| (s.horizontal_offset - c as f64 * 30.0).abs() < 1e-6)
                    .count()
            })
            .sum();
        assert_eq!(total, items.len(), "every item must sit in exactly one column");

        if let Some(last) = items.last() {
            if last.index < count - 1 {
                let bottom = items
                    .iter()
                    .map(|s| s.vertical_offset + s.height)
                    .fold(f64::MIN, f64::max);
                assert!(
                    bottom >= scroll + 100.0 - 40.0,
                    "grid bottom {bottom} left the viewport uncovered at scroll {scroll}"
                );
            }
        }
    }
}
