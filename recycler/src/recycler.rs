use std::cell::Cell;
use std::sync::Arc;

use crate::item::RealizedItem;
use crate::policy::LayoutPolicy;
use crate::window::Window;
use crate::{
    AnimationTicket, AsyncBalanceMode, ConfigError, ItemAnimationMode, ItemId, ItemState,
    LayoutConfig, Orientation, RealizedSnapshot, RecyclerOptions, ReorderMode, Size,
    WrapLineAlignment, are_close_with, grid, stack, wrap,
};

/// The four balance phases that pending remove animations can veto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BalancePhase {
    ManageLower,
    ManageUpper,
    BottomBounds,
    TopBounds,
}

/// A headless realize/recycle windowing engine.
///
/// This type is intentionally UI-agnostic:
/// - It does not hold any UI objects; containers are opaque ids handed back
///   through the item-state callback.
/// - The adapter drives it by feeding viewport geometry, scroll offsets and
///   collection mutations, and by playing the animations it schedules.
/// - Realized geometry is exposed via zero-allocation iteration
///   (`for_each_realized`).
///
/// One of three layout policies decides where realized items go; see
/// [`LayoutConfig`]. For a serializing driver with bring-into-view helpers,
/// see the `recycler-adapter` crate.
#[derive(Clone, Debug)]
pub struct Recycler {
    win: Window,
    policy: LayoutPolicy,
    /// Armed once per [`Self::begin_async_balance`]; while armed, realize
    /// loops defer their tail through the pending continuation.
    use_async: bool,
    /// Whether a deferred balance continuation is queued for the next tick.
    async_waiting: bool,

    notify_depth: Cell<usize>,
    notify_pending: Cell<bool>,
}

impl Recycler {
    /// Creates a new engine from options.
    ///
    /// Fails fast on invalid configuration (grid column count below 2, buffer
    /// scale outside its range); nothing is clamped.
    pub fn new(options: RecyclerOptions) -> Result<Self, ConfigError> {
        validate_buffer_scale(options.buffer_scale)?;
        let policy = LayoutPolicy::from_config(options.layout)?;
        let flip = policy.flips_layout_orientation();
        let win = Window::new(options, flip);
        rdebug!(
            count = win.count,
            layout = ?win.opts.layout,
            "Recycler::new"
        );
        let mut recycler = Self {
            win,
            policy,
            use_async: false,
            async_waiting: false,
            notify_depth: Cell::new(0),
            notify_pending: Cell::new(false),
        };
        if let LayoutPolicy::Grid(st) = &mut recycler.policy {
            st.refresh_item_extent(recycler.win.viewport_extent());
        }
        Ok(recycler)
    }

    pub fn options(&self) -> &RecyclerOptions {
        &self.win.opts
    }

    // ---- notification ----------------------------------------------------

    fn notify_now(&self) {
        if let Some(cb) = &self.win.opts.on_change {
            cb(self);
        }
    }

    fn notify(&self) {
        if self.notify_depth.get() > 0 {
            self.notify_pending.set(true);
            return;
        }
        self.notify_now();
    }

    /// Batches multiple updates into a single `on_change` notification.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        let depth = self.notify_depth.get();
        self.notify_depth.set(depth.saturating_add(1));

        f(self);

        let depth = self.notify_depth.get();
        debug_assert!(depth > 0, "notify_depth underflow");
        let next = depth.saturating_sub(1);
        self.notify_depth.set(next);

        if next == 0 && self.notify_pending.replace(false) {
            self.notify_now();
        }
    }

    pub fn set_on_change(
        &mut self,
        on_change: Option<impl Fn(&Recycler) + Send + Sync + 'static>,
    ) {
        self.win.opts.on_change = on_change.map(|f| Arc::new(f) as _);
        self.notify();
    }

    // ---- configuration ---------------------------------------------------

    pub fn count(&self) -> usize {
        self.win.count
    }

    /// Declares a new total item count without reflow bookkeeping. Use the
    /// `refresh_on_item_*` entry points for incremental mutations.
    pub fn set_count(&mut self, count: usize) {
        self.win.count = count;
        self.win.opts.count = count;
        self.notify();
    }

    pub fn orientation(&self) -> Orientation {
        self.win.orientation
    }

    /// Axis items are virtualized along. Equals the configured orientation for
    /// the stack policy; wrap and grid virtualize across it.
    pub fn layout_orientation(&self) -> Orientation {
        self.win.layout_orientation()
    }

    pub fn layout_config(&self) -> LayoutConfig {
        self.policy.config()
    }

    pub fn buffer_scale(&self) -> f64 {
        self.win.opts.buffer_scale
    }

    pub fn set_buffer_scale(&mut self, buffer_scale: f64) -> Result<(), ConfigError> {
        validate_buffer_scale(buffer_scale)?;
        if self.win.opts.buffer_scale != buffer_scale {
            self.win.opts.buffer_scale = buffer_scale;
            self.win.reset_buffers();
            self.balance_visual_space();
        }
        Ok(())
    }

    pub fn set_reorder_mode(&mut self, reorder_mode: ReorderMode) {
        if let LayoutPolicy::Stack(st) = &mut self.policy {
            st.reorder_mode = reorder_mode;
        }
    }

    pub fn set_wrap_line_alignment(&mut self, alignment: WrapLineAlignment) {
        if let LayoutPolicy::Wrap(st) = &mut self.policy {
            if st.line_alignment != alignment {
                st.line_alignment = alignment;
                if let Some(first) = st.first_row() {
                    wrap::reorder_from_row(st, &mut self.win, first);
                }
                self.notify();
            }
        }
    }

    pub fn set_stack_count(&mut self, stack_count: usize) -> Result<(), ConfigError> {
        if stack_count < 2 {
            return Err(ConfigError::StackCountTooSmall(stack_count));
        }
        if let LayoutPolicy::Grid(st) = &mut self.policy {
            st.stack_count = stack_count;
            st.refresh_item_extent(self.win.viewport_extent());
        }
        Ok(())
    }

    /// Swaps the active layout policy. Cancels in-flight animations, discards
    /// any deferred balance continuation and rebuilds the window from scratch.
    pub fn set_layout(&mut self, layout: LayoutConfig) -> Result<(), ConfigError> {
        let policy = LayoutPolicy::from_config(layout)?;
        rdebug!(layout = ?layout, "set_layout");
        self.stop_all_animations();
        self.recycle_all();
        self.policy = policy;
        self.win.flip_layout = self.policy.flips_layout_orientation();
        self.win.opts.layout = layout;
        if let LayoutPolicy::Grid(st) = &mut self.policy {
            st.refresh_item_extent(self.win.viewport_extent());
        }
        self.async_waiting = false;
        self.win.reset_buffers();
        self.balance_visual_space();
        Ok(())
    }

    /// Seeds the next empty-window realize pass with a specific data index.
    /// Consumed once.
    pub fn set_initial_item(&mut self, index: usize) {
        self.win.initial_item = Some(index);
    }

    // ---- scroll / viewport -----------------------------------------------

    pub fn scroll_offset(&self) -> f64 {
        self.win.scroll_offset
    }

    /// Applies a scroll offset reported by the host. Follow with
    /// [`Self::balance_visual_space`] (or use the adapter's controller).
    pub fn set_scroll_offset(&mut self, offset: f64) {
        let offset = offset.max(0.0);
        if self.win.scroll_offset == offset {
            return;
        }
        rtrace!(offset, "set_scroll_offset");
        self.win.scroll_offset = offset;
        self.win.scroll_scheduled = false;
        self.notify();
    }

    /// Engine-initiated scroll correction (mutation compensation, source
    /// reset). The host reads the new offset back through
    /// [`Self::scroll_offset`].
    fn scroll_to_offset(&mut self, offset: f64) {
        self.win.scroll_offset = offset.max(0.0);
        self.win.scroll_scheduled = true;
        self.notify();
    }

    pub fn viewport_length(&self) -> f64 {
        self.win.viewport_length()
    }

    pub fn viewport_extent(&self) -> f64 {
        self.win.viewport_extent()
    }

    /// Declared length of the scrollable surface.
    pub fn scrollable_content_length(&self) -> f64 {
        self.win.scrollable_content
    }

    /// Scrollable range (content minus viewport).
    pub fn scrollable_length(&self) -> f64 {
        self.win.scrollable_length()
    }

    pub fn average_item_length(&self) -> f64 {
        self.win.average_item_length
    }

    pub fn realized_items_length(&self) -> f64 {
        self.win.realized_items_length
    }

    /// Participates in the owner's layout pass. An unconstrained axis forces
    /// a full realize pass so the length can be inferred from content.
    pub fn measure(&mut self, available: Size) -> Size {
        self.win.available_width = available.width;
        self.win.available_height = available.height;

        let layout_orientation = self.win.layout_orientation();

        if !self.win.available_width.is_finite() {
            if layout_orientation == Orientation::Vertical {
                self.win.available_width = 0.0;
            } else if !self.win.opts.async_balance && self.win.count > 0 {
                self.win.available_width = f64::MAX;
                self.manage_viewport();
                self.win.available_width = self.win.realized_items_length;
            } else {
                self.win.available_width = 0.0;
            }
        }

        if !self.win.available_height.is_finite() {
            if layout_orientation == Orientation::Horizontal {
                self.win.available_height = 0.0;
            } else if !self.win.opts.async_balance && self.win.count > 0 {
                self.win.available_height = f64::MAX;
                self.manage_viewport();
                self.win.available_height = self.win.realized_items_length;
            } else {
                self.win.available_height = 0.0;
            }
        }

        if let LayoutPolicy::Grid(st) = &mut self.policy {
            st.refresh_item_extent(self.win.viewport_extent());
        }

        Size::new(self.win.available_width, self.win.available_height)
    }

    /// Reacts to a viewport size change: thresholds are rebuilt and the
    /// policy decides how much of the window survives.
    pub fn on_viewport_size_changed(&mut self, new_size: Size) {
        let old_size = self.win.last_viewport;
        self.win.available_width = new_size.width;
        self.win.available_height = new_size.height;
        if old_size == new_size {
            return;
        }
        rdebug!(
            width = new_size.width,
            height = new_size.height,
            "on_viewport_size_changed"
        );
        self.win.last_viewport = new_size;
        self.win.reset_buffers();
        if let LayoutPolicy::Grid(st) = &mut self.policy {
            st.refresh_item_extent(self.win.viewport_extent());
        }

        match &mut self.policy {
            LayoutPolicy::Stack(_) => {
                let cross_changed = match self.win.orientation {
                    Orientation::Vertical => new_size.width != old_size.width,
                    Orientation::Horizontal => new_size.height != old_size.height,
                };
                if !cross_changed {
                    self.balance_visual_space();
                } else if !self.win.order.is_empty() {
                    self.stop_all_animations();
                    for i in 0..self.win.order.len() {
                        let id = self.win.order[i];
                        self.measure_container(id);
                    }
                    stack::restack_all(&mut self.win);
                    self.notify();
                }
            }
            LayoutPolicy::Wrap(st) => {
                if st.order.is_empty() {
                    return;
                }
                let extent_changed = match self.win.orientation {
                    Orientation::Horizontal => new_size.width != old_size.width,
                    Orientation::Vertical => new_size.height != old_size.height,
                };
                if extent_changed {
                    let row_first = wrap::top_visible(st, &self.win)
                        .and_then(|top| st.row_of.get(&top).copied())
                        .and_then(|rid| st.row(rid).first_item);
                    if let Some(anchor) = row_first {
                        while self.win.first.is_some() && self.win.first != Some(anchor) {
                            self.recycle_first_item();
                        }
                    }
                    if let LayoutPolicy::Wrap(st) = &mut self.policy {
                        if let Some(first_row) = st.first_row() {
                            wrap::reorder_from_row(st, &mut self.win, first_row);
                        }
                    }
                    self.notify();
                }
            }
            LayoutPolicy::Grid(st) => {
                if self.win.order.is_empty() {
                    return;
                }
                let dirty = match self.win.orientation {
                    Orientation::Horizontal => new_size.width != old_size.width,
                    Orientation::Vertical => new_size.height != old_size.height,
                };
                if dirty {
                    st.clear();
                    let seed = self.win.first_index();
                    self.recycle_all();
                    self.win.initial_item = seed;
                    self.balance_visual_space();
                }
            }
        }
    }

    /// Flips the stacking axis. Invalidates every geometry assumption: stops
    /// animations, tears the chain down and rebalances from the item that was
    /// at the top of the viewport.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.win.orientation == orientation {
            return;
        }
        rdebug!(orientation = ?orientation, "set_orientation");
        self.win.orientation = orientation;
        self.win.opts.orientation = orientation;
        self.win.measured_lengths.clear();

        if self.win.count > 0 && !self.win.order.is_empty() {
            self.stop_all_animations();

            if matches!(self.policy, LayoutPolicy::Stack(_)) {
                self.win.initial_item = self.top_visible_index();
            }
            while let Some(last) = self.win.last {
                self.win.set_main_offset(last, 0.0);
                self.win.set_cross_offset(last, 0.0);
                self.recycle_item_dispatch(last);
            }
            match &mut self.policy {
                LayoutPolicy::Wrap(st) => st.clear(),
                LayoutPolicy::Grid(st) => st.clear(),
                LayoutPolicy::Stack(_) => {}
            }

            self.async_waiting = false;
            self.win.reset_buffers();
            self.begin_async_balance();
            self.balance_visual_space();
        } else {
            self.win.reset_buffers();
        }
        self.notify();
    }

    // ---- realize / recycle core -----------------------------------------

    /// Manages the viewport's lower side: optionally recycles the head items
    /// that fell beyond the upper buffer, then realizes downward until the
    /// viewport plus lower buffer is covered (or work is deferred).
    pub fn manage_lower_viewport(&mut self, recycle: bool) {
        self.batch_update(|e| e.manage_lower_viewport_inner(recycle));
    }

    fn manage_lower_viewport_inner(&mut self, recycle: bool) {
        if recycle {
            let mut visible_top = self.realized_items_top();
            while self.can_recycle_top(visible_top) {
                self.recycle_top(&mut visible_top);
            }

            if self.win.last.is_some()
                && self.win.first == self.win.last
                && !(self.win.is_first_realized_first_in_source()
                    || self.win.is_last_realized_last_in_source())
            {
                self.reset_realization_start_upper(visible_top);
            }
        }

        let mut processed = false;
        let mut visible_bottom = self.realized_items_bottom();

        while self.can_realize_bottom(visible_bottom) {
            let next_index = if self.win.order.is_empty() {
                match self.win.initial_item.take() {
                    Some(seed) if seed < self.win.count => Some(seed),
                    _ => (self.win.count > 0).then_some(0),
                }
            } else {
                let last_index = match self.win.last_index() {
                    Some(i) => i,
                    None => break,
                };
                (last_index + 1 < self.win.count).then(|| last_index + 1)
            };

            let viewport_filled = self.is_viewport_filled(visible_bottom);

            let Some(index) = next_index else {
                break;
            };

            let should_defer = match self.win.opts.async_balance_mode {
                AsyncBalanceMode::Standard => true,
                AsyncBalanceMode::FillViewportFirst => viewport_filled,
            };
            if self.use_async && processed && should_defer {
                self.schedule_async_balance();
                return;
            }

            let id = self.get_container_for_item(index, self.win.order.len());

            if self.win.anims.batch_add_armed
                && self.win.opts.animate_additions
                && !viewport_filled
                && !self.use_async
                && self.win.can_play_animation(id)
            {
                self.win.arena.get_mut(id).batch_animation_pending = true;
            } else if self.use_async && self.win.anims.batch_add_armed {
                if !viewport_filled && self.win.can_play_animation(id) {
                    self.win.schedule_add_ticket(id);
                } else {
                    self.win.anims.batch_add_armed = false;
                }
            }

            if self.position_bottom(id, &mut visible_bottom) {
                let container = self.win.arena.get(id).container;
                self.win.fire_state(container, index, ItemState::Realized);
                processed = true;
            } else {
                self.recycle_last_item();
                break;
            }

            visible_bottom = self.realized_items_bottom();
        }
        self.notify();
    }

    /// Mirror of [`Self::manage_lower_viewport`] for the head side, including
    /// the single-anchor jump when bottom recycling collapsed the window far
    /// from where realization should continue.
    pub fn manage_upper_viewport(&mut self, recycle: bool) {
        self.batch_update(|e| e.manage_upper_viewport_inner(recycle));
    }

    fn manage_upper_viewport_inner(&mut self, recycle: bool) {
        if self.win.first.is_none() {
            return;
        }

        if recycle {
            let mut visible_bottom = self.realized_items_bottom();
            while self.can_recycle_bottom(visible_bottom) {
                self.recycle_bottom(&mut visible_bottom);
            }

            if self.win.last.is_some()
                && self.win.first == self.win.last
                && !(self.win.is_first_realized_first_in_source()
                    || self.win.is_last_realized_last_in_source())
            {
                self.reset_realization_start_lower(visible_bottom);
            }
        }

        let mut processed = false;
        let mut visible_top = self.realized_items_top();

        while self.can_realize_top(visible_top) {
            let Some(first_index) = self.win.first_index() else {
                break;
            };
            if first_index == 0 {
                break;
            }

            if processed && self.use_async {
                self.schedule_async_balance();
                return;
            }

            let index = first_index - 1;
            let id = self.get_container_for_item(index, 0);
            let (positioned, needs_rebuild) = self.position_top(&mut visible_top);
            if positioned {
                let container = self.win.arena.get(id).container;
                self.win.fire_state(container, index, ItemState::Realized);
                processed = true;
                if needs_rebuild {
                    self.rebuild_window();
                    return;
                }
            } else {
                self.recycle_first_item();
                break;
            }

            visible_top = self.realized_items_top();
        }
        self.notify();
    }

    /// Runs a full balance pass: lower manage, upper manage, measurement
    /// refresh and both scrollable-bounds corrections.
    pub fn balance_visual_space(&mut self) {
        self.batch_update(|e| {
            e.manage_viewport();
            if e.win.anims.batch_add_armed && !e.use_async {
                e.schedule_batch_add_animations();
            }
        });
    }

    fn manage_viewport(&mut self) {
        if let LayoutPolicy::Grid(st) = &mut self.policy {
            st.refresh_item_extent(self.win.viewport_extent());
        }

        if self.can_balance(BalancePhase::ManageLower) {
            self.manage_lower_viewport_inner(true);
        }
        if self.can_balance(BalancePhase::ManageUpper) {
            self.manage_upper_viewport_inner(true);
        }

        self.recalculate_viewport_measurements();

        if self.can_balance(BalancePhase::BottomBounds) {
            self.check_bottom_scrollable_bounds();
        }
        if self.can_balance(BalancePhase::TopBounds) {
            self.check_top_scrollable_bounds();
        }

        if self.use_async && !self.async_waiting {
            self.use_async = false;
        }
    }

    /// Bounds corrections must not run while a remove-animated container
    /// outside the realized span still holds viewport space.
    fn can_balance(&self, phase: BalancePhase) -> bool {
        if self.win.anims.scheduled_remove.is_empty() {
            return true;
        }
        if matches!(phase, BalancePhase::ManageLower | BalancePhase::ManageUpper) {
            return true;
        }
        let (Some(first), Some(last)) = (self.win.first, self.win.last) else {
            return false;
        };
        let first_offset = self.win.main_offset(first);
        let last_offset = self.win.main_offset(last);
        self.win
            .anims
            .scheduled_remove
            .iter()
            .all(|t| t.offset >= first_offset && t.offset <= last_offset)
    }

    fn rebuild_window(&mut self) {
        rdebug!("rebuild_window");
        self.recycle_all();
        self.win.reset_buffers();
        self.recalculate_viewport_measurements();
        self.balance_visual_space();
    }

    fn recalculate_viewport_measurements(&mut self) {
        if self.win.order.is_empty() {
            return;
        }
        self.win.recalculate_average();
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::recalculate_measurements(&mut self.win),
            LayoutPolicy::Wrap(st) => wrap::recalculate_measurements(st, &mut self.win),
            LayoutPolicy::Grid(st) => grid::recalculate_measurements(st, &mut self.win),
        }
    }

    // ---- container acquisition ------------------------------------------

    fn measure_container(&mut self, id: ItemId) {
        let index = self.win.data_index(id);
        let constraint = match &self.policy {
            LayoutPolicy::Stack(_) | LayoutPolicy::Wrap(_) => match self.win.orientation {
                Orientation::Vertical if !self.win.flip_layout => {
                    Size::new(self.win.available_width, f64::INFINITY)
                }
                Orientation::Horizontal if !self.win.flip_layout => {
                    Size::new(f64::INFINITY, self.win.available_height)
                }
                // Wrap flips: the configured orientation is the row axis.
                Orientation::Horizontal => Size::new(self.win.available_width, f64::INFINITY),
                Orientation::Vertical => Size::new(f64::INFINITY, self.win.available_height),
            },
            LayoutPolicy::Grid(st) => match self.win.orientation {
                Orientation::Horizontal => Size::new(st.item_extent, f64::INFINITY),
                Orientation::Vertical => Size::new(f64::INFINITY, st.item_extent),
            },
        };
        let measure = Arc::clone(&self.win.opts.measure_item);
        let size = measure(index, constraint);
        {
            let item = self.win.arena.get_mut(id);
            item.width = size.width;
            item.height = size.height;
        }
        let length = self.win.item_length(id);
        self.win.record_measured_length(index, length);
    }

    /// Pulls a container from the pool (or mints one), binds it to the data
    /// item, measures it and splices it into the chain at `insert_at`.
    fn get_container_for_item(&mut self, index: usize, insert_at: usize) -> ItemId {
        let container = self.win.acquire_container();
        self.win.fire_state(container, index, ItemState::Realizing);

        let get_key = Arc::clone(&self.win.opts.get_item_key);
        let record = RealizedItem::new(index, get_key(index), container);
        let id = self.win.insert_realized(record, insert_at);
        self.measure_container(id);

        match &mut self.policy {
            LayoutPolicy::Stack(_) => {
                let length = self.win.item_length(id);
                self.win.realized_items_length += length;
            }
            LayoutPolicy::Wrap(st) => {
                st.all_items_extent += self.win.item_extent(id);
            }
            LayoutPolicy::Grid(_) => {}
        }
        rtrace!(index, insert_at, "realized");
        id
    }

    fn recycle_item_dispatch(&mut self, id: ItemId) {
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::recycle_item(&mut self.win, id),
            LayoutPolicy::Wrap(st) => wrap::recycle_item(st, &mut self.win, id),
            LayoutPolicy::Grid(st) => grid::recycle_item(st, &mut self.win, id),
        }
    }

    fn recycle_first_item(&mut self) {
        if let Some(first) = self.win.first {
            self.recycle_item_dispatch(first);
        }
    }

    fn recycle_last_item(&mut self) {
        if let Some(last) = self.win.last {
            self.recycle_item_dispatch(last);
        }
    }

    fn recycle_all(&mut self) {
        while self.win.first.is_some() {
            self.recycle_first_item();
        }
        match &mut self.policy {
            LayoutPolicy::Wrap(st) => st.clear(),
            LayoutPolicy::Grid(st) => st.clear(),
            LayoutPolicy::Stack(_) => {}
        }
    }

    // ---- policy dispatch -------------------------------------------------

    fn realized_items_bottom(&self) -> f64 {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::realized_items_bottom(&self.win),
            LayoutPolicy::Wrap(st) => wrap::realized_items_bottom(st, &self.win),
            LayoutPolicy::Grid(_) => grid::realized_items_bottom(&self.win),
        }
    }

    fn realized_items_top(&self) -> f64 {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::realized_items_top(&self.win),
            LayoutPolicy::Wrap(st) => wrap::realized_items_top(st, &self.win),
            LayoutPolicy::Grid(_) => grid::realized_items_top(&self.win),
        }
    }

    fn can_recycle_top(&self, visible_top: f64) -> bool {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::can_recycle_top(&self.win, visible_top),
            LayoutPolicy::Wrap(st) => wrap::can_recycle_top(st, &self.win, visible_top),
            LayoutPolicy::Grid(_) => grid::can_recycle_top(&self.win),
        }
    }

    fn recycle_top(&mut self, visible_top: &mut f64) {
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::recycle_top(&mut self.win, visible_top),
            LayoutPolicy::Wrap(st) => wrap::recycle_top(st, &mut self.win, visible_top),
            LayoutPolicy::Grid(st) => grid::recycle_top(st, &mut self.win, visible_top),
        }
    }

    fn can_recycle_bottom(&self, visible_bottom: f64) -> bool {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::can_recycle_bottom(&self.win, visible_bottom),
            LayoutPolicy::Wrap(st) => wrap::can_recycle_bottom(st, &self.win, visible_bottom),
            LayoutPolicy::Grid(_) => grid::can_recycle_bottom(&self.win, visible_bottom),
        }
    }

    fn recycle_bottom(&mut self, visible_bottom: &mut f64) {
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::recycle_bottom(&mut self.win, visible_bottom),
            LayoutPolicy::Wrap(st) => wrap::recycle_bottom(st, &mut self.win, visible_bottom),
            LayoutPolicy::Grid(st) => grid::recycle_bottom(st, &mut self.win, visible_bottom),
        }
    }

    fn can_realize_bottom(&self, visible_bottom: f64) -> bool {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::can_realize_bottom(&self.win, visible_bottom),
            LayoutPolicy::Wrap(_) => wrap::can_realize_bottom(&self.win, visible_bottom),
            LayoutPolicy::Grid(_) => grid::can_realize_bottom(&self.win),
        }
    }

    fn can_realize_top(&self, visible_top: f64) -> bool {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::can_realize_top(&self.win, visible_top),
            LayoutPolicy::Wrap(_) => wrap::can_realize_top(&self.win, visible_top),
            LayoutPolicy::Grid(_) => grid::can_realize_top(&self.win),
        }
    }

    fn position_bottom(&mut self, id: ItemId, visible_bottom: &mut f64) -> bool {
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::position_bottom(&mut self.win, id, visible_bottom),
            LayoutPolicy::Wrap(st) => wrap::position_bottom(st, &mut self.win, id, visible_bottom),
            LayoutPolicy::Grid(st) => grid::position_bottom(st, &mut self.win, id, visible_bottom),
        }
    }

    fn position_top(&mut self, visible_top: &mut f64) -> (bool, bool) {
        match &mut self.policy {
            LayoutPolicy::Stack(_) => stack::position_top(&mut self.win, visible_top),
            LayoutPolicy::Wrap(st) => {
                (wrap::position_top(st, &mut self.win, visible_top), false)
            }
            LayoutPolicy::Grid(st) => {
                let positioned = grid::position_top(st, &mut self.win, visible_top);
                grid::ensure_correct_layout(st, &mut self.win);
                (positioned, false)
            }
        }
    }

    fn is_viewport_filled(&self, visible_bottom: f64) -> bool {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::is_viewport_filled(&self.win, visible_bottom),
            LayoutPolicy::Wrap(st) => wrap::is_viewport_filled(st, &self.win, visible_bottom),
            LayoutPolicy::Grid(_) => grid::is_viewport_filled(&self.win, visible_bottom),
        }
    }

    fn top_visible_id(&self) -> Option<ItemId> {
        if self.win.order.is_empty() {
            return None;
        }
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::top_visible(&self.win),
            LayoutPolicy::Wrap(st) => wrap::top_visible(st, &self.win),
            LayoutPolicy::Grid(st) => grid::top_visible(st, &self.win),
        }
    }

    /// Estimated scroll offset of an arbitrary data index, from the running
    /// average. Heuristic seed for bring-into-view; the realize loops correct
    /// the exact boundary afterwards.
    pub fn calculate_item_offset(&self, index: usize) -> f64 {
        match &self.policy {
            LayoutPolicy::Stack(_) => stack::calculate_item_offset(&self.win, index),
            LayoutPolicy::Wrap(st) => wrap::calculate_item_offset(st, &self.win, index),
            LayoutPolicy::Grid(st) => grid::calculate_item_offset(st, &self.win, index),
        }
    }

    // ---- realization-start jumps -----------------------------------------

    /// Bottom recycling collapsed the window to one far-away anchor: estimate
    /// how many items the overshoot represents and jump the window start
    /// backward to a new seed, realized at the current scroll offset.
    fn reset_realization_start_lower(&mut self, position: f64) {
        let Some(last) = self.win.last else {
            return;
        };
        if self.win.average_item_length <= 0.0 {
            return;
        }

        match &self.policy {
            LayoutPolicy::Stack(_) => {
                let bottom_difference = position - self.win.item_length(last);
                if bottom_difference > self.win.bottom_threshold {
                    let skip =
                        (bottom_difference / self.win.average_item_length).round() as usize;
                    let first_index = self.win.first_index().unwrap_or(0);
                    let target = first_index.saturating_sub(skip);
                    rdebug!(seed = target, skip, "reset_realization_start_lower");
                    self.recycle_last_item();
                    let id = self.get_container_for_item(target, 0);
                    let offset = self.win.scroll_offset;
                    self.win.set_main_offset(id, offset);
                    self.win.set_cross_offset(id, 0.0);
                }
            }
            LayoutPolicy::Wrap(st) => {
                let Some(last_row) = st.last_row() else {
                    return;
                };
                let bottom_difference = position - st.row(last_row).length;
                if bottom_difference > self.win.bottom_threshold {
                    let row_count =
                        (bottom_difference / self.win.average_item_length).round() as usize;
                    let skip = (row_count as f64 * st.average_items_per_row) as usize;
                    let first_index = self.win.first_index().unwrap_or(0);
                    let target = first_index.saturating_sub(skip);
                    rdebug!(seed = target, skip, "reset_realization_start_lower");
                    self.recycle_all();
                    let id = self.get_container_for_item(target, 0);
                    let mut current_top = self.win.scroll_offset;
                    self.position_bottom(id, &mut current_top);
                }
            }
            LayoutPolicy::Grid(st) => {
                let bottom_difference = position - self.win.item_length(last);
                if bottom_difference > self.win.bottom_threshold + self.win.scroll_offset {
                    let row_count =
                        (bottom_difference / self.win.average_item_length).round() as usize;
                    let skip = row_count * st.stack_count;
                    let first_index = self.win.first_index().unwrap_or(0);
                    let target = first_index.saturating_sub(skip);
                    rdebug!(seed = target, skip, "reset_realization_start_lower");
                    self.recycle_all();
                    let id = self.get_container_for_item(target, 0);
                    let mut current_top = self.win.scroll_offset;
                    self.position_bottom(id, &mut current_top);
                }
            }
        }
    }

    /// Mirror jump for the other direction: top recycling left a single
    /// anchor far above where realization should continue.
    fn reset_realization_start_upper(&mut self, position: f64) {
        let Some(last) = self.win.last else {
            return;
        };
        if self.win.average_item_length <= 0.0 || self.win.count == 0 {
            return;
        }
        let max_index = self.win.count - 1;

        match &self.policy {
            LayoutPolicy::Stack(_) => {
                let top_difference = position + self.win.item_length(last);
                if top_difference < self.win.top_threshold {
                    let skip =
                        (top_difference.abs() / self.win.average_item_length).round() as usize;
                    let last_index = self.win.last_index().unwrap_or(0);
                    let target = (last_index + skip).min(max_index);
                    rdebug!(seed = target, skip, "reset_realization_start_upper");
                    self.recycle_last_item();
                    let id = self.get_container_for_item(target, 0);
                    let offset = self.win.scroll_offset;
                    self.win.set_main_offset(id, offset);
                    self.win.set_cross_offset(id, 0.0);
                }
            }
            LayoutPolicy::Wrap(st) => {
                let Some(last_row) = st.last_row() else {
                    return;
                };
                let top_difference = position + st.row(last_row).length;
                if top_difference < self.win.top_threshold {
                    let row_count =
                        (top_difference.abs() / self.win.average_item_length).round() as usize;
                    let skip = (row_count as f64 * st.average_items_per_row) as usize;
                    let last_index = self.win.last_index().unwrap_or(0);
                    let target = (last_index + skip).min(max_index);
                    rdebug!(seed = target, skip, "reset_realization_start_upper");
                    self.recycle_all();
                    let id = self.get_container_for_item(target, 0);
                    let mut current_top = self.win.scroll_offset;
                    self.position_bottom(id, &mut current_top);
                }
            }
            LayoutPolicy::Grid(st) => {
                let top_difference = position + self.win.item_length(last);
                if top_difference < self.win.top_threshold {
                    let row_count =
                        (top_difference.abs() / self.win.average_item_length).round() as usize;
                    let skip = row_count * st.stack_count;
                    let last_index = self.win.last_index().unwrap_or(0);
                    let even = last_index.saturating_sub((last_index + 1) % st.stack_count) + 1;
                    let target = (even + skip)
                        .min(self.win.count.saturating_sub(st.stack_count))
                        .min(max_index);
                    rdebug!(seed = target, skip, "reset_realization_start_upper");
                    self.recycle_all();
                    let id = self.get_container_for_item(target, 0);
                    let mut current_top = self.win.scroll_offset;
                    self.position_bottom(id, &mut current_top);
                }
            }
        }
    }

    // ---- scrollable bounds ----------------------------------------------

    fn correct_scrollable_content_size(&mut self, delta: f64) {
        rtrace!(delta, "correct_scrollable_content_size");
        self.win.scrollable_content += delta;
        self.notify();
    }

    fn check_resize_scrollable_content_when_all_items_realized(&mut self) {
        if self.win.order.is_empty() {
            return;
        }
        if self.win.is_first_realized_first_in_source()
            && self.win.is_last_realized_last_in_source()
        {
            let delta = -self.win.scrollable_content + self.win.realized_items_length;
            self.correct_scrollable_content_size(delta);
        }
    }

    /// Compares the realized window's bottom edge against the declared
    /// scrollable surface and grows/shrinks the surface by the discrepancy.
    pub fn check_bottom_scrollable_bounds(&mut self) {
        if self.win.order.is_empty() {
            return;
        }

        let last_item_bottom = self.realized_items_bottom();
        let content_end = self.win.scrollable_content;

        let first_realized = self.win.is_first_realized_first_in_source();
        let last_realized = self.win.is_last_realized_last_in_source();

        if are_close_with(last_item_bottom, content_end, crate::EPSILON) && last_realized {
            return;
        }

        if last_realized {
            let offset_change = last_item_bottom - content_end;
            let last_item_start = match self.win.last {
                Some(last) => self.win.main_offset(last),
                None => return,
            };
            let viewport_edge = self.win.scroll_offset + self.win.viewport_length();
            if (last_item_bottom < viewport_edge && offset_change < 0.0)
                || last_item_start < viewport_edge
                || viewport_edge > self.win.scrollable_length()
            {
                if !are_close_with(offset_change, 0.0, 0.1) {
                    self.correct_scrollable_content_size(offset_change);
                }
            }
        } else if !are_close_with(last_item_bottom, content_end, crate::EPSILON)
            && !(first_realized && last_realized)
        {
            let change = self.win.scrollable_items_length - content_end;
            if change.abs() > 0.01 {
                self.correct_scrollable_content_size(change);
            }
        } else {
            self.check_resize_scrollable_content_when_all_items_realized();
        }
    }

    /// Top-side counterpart: detects head drift and either re-stacks the
    /// window or snaps the surface when everything is realized.
    pub fn check_top_scrollable_bounds(&mut self) {
        let first_item_top = self.realized_items_top();
        let first_realized =
            self.win.first.is_some() && self.win.is_first_realized_first_in_source();

        if first_item_top == self.win.scroll_offset {
            return;
        }

        if (first_realized && !are_close_with(first_item_top, 0.0, 0.01))
            || (first_item_top < 0.0 && self.win.scroll_offset < self.win.viewport_length() / 4.0)
        {
            let new_offset = self.win.scroll_offset - first_item_top;
            if !are_close_with(new_offset, self.win.scroll_offset, 0.01) {
                self.ensure_correct_layout();
            }
        } else {
            self.check_resize_scrollable_content_when_all_items_realized();
        }
    }

    /// Correctness safety net for accumulated drift: re-stacks the realized
    /// window when the head no longer sits where index arithmetic says it
    /// should.
    pub fn ensure_correct_layout(&mut self) {
        let Some(top) = self.top_visible_id() else {
            return;
        };
        match &mut self.policy {
            LayoutPolicy::Stack(_) => {
                if stack::needs_layout_correction(&self.win, top) {
                    rdebug!("ensure_correct_layout: restacking");
                    for i in 0..self.win.order.len() {
                        let id = self.win.order[i];
                        self.win.set_main_offset(id, 0.0);
                        self.win.set_cross_offset(id, 0.0);
                    }
                    let mut size = 0.0;
                    for i in 0..self.win.order.len() {
                        let id = self.win.order[i];
                        stack::position_bottom(&mut self.win, id, &mut size);
                    }
                }
            }
            LayoutPolicy::Wrap(_) => {
                if stack::needs_layout_correction(&self.win, top) {
                    rdebug!("ensure_correct_layout: rebuilding wrap window");
                    self.recycle_all();
                }
            }
            LayoutPolicy::Grid(st) => {
                grid::ensure_correct_layout(st, &mut self.win);
            }
        }
    }

    // ---- collection mutations --------------------------------------------

    /// Call after an item was inserted at `index` in the data sequence.
    pub fn refresh_on_item_added(&mut self, index: usize) {
        rdebug!(index, "refresh_on_item_added");
        self.win.count += 1;
        self.win.opts.count = self.win.count;
        self.win.shift_indices_from(index, 1);

        if let (Some(first), Some(last)) = (self.win.first_index(), self.win.last_index()) {
            if index + 1 >= first && index <= last {
                let list_start = if index + 1 == first { index + 1 } else { index };
                let physical = list_start - first;
                if physical < self.win.order.len() {
                    let id = self.get_container_for_item(index, physical);
                    match &mut self.policy {
                        LayoutPolicy::Stack(st) => {
                            let mode = st.reorder_mode;
                            stack::reorder_on_item_added(&mut self.win, mode, physical, id);
                        }
                        LayoutPolicy::Wrap(st) => {
                            wrap::reorder_on_item_added(st, &mut self.win, physical);
                        }
                        LayoutPolicy::Grid(st) => {
                            grid::reorder_on_item_added(st, &mut self.win, id);
                        }
                    }
                    let container = self.win.arena.get(id).container;
                    self.win.fire_state(container, index, ItemState::Realized);
                    self.maybe_schedule_add_animation(id);
                }
            } else if index < first {
                self.reorder_on_item_added_on_top();
            } else if self.can_realize_bottom(self.realized_items_bottom()) {
                self.manage_lower_viewport_inner(false);
                if let Some(last_id) = self.win.last {
                    if self.win.data_index(last_id) == index {
                        self.maybe_schedule_add_animation(last_id);
                    }
                }
            }
        }

        if self.win.anims.scheduled_remove.is_empty() {
            self.balance_visual_space();
        }
        self.notify();
    }

    fn maybe_schedule_add_animation(&mut self, id: ItemId) {
        if !self.win.opts.animate_additions
            || !self
                .win
                .opts
                .animation_mode
                .contains(ItemAnimationMode::PLAY_ON_ADD)
            || !self.win.can_play_animation(id)
        {
            return;
        }
        if self.win.anims.batch_add_armed {
            self.win.arena.get_mut(id).batch_animation_pending = true;
        } else {
            self.win.schedule_add_ticket(id);
        }
    }

    /// Call after the item previously at `index` was removed from the data
    /// sequence.
    pub fn refresh_on_item_removed(&mut self, index: usize) {
        rdebug!(index, "refresh_on_item_removed");
        self.win.measured_lengths.remove(&index);

        if let (Some(first), Some(last)) = (self.win.first_index(), self.win.last_index()) {
            if index >= first && index <= last {
                let physical = index - first;
                let id = self.win.order[physical];
                let wants_animation = self.win.opts.animate_removals
                    && self
                        .win
                        .opts
                        .animation_mode
                        .contains(ItemAnimationMode::PLAY_ON_REMOVE)
                    && self.win.can_play_animation(id);
                if wants_animation {
                    self.win.schedule_remove_ticket(id);
                    self.recycle_item_dispatch(id);
                } else {
                    let removed_length = self.win.item_length(id);
                    self.recycle_item_dispatch(id);
                    match &mut self.policy {
                        LayoutPolicy::Stack(st) => {
                            let mode = st.reorder_mode;
                            stack::reorder_on_item_removed(
                                &mut self.win,
                                mode,
                                physical,
                                removed_length,
                            );
                        }
                        LayoutPolicy::Wrap(st) => {
                            wrap::reorder_on_item_removed(st, &mut self.win, physical);
                        }
                        LayoutPolicy::Grid(st) => {
                            grid::reorder_on_item_removed(st, &mut self.win, physical);
                        }
                    }
                }
            } else if index < first {
                self.reorder_on_item_removed_from_top();
            }
        }

        self.win.count = self.win.count.saturating_sub(1);
        self.win.opts.count = self.win.count;
        self.win.shift_indices_from(index + 1, -1);

        if self.win.count == 0 {
            self.scroll_to_offset(0.0);
            return;
        }
        if self.win.anims.scheduled_remove.is_empty() {
            self.balance_visual_space();
        }
        self.notify();
    }

    /// Call after the item at `index` was replaced in the data sequence.
    pub fn refresh_on_item_replaced(&mut self, index: usize) {
        rdebug!(index, "refresh_on_item_replaced");
        if let Some(physical) = self.win.physical_index(index) {
            let id = self.win.order[physical];
            let get_key = Arc::clone(&self.win.opts.get_item_key);
            self.win.arena.get_mut(id).key = get_key(index);
            self.measure_container(id);
            match &mut self.policy {
                LayoutPolicy::Stack(st) => {
                    let mode = st.reorder_mode;
                    stack::reorder_on_item_replaced(&mut self.win, mode, id);
                }
                LayoutPolicy::Wrap(st) => {
                    wrap::reorder_on_item_replaced(st, &mut self.win, id);
                }
                LayoutPolicy::Grid(st) => {
                    grid::reorder_on_item_replaced(st, &mut self.win, id);
                }
            }
        }

        if self.win.anims.scheduled_remove.is_empty() {
            self.balance_visual_space();
        }
        self.notify();
    }

    /// Call after the data sequence was rebuilt wholesale.
    pub fn refresh_on_source_reset(&mut self, new_count: usize) {
        rdebug!(new_count, "refresh_on_source_reset");
        self.stop_all_animations();
        self.recycle_all();
        self.win.measured_lengths.clear();
        self.win.count = new_count;
        self.win.opts.count = new_count;
        self.win.initial_item = None;
        self.win.scrollable_content = 0.0;
        self.async_waiting = false;
        self.scroll_to_offset(0.0);

        if self.win.opts.animate_additions
            && self
                .win
                .opts
                .animation_mode
                .contains(ItemAnimationMode::PLAY_ON_NEW_SOURCE)
        {
            self.win.anims.batch_add_armed = true;
        }
        self.balance_visual_space();
    }

    fn reorder_on_item_added_on_top(&mut self) {
        match &mut self.policy {
            LayoutPolicy::Stack(st) => {
                if st.reorder_mode == ReorderMode::ShiftDown {
                    let target = self.win.scroll_offset - self.win.average_item_length;
                    self.scroll_to_offset(target);
                }
            }
            LayoutPolicy::Wrap(_) => {
                let Some(old_first) = self.win.first else {
                    return;
                };
                let Some(first_index) = self.win.first_index().filter(|&i| i > 0) else {
                    return;
                };
                let id = self.get_container_for_item(first_index - 1, 0);
                if let LayoutPolicy::Wrap(st) = &mut self.policy {
                    if let Some(rid) = st.row_of.get(&old_first).copied() {
                        st.row_of.insert(id, rid);
                        st.row_mut(rid).first_item = Some(id);
                        wrap::reorder_from_row(st, &mut self.win, rid);
                    }
                }
            }
            // Slot assignments are keyed by identity; a top-side insertion
            // shifts indices but invalidates nothing realized.
            LayoutPolicy::Grid(_) => {}
        }
    }

    fn reorder_on_item_removed_from_top(&mut self) {
        match &mut self.policy {
            LayoutPolicy::Stack(st) => {
                if st.reorder_mode == ReorderMode::ShiftDown {
                    let target = self.win.scroll_offset + self.win.average_item_length;
                    self.scroll_to_offset(target);
                }
            }
            LayoutPolicy::Wrap(_) => {
                // Shift the realized window back by one item.
                self.recycle_first_item();
                if let LayoutPolicy::Wrap(st) = &mut self.policy {
                    if let Some(rid) = wrap::row_to_reorder_from(st, &self.win, 0, false) {
                        wrap::reorder_from_row(st, &mut self.win, rid);
                    }
                }
            }
            LayoutPolicy::Grid(_) => {}
        }
    }

    /// Call after a realized container's size changed post-layout (e.g. an
    /// image loaded). Irrelevant axis changes are ignored per policy.
    pub fn on_container_size_changed(&mut self, index: usize, new_size: Size) {
        let Some(physical) = self.win.physical_index(index) else {
            return;
        };
        let id = self.win.order[physical];
        let old_size = {
            let item = self.win.arena.get(id);
            Size::new(item.width, item.height)
        };

        let layout_orientation = self.win.layout_orientation();
        let relevant = match &self.policy {
            LayoutPolicy::Stack(_) => {
                old_size.axis(layout_orientation) != new_size.axis(layout_orientation)
            }
            _ => old_size.width != new_size.width || old_size.height != new_size.height,
        };
        if !relevant {
            return;
        }
        rdebug!(index, "on_container_size_changed");

        {
            let item = self.win.arena.get_mut(id);
            item.width = new_size.width;
            item.height = new_size.height;
        }
        let length = self.win.item_length(id);
        self.win.record_measured_length(index, length);
        let delta = new_size.axis(layout_orientation) - old_size.axis(layout_orientation);

        match &mut self.policy {
            LayoutPolicy::Stack(_) => {
                if self.win.next_of(id).is_none() {
                    self.win.realized_items_length += delta;
                } else {
                    stack::apply_container_resize(&mut self.win, id, delta);
                    self.recalculate_viewport_measurements();
                }
                if self.win.anims.scheduled_remove.is_empty() {
                    self.check_bottom_scrollable_bounds();
                }
            }
            LayoutPolicy::Wrap(st) => {
                let cross = layout_orientation.flipped();
                st.all_items_extent += new_size.axis(cross) - old_size.axis(cross);
                if let Some(own) = st.row_of.get(&id).copied() {
                    let rid = if st.row(own).first_item == Some(id) {
                        let pos = st.row_position(own);
                        match pos {
                            Some(p) if p > 0 => st.order[p - 1],
                            _ => own,
                        }
                    } else {
                        own
                    };
                    st.row_mut(rid).length = 0.0;
                    wrap::reorder_from_row(st, &mut self.win, rid);
                }
                self.recalculate_viewport_measurements();
                if self.win.anims.scheduled_remove.is_empty() {
                    self.check_bottom_scrollable_bounds();
                }
            }
            LayoutPolicy::Grid(st) => {
                if st.top_realized.contains(&id) {
                    grid::resize_top_realized(&mut self.win, id, delta);
                } else {
                    grid::reorder_on_item_resized(st, &mut self.win, id);
                }
                self.correct_scrollable_content_size(delta);
                self.ensure_correct_layout();
                self.check_bottom_scrollable_bounds();
            }
        }
        self.notify();
    }

    // ---- deferred balance ------------------------------------------------

    /// Arms the deferred balance mode for the next balance pass (one-shot).
    /// A no-op unless `async_balance` is enabled in the options.
    pub fn begin_async_balance(&mut self) {
        if self.win.opts.async_balance {
            self.use_async = true;
        }
    }

    fn schedule_async_balance(&mut self) {
        if !self.async_waiting {
            rtrace!("schedule_async_balance");
            self.async_waiting = true;
        }
    }

    /// Whether a deferred balance continuation is queued.
    pub fn has_pending_balance(&self) -> bool {
        self.async_waiting
    }

    /// Drains the deferred balance continuation, if any. Returns whether work
    /// was performed. Call once per host update tick.
    pub fn tick(&mut self) -> bool {
        if !self.async_waiting {
            return false;
        }
        self.async_waiting = false;
        self.balance_visual_space();
        true
    }

    // ---- animation scheduling --------------------------------------------

    pub fn scheduled_add_animations(&self) -> &[AnimationTicket] {
        &self.win.anims.scheduled_add
    }

    pub fn scheduled_remove_animations(&self) -> &[AnimationTicket] {
        &self.win.anims.scheduled_remove
    }

    /// Converts pending batch-add flags into tickets. Called automatically at
    /// the end of a synchronous balance while a new-source batch is armed.
    pub fn schedule_batch_add_animations(&mut self) {
        self.win.anims.batch_add_armed = false;
        for i in 0..self.win.order.len() {
            let id = self.win.order[i];
            if self.win.arena.get(id).batch_animation_pending {
                self.win.schedule_add_ticket(id);
            }
        }
    }

    /// Owner notification that an add animation finished.
    pub fn complete_add_animation(&mut self, ticket_id: u64) -> bool {
        let Some(position) = self
            .win
            .anims
            .scheduled_add
            .iter()
            .position(|t| t.id == ticket_id)
        else {
            return false;
        };
        let ticket = self.win.anims.scheduled_add.remove(position);
        for i in 0..self.win.order.len() {
            let id = self.win.order[i];
            if self.win.arena.get(id).container == ticket.container {
                self.win.arena.get_mut(id).batch_animation_pending = false;
            }
        }
        true
    }

    /// Owner notification that a remove animation finished. Re-enters the
    /// reflow logic; safe even though the chain may have changed shape since
    /// the ticket was issued (everything is re-derived from current state).
    pub fn complete_remove_animation(&mut self, ticket_id: u64) -> bool {
        let Some(position) = self
            .win
            .anims
            .scheduled_remove
            .iter()
            .position(|t| t.id == ticket_id)
        else {
            return false;
        };
        let ticket = self.win.anims.scheduled_remove.remove(position);
        if self.win.order.is_empty() {
            return true;
        }

        match &mut self.policy {
            LayoutPolicy::Stack(_) => {
                stack::apply_removed_animation_correction(&mut self.win, &ticket);
            }
            LayoutPolicy::Wrap(st) => {
                wrap::reorder_on_item_removed(st, &mut self.win, ticket.realized_index);
            }
            LayoutPolicy::Grid(st) => {
                grid::reorder_on_item_removed(st, &mut self.win, ticket.realized_index);
            }
        }
        self.manage_lower_viewport_inner(false);
        self.check_bottom_scrollable_bounds();
        self.notify();
        true
    }

    /// Drops every scheduled animation and batch flag without reflowing.
    /// Used when geometry assumptions are about to be rebuilt wholesale.
    pub fn stop_all_animations(&mut self) {
        self.win.anims.scheduled_add.clear();
        self.win.anims.scheduled_remove.clear();
        self.win.anims.batch_add_armed = false;
        for i in 0..self.win.order.len() {
            let id = self.win.order[i];
            self.win.arena.get_mut(id).batch_animation_pending = false;
        }
    }

    // ---- queries ---------------------------------------------------------

    pub fn realized_count(&self) -> usize {
        self.win.order.len()
    }

    pub fn first_realized_index(&self) -> Option<usize> {
        self.win.first_index()
    }

    pub fn last_realized_index(&self) -> Option<usize> {
        self.win.last_index()
    }

    /// Data index of the item at the top of the viewport, estimated from the
    /// running average and corrected by walking.
    pub fn top_visible_index(&self) -> Option<usize> {
        self.top_visible_id().map(|id| self.win.data_index(id))
    }

    pub fn is_item_realized(&self, index: usize) -> bool {
        self.win.physical_index(index).is_some()
    }

    /// Whether the item at `index` is inside the viewport.
    pub fn is_item_in_viewport(&self, index: usize, include_partially_visible: bool) -> bool {
        let Some(top) = self.top_visible_id() else {
            return false;
        };
        let Some(start) = self.win.physical_index(self.win.data_index(top)) else {
            return false;
        };
        let bottom_edge = self.win.scroll_offset + self.win.viewport_length();

        for i in start..self.win.order.len() {
            let id = self.win.order[i];
            let item_top = self.win.main_offset(id);
            if item_top >= bottom_edge {
                break;
            }
            if !include_partially_visible
                && (item_top < self.win.scroll_offset || self.win.item_end(id) > bottom_edge)
            {
                continue;
            }
            if self.win.data_index(id) == index {
                return true;
            }
        }
        false
    }

    /// Zero-allocation iteration over the realized window, head to tail.
    pub fn for_each_realized(&self, mut f: impl FnMut(RealizedSnapshot)) {
        for &id in &self.win.order {
            f(self.win.snapshot(id));
        }
    }

    /// Collects realized snapshots into `out` (clears `out` first).
    pub fn collect_realized(&self, out: &mut Vec<RealizedSnapshot>) {
        out.clear();
        self.for_each_realized(|s| out.push(s));
    }

    pub fn snapshot_at(&self, index: usize) -> Option<RealizedSnapshot> {
        let physical = self.win.physical_index(index)?;
        Some(self.win.snapshot(self.win.order[physical]))
    }

    pub fn pool_len(&self) -> usize {
        self.win.pool.len()
    }

    /// Empties the recycle pool. Containers already handed out are
    /// unaffected.
    pub fn clear_pool(&mut self) {
        self.win.pool.clear();
    }
}

fn validate_buffer_scale(buffer_scale: f64) -> Result<(), ConfigError> {
    if buffer_scale == 0.0 || (1.0..=4.0).contains(&buffer_scale) {
        Ok(())
    } else {
        Err(ConfigError::BufferScaleOutOfRange(buffer_scale))
    }
}
