use std::collections::{HashMap, VecDeque};

use crate::item::{ItemArena, RealizedItem};
use crate::{
    AnimationTicket, ContainerId, ItemId, ItemState, Orientation, RealizedSnapshot,
    RecyclerOptions, Size,
};

/// Scheduled (not yet completed) add/remove animations.
#[derive(Clone, Debug, Default)]
pub(crate) struct AnimationState {
    pub(crate) scheduled_add: Vec<AnimationTicket>,
    pub(crate) scheduled_remove: Vec<AnimationTicket>,
    pub(crate) batch_add_armed: bool,
    pub(crate) next_ticket: u64,
}

impl AnimationState {
    fn next_id(&mut self) -> u64 {
        let id = self.next_ticket;
        self.next_ticket += 1;
        id
    }

    pub(crate) fn is_container_scheduled(&self, container: ContainerId) -> bool {
        self.scheduled_add.iter().any(|t| t.container == container)
            || self.scheduled_remove.iter().any(|t| t.container == container)
    }
}

/// Shared window-manager state: the realized chain, the container pool,
/// measured-length accounting, thresholds, and viewport/scroll geometry.
///
/// The layout policies receive `&mut Window` for everything that is not
/// policy-specific; the engine owns the single instance.
#[derive(Clone, Debug)]
pub(crate) struct Window {
    pub(crate) opts: RecyclerOptions,
    pub(crate) orientation: Orientation,
    /// Wrap/grid virtualize along the flip of the configured orientation.
    pub(crate) flip_layout: bool,
    pub(crate) count: usize,

    pub(crate) arena: ItemArena,
    /// Index-ordered mirror of the chain, head first. Bounded by the window.
    pub(crate) order: Vec<ItemId>,
    pub(crate) first: Option<ItemId>,
    pub(crate) last: Option<ItemId>,

    pub(crate) pool: VecDeque<ContainerId>,
    next_container: u64,

    /// Measured item lengths keyed by data index; feeds the running average.
    pub(crate) measured_lengths: HashMap<usize, f64>,
    pub(crate) average_item_length: f64,
    pub(crate) realized_items_length: f64,
    pub(crate) scrollable_items_length: f64,

    pub(crate) available_width: f64,
    pub(crate) available_height: f64,
    pub(crate) last_viewport: Size,

    pub(crate) scroll_offset: f64,
    /// Set while a scroll correction requested by the engine itself has not
    /// yet been acknowledged by the host.
    pub(crate) scroll_scheduled: bool,
    /// Declared length of the scrollable surface.
    pub(crate) scrollable_content: f64,

    pub(crate) top_threshold: f64,
    pub(crate) bottom_threshold: f64,

    /// One-shot realization seed, consumed by the next empty-window realize.
    pub(crate) initial_item: Option<usize>,

    pub(crate) anims: AnimationState,
}

impl Window {
    pub(crate) fn new(opts: RecyclerOptions, flip_layout: bool) -> Self {
        let orientation = opts.orientation;
        let count = opts.count;
        let viewport = opts.initial_viewport.unwrap_or_default();
        let scroll_offset = opts.initial_scroll_offset;
        let mut win = Self {
            opts,
            orientation,
            flip_layout,
            count,
            arena: ItemArena::default(),
            order: Vec::new(),
            first: None,
            last: None,
            pool: VecDeque::new(),
            next_container: 0,
            measured_lengths: HashMap::new(),
            average_item_length: 0.0,
            realized_items_length: 0.0,
            scrollable_items_length: 0.0,
            available_width: viewport.width,
            available_height: viewport.height,
            last_viewport: viewport,
            scroll_offset,
            scroll_scheduled: false,
            scrollable_content: 0.0,
            top_threshold: 0.0,
            bottom_threshold: 0.0,
            initial_item: None,
            anims: AnimationState::default(),
        };
        win.reset_buffers();
        win
    }

    // ---- axes ------------------------------------------------------------

    pub(crate) fn layout_orientation(&self) -> Orientation {
        if self.flip_layout {
            self.orientation.flipped()
        } else {
            self.orientation
        }
    }

    /// Length of the viewport along the layout (virtualization) axis.
    pub(crate) fn viewport_length(&self) -> f64 {
        match self.layout_orientation() {
            Orientation::Horizontal => self.available_width,
            Orientation::Vertical => self.available_height,
        }
    }

    /// Extent of the viewport across the layout axis.
    pub(crate) fn viewport_extent(&self) -> f64 {
        match self.layout_orientation() {
            Orientation::Horizontal => self.available_height,
            Orientation::Vertical => self.available_width,
        }
    }

    /// Scrollable range reported to the host: content length minus viewport.
    pub(crate) fn scrollable_length(&self) -> f64 {
        (self.scrollable_content - self.viewport_length()).max(0.0)
    }

    pub(crate) fn reset_buffers(&mut self) {
        self.top_threshold = -(self.opts.buffer_scale * self.viewport_length());
        self.bottom_threshold = -self.top_threshold;
    }

    // ---- per-item geometry ----------------------------------------------

    /// Extent of an item along the layout orientation.
    pub(crate) fn item_length(&self, id: ItemId) -> f64 {
        self.arena.get(id).size_along(self.layout_orientation())
    }

    /// Extent of an item across the layout orientation.
    pub(crate) fn item_extent(&self, id: ItemId) -> f64 {
        self.arena
            .get(id)
            .size_along(self.layout_orientation().flipped())
    }

    pub(crate) fn main_offset(&self, id: ItemId) -> f64 {
        self.arena.get(id).offset_along(self.layout_orientation())
    }

    pub(crate) fn set_main_offset(&mut self, id: ItemId, offset: f64) {
        let axis = self.layout_orientation();
        self.arena.get_mut(id).set_offset_along(axis, offset);
    }

    pub(crate) fn cross_offset(&self, id: ItemId) -> f64 {
        self.arena
            .get(id)
            .offset_along(self.layout_orientation().flipped())
    }

    pub(crate) fn set_cross_offset(&mut self, id: ItemId, offset: f64) {
        let axis = self.layout_orientation().flipped();
        self.arena.get_mut(id).set_offset_along(axis, offset);
    }

    pub(crate) fn item_end(&self, id: ItemId) -> f64 {
        self.main_offset(id) + self.item_length(id)
    }

    // ---- chain queries ---------------------------------------------------

    pub(crate) fn data_index(&self, id: ItemId) -> usize {
        self.arena.get(id).data_index
    }

    pub(crate) fn first_index(&self) -> Option<usize> {
        self.first.map(|id| self.data_index(id))
    }

    pub(crate) fn last_index(&self) -> Option<usize> {
        self.last.map(|id| self.data_index(id))
    }

    pub(crate) fn is_first_realized_first_in_source(&self) -> bool {
        self.first_index() == Some(0)
    }

    pub(crate) fn is_last_realized_last_in_source(&self) -> bool {
        self.count > 0 && self.last_index() == Some(self.count - 1)
    }

    pub(crate) fn next_of(&self, id: ItemId) -> Option<ItemId> {
        self.arena.get(id).next
    }

    pub(crate) fn prev_of(&self, id: ItemId) -> Option<ItemId> {
        self.arena.get(id).prev
    }

    /// Physical (chain) position of a realized data index, if realized.
    pub(crate) fn physical_index(&self, data_index: usize) -> Option<usize> {
        let first = self.first_index()?;
        let last = self.last_index()?;
        if data_index < first || data_index > last {
            return None;
        }
        let physical = data_index - first;
        debug_assert!(
            physical < self.order.len(),
            "chain shorter than its index range promises (physical={physical}, len={})",
            self.order.len()
        );
        (physical < self.order.len()).then_some(physical)
    }

    pub(crate) fn snapshot(&self, id: ItemId) -> RealizedSnapshot {
        let item = self.arena.get(id);
        RealizedSnapshot {
            index: item.data_index,
            key: item.key,
            container: item.container,
            horizontal_offset: item.horizontal_offset,
            vertical_offset: item.vertical_offset,
            width: item.width,
            height: item.height,
        }
    }

    // ---- containers ------------------------------------------------------

    pub(crate) fn fire_state(&self, container: ContainerId, data_index: usize, state: ItemState) {
        if let Some(cb) = &self.opts.on_item_state {
            cb(container, data_index, state);
        }
    }

    /// Dequeues a pooled container, or mints a fresh one. A pooled container
    /// that still has an animation scheduled on it is put back and a fresh one
    /// is minted instead.
    pub(crate) fn acquire_container(&mut self) -> ContainerId {
        if let Some(container) = self.pool.pop_front() {
            if self.anims.is_container_scheduled(container) {
                self.pool.push_back(container);
            } else {
                return container;
            }
        }
        let container = ContainerId(self.next_container);
        self.next_container += 1;
        container
    }

    /// Inserts a realized record at a physical position, wiring the chain and
    /// refreshing the head/tail caches.
    pub(crate) fn insert_realized(&mut self, record: RealizedItem, insert_at: usize) -> ItemId {
        debug_assert!(insert_at <= self.order.len());
        let id = self.arena.alloc(record);
        self.order.insert(insert_at, id);

        if insert_at > 0 {
            let prev = self.order[insert_at - 1];
            self.arena.get_mut(id).prev = Some(prev);
            self.arena.get_mut(prev).next = Some(id);
        }
        if insert_at + 1 < self.order.len() {
            let next = self.order[insert_at + 1];
            self.arena.get_mut(id).next = Some(next);
            self.arena.get_mut(next).prev = Some(id);
        }

        self.first = self.order.first().copied();
        self.last = self.order.last().copied();
        id
    }

    /// Unlinks an item from the chain, returns its container to the pool and
    /// fires the recycle lifecycle callbacks. Returns the detached record.
    pub(crate) fn detach(&mut self, id: ItemId) -> RealizedItem {
        debug_assert!(self.arena.is_live(id), "recycling an already-recycled item");
        let item = self.arena.get(id).clone();
        self.fire_state(item.container, item.data_index, ItemState::Recycling);

        if let Some(next) = item.next {
            self.arena.get_mut(next).prev = item.prev;
        }
        if let Some(prev) = item.prev {
            self.arena.get_mut(prev).next = item.next;
        }
        if let Some(pos) = self.order.iter().position(|&o| o == id) {
            self.order.remove(pos);
        } else {
            debug_assert!(false, "realized order lost track of a chain member");
        }
        self.arena.free(id);
        self.pool.push_back(item.container);

        self.first = self.order.first().copied();
        self.last = self.order.last().copied();
        if self.order.is_empty() {
            self.average_item_length = 0.0;
        }

        self.fire_state(item.container, item.data_index, ItemState::Recycled);
        item
    }

    // ---- measurements ----------------------------------------------------

    pub(crate) fn record_measured_length(&mut self, data_index: usize, length: f64) {
        self.measured_lengths.insert(data_index, length);
    }

    pub(crate) fn recalculate_average(&mut self) {
        if self.order.is_empty() {
            return;
        }
        if !self.measured_lengths.is_empty() {
            let total: f64 = self.measured_lengths.values().sum();
            self.average_item_length = total / self.measured_lengths.len() as f64;
        }
    }

    /// Shifts the cached data index of every realized item at or after
    /// `from_index` by `delta` (collection mutation bookkeeping).
    pub(crate) fn shift_indices_from(&mut self, from_index: usize, delta: isize) {
        for i in 0..self.order.len() {
            let id = self.order[i];
            let item = self.arena.get_mut(id);
            if item.data_index >= from_index {
                item.data_index = item.data_index.saturating_add_signed(delta);
            }
        }
    }

    // ---- animation tickets ----------------------------------------------

    /// Whether a container is close enough to the viewport for an animation
    /// to be worth scheduling.
    pub(crate) fn can_play_animation(&self, id: ItemId) -> bool {
        let relative = self.main_offset(id) - self.scroll_offset;
        relative < self.viewport_length() && relative + self.item_length(id) > 0.0
    }

    pub(crate) fn schedule_add_ticket(&mut self, id: ItemId) -> u64 {
        let realized_index = self
            .first_index()
            .map(|f| self.data_index(id).saturating_sub(f))
            .unwrap_or(0);
        let ticket = AnimationTicket {
            id: self.anims.next_id(),
            container: self.arena.get(id).container,
            realized_index,
            realized_length: self.item_length(id),
            offset: self.main_offset(id),
        };
        self.arena.get_mut(id).batch_animation_pending = false;
        self.anims.scheduled_add.push(ticket);
        ticket.id
    }

    pub(crate) fn schedule_remove_ticket(&mut self, id: ItemId) -> u64 {
        let realized_index = self
            .first_index()
            .map(|f| self.data_index(id).saturating_sub(f))
            .unwrap_or(0);
        let ticket = AnimationTicket {
            id: self.anims.next_id(),
            container: self.arena.get(id).container,
            realized_index,
            realized_length: self.item_length(id),
            offset: self.main_offset(id),
        };
        self.anims.scheduled_remove.push(ticket);
        ticket.id
    }

    /// Shifts the cached offsets of remove-animated containers positioned
    /// after `starting_from` by `delta`, so late completions reflow from the
    /// right place.
    pub(crate) fn translate_remove_animated(&mut self, starting_from: f64, delta: f64) {
        for ticket in &mut self.anims.scheduled_remove {
            if ticket.offset > starting_from {
                ticket.offset += delta;
            }
        }
    }
}
