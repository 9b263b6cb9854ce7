use recycler::{ConfigError, Orientation, Recycler, RecyclerOptions, Size};

/// A framework-neutral controller that wraps a [`recycler::Recycler`] and
/// serializes the host events that drive it.
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_viewport_size` / `on_scroll` when UI events occur
/// - `tick()` each frame/timer tick (drains deferred balance work)
/// - the mutation passthroughs after editing the data sequence
///
/// The engine sometimes moves the scroll offset itself (mutation compensation
/// above the window, source resets). Methods that can trigger such a
/// correction return the offset the host should apply to its real scroll
/// container, or `None` when the offset is untouched.
#[derive(Clone, Debug)]
pub struct Controller {
    r: Recycler,
    last_seen_offset: f64,
}

impl Controller {
    pub fn new(options: RecyclerOptions) -> Result<Self, ConfigError> {
        Ok(Self::from_recycler(Recycler::new(options)?))
    }

    pub fn from_recycler(r: Recycler) -> Self {
        let last_seen_offset = r.scroll_offset();
        Self {
            r,
            last_seen_offset,
        }
    }

    pub fn recycler(&self) -> &Recycler {
        &self.r
    }

    pub fn recycler_mut(&mut self) -> &mut Recycler {
        &mut self.r
    }

    pub fn into_recycler(self) -> Recycler {
        self.r
    }

    fn correction(&mut self) -> Option<f64> {
        let offset = self.r.scroll_offset();
        if offset == self.last_seen_offset {
            return None;
        }
        self.last_seen_offset = offset;
        Some(offset)
    }

    pub fn on_viewport_size(&mut self, size: Size) -> Option<f64> {
        self.r.on_viewport_size_changed(size);
        self.r.balance_visual_space();
        self.correction()
    }

    /// Call this when the UI reports a scroll offset change (e.g. user
    /// wheel/drag). Arms the deferred balance mode so engines configured for
    /// async balancing keep the current frame cheap.
    pub fn on_scroll(&mut self, offset: f64) {
        self.r.set_scroll_offset(offset);
        self.r.begin_async_balance();
        self.r.balance_visual_space();
        self.last_seen_offset = self.r.scroll_offset();
    }

    /// Advances the controller: drains any deferred balance continuation.
    /// Returns whether deferred work ran.
    pub fn tick(&mut self) -> bool {
        self.r.tick()
    }

    pub fn on_item_added(&mut self, index: usize) -> Option<f64> {
        self.r.refresh_on_item_added(index);
        self.correction()
    }

    pub fn on_item_removed(&mut self, index: usize) -> Option<f64> {
        self.r.refresh_on_item_removed(index);
        self.correction()
    }

    pub fn on_item_replaced(&mut self, index: usize) -> Option<f64> {
        self.r.refresh_on_item_replaced(index);
        self.correction()
    }

    pub fn on_source_reset(&mut self, new_count: usize) -> Option<f64> {
        self.r.refresh_on_source_reset(new_count);
        self.correction()
    }

    pub fn on_container_size_changed(&mut self, index: usize, new_size: Size) -> Option<f64> {
        self.r.on_container_size_changed(index, new_size);
        self.correction()
    }

    pub fn complete_add_animation(&mut self, ticket_id: u64) -> bool {
        self.r.complete_add_animation(ticket_id)
    }

    pub fn complete_remove_animation(&mut self, ticket_id: u64) -> bool {
        self.r.complete_remove_animation(ticket_id)
    }

    /// Scrolls so the item at `index` lands at the viewport start.
    ///
    /// The target offset is estimated from the running average, then snapped
    /// to the item's exact boundary once the realize pass has placed it.
    /// Returns the applied offset.
    pub fn bring_into_view(&mut self, index: usize) -> f64 {
        let index = index.min(self.r.count().saturating_sub(1));
        let estimate = self.r.calculate_item_offset(index);
        self.r.set_scroll_offset(estimate.max(0.0));
        self.r.balance_visual_space();

        if let Some(snapshot) = self.r.snapshot_at(index) {
            let start = match self.r.layout_orientation() {
                Orientation::Horizontal => snapshot.horizontal_offset,
                Orientation::Vertical => snapshot.vertical_offset,
            };
            self.r.set_scroll_offset(start.max(0.0));
            self.r.balance_visual_space();
        }

        self.last_seen_offset = self.r.scroll_offset();
        self.last_seen_offset
    }
}
