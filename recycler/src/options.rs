use std::sync::Arc;

use crate::recycler::Recycler;
use crate::{
    AsyncBalanceMode, ContainerId, ItemAnimationMode, ItemState, Orientation, ReorderMode, Size,
    WrapLineAlignment,
};

/// A callback fired when the engine's observable state changes (scroll
/// corrections, scrollable length updates, realize/recycle passes).
pub type OnChangeCallback = Arc<dyn Fn(&Recycler) + Send + Sync>;

/// A callback fired whenever a container transitions between virtualization
/// states. This is also how fresh container generation is observed: the first
/// `Realizing` for a given [`ContainerId`] means the engine minted it.
pub type ItemStateCallback = Arc<dyn Fn(ContainerId, usize, ItemState) + Send + Sync>;

/// Measures the item at an index under the given constraint and returns its
/// size. Infinite axes in the constraint mean "unbounded".
pub type MeasureItemCallback = Arc<dyn Fn(usize, Size) -> Size + Send + Sync>;

/// Layout policy selection plus the policy-specific parameters. Pure data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutConfig {
    /// Items placed end-to-end along the orientation axis.
    Stack { reorder_mode: ReorderMode },
    /// Items packed into rows up to the available cross extent.
    Wrap { line_alignment: WrapLineAlignment },
    /// A fixed number of parallel columns; items fill the shortest one.
    Grid { stack_count: usize },
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::Stack {
            reorder_mode: ReorderMode::default(),
        }
    }
}

/// Configuration for [`crate::Recycler`].
///
/// This type is designed to be cheap to clone: the collaborator hooks are
/// stored in `Arc`s so adapters can tweak a few fields and rebuild an engine
/// without reallocating closures.
pub struct RecyclerOptions {
    /// Number of items in the data sequence. Keep in sync through the
    /// `refresh_on_item_*` entry points.
    pub count: usize,
    /// Scroll/stacking axis. See [`Orientation`] for how wrap/grid flip it.
    pub orientation: Orientation,
    /// Realized-buffer size relative to the viewport length. Must be within
    /// `1.0..=4.0`, or exactly 0 to keep the window identical to the viewport.
    pub buffer_scale: f64,
    pub layout: LayoutConfig,

    /// Enables the deferred balance mode; see
    /// [`crate::Recycler::begin_async_balance`].
    pub async_balance: bool,
    pub async_balance_mode: AsyncBalanceMode,

    /// Which collection changes schedule animations. Tickets are only issued
    /// when the respective `animate_*` switch is on.
    pub animation_mode: ItemAnimationMode,
    /// Whether the owner has an add animation to play.
    pub animate_additions: bool,
    /// Whether the owner has a remove animation to play.
    pub animate_removals: bool,

    pub initial_viewport: Option<Size>,
    pub initial_scroll_offset: f64,

    /// Geometry service: measures the item at an index under a constraint.
    pub measure_item: MeasureItemCallback,
    /// Stable identity for the item at an index. Identities must survive
    /// index shifts caused by insertions/removals above the item.
    pub get_item_key: Arc<dyn Fn(usize) -> u64 + Send + Sync>,

    pub on_item_state: Option<ItemStateCallback>,
    pub on_change: Option<OnChangeCallback>,
}

impl RecyclerOptions {
    /// Creates options for a source of `count` items measured by
    /// `measure_item`, keyed by index.
    pub fn new(count: usize, measure_item: impl Fn(usize, Size) -> Size + Send + Sync + 'static) -> Self {
        Self {
            count,
            orientation: Orientation::Vertical,
            buffer_scale: 2.0,
            layout: LayoutConfig::default(),
            async_balance: false,
            async_balance_mode: AsyncBalanceMode::default(),
            animation_mode: ItemAnimationMode::default(),
            animate_additions: false,
            animate_removals: false,
            initial_viewport: None,
            initial_scroll_offset: 0.0,
            measure_item: Arc::new(measure_item),
            get_item_key: Arc::new(|i| i as u64),
            on_item_state: None,
            on_change: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_buffer_scale(mut self, buffer_scale: f64) -> Self {
        self.buffer_scale = buffer_scale;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_async_balance(mut self, enabled: bool, mode: AsyncBalanceMode) -> Self {
        self.async_balance = enabled;
        self.async_balance_mode = mode;
        self
    }

    pub fn with_animations(mut self, additions: bool, removals: bool, mode: ItemAnimationMode) -> Self {
        self.animate_additions = additions;
        self.animate_removals = removals;
        self.animation_mode = mode;
        self
    }

    pub fn with_initial_viewport(mut self, viewport: Option<Size>) -> Self {
        self.initial_viewport = viewport;
        self
    }

    pub fn with_initial_scroll_offset(mut self, offset: f64) -> Self {
        self.initial_scroll_offset = offset;
        self
    }

    pub fn with_get_item_key(
        mut self,
        get_item_key: impl Fn(usize) -> u64 + Send + Sync + 'static,
    ) -> Self {
        self.get_item_key = Arc::new(get_item_key);
        self
    }

    pub fn with_on_item_state(
        mut self,
        on_item_state: Option<impl Fn(ContainerId, usize, ItemState) + Send + Sync + 'static>,
    ) -> Self {
        self.on_item_state = on_item_state.map(|f| Arc::new(f) as _);
        self
    }

    pub fn with_on_change(
        mut self,
        on_change: Option<impl Fn(&Recycler) + Send + Sync + 'static>,
    ) -> Self {
        self.on_change = on_change.map(|f| Arc::new(f) as _);
        self
    }
}

impl Clone for RecyclerOptions {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            orientation: self.orientation,
            buffer_scale: self.buffer_scale,
            layout: self.layout,
            async_balance: self.async_balance,
            async_balance_mode: self.async_balance_mode,
            animation_mode: self.animation_mode,
            animate_additions: self.animate_additions,
            animate_removals: self.animate_removals,
            initial_viewport: self.initial_viewport,
            initial_scroll_offset: self.initial_scroll_offset,
            measure_item: Arc::clone(&self.measure_item),
            get_item_key: Arc::clone(&self.get_item_key),
            on_item_state: self.on_item_state.clone(),
            on_change: self.on_change.clone(),
        }
    }
}

impl core::fmt::Debug for RecyclerOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecyclerOptions")
            .field("count", &self.count)
            .field("orientation", &self.orientation)
            .field("buffer_scale", &self.buffer_scale)
            .field("layout", &self.layout)
            .field("async_balance", &self.async_balance)
            .field("async_balance_mode", &self.async_balance_mode)
            .field("animation_mode", &self.animation_mode)
            .field("animate_additions", &self.animate_additions)
            .field("animate_removals", &self.animate_removals)
            .field("initial_viewport", &self.initial_viewport)
            .field("initial_scroll_offset", &self.initial_scroll_offset)
            .finish_non_exhaustive()
    }
}
