/// Tolerance used for all "close enough" geometry comparisons.
///
/// Realize/recycle decisions compare accumulated floating-point offsets; exact
/// equality would make the loops oscillate on one-ulp drift.
pub const EPSILON: f64 = 1e-3;

pub(crate) fn are_close(a: f64, b: f64) -> bool {
    are_close_with(a, b, EPSILON)
}

pub(crate) fn are_close_with(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Axis along which containers stack and the viewport scrolls.
///
/// For the wrap and grid policies the *layout* orientation (the axis items are
/// virtualized along) is the flip of this value: a `Horizontal` wrap panel
/// fills rows left-to-right but virtualizes top-to-bottom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Horizontal,
    #[default]
    Vertical,
}

impl Orientation {
    pub(crate) fn flipped(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

/// A width/height pair. Axes are absolute (not main/cross); the engine picks
/// the relevant axis from the active layout orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub(crate) fn axis(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }
}

/// Virtualization lifecycle of a container, reported through
/// [`crate::RecyclerOptions::on_item_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ItemState {
    Realizing,
    Realized,
    Recycling,
    Recycled,
}

/// How the linear policy shifts neighbors when an item is inserted or removed
/// inside the realized window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReorderMode {
    /// Items after the change move toward the end by the changed extent.
    #[default]
    ShiftDown,
    /// Items before the change move toward the start instead.
    ShiftUp,
}

/// Cross-axis alignment applied to a flow row once it is known to be full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapLineAlignment {
    #[default]
    Near,
    Center,
    Far,
}

/// Governs how a deferred balance pass yields.
///
/// `Standard` defers after every realized item once the pass has processed one;
/// `FillViewportFirst` realizes synchronously until the viewport looks filled
/// and only defers the buffer work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsyncBalanceMode {
    #[default]
    Standard,
    FillViewportFirst,
}

bitflags::bitflags! {
    /// Which collection changes get an animation scheduled for them.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ItemAnimationMode: u8 {
        const PLAY_ON_ADD = 1;
        const PLAY_ON_REMOVE = 1 << 1;
        const PLAY_ON_NEW_SOURCE = 1 << 2;
        const PLAY_ALL = Self::PLAY_ON_ADD.bits()
            | Self::PLAY_ON_REMOVE.bits()
            | Self::PLAY_ON_NEW_SOURCE.bits();
    }
}

impl Default for ItemAnimationMode {
    fn default() -> Self {
        Self::PLAY_ALL
    }
}

/// Handle of a realized slot in the engine's arena.
///
/// Ids are reused after recycling; holding one across a recycle is a logic
/// error on the caller's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(pub(crate) u32);

/// Opaque identity of a visual container minted by the engine.
///
/// The pool recycles containers by availability only, so the same id will
/// serve many different data items over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerId(pub(crate) u64);

/// A read-only view of one realized item, as yielded by
/// [`crate::Recycler::for_each_realized`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealizedSnapshot {
    pub index: usize,
    pub key: u64,
    pub container: ContainerId,
    pub horizontal_offset: f64,
    pub vertical_offset: f64,
    pub width: f64,
    pub height: f64,
}

/// A scheduled add/remove animation the owner is expected to play.
///
/// The engine only does the bookkeeping: it hands out tickets and reflows when
/// the owner reports completion via
/// [`crate::Recycler::complete_remove_animation`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationTicket {
    pub id: u64,
    pub container: ContainerId,
    /// Position of the animated container relative to the realized window's
    /// head at schedule time.
    pub realized_index: usize,
    /// Extent of the container along the layout orientation at schedule time.
    pub realized_length: f64,
    /// Main-axis offset of the container at schedule time. Kept current while
    /// neighboring items shift so that late completions reflow correctly.
    pub offset: f64,
}
