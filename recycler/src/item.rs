use crate::{ContainerId, ItemId, Orientation};

/// One realized visual slot, bound to a single data item and linked into the
/// realized chain.
///
/// Offsets start at `-1.0` ("not positioned yet"); the layout policy is the
/// only writer after that. Records never exist outside the chain: they are
/// created on realize and freed on recycle.
#[derive(Clone, Debug)]
pub(crate) struct RealizedItem {
    pub(crate) data_index: usize,
    pub(crate) key: u64,
    pub(crate) container: ContainerId,
    pub(crate) prev: Option<ItemId>,
    pub(crate) next: Option<ItemId>,
    pub(crate) horizontal_offset: f64,
    pub(crate) vertical_offset: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
    /// Armed when the item participates in a pending batch add animation.
    pub(crate) batch_animation_pending: bool,
}

impl RealizedItem {
    pub(crate) fn new(data_index: usize, key: u64, container: ContainerId) -> Self {
        Self {
            data_index,
            key,
            container,
            prev: None,
            next: None,
            horizontal_offset: -1.0,
            vertical_offset: -1.0,
            width: 0.0,
            height: 0.0,
            batch_animation_pending: false,
        }
    }

    pub(crate) fn offset_along(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.horizontal_offset,
            Orientation::Vertical => self.vertical_offset,
        }
    }

    pub(crate) fn set_offset_along(&mut self, orientation: Orientation, offset: f64) {
        match orientation {
            Orientation::Horizontal => self.horizontal_offset = offset,
            Orientation::Vertical => self.vertical_offset = offset,
        }
    }

    pub(crate) fn size_along(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }
}

/// Arena of realized-item records addressed by [`ItemId`].
///
/// Freed slots keep their last record but are invisible to the accessors;
/// `debug_assert`s catch use of a dead id, which always indicates that chain
/// bookkeeping desynchronized from the data sequence.
#[derive(Clone, Debug, Default)]
pub(crate) struct ItemArena {
    slots: Vec<RealizedItem>,
    live: Vec<bool>,
    free: Vec<ItemId>,
}

impl ItemArena {
    pub(crate) fn alloc(&mut self, record: RealizedItem) -> ItemId {
        if let Some(id) = self.free.pop() {
            self.slots[id.0 as usize] = record;
            self.live[id.0 as usize] = true;
            return id;
        }
        let id = ItemId(self.slots.len() as u32);
        self.slots.push(record);
        self.live.push(true);
        id
    }

    pub(crate) fn free(&mut self, id: ItemId) {
        debug_assert!(self.live[id.0 as usize], "freeing a dead item id");
        self.live[id.0 as usize] = false;
        self.free.push(id);
    }

    pub(crate) fn is_live(&self, id: ItemId) -> bool {
        self.live
            .get(id.0 as usize)
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn get(&self, id: ItemId) -> &RealizedItem {
        debug_assert!(self.live[id.0 as usize], "reading a dead item id");
        &self.slots[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> &mut RealizedItem {
        debug_assert!(self.live[id.0 as usize], "writing a dead item id");
        &mut self.slots[id.0 as usize]
    }
}
