//! # Pool Allocator
//!
//! Fixed-capacity slot table with generation-checked handles. Values live
//! in one dense vector so the whole table can be viewed as a slice; vacant
//! slots hold the table's fill value.

/// Per-slot bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
struct SlotMeta {
    generation: u32,
    live: bool,
}

/// Handle to a value in a [`PoolAllocator`].
///
/// Resolves only while the slot still carries the generation the handle
/// was issued with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Dense, fixed-capacity table of `T`.
///
/// Not thread-safe; the owner serializes access.
///
/// # Example
///
/// ```rust
/// use ligament_core::PoolAllocator;
///
/// let mut pool = PoolAllocator::new(4, 0_u32);
/// let handle = pool.allocate(7).expect("room");
/// assert_eq!(pool.get(handle), Some(&7));
/// assert_eq!(pool.free(handle), Some(7));
/// assert_eq!(pool.get(handle), None);
/// ```
#[derive(Debug)]
pub struct PoolAllocator<T> {
    values: Vec<T>,
    meta: Vec<SlotMeta>,
    vacant: Vec<u32>,
    fill: T,
    live: usize,
}

impl<T: Clone> PoolAllocator<T> {
    /// Creates a table of `capacity` slots, each holding `fill`.
    #[must_use]
    pub fn new(capacity: usize, fill: T) -> Self {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX);
        Self {
            values: vec![fill.clone(); capacity as usize],
            meta: vec![SlotMeta::default(); capacity as usize],
            // Popped from the back, so slot 0 is handed out first.
            vacant: (0..capacity).rev().collect(),
            fill,
            live: 0,
        }
    }

    /// Stores `value` in a vacant slot.
    ///
    /// # Returns
    ///
    /// `None` when every slot is taken.
    pub fn allocate(&mut self, value: T) -> Option<PoolHandle> {
        let index = self.vacant.pop()?;
        let slot = index as usize;
        self.values[slot] = value;
        self.meta[slot].live = true;
        self.live += 1;
        Some(PoolHandle {
            index,
            generation: self.meta[slot].generation,
        })
    }

    /// Vacates the slot behind `handle`, resetting it to the fill value.
    ///
    /// # Returns
    ///
    /// The stored value, or `None` for a stale handle.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.resolve(handle)?;
        let meta = &mut self.meta[slot];
        meta.live = false;
        meta.generation = meta.generation.wrapping_add(1);
        self.vacant.push(handle.index);
        self.live -= 1;
        Some(std::mem::replace(&mut self.values[slot], self.fill.clone()))
    }
}

impl<T> PoolAllocator<T> {
    /// Number of live values.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.live
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Value behind `handle`, if it is still live.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.resolve(handle).map(|slot| &self.values[slot])
    }

    /// Mutable value behind `handle`, if it is still live.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.resolve(handle)?;
        Some(&mut self.values[slot])
    }

    /// Every slot in index order, vacant ones included.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    fn resolve(&self, handle: PoolHandle) -> Option<usize> {
        let slot = handle.index as usize;
        let meta = self.meta.get(slot)?;
        (meta.live && meta.generation == handle.generation).then_some(slot)
    }
}
