use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub const DEFAULT_POOL_MAX_COUNT: usize = 3000;

/// An object that can be recycled through an [`ObjectPool`] or an [`Arena`].
pub trait Poolable: Default + 'static {
    /// Restores every field to its freshly constructed state.
    fn reset(&mut self);
}

trait ErasedPool {
    fn len(&self) -> usize;
    fn truncate(&mut self, len: usize);
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Poolable> ErasedPool for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Free lists keyed by type, each capped at a per-type maximum.
pub struct ObjectPool {
    pools: HashMap<TypeId, Box<dyn ErasedPool>>,
    max_counts: HashMap<TypeId, usize>,
    default_max_count: usize,
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_MAX_COUNT)
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("types", &self.pools.len())
            .field("default_max_count", &self.default_max_count)
            .finish()
    }
}

impl ObjectPool {
    pub fn new(default_max_count: usize) -> Self {
        Self {
            pools: HashMap::new(),
            max_counts: HashMap::new(),
            default_max_count,
        }
    }

    fn pool_mut<T: Poolable>(&mut self) -> &mut Vec<T> {
        let pool = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<T>::new()));
        match pool.as_any_mut().downcast_mut::<Vec<T>>() {
            Some(pool) => pool,
            None => unreachable!("pool registered under a foreign type id"),
        }
    }

    /// A recycled object, or a fresh default when the free list is empty.
    pub fn acquire<T: Poolable>(&mut self) -> T {
        self.pool_mut::<T>().pop().unwrap_or_default()
    }

    /// Resets `value` and keeps it for reuse unless the type's pool is full.
    pub fn release<T: Poolable>(&mut self, mut value: T) {
        value.reset();
        let max = self.max_count::<T>();
        let pool = self.pool_mut::<T>();
        if pool.len() < max {
            pool.push(value);
        }
    }

    pub fn max_count<T: Poolable>(&self) -> usize {
        self.max_counts
            .get(&TypeId::of::<T>())
            .copied()
            .unwrap_or(self.default_max_count)
    }

    pub fn set_max_count<T: Poolable>(&mut self, max_count: usize) {
        self.max_counts.insert(TypeId::of::<T>(), max_count);
        self.pool_mut::<T>().truncate(max_count);
    }

    /// Applies to every type without an explicit maximum.
    pub fn set_default_max_count(&mut self, max_count: usize) {
        self.default_max_count = max_count;
        for (type_id, pool) in &mut self.pools {
            if !self.max_counts.contains_key(type_id) {
                pool.truncate(max_count);
            }
        }
    }

    pub fn len<T: Poolable>(&self) -> usize {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any().downcast_ref::<Vec<T>>())
            .map_or(0, Vec::len)
    }

    pub fn total_len(&self) -> usize {
        self.pools.values().map(|pool| pool.len()).sum()
    }

    pub fn clear<T: Poolable>(&mut self) {
        if let Some(pool) = self.pools.get_mut(&TypeId::of::<T>()) {
            pool.truncate(0);
        }
    }

    pub fn clear_all(&mut self) {
        self.pools.clear();
    }
}

/// Generation-tagged index into an [`Arena`]. Stale handles resolve to nothing.
pub struct Handle<T> {
    index: usize,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug)]
struct ArenaSlot<T> {
    generation: u32,
    occupied: bool,
    value: T,
}

/// Slot storage whose vacated entries are reset and reused in place.
#[derive(Debug)]
pub struct Arena<T: Poolable> {
    slots: Vec<ArenaSlot<T>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<T: Poolable> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }
}

impl<T: Poolable> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Claims a reset slot.
    pub fn alloc(&mut self) -> (Handle<T>, &mut T) {
        self.len += 1;
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(ArenaSlot {
                    generation: 0,
                    occupied: false,
                    value: T::default(),
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.occupied = true;
        (Handle::new(index, slot.generation), &mut slot.value)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index)?;
        if !slot.occupied || slot.generation != handle.generation {
            return None;
        }
        Some(&slot.value)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index)?;
        if !slot.occupied || slot.generation != handle.generation {
            return None;
        }
        Some(&mut slot.value)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Resets the object and invalidates every handle to it.
    pub fn remove(&mut self, handle: Handle<T>) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index) else {
            return false;
        };
        if !slot.occupied || slot.generation != handle.generation {
            return false;
        }
        slot.value.reset();
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        true
    }

    pub fn clear(&mut self) {
        for index in 0..self.slots.len() {
            let handle = Handle::new(index, self.slots[index].generation);
            self.remove(handle);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.occupied)
            .map(|(index, slot)| (Handle::new(index, slot.generation), &slot.value))
    }
}
