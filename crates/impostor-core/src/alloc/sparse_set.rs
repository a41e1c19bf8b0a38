//! Generational slot storage.
//!
//! Handles ([`IndexSlot`]) pack a slot index and the generation of the value
//! that was stored there. Removing a value bumps the generation of its slot, so
//! a handle that outlives its value is detected on lookup instead of aliasing
//! whatever gets stored in the slot next.

use crate::profiling::profile_function;
use std::num::NonZeroU64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    pub fn new(generation: u32, idx: u32) -> Self {
        let packed = ((generation as u64) << 32) | (idx as u64 + 1);
        // The low half is at least 1, so the packed value is never zero.
        Self(NonZeroU64::new(packed).unwrap_or(NonZeroU64::MIN))
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        (self.0.get() & u32::MAX as u64) as u32 - 1
    }
}

struct Entry<T> {
    generation: u32,
    data: Option<T>,
}

pub struct SparseSet<T> {
    vec: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            vec: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn push(&mut self, data: T) -> IndexSlot {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop() {
            let entry = &mut self.vec[idx as usize];
            entry.data = Some(data);
            IndexSlot::new(entry.generation, idx)
        } else {
            let idx = self.vec.len() as u32;
            self.vec.push(Entry {
                generation: 0,
                data: Some(data),
            });
            IndexSlot::new(0, idx)
        }
    }

    fn entry(&self, idx: IndexSlot) -> Option<&Entry<T>> {
        self.vec
            .get(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
    }

    /// Returns the value behind `idx`, or `None` if it was removed.
    pub fn get(&self, idx: IndexSlot) -> Option<&T> {
        self.entry(idx).and_then(|entry| entry.data.as_ref())
    }

    pub fn get_mut(&mut self, idx: IndexSlot) -> Option<&mut T> {
        self.vec
            .get_mut(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
            .and_then(|entry| entry.data.as_mut())
    }

    pub fn contains(&self, idx: IndexSlot) -> bool {
        self.get(idx).is_some()
    }

    /// Removes the value behind `idx`. Stale handles are ignored.
    pub fn remove(&mut self, idx: IndexSlot) -> Option<T> {
        profile_function!();
        let index = idx.index();
        let entry = self
            .vec
            .get_mut(index as usize)
            .filter(|entry| entry.generation == idx.generation())?;
        let data = entry.data.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(data)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every value, invalidating all outstanding handles.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len);
        for (index, entry) in self.vec.iter_mut().enumerate() {
            if let Some(data) = entry.data.take() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index as u32);
                drained.push(data);
            }
        }
        self.len = 0;
        drained
    }

    /// Handles of all live values in slot order.
    pub fn slots(&self) -> Vec<IndexSlot> {
        self.iter().map(|(slot, _)| slot).collect()
    }

    pub fn iter(&self) -> SparseSetIter<'_, T> {
        SparseSetIter { set: self, idx: 0 }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (IndexSlot, &mut T)> {
        self.vec.iter_mut().enumerate().filter_map(|(index, entry)| {
            let generation = entry.generation;
            entry
                .data
                .as_mut()
                .map(|data| (IndexSlot::new(generation, index as u32), data))
        })
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SparseSetIter<'a, T> {
    set: &'a SparseSet<T>,
    idx: usize,
}

impl<'a, T> Iterator for SparseSetIter<'a, T> {
    type Item = (IndexSlot, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.set.vec.get(self.idx) {
            let index = self.idx;
            self.idx += 1;
            if let Some(data) = entry.data.as_ref() {
                return Some((IndexSlot::new(entry.generation, index as u32), data));
            }
        }
        None
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);
