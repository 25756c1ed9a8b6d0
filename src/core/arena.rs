use std::ops::Deref;
use thiserror::Error;

pub type ArenaResult<T> = Result<T, ArenaError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("{what} exhausted, capacity is {capacity}")]
    Exhausted {
        what:     &'static str,
        capacity: usize,
    },
    #[error("{what} slot {index} is not allocated")]
    Stale {
        what:  &'static str,
        index: usize,
    }
}

/// Index of a record stored in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaIndex(u32);

impl ArenaIndex {
    #[inline]
    pub fn get(self) -> usize { self.0 as usize }
}

/// A bounded pool of records addressed by index. Freed slots are recycled before the pool grows,
/// and allocation past `capacity` live records fails instead of growing without limit.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    what:     &'static str,
    slots:    Vec<Option<T>>,
    free:     Vec<u32>,
    capacity: usize,
    live:     usize,
    peak:     usize
}

impl<T> Arena<T> {
    pub fn new(what: &'static str, capacity: usize) -> Self {
        Self {
            what,
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
            peak: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize { self.capacity }

    #[inline]
    pub fn live(&self) -> usize { self.live }

    /// Highest number of records that were alive at the same time.
    #[inline]
    pub fn peak(&self) -> usize { self.peak }

    #[inline]
    pub fn remaining(&self) -> usize { self.capacity - self.live }

    #[inline]
    pub fn is_empty(&self) -> bool { self.live == 0 }

    /// Fails unless `count` more records fit.
    pub fn ensure_room(&self, count: usize) -> ArenaResult<()> {
        match count <= self.remaining() {
            true => Ok(()),
            false => Err(self.exhausted()),
        }
    }

    pub fn alloc(&mut self, value: T) -> ArenaResult<ArenaIndex> {
        self.ensure_room(1)?;
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        };
        self.live += 1;
        self.peak = self.peak.max(self.live);
        Ok(ArenaIndex(index))
    }

    pub fn free(&mut self, index: ArenaIndex) -> ArenaResult<T> {
        match self.slots.get_mut(index.get()).and_then(Option::take) {
            Some(value) => {
                self.free.push(index.0);
                self.live -= 1;
                Ok(value)
            }
            None => Err(ArenaError::Stale { what: self.what, index: index.get() }),
        }
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        self.slots.get(index.get()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        self.slots.get_mut(index.get()).and_then(Option::as_mut)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    fn exhausted(&self) -> ArenaError {
        ArenaError::Exhausted { what: self.what, capacity: self.capacity }
    }
}

/// A vector that refuses to grow past a fixed number of elements.
#[derive(Debug, Clone, PartialEq)]
pub struct CappedVec<T> {
    what:     &'static str,
    items:    Vec<T>,
    capacity: usize
}

impl<T> CappedVec<T> {
    pub fn new(what: &'static str, capacity: usize) -> Self {
        Self { what, items: Vec::new(), capacity }
    }

    #[inline]
    pub fn capacity(&self) -> usize { self.capacity }

    pub fn push(&mut self, value: T) -> ArenaResult<()> {
        if self.items.len() >= self.capacity {
            return Err(ArenaError::Exhausted { what: self.what, capacity: self.capacity })
        }
        self.items.push(value);
        Ok(())
    }

    #[inline]
    pub fn remove(&mut self, index: usize) -> T { self.items.remove(index) }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> { self.items.get_mut(index) }

    #[inline]
    pub fn into_inner(self) -> Vec<T> { self.items }
}

impl<T> Deref for CappedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] { &self.items }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycles_freed_slots() {
        let mut arena = Arena::new("tokens", 2);
        let first = arena.alloc("a").unwrap();
        let second = arena.alloc("b").unwrap();
        assert_eq!(arena.alloc("c"), Err(ArenaError::Exhausted { what: "tokens", capacity: 2 }));

        assert_eq!(arena.free(first), Ok("a"));
        let third = arena.alloc("c").unwrap();
        assert_eq!(third, first);
        assert_eq!(arena.get(second), Some(&"b"));
        assert_eq!(arena.peak(), 2);
    }

    #[test]
    fn double_free_is_reported() {
        let mut arena = Arena::new("tokens", 4);
        let index = arena.alloc(1).unwrap();
        arena.free(index).unwrap();
        assert_eq!(arena.free(index), Err(ArenaError::Stale { what: "tokens", index: 0 }));
        assert!(arena.is_empty());
    }

    #[test]
    fn capped_vec_stops_at_capacity() {
        let mut values = CappedVec::new("values", 2);
        values.push(1).unwrap();
        values.push(2).unwrap();
        assert!(values.push(3).is_err());
        assert_eq!(&*values, &[1, 2]);
        assert_eq!(values.remove(0), 1);
        assert_eq!(values.len(), 1);
    }
}
