//! Device memory arena
//!
//! Slots hold immutable snapshots (`Arc<ArrayData>`). A launch reads the
//! snapshots of its inputs and replaces the output slot's snapshot only after
//! every position has been computed, so an output that aliases an input is
//! safe and a failed call leaves memory untouched.

use crate::numeric::ArrayData;
use crate::shape::Shape;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct Slot {
    pub data: Arc<ArrayData>,
    pub shape: Shape,
    pub bytes: usize,
}

/// Capacity-limited map from buffer id to slot
pub(crate) struct Arena {
    slots: HashMap<u64, Slot>,
    capacity: usize,
    used: usize,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            capacity,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn available(&self) -> usize {
        self.capacity - self.used
    }

    pub fn live(&self) -> usize {
        self.slots.len()
    }

    /// Reserve room for `bytes` without inserting anything
    pub fn ensure_room(&self, bytes: usize) -> Result<()> {
        if bytes > self.available() {
            return Err(Error::OutOfDeviceMemory {
                requested: bytes,
                available: self.available(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, id: u64, shape: Shape, data: ArrayData) -> Result<()> {
        if data.len() != shape.size() {
            return Err(Error::shape_mismatch(
                "device buffer contents",
                shape.dims(),
                &[data.len()],
            ));
        }
        let bytes = data.nbytes();
        self.ensure_room(bytes)?;
        self.used += bytes;
        self.slots.insert(
            id,
            Slot {
                data: Arc::new(data),
                shape,
                bytes,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Slot> {
        self.slots.get(&id)
    }

    /// Swap the contents of a slot; size and dtype must already match
    pub fn replace(&mut self, id: u64, data: ArrayData) -> Option<()> {
        let slot = self.slots.get_mut(&id)?;
        slot.data = Arc::new(data);
        Some(())
    }

    pub fn remove(&mut self, id: u64) -> Option<Slot> {
        let slot = self.slots.remove(&id)?;
        self.used -= slot.bytes;
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::DType;

    #[test]
    fn test_accounting() {
        let mut arena = Arena::new(64);
        arena
            .insert(1, Shape::vector(4), ArrayData::zeroed(DType::F64, 4))
            .unwrap();
        assert_eq!(arena.used(), 32);
        assert_eq!(arena.available(), 32);
        assert_eq!(arena.live(), 1);

        let err = arena
            .insert(2, Shape::vector(5), ArrayData::zeroed(DType::F64, 5))
            .unwrap_err();
        match err {
            Error::OutOfDeviceMemory {
                requested,
                available,
            } => {
                assert_eq!(requested, 40);
                assert_eq!(available, 32);
            }
            _ => panic!("Wrong error type"),
        }

        assert!(arena.remove(1).is_some());
        assert!(arena.remove(1).is_none());
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_insert_rejects_length_mismatch() {
        let mut arena = Arena::new(64);
        assert_eq!(arena.capacity(), 64);
        assert!(matches!(
            arena.insert(1, Shape::new([2, 2]), ArrayData::zeroed(DType::I32, 3)),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_replace_keeps_accounting() {
        let mut arena = Arena::new(16);
        arena
            .insert(7, Shape::vector(2), ArrayData::zeroed(DType::I32, 2))
            .unwrap();
        arena.replace(7, ArrayData::from(vec![3i32, 4])).unwrap();

        let slot = arena.get(7).unwrap();
        assert_eq!(slot.data.view::<i32>(), Some(&[3, 4][..]));
        assert_eq!(arena.used(), 8);
        assert!(arena.replace(8, ArrayData::from(vec![1i32])).is_none());
    }
}
