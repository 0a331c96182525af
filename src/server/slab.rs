//! Generation-checked connection table.
//!
//! Slots are recycled after a connection closes; every reuse bumps the
//! slot's generation so a stale [`ConnId`] (for example from an event that was
//! queued before the close) never reaches the connection that replaced it.

use std::fmt;

use mio::Token;

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

/// Largest number of slots a table can hold. The two indices above it are
/// left free for the reactor's own tokens.
pub const MAX_SLOTS: usize = INDEX_MASK - 1;

/// Stable identifier of one connection in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId {
    index: usize,
    generation: usize,
}

impl ConnId {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> usize {
        self.generation
    }

    pub fn token(self) -> Token {
        Token((self.generation << INDEX_BITS) | self.index)
    }

    pub fn from_token(token: Token) -> Self {
        Self {
            index: token.0 & INDEX_MASK,
            generation: token.0 >> INDEX_BITS,
        }
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Slot<T> {
    Vacant { next_free: Option<usize> },
    /// Reserved or handed out; the value lives elsewhere for now.
    Taken,
    Occupied(T),
}

#[derive(Debug)]
struct Entry<T> {
    generation: usize,
    slot: Slot<T>,
}

/// Fixed-capacity table of connections, owned by the reactor thread.
#[derive(Debug)]
pub struct ConnectionSlab<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<usize>,
    len: usize,
    capacity: usize,
}

impl<T> ConnectionSlab<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
            capacity: capacity.min(MAX_SLOTS),
        }
    }

    /// Live slots, whether parked here or handed out.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn entry(&self, id: ConnId) -> Option<&Entry<T>> {
        self.entries
            .get(id.index)
            .filter(|e| e.generation == id.generation)
    }

    fn entry_mut(&mut self, id: ConnId) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(id.index)
            .filter(|e| e.generation == id.generation)
    }

    /// Claims a free slot in the `Taken` state. Returns `None` when full.
    pub fn reserve(&mut self) -> Option<ConnId> {
        let index = match self.free_head {
            Some(index) => {
                let Slot::Vacant { next_free } = self.entries[index].slot else {
                    return None;
                };
                self.free_head = next_free;
                self.entries[index].slot = Slot::Taken;
                index
            }
            None if self.entries.len() < self.capacity => {
                self.entries.push(Entry {
                    generation: 0,
                    slot: Slot::Taken,
                });
                self.entries.len() - 1
            }
            None => return None,
        };
        self.len += 1;
        Some(ConnId {
            index,
            generation: self.entries[index].generation,
        })
    }

    /// Moves the value out, leaving the slot `Taken`.
    pub fn take(&mut self, id: ConnId) -> Option<T> {
        let entry = self.entry_mut(id)?;
        if !matches!(entry.slot, Slot::Occupied(_)) {
            return None;
        }
        match std::mem::replace(&mut entry.slot, Slot::Taken) {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    /// Puts a value back into its `Taken` slot. Hands it back if `id` is
    /// stale or the slot is not taken.
    pub fn restore(&mut self, id: ConnId, value: T) -> Result<(), T> {
        match self.entry_mut(id) {
            Some(entry) if matches!(entry.slot, Slot::Taken) => {
                entry.slot = Slot::Occupied(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    pub fn is_taken(&self, id: ConnId) -> bool {
        self.entry(id).is_some_and(|e| matches!(e.slot, Slot::Taken))
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut T> {
        match &mut self.entry_mut(id)?.slot {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    /// Frees the slot and returns the value if it was parked here.
    ///
    /// The slot's generation moves on, invalidating `id`.
    pub fn release(&mut self, id: ConnId) -> Option<T> {
        let free_head = self.free_head;
        let entry = self.entry_mut(id)?;
        if matches!(entry.slot, Slot::Vacant { .. }) {
            return None;
        }
        let old = std::mem::replace(
            &mut entry.slot,
            Slot::Vacant {
                next_free: free_head,
            },
        );
        entry.generation = (entry.generation + 1) & (usize::MAX >> INDEX_BITS);
        self.free_head = Some(id.index);
        self.len -= 1;
        match old {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    /// Ids of the values currently parked in the table.
    pub fn occupied(&self) -> impl Iterator<Item = (ConnId, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, e)| match &e.slot {
            Slot::Occupied(value) => Some((
                ConnId {
                    index,
                    generation: e.generation,
                },
                value,
            )),
            _ => None,
        })
    }

    /// Ids of every live slot, parked or handed out.
    pub fn ids(&self) -> Vec<ConnId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !matches!(e.slot, Slot::Vacant { .. }))
            .map(|(index, e)| ConnId {
                index,
                generation: e.generation,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_operations() {
        let mut slab = ConnectionSlab::with_capacity(2);

        let a = slab.reserve().unwrap();
        slab.restore(a, "a").unwrap();
        let b = slab.reserve().unwrap();
        slab.restore(b, "b").unwrap();

        assert_eq!(slab.len(), 2);
        assert!(slab.reserve().is_none());

        assert_eq!(slab.take(a), Some("a"));
        assert!(slab.is_taken(a));
        assert_eq!(slab.take(a), None);
        slab.restore(a, "a").unwrap();

        assert_eq!(slab.release(a), Some("a"));
        assert_eq!(slab.len(), 1);

        let c = slab.reserve().unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
    }

    #[test]
    fn stale_ids_are_rejected() {
        let mut slab = ConnectionSlab::with_capacity(4);
        let old = slab.reserve().unwrap();
        slab.restore(old, 1).unwrap();
        slab.release(old);

        let new = slab.reserve().unwrap();
        slab.restore(new, 2).unwrap();

        assert_eq!(slab.take(old), None);
        assert_eq!(slab.restore(old, 3), Err(3));
        assert_eq!(slab.release(old), None);
        assert_eq!(slab.get_mut(new), Some(&mut 2));
    }

    #[test]
    fn releasing_a_handed_out_slot() {
        let mut slab = ConnectionSlab::with_capacity(1);
        let id = slab.reserve().unwrap();
        slab.restore(id, ()).unwrap();
        slab.take(id).unwrap();

        assert_eq!(slab.ids(), vec![id]);
        assert_eq!(slab.occupied().count(), 0);
        assert_eq!(slab.release(id), None);
        assert!(slab.is_empty());
    }

    #[test]
    fn token_round_trip_keeps_generation() {
        let mut slab = ConnectionSlab::<()>::with_capacity(8);
        let first = slab.reserve().unwrap();
        slab.release(first);
        let id = slab.reserve().unwrap();

        assert_eq!(ConnId::from_token(id.token()), id);
        assert_eq!(id.generation(), 1);
    }
}
