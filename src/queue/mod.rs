use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use crate::error::QueueError;
use crate::lock;
use crate::models::{BroadcastItem, ItemId};

pub mod rundown;

/// Shared, re-orderable rundown of broadcast items.
///
/// Insertion order is playback order. The queue holds no cursor: the
/// playout loop keeps the id of the current item and re-resolves it here
/// at the top of every iteration, so edits ahead of the cursor never cause
/// a skip or a replay. Clones share the same items; every operation takes
/// the lock once, so readers never see a half-applied edit.
#[derive(Clone, Default)]
pub struct PlayoutQueue {
    items: Arc<Mutex<Entries>>,
}

/// Items in playback order plus the order they arrived in
#[derive(Default)]
struct Entries {
    items: VecDeque<BroadcastItem>,
    arrivals: HashMap<ItemId, u64>,
    next_arrival: u64,
}

impl Entries {
    fn stamp(&mut self, id: ItemId) {
        self.arrivals.insert(id, self.next_arrival);
        self.next_arrival += 1;
    }

    fn arrival(&self, id: ItemId) -> u64 {
        self.arrivals.get(&id).copied().unwrap_or(0)
    }
}

impl Deref for Entries {
    type Target = VecDeque<BroadcastItem>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl DerefMut for Entries {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl PlayoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<BroadcastItem>) -> Result<Self, QueueError> {
        let queue = Self::new();
        queue.replace_all(items)?;
        Ok(queue)
    }

    fn ensure_unique(items: &VecDeque<BroadcastItem>, id: ItemId) -> Result<(), QueueError> {
        if items.iter().any(|i| i.id() == id) {
            return Err(QueueError::DuplicateId { id: id.to_string() });
        }
        Ok(())
    }

    pub fn append(&self, item: BroadcastItem) -> Result<(), QueueError> {
        let mut items = lock(&self.items);
        Self::ensure_unique(&items, item.id())?;
        items.stamp(item.id());
        items.push_back(item);
        Ok(())
    }

    pub fn prepend(&self, item: BroadcastItem) -> Result<(), QueueError> {
        let mut items = lock(&self.items);
        Self::ensure_unique(&items, item.id())?;
        items.stamp(item.id());
        items.push_front(item);
        Ok(())
    }

    /// Insert directly after `anchor`; at the front when the anchor is gone
    pub fn insert_after(&self, anchor: ItemId, item: BroadcastItem) -> Result<usize, QueueError> {
        let mut items = lock(&self.items);
        Self::ensure_unique(&items, item.id())?;
        let index = items.iter().position(|i| i.id() == anchor).map_or(0, |pos| pos + 1);
        items.stamp(item.id());
        items.insert(index, item);
        Ok(index)
    }

    /// Wholesale replacement. Items already handed out stay untouched.
    pub fn replace_all(&self, new_items: Vec<BroadcastItem>) -> Result<(), QueueError> {
        let mut seen = VecDeque::with_capacity(new_items.len());
        for item in new_items {
            Self::ensure_unique(&seen, item.id())?;
            seen.push_back(item);
        }

        let mut entries = lock(&self.items);
        entries.arrivals.clear();
        for item in &seen {
            let id = item.id();
            entries.stamp(id);
        }
        entries.items = seen;
        Ok(())
    }

    /// Swap in an edited item with the same id
    pub fn replace(&self, item: BroadcastItem) -> Result<(), QueueError> {
        let mut items = lock(&self.items);
        let slot = items
            .iter_mut()
            .find(|i| i.id() == item.id())
            .ok_or_else(|| QueueError::ItemNotFound { id: item.id().to_string() })?;
        *slot = item;
        Ok(())
    }

    pub fn remove(&self, id: ItemId) -> Result<BroadcastItem, QueueError> {
        let mut items = lock(&self.items);
        let index = items
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| QueueError::ItemNotFound { id: id.to_string() })?;
        items.remove(index).ok_or(QueueError::InvalidIndex { index })
    }

    pub fn remove_at(&self, index: usize) -> Result<BroadcastItem, QueueError> {
        let mut items = lock(&self.items);
        if items.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        items.remove(index).ok_or(QueueError::InvalidIndex { index })
    }

    /// Evict the earliest-arrived items until at most `keep_max` remain.
    /// Ids in `protect` are never evicted; they still count toward the cap.
    pub fn remove_oldest(&self, keep_max: usize, protect: &[ItemId]) -> Vec<BroadcastItem> {
        let mut entries = lock(&self.items);
        let mut evicted = Vec::new();

        while entries.len() > keep_max {
            let oldest = entries
                .iter()
                .enumerate()
                .filter(|(_, item)| !protect.contains(&item.id()))
                .min_by_key(|(_, item)| entries.arrival(item.id()))
                .map(|(index, _)| index);

            match oldest.and_then(|index| entries.remove(index)) {
                Some(item) => evicted.push(item),
                None => break,
            }
        }

        let live: Vec<ItemId> = entries.iter().map(|i| i.id()).collect();
        entries.arrivals.retain(|id, _| live.contains(id));
        evicted
    }

    /// The item after `from` in playback order, wrapping to the first.
    /// An unknown or missing `from` yields the first item; an empty queue
    /// yields `None`.
    pub fn advance(&self, from: Option<ItemId>) -> Option<BroadcastItem> {
        let items = lock(&self.items);
        if items.is_empty() {
            return None;
        }
        let next = from
            .and_then(|id| items.iter().position(|i| i.id() == id))
            .map_or(0, |pos| (pos + 1) % items.len());
        items.get(next).cloned()
    }

    /// Current item by id, or the first item when the id is gone
    pub fn resolve(&self, id: Option<ItemId>) -> Option<(usize, BroadcastItem)> {
        let items = lock(&self.items);
        let index = id
            .and_then(|id| items.iter().position(|i| i.id() == id))
            .unwrap_or(0);
        items.get(index).cloned().map(|item| (index, item))
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        lock(&self.items).iter().position(|i| i.id() == id)
    }

    pub fn get(&self, index: usize) -> Option<BroadcastItem> {
        lock(&self.items).get(index).cloned()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.position_of(id).is_some()
    }

    /// Up to `n` items that follow `from`, wrapping, never repeating `from`
    pub fn upcoming(&self, from: Option<ItemId>, n: usize) -> Vec<BroadcastItem> {
        let items = lock(&self.items);
        let len = items.len();
        match from.and_then(|id| items.iter().position(|i| i.id() == id)) {
            Some(pos) => (1..len)
                .take(n)
                .map(|offset| items[(pos + offset) % len].clone())
                .collect(),
            None => items.iter().take(n).cloned().collect(),
        }
    }

    pub fn snapshot(&self) -> Vec<BroadcastItem> {
        lock(&self.items).iter().cloned().collect()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        lock(&self.items).iter().map(|i| i.id()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    pub fn clear(&self) {
        let mut entries = lock(&self.items);
        entries.items.clear();
        entries.arrivals.clear();
    }
}
