//! Ordered entity collections with self-healing name caches.
//!
//! Catalog construction looks up the same names over and over (one lookup
//! per declared column, constraint, index and trigger). The collections here
//! keep a name to position map next to the ordered items so that repeated
//! lookups stay O(1). The map is never trusted blindly: every cached position
//! is re-validated against the live items (bounds and name at position) and a
//! stale entry is dropped and rebuilt by scanning from the end, so a lookup
//! always answers with the position of the *last* item carrying the name.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SchemaError};

/// An entity identified by name within its parent collection.
pub trait Named {
    /// Returns the entity name.
    fn name(&self) -> &str;
}

fn is_at<T: Named>(items: &[T], pos: usize, name: &str) -> bool {
    items.get(pos).is_some_and(|item| item.name() == name)
}

fn last_position<T: Named>(items: &[T], name: &str) -> Option<usize> {
    items.iter().rposition(|item| item.name() == name)
}

fn all_positions<T: Named>(items: &[T], name: &str) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.name() == name)
        .map(|(pos, _)| pos)
        .collect()
}

fn out_of_range(pos: usize, len: usize) -> SchemaError {
    SchemaError::Internal(format!("position {pos} out of range for {len} items"))
}

// ============================================================================
// NamedList
// ============================================================================

/// Ordered collection of uniquely named entities.
///
/// Duplicate names are tolerated (the last one wins lookups), which gives
/// upsert semantics to callers that always go through
/// [`get_or_create_with`](Self::get_or_create_with) or [`upsert`](Self::upsert).
#[derive(Clone)]
pub struct NamedList<T> {
    items: Vec<T>,
    positions: HashMap<String, usize>,
}

impl<T> Default for NamedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Named> NamedList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the items as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Returns the item at `pos`.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    /// Returns the position of the last item named `name`, healing the cache
    /// when the cached position turns out to be stale.
    pub fn cached_position(&mut self, name: &str) -> Option<usize> {
        let pos = *self.positions.get(name)?;
        if is_at(&self.items, pos, name) {
            return Some(pos);
        }
        self.positions.remove(name);
        let healed = last_position(&self.items, name)?;
        self.positions.insert(name.to_string(), healed);
        Some(healed)
    }

    /// Read-only variant of [`cached_position`](Self::cached_position): the
    /// cache is consulted and validated but never modified.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        match self.positions.get(name) {
            Some(&pos) if is_at(&self.items, pos, name) => Some(pos),
            Some(_) => last_position(&self.items, name),
            None => None,
        }
    }

    /// Returns the last item named `name`.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.find(name).and_then(|pos| self.items.get(pos))
    }

    /// Returns `true` if an item named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Appends an item and caches its position.
    pub fn append(&mut self, item: T) -> usize {
        let pos = self.items.len();
        self.positions.insert(item.name().to_string(), pos);
        self.items.push(item);
        pos
    }

    /// Returns a copy of the item named `name` with its position, appending
    /// `create(name)` first when there is none.
    pub fn get_or_create_with(&mut self, name: &str, create: impl FnOnce(&str) -> T) -> (T, usize)
    where
        T: Clone,
    {
        if let Some(pos) = self.cached_position(name) {
            return (self.items[pos].clone(), pos);
        }
        let item = create(name);
        let pos = self.append(item.clone());
        (item, pos)
    }

    /// Writes `item` back at `pos`.
    ///
    /// The cached position for the item's name moves to `pos` unless a later
    /// item already carries the same name.
    pub fn store(&mut self, pos: usize, item: T) -> Result<()> {
        let len = self.items.len();
        let slot = self.items.get_mut(pos).ok_or_else(|| out_of_range(pos, len))?;
        let name = item.name().to_string();
        *slot = item;
        let target = match self.positions.get(&name) {
            Some(&cached) if is_at(&self.items, cached, &name) => cached.max(pos),
            // A stale entry may hide a later duplicate between `pos` and the
            // stale position.
            Some(_) => last_position(&self.items, &name).unwrap_or(pos),
            None => pos,
        };
        self.positions.insert(name, target);
        Ok(())
    }

    /// Replaces the item with the same name, or appends it.
    pub fn upsert(&mut self, item: T) -> usize {
        match self.cached_position(item.name()) {
            Some(pos) => {
                self.items[pos] = item;
                pos
            }
            None => self.append(item),
        }
    }

    /// Removes and returns the item at `pos`, rebuilding the cache.
    pub fn remove(&mut self, pos: usize) -> Option<T> {
        if pos >= self.items.len() {
            return None;
        }
        let item = self.items.remove(pos);
        self.refresh_cache();
        Some(item)
    }

    /// Keeps only the items matching `keep`, rebuilding the cache.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
        self.refresh_cache();
    }

    /// Applies `f` to every item, then rebuilds the cache since `f` may
    /// rename items.
    pub fn modify_all(&mut self, f: impl FnMut(&mut T)) {
        self.items.iter_mut().for_each(f);
        self.refresh_cache();
    }

    /// Rebuilds the cache from the live items.
    pub fn refresh_cache(&mut self) {
        self.positions.clear();
        for (pos, item) in self.items.iter().enumerate() {
            self.positions.insert(item.name().to_string(), pos);
        }
    }

    /// Consumes the list, returning its items.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Named> From<Vec<T>> for NamedList<T> {
    fn from(items: Vec<T>) -> Self {
        let mut list = Self {
            items,
            positions: HashMap::new(),
        };
        list.refresh_cache();
        list
    }
}

impl<T: Named> FromIterator<T> for NamedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a, T> IntoIterator for &'a NamedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// The cache is bookkeeping and takes no part in equality.
impl<T: PartialEq> PartialEq for NamedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: fmt::Debug> fmt::Debug for NamedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Serialize> Serialize for NamedList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Named + Deserialize<'de>> Deserialize<'de> for NamedList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// OverloadList
// ============================================================================

/// Ordered collection whose names may repeat (overloaded functions).
///
/// Lookups by name answer with every matching position, in order.
#[derive(Clone)]
pub struct OverloadList<T> {
    items: Vec<T>,
    positions: HashMap<String, Vec<usize>>,
}

impl<T> Default for OverloadList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Named> OverloadList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the item at `pos`.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    fn cache_is_valid(&self, name: &str, cached: &[usize]) -> bool {
        cached.iter().all(|&pos| is_at(&self.items, pos, name))
    }

    /// Returns every position holding an item named `name`, healing the
    /// cache when any cached position is stale.
    pub fn cached_positions(&mut self, name: &str) -> Vec<usize> {
        let Some(cached) = self.positions.get(name) else {
            return Vec::new();
        };
        if self.cache_is_valid(name, cached) {
            return cached.clone();
        }
        let healed = all_positions(&self.items, name);
        if healed.is_empty() {
            self.positions.remove(name);
        } else {
            self.positions.insert(name.to_string(), healed.clone());
        }
        healed
    }

    /// Read-only variant of [`cached_positions`](Self::cached_positions).
    #[must_use]
    pub fn find_all(&self, name: &str) -> Vec<usize> {
        match self.positions.get(name) {
            Some(cached) if self.cache_is_valid(name, cached) => cached.clone(),
            Some(_) => all_positions(&self.items, name),
            None => Vec::new(),
        }
    }

    /// Returns the first position named `name` whose item satisfies `pred`.
    #[must_use]
    pub fn find_by(&self, name: &str, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.find_all(name)
            .into_iter()
            .find(|&pos| self.items.get(pos).is_some_and(&pred))
    }

    fn remember(&mut self, name: &str, pos: usize) {
        let entry = self.positions.entry(name.to_string()).or_default();
        if let Err(at) = entry.binary_search(&pos) {
            entry.insert(at, pos);
        }
    }

    /// Appends an item and caches its position.
    pub fn append(&mut self, item: T) -> usize {
        let pos = self.items.len();
        let name = item.name().to_string();
        self.items.push(item);
        self.remember(&name, pos);
        pos
    }

    /// Writes `item` back at `pos`.
    pub fn store(&mut self, pos: usize, item: T) -> Result<()> {
        let len = self.items.len();
        let slot = self.items.get_mut(pos).ok_or_else(|| out_of_range(pos, len))?;
        let name = item.name().to_string();
        *slot = item;
        self.remember(&name, pos);
        Ok(())
    }

    /// Removes and returns the item at `pos`, rebuilding the cache.
    pub fn remove(&mut self, pos: usize) -> Option<T> {
        if pos >= self.items.len() {
            return None;
        }
        let item = self.items.remove(pos);
        self.refresh_cache();
        Some(item)
    }

    /// Keeps only the items matching `keep`, rebuilding the cache.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
        self.refresh_cache();
    }

    /// Rebuilds the cache from the live items.
    pub fn refresh_cache(&mut self) {
        self.positions.clear();
        for pos in 0..self.items.len() {
            let name = self.items[pos].name().to_string();
            self.positions.entry(name).or_default().push(pos);
        }
    }
}

impl<T: Named> From<Vec<T>> for OverloadList<T> {
    fn from(items: Vec<T>) -> Self {
        let mut list = Self {
            items,
            positions: HashMap::new(),
        };
        list.refresh_cache();
        list
    }
}

impl<'a, T> IntoIterator for &'a OverloadList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: PartialEq> PartialEq for OverloadList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: fmt::Debug> fmt::Debug for OverloadList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Serialize> Serialize for OverloadList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Named + Deserialize<'de>> Deserialize<'de> for OverloadList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        value: u32,
    }

    impl Item {
        fn new(name: &str, value: u32) -> Self {
            Self {
                name: name.to_string(),
                value,
            }
        }
    }

    impl Named for Item {
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn scan(list: &NamedList<Item>, name: &str) -> Option<usize> {
        list.iter().rposition(|i| i.name == name)
    }

    #[test]
    fn test_get_or_create_then_store() {
        let mut list = NamedList::new();
        let (mut item, pos) = list.get_or_create_with("a", |n| Item::new(n, 0));
        assert_eq!(pos, 0);
        item.value = 7;
        list.store(pos, item).unwrap();

        let (item, pos) = list.get_or_create_with("a", |n| Item::new(n, 0));
        assert_eq!(pos, 0);
        assert_eq!(item.value, 7);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_stale_entry_heals_after_rename() {
        let mut list = NamedList::new();
        list.append(Item::new("a", 1));
        list.append(Item::new("b", 2));
        list.store(0, Item::new("c", 3)).unwrap();

        assert_eq!(list.cached_position("a"), None);
        assert_eq!(list.cached_position("c"), Some(0));
        assert_eq!(list.cached_position("b"), Some(1));
    }

    #[test]
    fn test_duplicate_names_resolve_to_last() {
        let mut list = NamedList::new();
        list.append(Item::new("a", 1));
        list.append(Item::new("b", 2));
        list.store(1, Item::new("a", 3)).unwrap();
        assert_eq!(list.cached_position("a"), Some(1));

        // Renaming the later duplicate heals back to the earlier one.
        list.store(1, Item::new("b", 4)).unwrap();
        assert_eq!(list.cached_position("a"), Some(0));
        assert_eq!(list.find("a"), Some(0));
    }

    #[test]
    fn test_store_out_of_range_is_an_error() {
        let mut list: NamedList<Item> = NamedList::new();
        let err = list.store(3, Item::new("a", 1)).unwrap_err();
        assert!(matches!(err, SchemaError::Internal(_)));
    }

    #[test]
    fn test_remove_rebuilds_subsequent_positions() {
        let mut list: NamedList<Item> =
            vec![Item::new("a", 1), Item::new("b", 2), Item::new("c", 3)].into();
        assert_eq!(list.remove(0).map(|i| i.name), Some("a".to_string()));
        assert_eq!(list.cached_position("b"), Some(0));
        assert_eq!(list.cached_position("c"), Some(1));
        assert_eq!(list.cached_position("a"), None);

        list.retain(|i| i.name != "b");
        assert_eq!(list.cached_position("c"), Some(0));
        assert!(list.remove(5).is_none());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut list = NamedList::new();
        list.upsert(Item::new("a", 1));
        list.upsert(Item::new("b", 2));
        assert_eq!(list.upsert(Item::new("a", 9)), 0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get_by_name("a").map(|i| i.value), Some(9));
    }

    #[test]
    fn test_cache_matches_linear_scan_under_random_operations() {
        let names = ["a", "b", "c", "d"];
        let mut list: NamedList<Item> = NamedList::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: usize| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % bound as u64) as usize
        };

        for step in 0..2_000u32 {
            let name = names[next(names.len())];
            match next(6) {
                0 | 1 => {
                    list.append(Item::new(name, step));
                }
                2 if !list.is_empty() => {
                    let pos = next(list.len());
                    list.store(pos, Item::new(name, step)).unwrap();
                }
                3 if !list.is_empty() => {
                    let pos = next(list.len());
                    list.remove(pos);
                }
                4 => {
                    let (item, pos) = list.get_or_create_with(name, |n| Item::new(n, step));
                    list.store(pos, item).unwrap();
                }
                _ => list.refresh_cache(),
            }
            for lookup in names {
                assert_eq!(list.find(lookup), scan(&list, lookup), "find {lookup}");
                assert_eq!(list.cached_position(lookup), scan(&list, lookup), "cached {lookup}");
            }
        }
    }

    #[test]
    fn test_serde_skips_cache() {
        let list: NamedList<Item> = vec![Item::new("a", 1), Item::new("b", 2)].into();
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"[{"name":"a","value":1},{"name":"b","value":2}]"#);
        let back: NamedList<Item> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
        assert_eq!(back.find("b"), Some(1));
    }

    #[test]
    fn test_overloads_track_every_position() {
        let mut list = OverloadList::new();
        list.append(Item::new("f", 1));
        list.append(Item::new("g", 2));
        list.append(Item::new("f", 3));
        assert_eq!(list.cached_positions("f"), vec![0, 2]);
        assert_eq!(list.find_by("f", |i| i.value == 3), Some(2));

        list.store(0, Item::new("h", 4)).unwrap();
        assert_eq!(list.cached_positions("f"), vec![2]);
        assert_eq!(list.cached_positions("h"), vec![0]);

        list.remove(1);
        assert_eq!(list.cached_positions("f"), vec![1]);
        assert!(list.cached_positions("missing").is_empty());
    }
}
