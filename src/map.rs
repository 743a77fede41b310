use alloc::boxed::Box;
use core::{
    borrow::Borrow,
    fmt,
    iter::FusedIterator,
    mem,
    ops::{Index, IndexMut},
    ptr::NonNull,
};

use cordyceps::Linked;

use crate::{
    Avl, Balance, Cursor, Entry, Iter, KeyError, Links, SearchTree, TreeNode, Unbalanced,
};

/// An ordered map based on a [`SearchTree`] with balancing policy `B`.
///
/// Each entry is stored in its own heap-allocated node, which is freed when the entry is removed
/// or the map is cleared or dropped.
pub struct TreeMap<K: Ord, V, B: Balance = Avl> {
    tree: SearchTree<MapNode<K, V>, B>,
}

/// An ordered map based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub type AvlMap<K, V> = TreeMap<K, V, Avl>;

/// An ordered map based on a binary search tree that is never rebalanced.
pub type BstMap<K, V> = TreeMap<K, V, Unbalanced>;

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
}

impl<K, V> MapNode<K, V> {
    fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
        })
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        // SAFETY: `ptr` points to a live node, so the address of its field is non-null.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

// SAFETY: The map exclusively owns its nodes, and nodes are only reachable through the map.
unsafe impl<K: Ord + Send, V: Send, B: Balance> Send for TreeMap<K, V, B> {}

// SAFETY: Shared access never mutates links or entries.
unsafe impl<K: Ord + Sync, V: Sync, B: Balance> Sync for TreeMap<K, V, B> {}

impl<K: Ord, V, B: Balance> TreeMap<K, V, B> {
    /// Creates a new, empty map.
    pub const fn new() -> Self {
        Self {
            tree: SearchTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns `true` if the heights of the two subtrees of every node differ by at most one.
    ///
    /// Always `true` for an [`AvlMap`].
    pub fn is_balanced(&self) -> bool {
        self.tree.is_balanced()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains `key`, its value is overwritten in place and the old value is
    /// returned; the stored key and the shape of the tree are left unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.entry(&key) {
            Entry::Occupied(occupied) => {
                // SAFETY: Pinning is not structural for `node.value`, and the key is not modified.
                let node = unsafe { occupied.into_mut().get_unchecked_mut() };
                Some(mem::replace(&mut node.value, value))
            }

            Entry::Vacant(vacant) => {
                // SAFETY: The new node carries the key the entry was found with.
                unsafe { vacant.insert(MapNode::new(key, value)) };
                None
            }
        }
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns the stored key and the value associated with `key`.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // SAFETY: Pinning is not structural for `node.value`, and the key is not modified.
        unsafe {
            self.tree
                .get_mut(key)
                .map(|node| &mut node.get_unchecked_mut().value)
        }
    }

    /// Returns a reference to the value associated with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotFound`] if the map does not contain `key`.
    pub fn lookup<Q>(&self, key: &Q) -> Result<&V, KeyError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(KeyError::NotFound)
    }

    /// Returns a mutable reference to the value associated with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotFound`] if the map does not contain `key`.
    pub fn lookup_mut<Q>(&mut self, key: &Q) -> Result<&mut V, KeyError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_mut(key).ok_or(KeyError::NotFound)
    }

    /// Removes the value associated with `key` from the map.
    ///
    /// Removing a key that is not present does nothing.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| node.value)
    }

    /// Removes the entry associated with `key` from the map, returning the stored key and value.
    #[inline]
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns a cursor pointing to the entry for `key`, or to the end position if the map does
    /// not contain `key`.
    pub fn find<Q>(&self, key: &Q) -> MapCursor<'_, K, V, B>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        MapCursor {
            curs: self.tree.find(key),
        }
    }

    /// Returns a cursor pointing to the entry with the minimum key.
    ///
    /// If the map is empty, the cursor is at the end position.
    pub fn cursor_first(&self) -> MapCursor<'_, K, V, B> {
        MapCursor {
            curs: self.tree.cursor_first(),
        }
    }

    /// Returns a cursor pointing to the entry with the maximum key.
    ///
    /// If the map is empty, the cursor is at the end position.
    pub fn cursor_last(&self) -> MapCursor<'_, K, V, B> {
        MapCursor {
            curs: self.tree.cursor_last(),
        }
    }

    /// Returns an iterator over the entries of the map in ascending key order.
    pub fn iter(&self) -> MapIter<'_, K, V> {
        MapIter {
            iter: self.tree.iter(),
        }
    }

    /// Returns an iterator over the keys of the map in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values of the map in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Writes a sideways drawing of the underlying tree to `w`.
    pub fn write_pretty<W: fmt::Write>(&self, w: W) -> fmt::Result
    where
        K: fmt::Debug,
    {
        self.tree.write_pretty(w)
    }

    /// Prints a sideways drawing of the underlying tree to standard output.
    #[cfg(feature = "std")]
    pub fn print(&self)
    where
        K: fmt::Debug,
    {
        let mut out = alloc::string::String::new();

        if self.write_pretty(&mut out).is_ok() {
            std::print!("{out}");
        }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord, V, B: Balance> Default for TreeMap<K, V, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Q, V, B> Index<&Q> for TreeMap<K, V, B>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
    B: Balance,
{
    type Output = V;

    /// Returns a reference to the value associated with `key`.
    ///
    /// # Panics
    ///
    /// Panics if the map does not contain `key`.
    fn index(&self, key: &Q) -> &V {
        match self.lookup(key) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<K, Q, V, B> IndexMut<&Q> for TreeMap<K, V, B>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
    B: Balance,
{
    /// Returns a mutable reference to the value associated with `key`.
    ///
    /// # Panics
    ///
    /// Panics if the map does not contain `key`.
    fn index_mut(&mut self, key: &Q) -> &mut V {
        match self.lookup_mut(key) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<K, V, B> fmt::Debug for TreeMap<K, V, B>
where
    K: Ord + fmt::Debug,
    V: fmt::Debug,
    B: Balance,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V, B: Balance> FromIterator<(K, V)> for TreeMap<K, V, B> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TreeMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V, B: Balance> Extend<(K, V)> for TreeMap<K, V, B> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'map, K: Ord, V, B: Balance> IntoIterator for &'map TreeMap<K, V, B> {
    type Item = (&'map K, &'map V);
    type IntoIter = MapIter<'map, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the entries of a [`TreeMap`] in ascending key order.
pub struct MapIter<'map, K: Ord, V> {
    iter: Iter<'map, MapNode<K, V>>,
}

impl<'map, K: Ord, V> Iterator for MapIter<'map, K, V> {
    type Item = (&'map K, &'map V);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K: Ord, V> ExactSizeIterator for MapIter<'_, K, V> {}

impl<K: Ord, V> FusedIterator for MapIter<'_, K, V> {}

/// A cursor over the entries of a [`TreeMap`].
///
/// The cursor points either to an entry or to the end position, which sits after the last entry
/// and before the first.
pub struct MapCursor<'map, K: Ord, V, B: Balance = Avl> {
    curs: Cursor<'map, MapNode<K, V>, B>,
}

impl<'map, K: Ord, V, B: Balance> MapCursor<'map, K, V, B> {
    /// Returns `true` if the cursor is at the end position.
    pub fn is_end(&self) -> bool {
        self.curs.is_ghost()
    }

    /// Advances the cursor to the entry with the next greater key.
    ///
    /// From the last entry the cursor moves to the end position; from the end position it wraps
    /// around to the first entry.
    pub fn move_next(&mut self) {
        self.curs.move_next();
    }

    /// Moves the cursor to the entry with the next smaller key.
    ///
    /// From the first entry the cursor moves to the end position; from the end position it wraps
    /// around to the last entry.
    pub fn move_prev(&mut self) {
        self.curs.move_prev();
    }

    /// Returns the key of the current entry, or `None` at the end position.
    pub fn key(&self) -> Option<&'map K> {
        self.curs.get().map(|node| &node.key)
    }

    /// Returns the value of the current entry, or `None` at the end position.
    pub fn value(&self) -> Option<&'map V> {
        self.curs.get().map(|node| &node.value)
    }

    /// Returns the current entry, or `None` at the end position.
    pub fn key_value(&self) -> Option<(&'map K, &'map V)> {
        self.curs.get().map(|node| (&node.key, &node.value))
    }

    /// Returns the entry the cursor would move to with [`MapCursor::move_next`].
    pub fn peek_next(&self) -> Option<(&'map K, &'map V)> {
        self.curs.peek_next().map(|node| (&node.key, &node.value))
    }

    /// Returns the entry the cursor would move to with [`MapCursor::move_prev`].
    pub fn peek_prev(&self) -> Option<(&'map K, &'map V)> {
        self.curs.peek_prev().map(|node| (&node.key, &node.value))
    }
}

impl<K: Ord, V, B: Balance> Clone for MapCursor<'_, K, V, B> {
    fn clone(&self) -> Self {
        MapCursor {
            curs: self.curs.clone(),
        }
    }
}

impl<K: Ord, V, B: Balance> PartialEq for MapCursor<'_, K, V, B> {
    fn eq(&self, other: &Self) -> bool {
        self.curs == other.curs
    }
}

impl<K: Ord, V, B: Balance> Eq for MapCursor<'_, K, V, B> {}
