use core::{pin::Pin, ptr::NonNull};

use crate::{Balance, Dir, Links, SearchTree, TreeNode};

/// A view into a single entry in a [`SearchTree`], which may be either vacant or occupied.
pub enum Entry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    Vacant(VacantEntry<'tree, T, B>),
    Occupied(OccupiedEntry<'tree, T, B>),
}

impl<'tree, T, B> Entry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    pub(crate) unsafe fn vacant_root(tree: &'tree mut SearchTree<T, B>) -> Self {
        Entry::Vacant(VacantEntry {
            tree,
            insert_as: InsertAs::Root,
        })
    }

    pub(crate) unsafe fn vacant_child(
        tree: &'tree mut SearchTree<T, B>,
        parent: NonNull<T>,
        dir: Dir,
    ) -> Self {
        Entry::Vacant(VacantEntry {
            tree,
            insert_as: InsertAs::Child { parent, dir },
        })
    }

    pub(crate) unsafe fn occupied(tree: &'tree mut SearchTree<T, B>, node: NonNull<T>) -> Self {
        Entry::Occupied(OccupiedEntry { tree, node })
    }
}

pub(crate) enum InsertAs<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

/// A vacant entry: the position where an element with the searched-for key would be linked.
pub struct VacantEntry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    pub(crate) tree: &'tree mut SearchTree<T, B>,
    pub(crate) insert_as: InsertAs<T>,
}

impl<'tree, T, B> VacantEntry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    /// Inserts `item` at the position associated with this entry and rebalances the tree.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the key returned by `item.key()` is equal to the key used to
    /// retrieve this entry.
    pub unsafe fn insert(self, item: T::Handle) -> Pin<&'tree mut T> {
        unsafe { self.insert_ptr(T::into_ptr(item)) }
    }

    pub(crate) unsafe fn insert_ptr(self, mut ptr: NonNull<T>) -> Pin<&'tree mut T> {
        unsafe {
            match self.insert_as {
                InsertAs::Root => self.tree.insert_as_root(ptr),
                InsertAs::Child { parent, dir } => self.tree.insert_as_child(parent, dir, ptr),
            }

            Pin::new_unchecked(ptr.as_mut())
        }
    }
}

/// An occupied entry: an element whose key equals the searched-for key.
pub struct OccupiedEntry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    pub(crate) tree: &'tree mut SearchTree<T, B>,
    pub(crate) node: NonNull<T>,
}

impl<'tree, T, B> OccupiedEntry<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    /// Returns a reference to the item in the entry.
    pub fn get(&self) -> &T {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`
        unsafe { self.node.as_ref() }
    }

    /// Returns a pinned mutable reference to the item in the entry.
    ///
    /// # Safety
    ///
    /// The caller must ensure that neither the links nor the key of the mutably borrowed item are
    /// modified, as doing so may result in undefined behavior.
    pub unsafe fn get_mut(&mut self) -> Pin<&mut T> {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`, and `self.node` is guaranteed pinned
        // by contract with `Linked`.
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Converts the entry into a pinned mutable reference bound to the tree's borrow.
    ///
    /// # Safety
    ///
    /// Same as [`OccupiedEntry::get_mut`].
    pub unsafe fn into_mut(mut self) -> Pin<&'tree mut T> {
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Puts `item` in place of the item in the entry, returning the previous item.
    ///
    /// The shape of the tree does not change.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `item`'s key is equivalent to the key of the existing item.
    pub unsafe fn insert(&mut self, item: T::Handle) -> T::Handle {
        unsafe { self.replace_ptr(T::into_ptr(item)) }
    }

    pub(crate) unsafe fn replace_ptr(&mut self, new_ptr: NonNull<T>) -> T::Handle {
        let old_ptr = self.node;

        // Point this entry at the new item.
        self.node = new_ptr;

        unsafe { self.tree.replace_at(old_ptr, new_ptr) }
    }

    /// Removes and returns the item pointed to by this entry.
    pub fn remove(self) -> T::Handle {
        unsafe { self.tree.remove_at(self.node) }
    }
}
