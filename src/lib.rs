//! An intrusive AVL tree, layered over a generic unbalanced binary search tree.
//!
//! Elements embed a [`Links`] header and implement [`cordyceps::Linked`] and [`TreeNode`]. The
//! tree takes ownership of an element's [`Linked::Handle`] on insertion and gives it back on
//! removal. Whether the tree rebalances itself is decided at compile time by its [`Balance`]
//! policy: [`AvlTree`] keeps itself height-balanced, [`BinarySearchTree`] never restructures.
//!
//! With the `alloc` feature, [`AvlMap`] and [`BstMap`] provide owning key-value maps on top.
#![no_std]

// Conventions used in comments:
// - The height `h(x)` of an empty subtree is 0 and of a leaf is 1.
// - The balance of a node `x` is `b(x) = h(right(x)) - h(left(x))`.
// - A node is left-heavy if `b(x) < 0` and right-heavy if `b(x) > 0`.
//
// The AVL invariant is that `b(x) ∈ {-1, 0, 1}` for every node `x` whenever a public operation
// returns. During a retracing walk exactly one node may hold ±2, and it is rotated before the walk
// moves past it.

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

use core::{
    borrow::Borrow,
    cell::UnsafeCell,
    cmp::Ordering,
    fmt,
    marker::{PhantomData, PhantomPinned},
    mem,
    ops::Not,
    pin::Pin,
    ptr::{self, NonNull},
};

use cordyceps::Linked;
use log::{debug, trace};

mod avl;
mod cursor;
#[cfg(feature = "alloc")]
mod debug;
mod entry;
mod error;
mod iter;
#[cfg(feature = "alloc")]
mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(test)]
mod tests;

pub use avl::Avl;
pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use error::KeyError;
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use map::{AvlMap, BstMap, MapCursor, MapIter, TreeMap};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

mod sealed {
    pub trait Sealed {}
}

/// A balancing policy for a [`SearchTree`].
///
/// The policy is invoked after every structural change to the tree and may restructure the tree
/// to restore its own invariant. It cannot be implemented outside of this crate.
pub trait Balance: sealed::Sealed + Sized {
    /// Whether the policy keeps the balance factor stored in each node's [`Links`] up to date.
    const MAINTAINS_BALANCE: bool;

    // Called after `node` was linked into the tree as a new leaf.
    #[doc(hidden)]
    unsafe fn rebalance_inserted<T>(tree: &mut SearchTree<T, Self>, node: NonNull<T>)
    where
        T: TreeNode<Links<T>> + ?Sized;

    // Called after a node was spliced out of the `shrunk` side of `parent`.
    #[doc(hidden)]
    unsafe fn rebalance_removed<T>(tree: &mut SearchTree<T, Self>, parent: NonNull<T>, shrunk: Dir)
    where
        T: TreeNode<Links<T>> + ?Sized;
}

/// The policy of a plain binary search tree, which is never restructured.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unbalanced;

impl sealed::Sealed for Unbalanced {}

impl Balance for Unbalanced {
    const MAINTAINS_BALANCE: bool = false;

    unsafe fn rebalance_inserted<T>(_tree: &mut SearchTree<T, Self>, _node: NonNull<T>)
    where
        T: TreeNode<Links<T>> + ?Sized,
    {
    }

    unsafe fn rebalance_removed<T>(_tree: &mut SearchTree<T, Self>, _parent: NonNull<T>, _shrunk: Dir)
    where
        T: TreeNode<Links<T>> + ?Sized,
    {
    }
}

/// An intrusive binary search tree whose balancing is chosen by `B`.
///
/// See [`AvlTree`] and [`BinarySearchTree`].
pub struct SearchTree<T, B = Avl>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    root: Link<T>,
    len: usize,
    _balance: PhantomData<B>,
}

/// An intrusive AVL tree.
///
/// Insertion, removal and lookup complete in _O(log(n))_ time.
pub type AvlTree<T> = SearchTree<T, Avl>;

/// An intrusive binary search tree that performs no rebalancing.
pub type BinarySearchTree<T> = SearchTree<T, Unbalanced>;

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

/// The side of its parent a child hangs from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    // The change in a parent's balance when the subtree on this side grows by one level.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

// Returns which child of `parent` the node `child` is.
//
// # Safety
//
// Both nodes must be linked into the same tree, and `child` must be a child of `parent`.
#[inline]
unsafe fn which_child<T>(parent: NonNull<T>, child: NonNull<T>) -> Dir
where
    T: TreeNode<Links<T>> + ?Sized,
{
    if same_link(unsafe { T::links(parent).as_ref().left() }, Some(child)) {
        Dir::Left
    } else {
        debug_assert!(same_link(unsafe { T::links(parent).as_ref().right() }, Some(child)));
        Dir::Right
    }
}

// Returns `true` if `a` and `b` point to the same node. Only addresses are compared, never
// pointer metadata.
#[inline]
pub(crate) fn same_node<T: ?Sized>(a: NonNull<T>, b: NonNull<T>) -> bool {
    ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

#[inline]
pub(crate) fn same_link<T: ?Sized>(a: Link<T>, b: Link<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_node(a, b),
        (None, None) => true,
        _ => false,
    }
}

// Follows `dir` links from `root` until there are none left.
#[inline]
unsafe fn extreme_in_subtree<T>(root: NonNull<T>, dir: Dir) -> NonNull<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    let mut cur = root;

    while let Some(next) = unsafe { T::links(cur).as_ref().child(dir) } {
        cur = next;
    }

    cur
}

unsafe fn subtree_height<T>(node: Link<T>) -> usize
where
    T: TreeNode<Links<T>> + ?Sized,
{
    let Some(node) = node else {
        return 0;
    };

    unsafe {
        let links = T::links(node).as_ref();
        1 + subtree_height(links.left()).max(subtree_height(links.right()))
    }
}

impl<T, B> SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    /// Returns a new empty tree.
    pub const fn new() -> SearchTree<T, B> {
        SearchTree {
            root: None,
            len: 0,
            _balance: PhantomData,
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree. The empty tree has height 0.
    ///
    /// This walks the entire tree and is intended for diagnostics.
    pub fn height(&self) -> usize {
        unsafe { subtree_height(self.root) }
    }

    /// Returns `true` if the heights of the two subtrees of every node differ by at most one.
    ///
    /// This walks the entire tree and is intended for diagnostics; it is never used to maintain
    /// the tree.
    pub fn is_balanced(&self) -> bool {
        // Returns `None` as soon as an unbalanced node is found.
        fn checked_height<T>(node: Link<T>) -> Option<usize>
        where
            T: TreeNode<Links<T>> + ?Sized,
        {
            let Some(node) = node else {
                return Some(0);
            };

            let links = unsafe { T::links(node).as_ref() };
            let left = checked_height(links.left())?;
            let right = checked_height(links.right())?;

            (left.abs_diff(right) <= 1).then(|| 1 + left.max(right))
        }

        checked_height(self.root).is_some()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            unsafe {
                assert!(
                    T::links(root).as_ref().parent().is_none(),
                    "root parent pointer is set"
                );
                self.assert_invariants_at(root, None, None, &mut count);
            }
        }

        assert_eq!(count, self.len, "length does not match the number of nodes");
    }

    // Checks the subtree rooted at `node` and returns its height.
    //
    // Every key in the subtree must lie strictly between `lower` and `upper`.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at<'a>(
        &self,
        node: NonNull<T>,
        lower: Option<&'a T::Key>,
        upper: Option<&'a T::Key>,
        count: &mut usize,
    ) -> i32
    where
        T: 'a,
    {
        *count += 1;

        unsafe {
            let key: &'a T::Key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(lower < key, "keys out of order");
            }

            if let Some(upper) = upper {
                assert!(key < upper, "keys out of order");
            }

            let mut heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert!(same_node(node, parent), "child parent pointer is wrong");

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            if B::MAINTAINS_BALANCE {
                let balance = T::links(node).as_ref().balance();
                let measured = heights[Dir::Right as usize] - heights[Dir::Left as usize];

                assert_eq!(i32::from(balance), measured, "stale balance factor");
                assert!((-1..=1).contains(&balance), "balance factor out of range");
            }

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns a reference to the element corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the element corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not change the result of
    /// comparisons between its key and the keys of other elements in the tree.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains an element corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { extreme_in_subtree(root, Dir::Left) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { extreme_in_subtree(root, Dir::Right) })
    }

    // Returns the in-order predecessor of `node`: the element with the greatest key less than
    // `node`'s key.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    // Returns the in-order successor of `node`: the element with the least key greater than
    // `node`'s key.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    // Returns the in-order neighbor of `node` on side `dir`.
    //
    // If `node` has a `dir` subtree, the neighbor is that subtree's extreme node in the opposite
    // direction. Otherwise it is the first ancestor reached by stepping up from a `!dir` child.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = T::links(node).as_ref().child(dir) {
                return Some(extreme_in_subtree(child, !dir));
            }

            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.root, self.len)
    }

    /// Returns a cursor pointing to the minimum element of the tree.
    ///
    /// If the tree is empty, the cursor points to the "ghost" non-element.
    pub fn cursor_first(&self) -> Cursor<'_, T, B> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing to the maximum element of the tree.
    ///
    /// If the tree is empty, the cursor points to the "ghost" non-element.
    pub fn cursor_last(&self) -> Cursor<'_, T, B> {
        Cursor::last(self)
    }

    /// Returns a mutable cursor pointing to the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T, B> {
        CursorMut::first(self)
    }

    /// Returns a mutable cursor pointing to the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T, B> {
        CursorMut::last(self)
    }

    /// Returns a cursor pointing to the element corresponding to `key`.
    ///
    /// If no such element exists, the cursor points to the "ghost" non-element.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, T, B>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key);
        Cursor::at(self, ptr)
    }

    /// Returns a mutable cursor pointing to the element corresponding to `key`.
    ///
    /// If no such element exists, the cursor points to the "ghost" non-element.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, T, B>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key);
        CursorMut::at(self, ptr)
    }

    /// Returns the entry corresponding to `key`, which is either occupied by an element or
    /// vacant.
    ///
    /// The tree is searched once; inserting into a vacant entry does not search again.
    pub fn entry<Q>(&mut self, key: &Q) -> Entry<'_, T, B>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return unsafe { Entry::vacant_root(self) };
        };

        loop {
            let dir = match key.cmp(unsafe { cur.as_ref() }.key().borrow()) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return unsafe { Entry::occupied(self, cur) },
                Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return unsafe { Entry::vacant_child(self, cur, dir) },
            }
        }
    }

    /// Inserts an element into the tree.
    ///
    /// If the tree already contains an element with an equal key, `item` takes its place and the
    /// previous element is returned. The shape of the tree is unchanged in that case.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe {
            let key = ptr.as_ref().key();

            match self.entry(key) {
                Entry::Vacant(vacant) => {
                    vacant.insert_ptr(ptr);
                    None
                }
                Entry::Occupied(mut occupied) => Some(occupied.replace_ptr(ptr)),
            }
        }
    }

    pub(crate) unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { T::links(ptr).as_mut().clear() };

        // A lone root is trivially balanced.
        self.root = Some(ptr);
        self.len += 1;
    }

    pub(crate) unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(T::links(parent).as_ref().child(dir).is_none());

            let links = T::links(ptr).as_mut();
            links.clear();
            links.set_parent(Some(parent));

            T::links(parent).as_mut().set_child(dir, Some(ptr));
            self.len += 1;

            B::rebalance_inserted(self, ptr);
        }
    }

    // Puts `new` in the structural position of `old`, which is unlinked and returned.
    //
    // The caller must ensure that the keys of `old` and `new` are equal.
    pub(crate) unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            // Read the old element's links.
            let old_links = T::links(old).as_ref();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();
            let balance = old_links.balance();

            // Link the new element into the tree.
            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = T::links(new).as_mut();
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_balance(balance);

            // Deinit the old element's links.
            T::links(old).as_mut().clear();

            T::from_ptr(old)
        }
    }

    /// Removes the element corresponding to `key` from the tree and returns it.
    ///
    /// Returns `None`, leaving the tree untouched, if there is no such element.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Removes an arbitrary element from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let links = T::links(node).as_ref();

            if let (Some(left), Some(_)) = (links.left(), links.right()) {
                // `node` has two children. Its predecessor is the maximum of its left subtree and
                // thus has no right child. Swapping the two leaves `node` with at most one child.
                // The balance stays with the position, not the element.
                let predecessor = extreme_in_subtree(left, Dir::Right);
                self.node_swap(node, predecessor);
                self.swap_balance(node, predecessor);
            }

            let links = T::links(node).as_ref();
            let parent = links.parent();
            let child = links.left().or(links.right());
            let side = parent.map(|parent| which_child(parent, node));

            // Splice `node` out; its sole child (if any) takes its place.
            self.replace_child_or_set_root(parent, node, child);
            self.maybe_set_parent(child, parent);

            T::links(node).as_mut().clear();
            self.len -= 1;

            if let (Some(parent), Some(side)) = (parent, side) {
                B::rebalance_removed(self, parent, side);
            }

            T::from_ptr(node)
        }
    }

    // Exchanges the structural positions of `a` and `b`.
    //
    // Parent and child links, as well as the root pointer, are transposed. The elements themselves
    // (and their balance factors) are not touched. `a` and `b` may be adjacent.
    pub(crate) unsafe fn node_swap(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if same_node(a, b) {
            return;
        }

        unsafe {
            let (a_parent, a_left, a_right) = {
                let links = T::links(a).as_ref();
                (links.parent(), links.left(), links.right())
            };
            let (b_parent, b_left, b_right) = {
                let links = T::links(b).as_ref();
                (links.parent(), links.left(), links.right())
            };

            let a_side = a_parent.map(|p| which_child(p, a));
            let b_side = b_parent.map(|p| which_child(p, b));

            // When `a` and `b` are adjacent, a link between them must point back the other way.
            let transpose = |link: Link<T>| match link {
                Some(n) if same_node(n, a) => Some(b),
                Some(n) if same_node(n, b) => Some(a),
                other => other,
            };

            {
                let links = T::links(a).as_mut();
                links.set_parent(transpose(b_parent));
                links.set_left(transpose(b_left));
                links.set_right(transpose(b_right));
            }
            {
                let links = T::links(b).as_mut();
                links.set_parent(transpose(a_parent));
                links.set_left(transpose(a_left));
                links.set_right(transpose(a_right));
            }

            // Repoint the outside neighbors.
            for (old_parent, side, new) in [(a_parent, a_side, b), (b_parent, b_side, a)] {
                match (old_parent, side) {
                    (Some(p), Some(side)) if !same_node(p, a) && !same_node(p, b) => {
                        T::links(p).as_mut().set_child(side, Some(new));
                    }
                    (Some(_), _) => {}
                    (None, _) => self.root = Some(new),
                }
            }

            for child in [a_left, a_right].into_iter().flatten() {
                if !same_node(child, b) {
                    T::links(child).as_mut().set_parent(Some(b));
                }
            }

            for child in [b_left, b_right].into_iter().flatten() {
                if !same_node(child, a) {
                    T::links(child).as_mut().set_parent(Some(a));
                }
            }
        }
    }

    #[inline]
    unsafe fn swap_balance(&mut self, a: NonNull<T>, b: NonNull<T>) {
        unsafe {
            let a_balance = T::links(a).as_ref().balance();
            let b_balance = T::links(b).as_mut().set_balance(a_balance);
            T::links(a).as_mut().set_balance(b_balance);
        }
    }

    /// Clears the tree, removing all elements.
    ///
    /// Elements are released children first, so no element outlives its descendants.
    pub fn clear(&mut self) {
        if self.len > 0 {
            debug!("clearing tree of {} elements", self.len);
        }

        let mut opt_cur = self.root.take();

        while let Some(cur) = opt_cur {
            unsafe {
                let links = T::links(cur).as_ref();

                // Descend until a leaf is found.
                if let Some(child) = links.left().or(links.right()) {
                    opt_cur = Some(child);
                    continue;
                }

                let parent = links.parent();
                if let Some(parent) = parent {
                    let side = which_child(parent, cur);
                    T::links(parent).as_mut().set_child(side, None);
                }

                // Drop the leaf and climb to its parent.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                opt_cur = parent;
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = which_child(parent, old_child);

            if let Some(new_child) = new_child {
                debug_assert!(
                    !same_link(T::links(parent).as_ref().child(!dir), Some(new_child)),
                    "`new_child` must not be a child of `parent`"
                );
            }

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    // Performs a rotation moving `down` one level down on side `dir`. The child of `down` on the
    // opposite side moves up into its place and is returned.
    //
    // Balance factors are not updated.
    pub(crate) unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("rotation requires a child to promote");

            // `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            let parent = T::links(down).as_ref().parent();
            self.replace_child_or_set_root(parent, down, Some(up));

            T::links(up).as_mut().set_parent(parent);
            T::links(up).as_mut().set_child(dir, Some(down));
            T::links(down).as_mut().set_parent(Some(up));

            trace!("rotated {dir:?}");

            up
        }
    }
}

impl<T, B> Default for SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, B> fmt::Debug for SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Debug,
    B: Balance,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|node| node.key())).finish()
    }
}

impl<'tree, T, B> IntoIterator for &'tree SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, B> Drop for SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the balance factor last recorded for this node.
    ///
    /// Only meaningful while the node is linked into an [`AvlTree`].
    #[inline]
    pub fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[cfg(any(test, feature = "alloc"))]
    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) -> i8 {
        mem::replace(&mut self.inner.get_mut().balance, balance)
    }

    // Resets the links to the unlinked state.
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
