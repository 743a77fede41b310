use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{same_link, Balance, Link, Links, SearchTree, TreeNode};

/// A cursor over a [`SearchTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first. The ghost doubles as the end position of an in-order traversal.
pub struct Cursor<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    curs: CursorRaw<T, B>,
    phantom: PhantomData<&'tree SearchTree<T, B>>,
}

impl<'tree, T, B> Cursor<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    pub(crate) fn first(tree: &'tree SearchTree<T, B>) -> Cursor<'tree, T, B> {
        Cursor {
            curs: CursorRaw::first(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree SearchTree<T, B>) -> Cursor<'tree, T, B> {
        Cursor {
            curs: CursorRaw::last(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn at(tree: &'tree SearchTree<T, B>, ptr: Link<T>) -> Cursor<'tree, T, B> {
        Cursor {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns `true` if the cursor points to the "ghost" non-element.
    pub fn is_ghost(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Moves the cursor to the next element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&'tree T> {
        unsafe { self.curs.get() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_prev() }
    }
}

impl<T, B> Clone for Cursor<'_, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    fn clone(&self) -> Self {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }
}

impl<T, B> PartialEq for Cursor<'_, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    /// Two cursors are equal if they point to the same position of the same tree.
    fn eq(&self, other: &Self) -> bool {
        self.curs.tree == other.curs.tree && same_link(self.curs.ptr, other.curs.ptr)
    }
}

impl<T, B> Eq for Cursor<'_, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
}

/// A cursor over a [`SearchTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    curs: CursorRaw<T, B>,
    phantom: PhantomData<&'tree mut SearchTree<T, B>>,
}

impl<'tree, T, B> CursorMut<'tree, T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    pub(crate) fn first(tree: &'tree mut SearchTree<T, B>) -> CursorMut<'tree, T, B> {
        CursorMut {
            curs: CursorRaw::first(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree mut SearchTree<T, B>) -> CursorMut<'tree, T, B> {
        CursorMut {
            curs: CursorRaw::last(tree.into()),
            phantom: PhantomData,
        }
    }

    pub(crate) fn at(tree: &'tree mut SearchTree<T, B>, ptr: Link<T>) -> CursorMut<'tree, T, B> {
        CursorMut {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T, B> {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns `true` if the cursor points to the "ghost" non-element.
    pub fn is_ghost(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Moves the cursor to the next element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.curs.get() }
    }

    /// Returns a pinned mutable reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not violate the
    /// invariants of the tree. In particular, the result of comparisons between the key of the
    /// returned item and the keys of other items in the tree must not change.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        unsafe { self.curs.get_mut() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek_prev() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the next element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the previous element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current_and_move_prev() }
    }
}

// Neighbors are found by walking links rather than by key, so the cursor stays valid across the
// rotations a removal performs: only the removed element leaves the tree.
struct CursorRaw<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    tree: NonNull<SearchTree<T, B>>,
    ptr: Link<T>,
}

impl<T, B> CursorRaw<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    fn first(tree: NonNull<SearchTree<T, B>>) -> CursorRaw<T, B> {
        CursorRaw {
            tree,
            ptr: unsafe { tree.as_ref().first_raw() },
        }
    }

    fn last(tree: NonNull<SearchTree<T, B>>) -> CursorRaw<T, B> {
        CursorRaw {
            tree,
            ptr: unsafe { tree.as_ref().last_raw() },
        }
    }

    unsafe fn move_next(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        match self.ptr {
            Some(p) => self.ptr = unsafe { tree.successor_raw(p) },
            None => self.ptr = tree.first_raw(),
        }
    }

    unsafe fn move_prev(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        match self.ptr {
            Some(p) => self.ptr = unsafe { tree.predecessor_raw(p) },
            None => self.ptr = tree.last_raw(),
        }
    }

    unsafe fn get<'a>(&self) -> Option<&'a T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn get_mut<'a>(&mut self) -> Option<Pin<&'a mut T>> {
        self.ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    unsafe fn peek_next<'a>(&self) -> Option<&'a T> {
        let tree = unsafe { self.tree.as_ref() };

        let next_ptr = match self.ptr {
            Some(p) => unsafe { tree.successor_raw(p) },
            None => tree.first_raw(),
        };

        next_ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn peek_prev<'a>(&self) -> Option<&'a T> {
        let tree = unsafe { self.tree.as_ref() };

        let prev_ptr = match self.ptr {
            Some(p) => unsafe { tree.predecessor_raw(p) },
            None => tree.last_raw(),
        };

        prev_ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn remove_current(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_next();

            let tree = self.tree.as_mut();
            Some(tree.remove_at(remove))
        }
    }

    unsafe fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.move_prev();

            let tree = self.tree.as_mut();
            Some(tree.remove_at(remove))
        }
    }
}
