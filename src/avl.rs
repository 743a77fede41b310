//! AVL rebalancing: rotations with O(1) balance updates, and the two retracing walks.

use core::ptr::NonNull;

use log::trace;

use crate::{sealed, which_child, Balance, Dir, Links, SearchTree, TreeNode};

/// The AVL balancing policy.
///
/// After every insertion and removal the tree is retraced from the changed position toward the
/// root, updating balance factors and rotating wherever a node becomes two levels heavier on one
/// side. Insertion performs at most one single or double rotation; removal may rotate at every
/// level.
#[derive(Copy, Clone, Debug, Default)]
pub struct Avl;

impl sealed::Sealed for Avl {}

impl Balance for Avl {
    const MAINTAINS_BALANCE: bool = true;

    unsafe fn rebalance_inserted<T>(tree: &mut SearchTree<T, Self>, node: NonNull<T>)
    where
        T: TreeNode<Links<T>> + ?Sized,
    {
        unsafe { tree.retrace_insert(node) }
    }

    unsafe fn rebalance_removed<T>(tree: &mut SearchTree<T, Self>, parent: NonNull<T>, shrunk: Dir)
    where
        T: TreeNode<Links<T>> + ?Sized,
    {
        unsafe { tree.retrace_remove(parent, shrunk) }
    }
}

impl<T> SearchTree<T, Avl>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    #[inline]
    unsafe fn balance(&self, node: NonNull<T>) -> i8 {
        unsafe { T::links(node).as_ref().balance() }
    }

    #[inline]
    unsafe fn set_balance(&mut self, node: NonNull<T>, balance: i8) {
        unsafe { T::links(node).as_mut().set_balance(balance) };
    }

    // Promotes the right child `y` of `x` into `x`'s position and returns it.
    //
    // With `b` the balances before the rotation and `b'` after:
    //   b'(x) = b(x) - 1 - max(b(y), 0)
    //   b'(y) = b(y) - 1 + min(b'(x), 0)
    pub(crate) unsafe fn rotate_left(&mut self, x: NonNull<T>) -> NonNull<T> {
        unsafe {
            let x_balance = self.balance(x);
            let y = self.rotate(x, Dir::Left);
            let y_balance = self.balance(y);

            let x_balance = x_balance - 1 - y_balance.max(0);
            let y_balance = y_balance - 1 + x_balance.min(0);

            self.set_balance(x, x_balance);
            self.set_balance(y, y_balance);

            y
        }
    }

    // Promotes the left child `y` of `x` into `x`'s position and returns it.
    //
    // Mirror image of `rotate_left`:
    //   b'(x) = b(x) + 1 - min(b(y), 0)
    //   b'(y) = b(y) + 1 + max(b'(x), 0)
    pub(crate) unsafe fn rotate_right(&mut self, x: NonNull<T>) -> NonNull<T> {
        unsafe {
            let x_balance = self.balance(x);
            let y = self.rotate(x, Dir::Right);
            let y_balance = self.balance(y);

            let x_balance = x_balance + 1 - y_balance.min(0);
            let y_balance = y_balance + 1 + x_balance.max(0);

            self.set_balance(x, x_balance);
            self.set_balance(y, y_balance);

            y
        }
    }

    // Rotates `x` down and away from its `heavy` side.
    #[inline]
    unsafe fn rotate_away(&mut self, x: NonNull<T>, heavy: Dir) -> NonNull<T> {
        unsafe {
            match heavy {
                Dir::Right => self.rotate_left(x),
                Dir::Left => self.rotate_right(x),
            }
        }
    }

    // Restores the balance of `node`, which is two levels heavier on its `heavy` side, and returns
    // the root of the rotated subtree.
    //
    // If the heavy child leans the other way, a single rotation would only mirror the imbalance,
    // so the child is first rotated the other way (the zig-zag case). A heavy child with balance 0
    // can only occur after a removal; it takes the single rotation, which leaves the new subtree
    // root leaning toward the side that shrank.
    unsafe fn restore_at(&mut self, node: NonNull<T>, heavy: Dir) -> NonNull<T> {
        unsafe {
            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("the heavy side of an unbalanced node must have a child");

            if self.balance(child) == (!heavy).sign() {
                trace!("double rotation, heavy side {heavy:?}");
                self.rotate_away(child, !heavy);
            } else {
                trace!("single rotation, heavy side {heavy:?}");
            }

            self.rotate_away(node, heavy)
        }
    }

    // Retraces the tree after `node` was attached as a new leaf.
    //
    // Walking up from `node`, each ancestor's balance shifts toward the side that grew:
    // - 0: the ancestor's height is unchanged, so nothing above it is affected.
    // - ±1: the ancestor grew by one level; continue with its parent.
    // - ±2: rotate. The rotated subtree regains its height from before the insertion, so the walk
    //   ends.
    unsafe fn retrace_insert(&mut self, node: NonNull<T>) {
        unsafe {
            let mut child = node;

            while let Some(parent) = T::links(child).as_ref().parent() {
                let grew = which_child(parent, child);
                let balance = self.balance(parent) + grew.sign();
                self.set_balance(parent, balance);

                match balance {
                    0 => return,
                    -1 | 1 => child = parent,
                    _ => {
                        self.restore_at(parent, grew);
                        return;
                    }
                }
            }

            trace!("insert retraced to the root");
        }
    }

    // Retraces the tree after a node was spliced out of the `shrunk` side of `parent`.
    //
    // Walking up from `parent`, each node's balance shifts away from the side that shrank:
    // - ±1: the node was balanced before, so its height is unchanged; the walk ends.
    // - 0: the node lost a level; continue with its parent.
    // - ±2: rotate. If the new subtree root is balanced the subtree lost a level and the walk
    //   continues above it; otherwise its height is unchanged and the walk ends.
    unsafe fn retrace_remove(&mut self, parent: NonNull<T>, shrunk: Dir) {
        unsafe {
            let mut node = parent;
            let mut shrunk = shrunk;

            loop {
                let balance = self.balance(node) - shrunk.sign();
                self.set_balance(node, balance);

                let subtree = match balance {
                    -1 | 1 => return,
                    0 => node,
                    _ => {
                        let root = self.restore_at(node, !shrunk);

                        if self.balance(root) != 0 {
                            return;
                        }

                        root
                    }
                };

                let Some(up) = T::links(subtree).as_ref().parent() else {
                    trace!("remove retraced to the root");
                    return;
                };

                shrunk = which_child(up, subtree);
                node = up;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::prelude::v1::*;

    use cordyceps::Linked;

    use super::*;
    use crate::model::TestNode;

    fn tree_of(keys: &[u32]) -> SearchTree<TestNode, Avl> {
        let mut tree = SearchTree::new();

        for &key in keys {
            tree.insert(TestNode::new(key, key));
            tree.assert_invariants();
        }

        tree
    }

    // Returns `(key, balance)` for every node in level order.
    fn shape(tree: &SearchTree<TestNode, Avl>) -> Vec<(u32, i8)> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.extend(tree.root);

        while let Some(node) = queue.pop_front() {
            unsafe {
                let links = TestNode::links(node).as_ref();
                out.push((node.as_ref().key, links.balance()));
                queue.extend(links.left());
                queue.extend(links.right());
            }
        }

        out
    }

    #[test]
    fn single_rotations_on_insert() {
        // Right-right.
        assert_eq!(shape(&tree_of(&[1, 2, 3])), [(2, 0), (1, 0), (3, 0)]);
        // Left-left.
        assert_eq!(shape(&tree_of(&[3, 2, 1])), [(2, 0), (1, 0), (3, 0)]);
    }

    #[test]
    fn double_rotations_on_insert() {
        // Right-left.
        assert_eq!(shape(&tree_of(&[1, 3, 2])), [(2, 0), (1, 0), (3, 0)]);
        // Left-right.
        assert_eq!(shape(&tree_of(&[3, 1, 2])), [(2, 0), (1, 0), (3, 0)]);
    }

    #[test]
    fn double_rotation_with_leaning_grandchild() {
        // 40 lands under 30, making 50 left-heavy by two through the right-leaning 20.
        let tree = tree_of(&[50, 20, 80, 10, 30, 40]);
        assert_eq!(
            shape(&tree),
            [(30, 0), (20, -1), (50, 0), (10, 0), (40, 0), (80, 0)]
        );

        // 25 lands on the other side of 30, so the balance ends up on 50 instead.
        let tree = tree_of(&[50, 20, 80, 10, 30, 25]);
        assert_eq!(
            shape(&tree),
            [(30, 0), (20, 0), (50, 1), (10, 0), (25, 0), (80, 0)]
        );
    }

    #[test]
    fn ascending_inserts_stay_shallow() {
        let tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(tree.height(), 3);
        assert_eq!(
            shape(&tree),
            [(4, 0), (2, 0), (6, 0), (1, 0), (3, 0), (5, 0), (7, 0)]
        );
    }

    #[test]
    fn removal_with_balanced_heavy_child_stops() {
        // Removing 1 leaves 2 right-heavy by two with a balanced right child. The single rotation
        // keeps the subtree height, leaving 4 leaning left.
        let mut tree = tree_of(&[2, 1, 4, 3, 5]);
        assert!(tree.remove(&1).is_some());
        tree.assert_invariants();

        assert_eq!(shape(&tree), [(4, -1), (2, 1), (5, 0), (3, 0)]);
    }

    #[test]
    fn removal_propagates_to_root() {
        // Every node on the left spine leans left, so removing 12 unbalances 11, and the shrunken
        // right subtree then unbalances the root.
        let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
        assert_eq!(tree.height(), 5);

        assert!(tree.remove(&12).is_some());
        tree.assert_invariants();

        assert_eq!(tree.height(), 4);
        assert_eq!(
            shape(&tree),
            [
                (5, 0),
                (3, -1),
                (8, 0),
                (2, -1),
                (4, 0),
                (7, -1),
                (10, 0),
                (1, 0),
                (6, 0),
                (9, 0),
                (11, 0)
            ]
        );
    }

    #[test]
    fn removing_inner_node_swaps_with_predecessor() {
        let mut tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);
        let removed = tree.remove(&5).expect("5 is present");
        assert_eq!(removed.key, 5);
        tree.assert_invariants();

        assert_eq!(
            tree.iter().map(|node| node.key).collect::<Vec<_>>(),
            [1, 3, 4, 7, 8, 9]
        );
        // 4 took the root position and its balance.
        assert_eq!(shape(&tree)[0], (4, 0));
    }

    #[test]
    fn removing_parent_of_adjacent_predecessor() {
        // The predecessor of 3 is its direct left child.
        let mut tree = tree_of(&[3, 2, 4, 1]);
        assert!(tree.remove(&3).is_some());
        tree.assert_invariants();

        assert_eq!(shape(&tree), [(2, 0), (1, 0), (4, 0)]);
    }
}
