extern crate std;

use std::{cell::Cell, ops::Range, prelude::v1::*, rc::Rc};

use proptest::prelude::ProptestConfig;

use crate::model::{self, TestNode};

use super::*;

fn keys_of<B: Balance>(tree: &SearchTree<TestNode, B>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn insert_find_all<B: Balance>(keys: &[u32]) {
    let mut tree: SearchTree<TestNode, B> = SearchTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key, key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    if B::MAINTAINS_BALANCE {
        assert!(tree.is_balanced());
    }
}

fn insert_remove_all<B: Balance>(keys: &[u32]) {
    let mut tree: SearchTree<TestNode, B> = SearchTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key, key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key, key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

fn both<F: Fn(&[u32]), G: Fn(&[u32])>(avl: F, bst: G, keys: &[u32]) {
    avl(keys);
    bst(keys);
}

// Calls `f` with every permutation of `0..n`, in lexicographic order.
fn for_each_permutation(n: u32, mut f: impl FnMut(&[u32])) {
    let mut perm: Vec<u32> = (0..n).collect();

    loop {
        f(&perm);

        // Find the rightmost ascent, then bump it to the next larger value to its right.
        let Some(i) = perm.windows(2).rposition(|w| w[0] < w[1]) else {
            return;
        };

        let j = perm.iter().rposition(|&x| x > perm[i]).unwrap();
        perm.swap(i, j);
        perm[i + 1..].reverse();
    }
}

#[test]
fn zero_elems_find() {
    both(insert_find_all::<Avl>, insert_find_all::<Unbalanced>, &[]);
}

#[test]
fn single_elem_find() {
    both(insert_find_all::<Avl>, insert_find_all::<Unbalanced>, &[0]);
}

#[test]
fn two_elems_find() {
    for keys in [[0u32, 1], [1, 0]] {
        both(insert_find_all::<Avl>, insert_find_all::<Unbalanced>, &keys);
    }
}

#[test]
fn three_elems_find() {
    for_each_permutation(3, |keys| {
        both(insert_find_all::<Avl>, insert_find_all::<Unbalanced>, keys)
    });
}

#[test]
fn four_elems_find() {
    for_each_permutation(4, |keys| {
        both(insert_find_all::<Avl>, insert_find_all::<Unbalanced>, keys)
    });
}

#[test]
fn remove_one() {
    both(insert_remove_all::<Avl>, insert_remove_all::<Unbalanced>, &[0]);
}

#[test]
fn remove_two() {
    for keys in [[0u32, 1], [1, 0]] {
        both(insert_remove_all::<Avl>, insert_remove_all::<Unbalanced>, &keys);
    }
}

#[test]
fn remove_three() {
    for_each_permutation(3, |keys| {
        both(insert_remove_all::<Avl>, insert_remove_all::<Unbalanced>, keys)
    });
}

#[test]
fn remove_four() {
    for_each_permutation(4, |keys| {
        both(insert_remove_all::<Avl>, insert_remove_all::<Unbalanced>, keys)
    });
}

#[test]
fn remove_six() {
    let mut count = 0;

    for_each_permutation(6, |keys| {
        insert_remove_all::<Avl>(keys);
        count += 1;
    });

    assert_eq!(count, 720);
}

#[test]
fn duplicate_insert_replaces_in_place() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [4, 2, 6, 1, 3] {
        tree.insert(TestNode::new(key, 0));
    }

    let mut before = String::new();
    tree.write_pretty(&mut before).unwrap();

    let old = tree.insert(TestNode::new(2, 1)).expect("key 2 was present");
    assert_eq!((old.key, old.value), (2, 0));
    assert_eq!(old.links.balance(), 0);
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.get(&2).map(|node| node.value), Some(1));
    tree.assert_invariants();

    let mut after = String::new();
    tree.write_pretty(&mut after).unwrap();
    assert_eq!(before, after);
}

#[test]
fn remove_absent_is_noop() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.remove(&3).is_none());

    for key in [1, 2, 3] {
        tree.insert(TestNode::new(key, key));
    }

    assert!(tree.remove(&4).is_none());
    assert_eq!(tree.len(), 3);
    assert_eq!(keys_of(&tree), [1, 2, 3]);
}

#[test]
fn removed_nodes_are_unlinked() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [4, 2, 6, 1, 3, 5, 7] {
        tree.insert(TestNode::new(key, key));
    }

    // The root has two children, so it trades places with its predecessor before leaving.
    let node = tree.remove(&4).unwrap();
    let links = unsafe { TestNode::links(NonNull::from(&*node)).as_ref() };

    assert!(links.parent().is_none());
    assert!(links.is_leaf());
    assert_eq!(links.balance(), 0);

    // A removed node can be inserted again.
    tree.insert(node);
    tree.assert_invariants();
    assert_eq!(keys_of(&tree), [1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn neighbors() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
        tree.insert(TestNode::new(key, key));
    }

    let key_of = |link: Link<TestNode>| link.map(|node| unsafe { node.as_ref().key });

    for key in 1..=9 {
        let node = tree.get_raw(&key).unwrap();

        let pred = unsafe { tree.predecessor_raw(node) };
        let succ = unsafe { tree.successor_raw(node) };

        assert_eq!(key_of(pred), (key > 1).then(|| key - 1));
        assert_eq!(key_of(succ), (key < 9).then(|| key + 1));
    }
}

#[test]
fn node_swap_adjacent_and_root() {
    let mut tree: BinarySearchTree<TestNode> = BinarySearchTree::new();

    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key, key));
    }

    let root = tree.get_raw(&2).unwrap();
    let left = tree.get_raw(&1).unwrap();

    // Swapping a node with its child moves the child into the root position.
    unsafe { tree.node_swap(root, left) };
    assert_eq!(tree.root, Some(left));

    unsafe {
        assert_eq!(TestNode::links(left).as_ref().left(), Some(root));
        assert_eq!(TestNode::links(root).as_ref().parent(), Some(left));
        assert!(TestNode::links(root).as_ref().is_leaf());
        assert_eq!(TestNode::links(left).as_ref().right(), tree.get_raw(&3));
    }

    // Swapping a node with itself changes nothing.
    unsafe { tree.node_swap(left, left) };
    assert_eq!(tree.root, Some(left));

    // Swapping back restores a valid tree.
    unsafe { tree.node_swap(root, left) };
    tree.assert_invariants();
    assert_eq!(keys_of(&tree), [1, 2, 3]);
}

#[test]
#[should_panic(expected = "stale balance factor")]
fn stale_balance_is_detected() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key, key));
    }
    tree.assert_invariants();

    let root = tree.get_raw(&2).unwrap();
    unsafe { TestNode::links(root).as_mut().set_balance(1) };

    tree.assert_invariants();
}

#[test]
fn entry_api() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    match tree.entry(&5) {
        Entry::Vacant(vacant) => unsafe {
            vacant.insert(TestNode::new(5, 50));
        },
        Entry::Occupied(_) => panic!("empty tree has no occupied entries"),
    }

    match tree.entry(&5) {
        Entry::Occupied(occupied) => {
            assert_eq!(occupied.get().value, 50);
            let node = occupied.remove();
            assert_eq!(node.key, 5);
        }
        Entry::Vacant(_) => panic!("entry for 5 should be occupied"),
    }

    assert!(tree.is_empty());
}

#[test]
fn find_and_cursors() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [10, 20, 30, 40] {
        tree.insert(TestNode::new(key, key));
    }

    let curs = tree.find(&30);
    assert_eq!(curs.get().map(|n| n.key), Some(30));
    assert_eq!(curs.peek_prev().map(|n| n.key), Some(20));
    assert_eq!(curs.peek_next().map(|n| n.key), Some(40));

    assert!(tree.find(&35).is_ghost());

    let mut curs = tree.cursor_last();
    curs.move_next();
    assert!(curs.is_ghost());
    curs.move_prev();
    assert_eq!(curs.get().map(|n| n.key), Some(40));

    let mut curs = tree.find_mut(&20);
    let removed = curs.remove_current().map(|n| n.key);
    assert_eq!(removed, Some(20));
    assert_eq!(curs.get().map(|n| n.key), Some(30));

    tree.assert_invariants();
    assert_eq!(keys_of(&tree), [10, 30, 40]);
}

#[test]
fn iteration_terminates_after_len_steps() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in (0..50).map(|k| (k * 37) % 50) {
        tree.insert(TestNode::new(key, key));
    }

    let iter = tree.iter();
    assert_eq!(iter.len(), 50);
    assert_eq!(iter.map(|n| n.key).collect::<Vec<_>>(), (0..50).collect::<Vec<_>>());

    let mut curs = tree.cursor_first();
    for _ in 0..tree.len() {
        assert!(!curs.is_ghost());
        curs.move_next();
    }
    assert!(curs.is_ghost());
}

#[test]
fn unbalanced_tree_degenerates() {
    let mut bst: BinarySearchTree<TestNode> = BinarySearchTree::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    for key in 0..32 {
        bst.insert(TestNode::new(key, key));
        avl.insert(TestNode::new(key, key));
    }

    assert_eq!(bst.height(), 32);
    assert!(!bst.is_balanced());

    // A perfect tree of 31 nodes has height 5; the 32nd node adds a level.
    assert_eq!(avl.height(), 6);
    assert!(avl.is_balanced());
}

#[test]
fn pretty_printing() {
    let mut avl: AvlTree<TestNode> = AvlTree::new();
    for key in [2, 1, 3, 4] {
        avl.insert(TestNode::new(key, key));
    }

    let mut out = String::new();
    avl.write_pretty(&mut out).unwrap();
    assert_eq!(
        out,
        "2 [1]\n├── 1 [0]\n└── 3 [1]\n    ├── ·\n    └── 4 [0]\n"
    );

    let mut bst: BinarySearchTree<TestNode> = BinarySearchTree::new();
    for key in [1, 2] {
        bst.insert(TestNode::new(key, key));
    }

    let mut out = String::new();
    bst.write_pretty(&mut out).unwrap();
    assert_eq!(out, "1\n├── ·\n└── 2\n");

    let empty: AvlTree<TestNode> = AvlTree::new();
    let mut out = String::new();
    empty.write_pretty(&mut out).unwrap();
    assert_eq!(out, "(empty)\n");
}

#[test]
fn dotgraph_labels_balance() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [1, 2] {
        tree.insert(TestNode::new(key, key));
    }

    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();

    assert!(out.starts_with("digraph \"graph-t\""));
    assert!(out.contains("[label=\"1:1\"]"));
    assert!(out.contains("[label=\"2:0\"]"));
    assert!(out.contains("\"grapht-1\" -> \"grapht-2\";"));
}

#[repr(C)]
struct DropNode {
    links: Links<DropNode>,
    key: u32,
    drops: Rc<Cell<usize>>,
}

impl Drop for DropNode {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

unsafe impl Linked<Links<DropNode>> for DropNode {
    type Handle = Box<DropNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<DropNode>> {
        ptr.cast()
    }
}

impl TreeNode<Links<DropNode>> for DropNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[test]
fn clear_releases_every_node_once() {
    let drops = Rc::new(Cell::new(0));
    let mut tree: AvlTree<DropNode> = AvlTree::new();

    for key in 0..64 {
        tree.insert(Box::new(DropNode {
            links: Links::new(),
            key: (key * 13) % 64,
            drops: drops.clone(),
        }));
    }

    tree.clear();
    assert_eq!(drops.get(), 64);
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);

    // Clearing an empty tree does nothing.
    tree.clear();
    assert_eq!(drops.get(), 64);

    tree.insert(Box::new(DropNode {
        links: Links::new(),
        key: 0,
        drops: drops.clone(),
    }));
    drop(tree);
    assert_eq!(drops.get(), 65);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence::<Avl>(ops);
    }

    #[test]
    fn btree_equivalence_unbalanced(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence::<Unbalanced>(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence::<Avl>(values, ops);
    }

    #[test]
    fn cursor_equivalence_unbalanced(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence::<Unbalanced>(values, ops);
    }
}
