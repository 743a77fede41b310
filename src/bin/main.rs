use cordyceps_avl::{AvlMap, BstMap};

fn main() {
    let mut avl: AvlMap<u32, char> = AvlMap::new();
    let mut bst: BstMap<u32, char> = BstMap::new();

    for (key, value) in (1..=7).zip('a'..) {
        avl.insert(key, value);
        bst.insert(key, value);
        avl.assert_invariants();
    }

    println!("avl: height {}, balanced: {}", avl.height(), avl.is_balanced());
    avl.print();

    println!("bst: height {}, balanced: {}", bst.height(), bst.is_balanced());
    bst.print();

    avl.remove(&4);
    avl.assert_invariants();
    println!("avl without 4: {avl:?}");
    avl.print();

    match avl.lookup(&4) {
        Ok(value) => println!("4 => {value}"),
        Err(err) => println!("4: {err}"),
    }

    let first = avl.pop_first().map(|(key, _)| key);
    assert_eq!(first, Some(1));
    avl.assert_invariants();
}
