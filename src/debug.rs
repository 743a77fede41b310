use alloc::{collections::VecDeque, format, string::String, vec, vec::Vec};
use core::{fmt, ptr::NonNull};

use crate::{Balance, Dir, Link, Links, SearchTree, TreeNode};

impl<T, B> SearchTree<T, B>
where
    T: TreeNode<Links<T>> + ?Sized,
    B: Balance,
{
    /// Writes the tree to `w` as a Graphviz digraph named `name`.
    ///
    /// Each node is labeled with its key and its balance factor.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        T::Key: fmt::Display,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let node = match item {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let key = unsafe { node.as_ref().key() };
                let links = unsafe { T::links(node).as_ref() };
                write!(
                    w,
                    "\"graph{name}-{key}\" [label=\"{key}:{}\"]; ",
                    links.balance()
                )?;

                for dir in [Dir::Left, Dir::Right] {
                    if let Some(child) = links.child(dir) {
                        let child_key = unsafe { child.as_ref().key() };

                        queue.push_back(Item::Node(child));
                        writeln!(edges, "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";")?;
                    } else {
                        queue.push_back(Item::Missing(missing));
                        writeln!(
                            edges,
                            "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                        )?;
                        missing += 1;
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}")
    }

    /// Writes a sideways drawing of the tree to `w`, one node per line.
    ///
    /// Each node is followed by its left child (`├──`) and then its right child (`└──`). A missing
    /// child of a node with one child is drawn as `·`. For an [`AvlTree`](crate::AvlTree) the
    /// balance factor of every node is shown in brackets.
    pub fn write_pretty<W>(&self, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        T::Key: fmt::Debug,
    {
        let Some(root) = self.root else {
            return writeln!(w, "(empty)");
        };

        // Entries are `(node, indentation, side of parent)`. The root has no connector.
        let mut stack: Vec<(Link<T>, String, Option<Dir>)> = vec![(Some(root), String::new(), None)];

        while let Some((node, indent, side)) = stack.pop() {
            let (branch, child_indent) = match side {
                None => ("", String::new()),
                Some(Dir::Left) => ("├── ", format!("{indent}│   ")),
                Some(Dir::Right) => ("└── ", format!("{indent}    ")),
            };

            let Some(node) = node else {
                writeln!(w, "{indent}{branch}·")?;
                continue;
            };

            let key = unsafe { node.as_ref().key() };
            let links = unsafe { T::links(node).as_ref() };

            if B::MAINTAINS_BALANCE {
                writeln!(w, "{indent}{branch}{key:?} [{}]", links.balance())?;
            } else {
                writeln!(w, "{indent}{branch}{key:?}")?;
            }

            if links.is_leaf() {
                continue;
            }

            stack.push((links.right(), child_indent.clone(), Some(Dir::Right)));
            stack.push((links.left(), child_indent, Some(Dir::Left)));
        }

        Ok(())
    }
}
