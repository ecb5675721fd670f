//! Tree visualization for debugging.
//!
//! # Example
//!
//! ```
//! use horizon_sections::{SectionTree, TreeDebug, TreeFormatOptions, TreeStyle};
//!
//! let mut tree = SectionTree::new();
//! let root = tree.create_composite();
//! let leaf = tree.create_section([1, 2, 3]);
//! tree.set_name(root, "root").unwrap();
//! tree.set_name(leaf, "numbers").unwrap();
//! tree.append_child(root, leaf).unwrap();
//!
//! let output = TreeDebug::new(&tree)
//!     .with_options(TreeFormatOptions::minimal().with_style(TreeStyle::Ascii))
//!     .format(root)
//!     .unwrap();
//! assert_eq!(output, "root (composite)\n`-- numbers (section)\n");
//! ```

use std::fmt::{self, Write};

use horizon_sections_core::{TreeFormatOptions, TreeStyle};

use crate::error::SectionResult;
use crate::node::{NodeId, NodeKind};
use crate::tree::SectionTree;

/// Formats the structure of a [`SectionTree`].
pub struct TreeDebug<'a, T> {
    tree: &'a SectionTree<T>,
    options: TreeFormatOptions,
}

impl<'a, T> TreeDebug<'a, T> {
    /// Create a formatter with default options.
    pub fn new(tree: &'a SectionTree<T>) -> Self {
        Self {
            tree,
            options: TreeFormatOptions::default(),
        }
    }

    /// Set the format options.
    pub fn with_options(mut self, options: TreeFormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Format every root of the tree.
    pub fn format_all(&self) -> SectionResult<String> {
        let mut output = String::new();
        for root in self.tree.roots() {
            output.push_str(&self.format(root)?);
        }
        Ok(output)
    }

    /// Format the subtree rooted at `root`.
    pub fn format(&self, root: NodeId) -> SectionResult<String> {
        let mut output = String::new();
        if self.options.style == TreeStyle::Compact {
            self.format_compact(root, root, 0, &mut output)?;
            output.push('\n');
        } else {
            self.format_node(root, root, &mut Vec::new(), &mut output)?;
        }
        Ok(output)
    }

    /// Writes `node` and its children, one line each. `last_flags` holds, for
    /// every ancestor level below the root, whether that ancestor was the
    /// last of its siblings.
    fn format_node(
        &self,
        root: NodeId,
        node: NodeId,
        last_flags: &mut Vec<bool>,
        output: &mut String,
    ) -> SectionResult<()> {
        let depth = last_flags.len();
        output.push_str(&self.prefix(last_flags));
        self.write_label(root, node, output)?;
        output.push('\n');

        if self.options.max_depth.is_some_and(|max| depth >= max) {
            return Ok(());
        }
        let children = self.children(node)?;
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            last_flags.push(i + 1 == count);
            self.format_node(root, child, last_flags, output)?;
            last_flags.pop();
        }
        Ok(())
    }

    fn format_compact(
        &self,
        root: NodeId,
        node: NodeId,
        depth: usize,
        output: &mut String,
    ) -> SectionResult<()> {
        self.write_label(root, node, output)?;
        let children = self.children(node)?;
        if children.is_empty() || self.options.max_depth.is_some_and(|max| depth >= max) {
            return Ok(());
        }
        output.push_str(" [");
        for (i, child) in children.into_iter().enumerate() {
            if i > 0 {
                output.push_str(", ");
            }
            self.format_compact(root, child, depth + 1, output)?;
        }
        output.push(']');
        Ok(())
    }

    fn children(&self, node: NodeId) -> SectionResult<Vec<NodeId>> {
        Ok(self.tree.node(node)?.kind.children().to_vec())
    }

    fn prefix(&self, last_flags: &[bool]) -> String {
        let Some((&is_last, ancestors)) = last_flags.split_last() else {
            return String::new();
        };
        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "", ""),
        };

        let mut prefix = String::new();
        for &ancestor_is_last in ancestors {
            prefix.push_str(if ancestor_is_last { " " } else { branch });
            for _ in 0..self.options.indent_size + 1 {
                prefix.push(' ');
            }
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }

    fn write_label(&self, root: NodeId, id: NodeId, output: &mut String) -> SectionResult<()> {
        let node = self.tree.node(id)?;
        let name = if node.name.is_empty() {
            "(unnamed)"
        } else {
            &node.name
        };
        write!(output, "{name} ({})", node.kind.tag()).expect("write to String");

        if self.options.show_ids {
            write!(output, " [{id:?}]").expect("write to String");
        }
        if let NodeKind::Section(elements) = &node.kind {
            if self.options.show_counts {
                write!(output, " elements={}", elements.len()).expect("write to String");
            }
        } else if self.options.show_counts {
            let sections = self.tree.number_of_sections(id)?;
            write!(output, " sections={sections}").expect("write to String");
        }
        if self.options.show_offsets && id != root {
            match self.tree.offset_of(root, id)? {
                Some(offset) => write!(output, " offset={offset}").expect("write to String"),
                None => output.push_str(" hidden"),
            }
        }
        Ok(())
    }
}

impl<T> fmt::Display for TreeDebug<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format_all() {
            Ok(output) => write!(f, "{output}"),
            Err(e) => write!(f, "Error formatting section tree: {e}"),
        }
    }
}
