//! Horizon Sections - composes a tree of section providers into one flat,
//! globally addressed index space.
//!
//! A presentation layer (a scrolling list or grid) sees one contiguous list
//! of sections. Behind it, a [`SectionTree`] holds leaf sections of elements
//! grouped by composites and segmented containers nested to any depth.
//! Queries resolve a global section to the leaf that owns it; mutations
//! anywhere in the tree reach the root observer as root-addressed
//! [`ChangeSet`]s.
//!
//! # Example
//!
//! ```
//! use horizon_sections::{IndexPath, SectionMirror, SectionTree};
//!
//! let mut tree = SectionTree::new();
//! let root = tree.create_composite();
//! let inbox = tree.create_section(["hello"]);
//! let archive = tree.create_composite();
//! let old = tree.create_section(["first", "second"]);
//! tree.append_child(root, inbox).unwrap();
//! tree.append_child(root, archive).unwrap();
//! tree.append_child(archive, old).unwrap();
//!
//! let mirror = SectionMirror::new();
//! tree.set_observer(root, mirror.clone()).unwrap();
//! assert_eq!(mirror.counts(), vec![1, 2]);
//!
//! tree.remove_element(old, 0).unwrap();
//! assert_eq!(mirror.counts(), vec![1, 1]);
//! assert_eq!(*tree.element(root, IndexPath::new(1, 0)).unwrap(), "second");
//! ```

mod capability;
mod changeset;
mod debug;
mod dispatch;
mod error;
mod index_path;
mod mapping;
mod node;
mod observer;
mod reducer;
mod section;
mod tree;

pub use capability::Capabilities;
pub use changeset::{ChangeSet, Operation};
pub use debug::TreeDebug;
pub use dispatch::RootView;
pub use error::{SectionError, SectionResult};
pub use index_path::IndexPath;
pub use mapping::Location;
pub use node::{NodeId, ProviderKind, UpdateSink};
pub use observer::{SectionMirror, SectionSource, UpdateObserver};
pub use reducer::ChangeReducer;
pub use tree::{SectionTree, TreeSignals};

pub use horizon_sections_core::{
    ConfigError, ConfigResult, ConnectionId, Signal, TreeConfig, TreeFormatOptions, TreeStyle,
};
