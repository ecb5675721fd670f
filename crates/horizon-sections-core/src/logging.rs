//! Logging and debugging facilities for Horizon Sections.
//!
//! This module provides:
//! - Target names for the `tracing` instrumentation used throughout the
//!   section tree
//! - Formatting options shared by the tree debug printers
//!
//! # Tracing Integration
//!
//! Horizon Sections uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_sections::mapping=trace")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_sections_core::signal";
    /// Configuration loading target.
    pub const CONFIG: &str = "horizon_sections_core::config";
    /// Tree structure (attach, detach, destroy).
    pub const TREE: &str = "horizon_sections::tree";
    /// Mapping cache invalidation and rebuilds.
    pub const MAPPING: &str = "horizon_sections::mapping";
    /// Change translation, batching and dispatch.
    pub const CHANGES: &str = "horizon_sections::changes";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node handles.
    pub show_ids: bool,
    /// Whether to show section counts.
    pub show_counts: bool,
    /// Whether to show offsets relative to the formatted root.
    pub show_offsets: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            show_counts: true,
            show_offsets: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_ids: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output (names and kinds only).
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_counts: false,
            show_offsets: false,
            ..Default::default()
        }
    }

    /// Sets the tree style.
    pub fn with_style(mut self, style: TreeStyle) -> Self {
        self.style = style;
        self
    }

    /// Limits the traversal depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_option_presets() {
        let detailed = TreeFormatOptions::detailed();
        assert!(detailed.show_ids);
        assert!(detailed.show_counts);

        let minimal = TreeFormatOptions::minimal().with_style(TreeStyle::Ascii);
        assert!(!minimal.show_counts);
        assert!(!minimal.show_offsets);
        assert_eq!(minimal.style, TreeStyle::Ascii);
        assert_eq!(minimal.with_max_depth(2).max_depth, Some(2));
    }
}
