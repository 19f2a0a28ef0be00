//! Normalized, absolute, POSIX-style paths used as keys by trees and hosts.

mod tree_path;

pub use tree_path::{PathError, TreePath};
