//! Staged file-tree editing.
//!
//! Changes are staged on a [`tree::HostTree`], an in-memory overlay over a
//! read-only [`host::Host`], and later committed in one go through a
//! [`sink::Sink`], which either writes them to an output host or only reports
//! what it would write.

pub mod host;
pub mod path;
pub mod recorder;
pub mod sink;
pub mod tree;
