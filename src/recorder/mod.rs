//! Offset-stable recording of byte-range edits against one file.
//!
//! Every position handed to an [`UpdateRecorder`] refers to the original
//! content the recorder was opened on, never to content shifted by earlier
//! edits. The edits are applied in a single pass when the recorder is
//! committed back into its tree.

mod apply;
mod update_recorder;

pub(crate) use update_recorder::fingerprint;
pub use update_recorder::{RecorderError, Side, UpdateRecorder};
