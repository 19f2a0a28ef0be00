//! Edit scripts: the YAML description of the changes the binary stages.

mod edit_script;

pub use edit_script::{Change, Edit, EditScript, EditScriptError};
