use compio::{fs::File, io::AsyncReadExt, io::BufReader};
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{borrow::Cow, io::Cursor, path::Path};
use tracing::debug;

use crate::ext::BestEffortPathExt;

/// One change to stage on the tree, as written in the edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Create { path: String, content: String },
    Overwrite { path: String, content: String },
    Delete { path: String },
    Rename { from: String, to: String },
    Update { path: String, changes: Vec<Change> },
}

/// One recorder operation of an `update` edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    InsertLeft { position: usize, content: String },
    InsertRight { position: usize, content: String },
    Remove { position: usize, length: usize },
}

#[derive(Debug, Clone, Default)]
pub struct EditScript {
    edits: Vec<Edit>,
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn get_str<'a>(entry: &'a LinkedHashMap<Yaml<'_>, Yaml<'_>>, name: &'static str) -> Option<&'a str> {
    entry.get(&key(name)).and_then(|value| value.as_str())
}

fn get_usize(entry: &LinkedHashMap<Yaml<'_>, Yaml<'_>>, name: &'static str) -> Option<usize> {
    entry
        .get(&key(name))
        .and_then(|value| value.as_integer())
        .and_then(|value| usize::try_from(value).ok())
}

impl EditScript {
    pub async fn from_path(path: &Path) -> Result<Self, EditScriptError> {
        debug!("Opening edit script: {}", path.best_effort_path_display());
        let file = File::open(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;

        let cursor = Cursor::new(file);
        let mut reader = BufReader::new(cursor);
        let res = reader.read_to_string(String::new()).await;
        let bytes = res.0.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        debug!("Read edit script: {bytes} bytes");

        res.1.as_str().try_into()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    fn parse_edit(index: usize, entry: &Yaml<'_>) -> Result<Edit, EditScriptError> {
        let invalid = |reason: &str| EditScriptError::InvalidEdit {
            index,
            reason: reason.to_string(),
        };
        let entry = entry
            .as_mapping()
            .ok_or_else(|| invalid("edit should be a map"))?;
        let content = || {
            get_str(entry, "content")
                .map(str::to_string)
                .ok_or_else(|| invalid("missing 'content' string"))
        };

        if let Some(path) = get_str(entry, "create") {
            return Ok(Edit::Create {
                path: path.to_string(),
                content: content()?,
            });
        }
        if let Some(path) = get_str(entry, "overwrite") {
            return Ok(Edit::Overwrite {
                path: path.to_string(),
                content: content()?,
            });
        }
        if let Some(path) = get_str(entry, "delete") {
            return Ok(Edit::Delete {
                path: path.to_string(),
            });
        }
        if let Some(from) = get_str(entry, "rename") {
            let to = get_str(entry, "to").ok_or_else(|| invalid("missing 'to' path"))?;
            return Ok(Edit::Rename {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some(path) = get_str(entry, "update") {
            let changes = entry
                .get(&key("changes"))
                .and_then(|value| value.as_sequence())
                .ok_or_else(|| invalid("missing 'changes' list"))?
                .iter()
                .map(|change| Self::parse_change(change).ok_or_else(|| invalid("invalid change")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Edit::Update {
                path: path.to_string(),
                changes,
            });
        }

        Err(invalid("unknown edit kind"))
    }

    fn parse_change(change: &Yaml<'_>) -> Option<Change> {
        let change = change.as_mapping()?;
        let content = || get_str(change, "content").map(str::to_string);

        if let Some(position) = get_usize(change, "insertLeft") {
            return Some(Change::InsertLeft {
                position,
                content: content()?,
            });
        }
        if let Some(position) = get_usize(change, "insertRight") {
            return Some(Change::InsertRight {
                position,
                content: content()?,
            });
        }
        let position = get_usize(change, "remove")?;
        let length = get_usize(change, "length")?;
        Some(Change::Remove { position, length })
    }
}

impl TryFrom<&str> for EditScript {
    type Error = EditScriptError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedScriptSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        let Some(edits) = top_level.get(&key("edits")) else {
            debug!("Edit script has no edits");
            return Ok(EditScript::default());
        };
        let edits = edits
            .as_sequence()
            .context(EditsNotSequenceSnafu)?
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::parse_edit(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Parsed {} edits", edits.len());
        Ok(EditScript { edits })
    }
}

#[derive(Debug, Snafu)]
pub enum EditScriptError {
    #[snafu(display("Failed to read the edit script: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the edit script"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted edit script"))]
    MalformedScript,
    #[snafu(display("Top level of the edit script should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Edits section should be a list"))]
    EditsNotSequence,
    #[snafu(display("Edit #{} is invalid: {}", index, reason))]
    InvalidEdit { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[compio::test]
    async fn script_returns_error_on_nonexistent_file() {
        let result = EditScript::from_path(Path::new("nonexistent.yaml")).await;
        assert!(matches!(result, Err(EditScriptError::ReadError { .. })));
    }

    #[compio::test]
    async fn script_is_read_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stagetree.yaml");
        std::fs::write(&path, "edits:\n  - delete: /old.txt\n").unwrap();

        let script = EditScript::from_path(&path).await.unwrap();
        assert_eq!(
            script.edits(),
            [Edit::Delete {
                path: "/old.txt".to_string()
            }]
        );
    }

    #[test]
    fn script_returns_error_on_invalid_yaml() {
        let result: Result<EditScript, _> = "invalid: yaml: content: [unclosed".try_into();
        assert!(matches!(result, Err(EditScriptError::ParseError { .. })));
    }

    #[test]
    fn script_returns_error_on_empty_file() {
        let result: Result<EditScript, _> = "".try_into();
        assert!(matches!(result, Err(EditScriptError::MalformedScript)));
    }

    #[test]
    fn script_returns_error_when_top_level_is_not_map() {
        let result: Result<EditScript, _> = "- item1\n- item2".try_into();
        assert!(matches!(result, Err(EditScriptError::TopLevelNotMap)));
    }

    #[test]
    fn script_returns_error_when_edits_is_not_sequence() {
        let result: Result<EditScript, _> = "edits:\n  create: /a".try_into();
        assert!(matches!(result, Err(EditScriptError::EditsNotSequence)));
    }

    #[test]
    fn script_handles_missing_edits_section() {
        let script: EditScript = "other: value".try_into().unwrap();
        assert!(script.edits().is_empty());
    }

    #[test]
    fn script_parses_every_edit_kind() {
        let yaml = r#"
edits:
  - create: /src/app.txt
    content: "hello"
  - overwrite: /README.md
    content: "readme"
  - delete: /old.txt
  - rename: /a.txt
    to: /b.txt
  - update: /src/main.ts
    changes:
      - insertLeft: 8
        content: "testing "
      - insertRight: 0
        content: "// "
      - remove: 3
        length: 2
"#;
        let script: EditScript = yaml.try_into().unwrap();
        assert_eq!(
            script.edits(),
            [
                Edit::Create {
                    path: "/src/app.txt".to_string(),
                    content: "hello".to_string(),
                },
                Edit::Overwrite {
                    path: "/README.md".to_string(),
                    content: "readme".to_string(),
                },
                Edit::Delete {
                    path: "/old.txt".to_string(),
                },
                Edit::Rename {
                    from: "/a.txt".to_string(),
                    to: "/b.txt".to_string(),
                },
                Edit::Update {
                    path: "/src/main.ts".to_string(),
                    changes: vec![
                        Change::InsertLeft {
                            position: 8,
                            content: "testing ".to_string(),
                        },
                        Change::InsertRight {
                            position: 0,
                            content: "// ".to_string(),
                        },
                        Change::Remove {
                            position: 3,
                            length: 2,
                        },
                    ],
                },
            ]
        );
    }

    #[test]
    fn script_reports_index_of_invalid_edit() {
        let yaml = r#"
edits:
  - delete: /fine.txt
  - create: /missing-content.txt
"#;
        let result: Result<EditScript, _> = yaml.try_into();
        assert!(matches!(
            result,
            Err(EditScriptError::InvalidEdit { index: 1, .. })
        ));
    }

    #[test]
    fn script_rejects_unknown_edit_kinds_and_negative_positions() {
        let unknown: Result<EditScript, _> = "edits:\n  - copy: /a".try_into();
        assert!(matches!(
            unknown,
            Err(EditScriptError::InvalidEdit { index: 0, .. })
        ));

        let negative: Result<EditScript, _> =
            "edits:\n  - update: /a\n    changes:\n      - remove: -1\n        length: 2".try_into();
        assert!(matches!(
            negative,
            Err(EditScriptError::InvalidEdit { index: 0, .. })
        ));
    }
}
