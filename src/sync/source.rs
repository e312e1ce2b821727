use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tracing::debug;

use crate::constants::KEY_SEPARATOR;
use crate::Result;
use crate::SourceError;

/// File extensions understood by [`FileSource`]
const SUPPORTED_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Local configuration the sync operation pushes to the remote store
#[cfg_attr(test, automock)]
pub trait ConfigSource: Send + Sync + 'static {
    /// Loads every local key with its value. Keys are relative to the namespace.
    fn load_all(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, String>>;
}

/// Reads a single config file, or every supported file of a directory
///
/// Directory entries are merged in file-name order, later files overriding
/// earlier keys. Nested tables flatten to `/`-joined keys with a leading `/`,
/// so `[db] host = "x"` becomes `/db/host`. Keys are kept verbatim: case is
/// preserved, dots are not path separators, and a key already starting with
/// `/` (`{"/db/host": "x"}`) is not prefixed again. Arrays are kept as JSON
/// text and null values are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl ConfigSource for FileSource {
    fn load_all(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()).into());
        }

        let files = if path.is_dir() {
            collect_files(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut out = BTreeMap::new();
        for file in &files {
            debug!("loading config source {:?}", file);
            flatten("", parse_file(file)?, &mut out);
        }
        Ok(out)
    }
}

/// Parses one file into a JSON tree, picking the format from its extension
fn parse_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parse_error = |reason: String| SourceError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    let tree: Value = match extension {
        "json" => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        "toml" => {
            let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
            toml_to_json(toml::Value::Table(table))
        }
        "yaml" | "yml" => {
            let doc: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
            yaml_to_json(doc)
        }
        other => return Err(parse_error(format!("unsupported format {:?}", other)).into()),
    };
    Ok(tree)
}

fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if path.is_file() && supported {
            files.push(path);
        } else {
            debug!("skipping {:?}", path);
        }
    }
    files.sort();
    Ok(files)
}

/// Appends `key` to `prefix` with exactly one separator between them
fn join_key(
    prefix: &str,
    key: &str,
) -> String {
    if key.starts_with(KEY_SEPARATOR) {
        format!("{}{}", prefix, key)
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
    }
}

fn flatten(
    prefix: &str,
    value: Value,
    out: &mut BTreeMap<String, String>,
) {
    match value {
        Value::Null => {}
        Value::Object(table) => {
            for (key, value) in table {
                flatten(&join_key(prefix, &key), value, out);
            }
        }
        // A scalar at the document root has no key
        _ if prefix.is_empty() => debug!("skipping value without key"),
        Value::String(s) => {
            out.insert(prefix.to_string(), s);
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(n) => n.into(),
        toml::Value::Float(n) => float_to_json(n),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                float_to_json(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                match yaml_key(key) {
                    Some(key) => {
                        object.insert(key, yaml_to_json(value));
                    }
                    None => debug!("skipping yaml entry with a non-scalar key"),
                }
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-finite floats have no JSON form and are dropped like nulls
fn float_to_json(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
