//! Line-oriented `key=value` configuration files.
//!
//! # Format
//!
//! ```text
//! # comment
//! dir="/home/user/Yandex.Disk"
//! "quoted key" = value
//! exclude-dirs = one, "two, with comma", three
//! read-only = yes
//! ```
//!
//! Keys are bare identifiers (`[\w-]+`) or double-quoted strings. Values are
//! comma-separated items, each quoted (no escapes) or a bare run without
//! `,` `"` `#`. Items matching a boolean alias decode to [`Value::Bool`].
//!
//! # Saving
//!
//! [`ConfigStore::save`] patches the existing file instead of rewriting it:
//! comments, ordering and keys the store does not manage are kept as they are.
//! The daemon and people edit these files too.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::value_set::ValueSet;

/// A single configuration scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => b.fmt(f),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Value> for ValueSet<Value> {
    fn from(value: Value) -> Self {
        ValueSet::single(value)
    }
}

impl From<&str> for ValueSet<Value> {
    fn from(s: &str) -> Self {
        ValueSet::single(Value::from(s))
    }
}

impl From<String> for ValueSet<Value> {
    fn from(s: String) -> Self {
        ValueSet::single(Value::from(s))
    }
}

impl From<bool> for ValueSet<Value> {
    fn from(b: bool) -> Self {
        ValueSet::single(Value::Bool(b))
    }
}

/// Per-store parsing and rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFormat {
    /// Lower-case words read as `true`.
    pub true_words: Vec<String>,
    /// Lower-case words read as `false`.
    pub false_words: Vec<String>,
    /// Word written for `true`.
    pub write_true: String,
    /// Word written for `false`.
    pub write_false: String,
    /// Quote every value on save.
    pub use_quotes: bool,
    pub delimiter: char,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        Self {
            true_words: vec!["true".into(), "yes".into(), "y".into()],
            false_words: vec!["false".into(), "no".into(), "n".into()],
            write_true: "yes".into(),
            write_false: "no".into(),
            use_quotes: true,
            delimiter: '=',
        }
    }
}

impl ConfigFormat {
    /// Default format without boolean aliases: every item stays text.
    pub fn text_only() -> Self {
        Self {
            true_words: Vec::new(),
            false_words: Vec::new(),
            ..Self::default()
        }
    }

    /// Parses a raw value list such as `a, "b, c", yes`.
    ///
    /// Returns `None` for malformed lists: leading or trailing commas, an
    /// unclosed quote, or anything other than a comma after an item.
    pub fn parse_values(&self, raw: &str) -> Option<ValueSet<Value>> {
        let mut rest = raw.trim();
        if rest.is_empty() || rest.starts_with(',') {
            return None;
        }
        let mut values = ValueSet::new();
        loop {
            let (item, tail) = match rest.strip_prefix('"') {
                Some(quoted) => {
                    let end = quoted.find('"')?;
                    (&quoted[..end], &quoted[end + 1..])
                }
                None => {
                    let end = rest.find([',', '"', '#']).unwrap_or(rest.len());
                    if end == 0 {
                        return None;
                    }
                    (rest[..end].trim(), &rest[end..])
                }
            };
            values.add(self.decode(item));

            rest = tail.trim_start();
            if rest.is_empty() {
                return Some(values);
            }
            rest = rest.strip_prefix(',')?.trim_start();
            if rest.is_empty() {
                return None;
            }
        }
    }

    fn decode(&self, item: &str) -> Value {
        let lower = item.to_lowercase();
        if self.true_words.iter().any(|w| *w == lower) {
            Value::Bool(true)
        } else if self.false_words.iter().any(|w| *w == lower) {
            Value::Bool(false)
        } else {
            Value::Text(item.to_owned())
        }
    }

    /// Renders one item so that [`ConfigFormat::parse_values`] reads it back.
    ///
    /// `None` when the grammar has no spelling for it: a `"` or line break
    /// anywhere, or, unquoted, an empty or padded item or one with `,` or `#`.
    fn encode(&self, value: &Value) -> Option<String> {
        let raw = match value {
            Value::Bool(true) => self.write_true.as_str(),
            Value::Bool(false) => self.write_false.as_str(),
            Value::Text(s) => s.as_str(),
        };
        if raw.contains(['"', '\n', '\r']) {
            return None;
        }
        if self.use_quotes {
            return Some(format!("\"{raw}\""));
        }
        let bare = !raw.is_empty() && raw.trim() == raw && !raw.contains([',', '#']);
        bare.then(|| raw.to_owned())
    }
}

/// In-memory view of one configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    format: ConfigFormat,
    entries: Vec<(String, ValueSet<Value>)>,
    // Value text as read by the last load, before decoding.
    raw: Vec<(String, String)>,
    changed: bool,
    read_success: bool,
}

impl ConfigStore {
    /// Empty store bound to `path`; nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_format(path, ConfigFormat::default())
    }

    pub fn with_format(path: impl Into<PathBuf>, format: ConfigFormat) -> Self {
        Self {
            path: path.into(),
            format,
            entries: Vec::new(),
            raw: Vec::new(),
            changed: false,
            read_success: false,
        }
    }

    /// Store bound to `path` with the file loaded.
    ///
    /// A missing or unreadable file is logged and leaves the store empty; check
    /// [`ConfigStore::read_success`] to tell "new file" from "loaded".
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        let _ = store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &ConfigFormat {
        &self.format
    }

    /// `true` after the last [`ConfigStore::load`] read the file.
    pub fn read_success(&self) -> bool {
        self.read_success
    }

    /// `true` when values were set since the last successful save.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<&ValueSet<Value>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Undecoded value text of `key` as the last [`ConfigStore::load`] read it.
    pub fn raw_value(&self, key: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The value of `key` when it is a single boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_single()?.as_bool()
    }

    /// The value of `key` when it is a single text value.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_single()?.as_text()
    }

    /// Sets `key`, marking the store as changed.
    ///
    /// An absent value keeps the key and makes [`ConfigStore::save`] delete
    /// its line from the file.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ValueSet<Value>>) {
        self.insert(key.into(), value.into());
        self.changed = true;
    }

    /// Marks `key` for deletion on the next save.
    pub fn remove(&mut self, key: &str) {
        self.set(key, ValueSet::new());
    }

    /// Inserts `value` only if `key` is missing; returns the stored value.
    pub fn set_default(
        &mut self,
        key: &str,
        value: impl Into<ValueSet<Value>>,
    ) -> &ValueSet<Value> {
        let pos = match self.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.entries.push((key.to_owned(), value.into()));
                self.entries.len() - 1
            }
        };
        &self.entries[pos].1
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueSet<Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, value: ValueSet<Value>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Reads the backing file, replacing all entries.
    ///
    /// Malformed lines are logged and skipped. An unreadable file returns
    /// [`ConfigError::Io`] and leaves the store empty.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        self.entries.clear();
        self.raw.clear();
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                self.read_success = false;
                tracing::error!(path = %self.path.display(), error = %err, "config file read error");
                return Err(io_err(&self.path, err));
            }
        };
        self.read_success = true;
        for line in contents.lines() {
            self.load_line(line);
        }
        tracing::info!(path = %self.path.display(), keys = self.entries.len(), "config read");
        Ok(())
    }

    fn load_line(&mut self, line: &str) {
        let stripped = line.trim_start();
        if stripped.is_empty() || stripped.starts_with('#') {
            return;
        }
        let Some((raw_key, raw_value)) = line.split_once(self.format.delimiter) else {
            return;
        };
        let (raw_key, raw_value) = (raw_key.trim(), raw_value.trim());

        let Some(key) = parse_key(raw_key) else {
            tracing::warn!(line = %line.trim(), "wrong key in config line");
            return;
        };
        if raw_value.is_empty() {
            tracing::warn!(line = %line.trim(), "no value specified in config line");
            return;
        }
        let Some(value) = self.parse_values(raw_value) else {
            tracing::warn!(line = %line.trim(), "wrong value(s) in config line");
            return;
        };

        if let Some(previous) = self.get(key) {
            tracing::warn!(
                key,
                previous = %previous,
                value = %value,
                "duplicate config key; last one is stored",
            );
        }
        tracing::debug!(key, value = %value, "config value read");
        match self.raw.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = raw_value.to_owned(),
            None => self.raw.push((key.to_owned(), raw_value.to_owned())),
        }
        self.insert(key.to_owned(), value);
    }

    /// [`ConfigFormat::parse_values`] with this store's format.
    pub fn parse_values(&self, raw: &str) -> Option<ValueSet<Value>> {
        self.format.parse_values(raw)
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Writes the store into its file, patching lines in place.
    ///
    /// An unreadable file is treated as empty and created. Write failures are
    /// returned; the `changed` flag is cleared only on success.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "config file access error, a new file will be created",
                );
                String::new()
            }
        };
        let patched = self.patch(&existing);

        if let Err(err) = write_atomic(&self.path, &patched) {
            tracing::error!(path = %self.path.display(), error = %err, "config file write error");
            return Err(err);
        }
        tracing::info!(path = %self.path.display(), "config written");
        self.changed = false;
        Ok(())
    }

    /// Applies every entry to `existing` file text and returns the new text.
    ///
    /// Absent values delete all lines of their key. Present values replace
    /// the first line of their key and drop later duplicates, or are appended.
    /// A value the format cannot spell leaves its key's lines untouched.
    pub fn patch(&self, existing: &str) -> String {
        let body = existing.trim_end_matches(['\n', '\r']);
        let mut lines: Vec<String> = if body.is_empty() {
            Vec::new()
        } else {
            body.lines().map(str::to_owned).collect()
        };

        for (key, value) in &self.entries {
            let rendered = if value.is_present() {
                let Some(line) = self.render_line(key, value) else {
                    tracing::warn!(
                        key = %key,
                        value = %value,
                        "config value cannot be written in this format, line left as is",
                    );
                    continue;
                };
                Some(line)
            } else {
                tracing::debug!(key = %key, "config value will be removed");
                None
            };

            let mut found = false;
            let mut patched = Vec::with_capacity(lines.len() + 1);
            for line in lines {
                if !line_defines(&line, key, self.format.delimiter) {
                    patched.push(line);
                    continue;
                }
                if !found {
                    found = true;
                    if let Some(rendered) = &rendered {
                        patched.push(rendered.clone());
                    }
                }
            }
            if let (false, Some(rendered)) = (found, rendered) {
                patched.push(rendered);
            }
            lines = patched;
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    fn render_line(&self, key: &str, value: &ValueSet<Value>) -> Option<String> {
        let key = if is_bare_key(key) {
            key.to_owned()
        } else if key.is_empty() || key.contains(['"', '\n', '\r', self.format.delimiter]) {
            return None;
        } else {
            format!("\"{key}\"")
        };
        let values = value
            .iter()
            .map(|v| self.format.encode(v))
            .collect::<Option<Vec<String>>>()?;
        let line = format!("{key}{}{}", self.format.delimiter, values.join(", "));
        tracing::debug!(line = %line, "config value to save");
        Some(line)
    }
}

fn parse_key(raw: &str) -> Option<&str> {
    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return (!inner.is_empty() && !inner.contains('"')).then_some(inner);
    }
    is_bare_key(raw).then_some(raw)
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// `true` when `line` assigns `key` (optionally quoted) with `delimiter`.
fn line_defines(line: &str, key: &str, delimiter: char) -> bool {
    let rest = line.trim_start();
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    let Some(rest) = rest.strip_prefix(key) else {
        return false;
    };
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    rest.trim_start_matches([' ', '\t']).starts_with(delimiter)
}

/// Write flow: `<file>.tmp` sibling, then `rename` over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}
