use crate::error::{Result, TreeError};
use crate::signal::ResponseStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Stable handle into an [`EpochStore`].
///
/// Handles alias the stored record: a flag changed through a handle is what
/// every later tree query observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpochId(pub(crate) usize);

impl EpochId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn default_selected() -> bool {
    true
}

/// One recorded trial: an attribute bag, a selection flag and its responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    #[serde(default = "empty_object")]
    pub attributes: Value,
    #[serde(default = "default_selected")]
    pub is_selected: bool,
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseStream>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl EpochRecord {
    pub fn new(attributes: Value) -> Self {
        Self {
            attributes,
            is_selected: true,
            responses: BTreeMap::new(),
        }
    }

    pub fn with_response(mut self, name: impl Into<String>, stream: ResponseStream) -> Self {
        self.responses.insert(name.into(), stream);
        self
    }

    /// Resolve a dotted key path such as `cellInfo.type`.
    ///
    /// Numeric segments index into arrays. Absent keys and explicit nulls
    /// both resolve to `None`.
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.attributes, path)
    }

    pub fn response(&self, name: &str) -> Option<&ResponseStream> {
        self.responses.get(name)
    }
}

pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Write `value` at a dotted key path, creating intermediate objects.
pub fn insert_path(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = empty_object();
        }
        let map = match current {
            Value::Object(map) => map,
            _ => return,
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map.entry(segment.to_string()).or_insert_with(empty_object);
    }
}

/// Arena owning every epoch record. Tree nodes only hold [`EpochId`]s.
#[derive(Debug, Clone, Default)]
pub struct EpochStore {
    records: Vec<EpochRecord>,
}

impl EpochStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<EpochRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: EpochRecord) -> EpochId {
        self.records.push(record);
        EpochId(self.records.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: EpochId) -> Option<&EpochRecord> {
        self.records.get(id.0)
    }

    /// Handle for the record at `index`, if it exists.
    pub fn id_at(&self, index: usize) -> Option<EpochId> {
        (index < self.records.len()).then_some(EpochId(index))
    }

    pub fn ids(&self) -> impl Iterator<Item = EpochId> + '_ {
        (0..self.records.len()).map(EpochId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EpochId, &EpochRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, record)| (EpochId(idx), record))
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn is_selected(&self, id: EpochId) -> Result<bool> {
        self.get(id)
            .map(|record| record.is_selected)
            .ok_or(TreeError::UnknownEpoch(id.0))
    }

    pub fn selected_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_selected).count()
    }

    // Selection flags are only written through the selection controller.
    pub(crate) fn set_selected(&mut self, id: EpochId, value: bool) -> Result<()> {
        let record = self
            .records
            .get_mut(id.0)
            .ok_or(TreeError::UnknownEpoch(id.0))?;
        record.is_selected = value;
        Ok(())
    }
}
