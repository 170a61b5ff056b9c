//! Record builder
//!
//! Turns one flat row into one nested JSON object. For every kept column:
//!
//! ```text
//! row[originalKey] → rule substitution → type conversion → write at targetPath
//! ```
//!
//! then custom keys are written on top. Writes walk the target path and
//! create objects on demand; a scalar or array sitting where an object is
//! needed is replaced by an empty object, so the last structural write wins.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::convert::convert_value;
use super::path::{resolve, TargetPath};
use super::rules::TransformRule;
use crate::models::{ColumnMapping, CustomKey, Row, Scalar};

/// A nested output record.
pub type OutputTree = Map<String, Value>;

/// A kept column with its path and rule parsed.
#[derive(Debug, Clone)]
struct CompiledColumn<'a> {
    mapping: &'a ColumnMapping,
    target: TargetPath,
    rule: Option<TransformRule>,
}

/// Builds output records for a fixed set of mappings and custom keys.
///
/// Paths and rules are parsed once in [`RecordBuilder::new`]; [`RecordBuilder::build`]
/// can then be called for every row of a batch.
#[derive(Debug, Clone)]
pub struct RecordBuilder<'a> {
    columns: Vec<CompiledColumn<'a>>,
    custom_keys: &'a [CustomKey],
    skip_empty: bool,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(mappings: &'a [ColumnMapping], custom_keys: &'a [CustomKey], skip_empty: bool) -> Self {
        let columns = mappings
            .iter()
            .filter(|m| m.is_active())
            .filter_map(|mapping| {
                let target = resolve(&mapping.target_path)?;
                Some(CompiledColumn {
                    mapping,
                    target,
                    rule: mapping.rule().map(TransformRule::parse),
                })
            })
            .collect();

        Self {
            columns,
            custom_keys,
            skip_empty,
        }
    }

    /// Number of columns that can write into a record.
    pub fn writable_columns(&self) -> usize {
        self.columns.len()
    }

    /// Build the output record for one row.
    pub fn build(&self, row: &Row) -> OutputTree {
        let mut tree = OutputTree::new();
        let mut arrays = ArrayAccumulator::default();

        for column in &self.columns {
            let raw = row
                .get(&column.mapping.original_key)
                .cloned()
                .unwrap_or(Scalar::Null);

            let raw = match &column.rule {
                Some(rule) if !raw.is_null() => rule.apply(&raw),
                _ => raw,
            };

            let value = convert_value(&raw, column.mapping.data_type);
            if value.is_null() && self.skip_empty {
                continue;
            }

            match &column.target {
                TargetPath::Scalar { segments } => write_nested(&mut tree, segments, value.to_json()),
                TargetPath::Array {
                    prefix, root, inner, ..
                } => arrays.write(&mut tree, prefix, root, inner, value.to_json()),
            }
        }

        for custom in self.custom_keys {
            let Some(raw) = custom.value.as_deref() else {
                continue;
            };
            if custom.key.is_empty() {
                continue;
            }
            let value = convert_value(&Scalar::from(raw), custom.value_type.into());
            let segments: Vec<String> = custom.key.split('.').map(str::to_string).collect();
            write_nested(&mut tree, &segments, value.to_json());
        }

        tree
    }
}

/// Build one row's output record without keeping the compiled builder.
pub fn build_record(
    row: &Row,
    mappings: &[ColumnMapping],
    custom_keys: &[CustomKey],
    skip_empty: bool,
) -> OutputTree {
    RecordBuilder::new(mappings, custom_keys, skip_empty).build(row)
}

/// The element each array root received in the current row.
///
/// Keyed by the root name alone, holding where that element lives. A second
/// location using the same root name gets an empty array and its values go
/// into the element already made for that root.
#[derive(Debug, Default)]
struct ArrayAccumulator {
    elements: HashMap<String, (Vec<String>, usize)>,
}

impl ArrayAccumulator {
    fn write(&mut self, tree: &mut OutputTree, prefix: &[String], root: &str, inner: &[String], value: Value) {
        let parent = descend(tree, prefix);
        let slot = parent
            .entry(root.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        ensure_array(slot);

        if let Some((at, index)) = self.elements.get(root).cloned() {
            if let Some(element) = element_at(tree, &at, root, index) {
                write_nested(element, inner, value);
                return;
            }
        }

        // First write to this root, or its element was replaced since.
        let items = ensure_array(
            descend(tree, prefix)
                .entry(root.to_string())
                .or_insert_with(|| Value::Array(Vec::new())),
        );
        items.push(Value::Object(Map::new()));
        let index = items.len() - 1;
        self.elements.insert(root.to_string(), (prefix.to_vec(), index));

        let element = ensure_object(&mut items[index]);
        write_nested(element, inner, value);
    }
}

/// The object at `prefix.root[index]`, without creating anything.
fn element_at<'t>(
    mut node: &'t mut OutputTree,
    prefix: &[String],
    root: &str,
    index: usize,
) -> Option<&'t mut OutputTree> {
    for segment in prefix {
        node = node.get_mut(segment)?.as_object_mut()?;
    }
    node.get_mut(root)?.as_array_mut()?.get_mut(index)?.as_object_mut()
}

/// Assign `value` at `segments` below `node`, creating objects on the way.
fn write_nested(node: &mut OutputTree, segments: &[String], value: Value) {
    let Some((leaf, nesting)) = segments.split_last() else {
        return;
    };
    descend(node, nesting).insert(leaf.clone(), value);
}

/// Walk `segments` from `node`, replacing anything that is not an object.
fn descend<'t>(mut node: &'t mut OutputTree, segments: &[String]) -> &'t mut OutputTree {
    for segment in segments {
        let slot = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        node = ensure_object(slot);
    }
    node
}

fn ensure_object(slot: &mut Value) -> &mut OutputTree {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

fn ensure_array(slot: &mut Value) -> &mut Vec<Value> {
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just set to an array"),
    }
}
