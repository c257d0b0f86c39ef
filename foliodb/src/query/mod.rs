// Query pipeline: an explicit cursor over one table's records.
//
// `filter` always re-reads the full table from storage; every materializing
// call (`records`, `count`, `has_records`, `group_by`, `update_all`,
// `delete_all`) consumes and clears the cursor state.

use crate::error::{FolioDbError, Result};
use crate::record::ID_KEY;
use crate::schema::TableStructure;
use crate::store::Table;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Comparison operators accepted by `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Like,
    In,
}

impl Operator {
    pub fn parse(op: &str) -> Result<Operator> {
        match op {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            _ if op.eq_ignore_ascii_case("like") => Ok(Operator::Like),
            _ if op.eq_ignore_ascii_case("in") => Ok(Operator::In),
            _ => Err(FolioDbError::UnsupportedOperator(op.to_string())),
        }
    }
}

/// One `(field, operator, value)` filter condition.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Criterion {
    /// Parse the operator eagerly; an unknown one fails here, before any
    /// scan can start.
    pub fn new(field: &str, op: &str, value: Value) -> Result<Criterion> {
        Ok(Criterion {
            field: field.to_string(),
            op: Operator::parse(op)?,
            value,
        })
    }

    fn validate(&self, structure: &TableStructure) -> Result<()> {
        if self.field != ID_KEY && !structure.contains_field(&self.field) {
            return Err(FolioDbError::InvalidCriterion(format!(
                "field '{}' is not declared in the table structure",
                self.field
            )));
        }
        match self.op {
            Operator::In if !self.value.is_array() => Err(FolioDbError::InvalidCriterion(
                format!("IN requires an array operand for field '{}'", self.field),
            )),
            Operator::Like if !self.value.is_string() => Err(FolioDbError::InvalidCriterion(
                format!("LIKE requires a string operand for field '{}'", self.field),
            )),
            _ => Ok(()),
        }
    }

    fn matches(&self, record: &Map<String, Value>) -> bool {
        // A record lacking the field is excluded, never an error.
        let Some(actual) = record.get(&self.field) else {
            return false;
        };
        match self.op {
            Operator::Eq => cmp_values(actual, &self.value)
                .map(|o| o == Ordering::Equal)
                .unwrap_or(false),
            Operator::Ne => cmp_values(actual, &self.value)
                .map(|o| o != Ordering::Equal)
                .unwrap_or(false),
            Operator::Ge => cmp_values(actual, &self.value)
                .map(Ordering::is_ge)
                .unwrap_or(false),
            Operator::Le => cmp_values(actual, &self.value)
                .map(Ordering::is_le)
                .unwrap_or(false),
            Operator::Like => match (actual, &self.value) {
                (Value::String(haystack), Value::String(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
            Operator::In => self
                .value
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .any(|v| cmp_values(actual, v) == Some(Ordering::Equal))
                })
                .unwrap_or(false),
        }
    }
}

/// Typed comparison: numbers as f64, strings lexicographically, booleans.
/// Any other pairing is incomparable and never matches; there is no
/// cross-type coercion.
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct SortKey {
    field: String,
    direction: Direction,
}

/// `"age"`, `"age DESC"`, `"age ASC"` -- anything else is a plain field name.
fn parse_sort_key(spec: &str) -> SortKey {
    let trimmed = spec.trim();
    if let Some((field, marker)) = trimmed.rsplit_once(char::is_whitespace) {
        if marker.eq_ignore_ascii_case("desc") {
            return SortKey {
                field: field.trim_end().to_string(),
                direction: Direction::Descending,
            };
        }
        if marker.eq_ignore_ascii_case("asc") {
            return SortKey {
                field: field.trim_end().to_string(),
                direction: Direction::Ascending,
            };
        }
    }
    SortKey {
        field: trimmed.to_string(),
        direction: Direction::Ascending,
    }
}

/// Sort comparison for one key: both numeric compares numerically, anything
/// else compares the operands' string forms. A side missing the key treats
/// the key as equal so the next key decides.
fn order_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => display_string(x).cmp(&display_string(y)),
        _ => Ordering::Equal,
    }
}

/// The string form of a value, used for sort fallbacks and group keys.
fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Aggregation functions for `group_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn name(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }

    /// The output key for an aggregate over a field, e.g. `sum_amount`.
    fn key(&self, field: &str) -> String {
        format!("{}_{}", self.name(), field)
    }
}

/// One group emitted by `group_by`: the grouping key, the member records,
/// an optional member count, and the computed aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordGroup {
    pub key: String,
    pub records: Vec<Map<String, Value>>,
    pub count: Option<usize>,
    pub aggregates: Map<String, Value>,
}

/// Transient pipeline state for one selection cycle.
#[derive(Debug)]
pub struct Query<'a> {
    table: &'a Table,
    records: Vec<Map<String, Value>>,
    selected_fields: Option<Vec<String>>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Query {
            table,
            records: Vec::new(),
            selected_fields: None,
        }
    }

    /// Load the entire table fresh from storage, keeping records that match
    /// every criterion. Criteria are validated before the scan starts, so a
    /// bad field or operand never leaves a partially-applied filter.
    pub fn filter(&mut self, criteria: &[Criterion]) -> Result<&mut Self> {
        let structure = self.table.control_document()?.structure;
        for criterion in criteria {
            criterion.validate(&structure)?;
        }

        let all = self.table.scan()?;
        self.records = all
            .into_iter()
            .filter(|record| criteria.iter().all(|c| c.matches(record)))
            .collect();
        Ok(self)
    }

    /// Record the fields the eventual materialization should project.
    /// `"*"` or an empty list keeps all fields.
    pub fn select(&mut self, fields: &[&str]) -> Result<&mut Self> {
        if fields.is_empty() || fields.contains(&"*") {
            self.selected_fields = None;
            return Ok(self);
        }

        let structure = self.table.control_document()?.structure;
        for field in fields {
            if *field != ID_KEY && !structure.contains_field(field) {
                return Err(FolioDbError::UnknownField(field.to_string()));
            }
        }

        self.selected_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        Ok(self)
    }

    /// Stable multi-key sort. Each spec is a field name optionally suffixed
    /// with `DESC` (or an explicit `ASC`). Ties after all keys keep input
    /// order.
    pub fn order_by(&mut self, specs: &[&str]) -> &mut Self {
        let keys: Vec<SortKey> = specs.iter().map(|s| parse_sort_key(s)).collect();
        self.records.sort_by(|a, b| {
            for key in &keys {
                let mut ord = order_cmp(a.get(&key.field), b.get(&key.field));
                if key.direction == Direction::Descending {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        self
    }

    /// Slice the current sequence starting at `offset`, up to `count`
    /// entries.
    pub fn limit(&mut self, count: usize, offset: usize) -> &mut Self {
        let records = std::mem::take(&mut self.records);
        self.records = records.into_iter().skip(offset).take(count).collect();
        self
    }

    /// Partition the current records by the string form of `field`. Records
    /// lacking the field are dropped from every group; groups are emitted in
    /// first-encounter order. Consumes the pipeline state; materialize via
    /// the returned groups, not `records()`.
    pub fn group_by(
        &mut self,
        field: &str,
        with_count: bool,
        aggregates: &[(&str, Aggregate)],
    ) -> Result<Vec<RecordGroup>> {
        let records = std::mem::take(&mut self.records);
        self.selected_fields = None;

        let mut groups: Vec<RecordGroup> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for record in records {
            let Some(value) = record.get(field) else {
                continue;
            };
            let key = display_string(value);
            let idx = match by_key.get(&key) {
                Some(&idx) => idx,
                None => {
                    groups.push(RecordGroup {
                        key: key.clone(),
                        records: Vec::new(),
                        count: None,
                        aggregates: Map::new(),
                    });
                    by_key.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[idx].records.push(record);
        }

        for group in &mut groups {
            if with_count {
                group.count = Some(group.records.len());
            }
            for (agg_field, func) in aggregates {
                // non-numeric and absent values are skipped, not zeroed
                let numbers: Vec<f64> = group
                    .records
                    .iter()
                    .filter_map(|r| r.get(*agg_field).and_then(Value::as_f64))
                    .collect();
                let computed = match func {
                    Aggregate::Sum => Some(numbers.iter().sum()),
                    Aggregate::Avg => Some(if numbers.is_empty() {
                        0.0
                    } else {
                        numbers.iter().sum::<f64>() / numbers.len() as f64
                    }),
                    Aggregate::Min => numbers.iter().copied().reduce(f64::min),
                    Aggregate::Max => numbers.iter().copied().reduce(f64::max),
                };
                let value = computed
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                group.aggregates.insert(func.key(agg_field), value);
            }
        }

        Ok(groups)
    }

    /// Apply the pending projection (always including `id`), return the
    /// records, and clear all pipeline state. A second call without an
    /// intervening `filter` returns empty.
    pub fn records(&mut self) -> Vec<Map<String, Value>> {
        let records = std::mem::take(&mut self.records);
        match self.selected_fields.take() {
            None => records,
            Some(fields) => records
                .into_iter()
                .map(|record| project(record, &fields))
                .collect(),
        }
    }

    /// Terminal-and-clear, returning the record count.
    pub fn count(&mut self) -> usize {
        let count = self.records.len();
        self.clear();
        count
    }

    /// Terminal-and-clear, returning whether any record passed.
    pub fn has_records(&mut self) -> bool {
        let found = !self.records.is_empty();
        self.clear();
        found
    }

    /// Apply `update_by_id` to every pipeline record. Only the last
    /// application's outcome is reported; an error stops the batch with
    /// prior updates already committed. Clears pipeline state.
    pub fn update_all(&mut self, data: &Map<String, Value>) -> Result<bool> {
        let records = std::mem::take(&mut self.records);
        self.selected_fields = None;

        let mut last = false;
        for record in &records {
            let Some(id) = record.get(ID_KEY).and_then(Value::as_str) else {
                continue;
            };
            self.table.update_by_id(id, data)?;
            last = true;
        }
        Ok(last)
    }

    /// Apply `delete_by_id` to every pipeline record, same last-result-only
    /// contract as `update_all`. Clears pipeline state.
    pub fn delete_all(&mut self) -> Result<bool> {
        let records = std::mem::take(&mut self.records);
        self.selected_fields = None;

        let mut last = false;
        for record in &records {
            let Some(id) = record.get(ID_KEY).and_then(Value::as_str) else {
                continue;
            };
            last = self.table.delete_by_id(id)?;
        }
        Ok(last)
    }

    fn clear(&mut self) {
        self.records.clear();
        self.selected_fields = None;
    }
}

fn project(record: Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(id) = record.get(ID_KEY) {
        out.insert(ID_KEY.to_string(), id.clone());
    }
    for field in fields {
        if field == ID_KEY {
            continue;
        }
        if let Some(value) = record.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    out
}
