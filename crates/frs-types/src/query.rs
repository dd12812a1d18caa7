//! Query parameters: paging, sorting, filter, and revision selection.
//!
//! Paging, sorting, and filter arrive as JSON expression strings. The service
//! layer forwards them verbatim; repositories parse them with the types here.
//! A blank or absent expression always means "no constraint".

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

fn non_blank(expression: Option<&str>) -> Option<&str> {
    expression.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// A skip/max window over an ordered sequence.
///
/// Expression form: `{"skip": 10, "max": 5}`. Both members are optional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl Paging {
    pub fn new(skip: Option<usize>, max: Option<usize>) -> Self {
        Self { skip, max }
    }

    /// Parse a paging expression. Blank or absent yields `None`.
    pub fn parse(expression: Option<&str>) -> Result<Option<Self>, TypeError> {
        let Some(text) = non_blank(expression) else {
            return Ok(None);
        };
        serde_json::from_str(text)
            .map(Some)
            .map_err(|e| TypeError::expression("paging", e.to_string()))
    }

    /// Number of leading items to skip (0 when unset).
    pub fn offset(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    /// Apply the window to an already ordered sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let rest = items.into_iter().skip(self.offset());
        match self.max {
            Some(max) => rest.take(max).collect(),
            None => rest.collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One ordering criterion: a dotted property path and a direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortKey {
    pub property: String,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SortingExpr {
    One(SortKey),
    Many(Vec<SortKey>),
}

/// Ordering over JSON documents.
///
/// Expression form: `{"property": "name", "sort": "desc"}` or an array of
/// such objects; later entries break ties left by earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sorting {
    keys: Vec<SortKey>,
}

impl Sorting {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn parse(expression: Option<&str>) -> Result<Option<Self>, TypeError> {
        let Some(text) = non_blank(expression) else {
            return Ok(None);
        };
        let keys = match serde_json::from_str::<SortingExpr>(text)
            .map_err(|e| TypeError::expression("sorting", e.to_string()))?
        {
            SortingExpr::One(key) => vec![key],
            SortingExpr::Many(keys) => keys,
        };
        Ok(Some(Self { keys }))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Compare two documents by every sort key in turn.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for key in &self.keys {
            let ord = compare_values(lookup(a, &key.property), lookup(b, &key.property));
            let ord = match key.sort {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Comparison operator of a filter clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$ge" => Self::Ge,
            "$lt" => Self::Lt,
            "$le" => Self::Le,
            "$contains" => Self::Contains,
            _ => return None,
        })
    }

    fn test(self, actual: Option<&Value>, expected: &Value) -> bool {
        match self {
            Self::Eq => values_equal(actual, expected),
            Self::Ne => !values_equal(actual, expected),
            Self::Gt => partial_compare(actual, expected) == Some(Ordering::Greater),
            Self::Ge => matches!(
                partial_compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt => partial_compare(actual, expected) == Some(Ordering::Less),
            Self::Le => matches!(
                partial_compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Contains => match (actual, expected) {
                (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => {
                    items.iter().any(|item| values_equal(Some(item), needle))
                }
                _ => false,
            },
        }
    }
}

/// Predicate over JSON documents.
///
/// Expression form: a JSON object whose members are either
/// `"path": value` (equality), `"path": {"$op": value, ...}`, or one of the
/// combinators `"$and": [..]`, `"$or": [..]`, `"$not": {..}`. Members of one
/// object are combined with AND.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Compare {
        path: String,
        op: Comparison,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Parse a filter expression. Blank or absent yields [`Filter::All`].
    pub fn parse(expression: Option<&str>) -> Result<Self, TypeError> {
        let Some(text) = non_blank(expression) else {
            return Ok(Self::All);
        };
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TypeError::expression("filter", e.to_string()))?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self, TypeError> {
        let Value::Object(members) = value else {
            return Err(TypeError::expression("filter", "expected a JSON object"));
        };
        let mut clauses = Vec::with_capacity(members.len());
        for (name, operand) in members {
            match name.as_str() {
                "$and" => clauses.push(Self::And(Self::from_array(operand)?)),
                "$or" => clauses.push(Self::Or(Self::from_array(operand)?)),
                "$not" => clauses.push(Self::Not(Box::new(Self::from_value(operand)?))),
                op if op.starts_with('$') => {
                    return Err(TypeError::expression(
                        "filter",
                        format!("unknown combinator {op:?}"),
                    ));
                }
                path => clauses.extend(Self::field(path, operand)?),
            }
        }
        Ok(match clauses.len() {
            0 => Self::All,
            1 => clauses.remove(0),
            _ => Self::And(clauses),
        })
    }

    fn from_array(operand: &Value) -> Result<Vec<Self>, TypeError> {
        let Value::Array(items) = operand else {
            return Err(TypeError::expression("filter", "combinator expects an array"));
        };
        items.iter().map(Self::from_value).collect()
    }

    fn field(path: &str, operand: &Value) -> Result<Vec<Self>, TypeError> {
        match operand {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops
                .iter()
                .map(|(op, value)| {
                    let op = Comparison::from_operator(op).ok_or_else(|| {
                        TypeError::expression("filter", format!("unknown operator {op:?}"))
                    })?;
                    Ok(Self::Compare {
                        path: path.to_string(),
                        op,
                        value: value.clone(),
                    })
                })
                .collect(),
            _ => Ok(vec![Self::Compare {
                path: path.to_string(),
                op: Comparison::Eq,
                value: operand.clone(),
            }]),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Compare { path, op, value } => op.test(lookup(document, path), value),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(document)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(document)),
            Self::Not(inner) => !inner.matches(document),
        }
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// Commit selector for read operations.
///
/// `commit` names an explicit commit; `at` selects the last commit made at or
/// before the timestamp. `commit` wins when both are set. Neither set means
/// the live state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl Revision {
    /// Build a selector; a blank commit is treated as absent.
    pub fn new(commit: Option<String>, at: Option<DateTime<Utc>>) -> Self {
        Self {
            commit: commit.filter(|c| !c.trim().is_empty()),
            at,
        }
    }

    pub fn live() -> Self {
        Self::default()
    }

    pub fn at_commit(commit: impl Into<String>) -> Self {
        Self::new(Some(commit.into()), None)
    }

    pub fn at_time(at: DateTime<Utc>) -> Self {
        Self::new(None, Some(at))
    }

    /// Build from wire values, where `at` is milliseconds since the epoch.
    pub fn from_millis(commit: Option<String>, at_ms: Option<i64>) -> Result<Self, TypeError> {
        let at = at_ms
            .map(|ms| {
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or(TypeError::InvalidTimestamp(ms))
            })
            .transpose()?;
        Ok(Self::new(commit, at))
    }

    pub fn is_live(&self) -> bool {
        self.commit.is_none() && self.at.is_none()
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Resolve a dotted path (`"owner.name"`, `"tags.0"`) inside a document.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
    }
}

fn partial_compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over optional JSON values; missing and null sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ if type_rank(a) != type_rank(b) => type_rank(a).cmp(&type_rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
