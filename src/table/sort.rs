//! Column sorting for the policy table
//!
//! Values are coerced before comparison:
//! - null or missing values become the empty string and sort lowest
//! - `createdDateTime` / `modifiedDateTime` become millisecond timestamps,
//!   with missing or unparseable values at epoch 0
//! - strings compare case-insensitively, other values by their natural order

use crate::model::PolicyItem;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;

/// Attributes compared as points in time
pub const DATE_COLUMNS: [&str; 2] = ["createdDateTime", "modifiedDateTime"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Active sort column and direction; no column means source order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn by(column: &str, direction: SortDirection) -> Self {
        Self {
            column: Some(column.to_string()),
            direction,
        }
    }

    /// Same column flips direction, a new column starts ascending
    pub fn toggle(&mut self, column: &str) {
        if self.column.as_deref() == Some(column) {
            self.direction = self.direction.flip();
        } else {
            self.column = Some(column.to_string());
            self.direction = SortDirection::Ascending;
        }
    }
}

/// Comparable form of one attribute value
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Empty,
    Bool(bool),
    Number(f64),
    Timestamp(i64),
    Text(String),
    Other(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Empty => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Timestamp(_) => 3,
            SortKey::Text(_) => 4,
            SortKey::Other(_) => 5,
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Timestamp(a), SortKey::Timestamp(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Other(a), SortKey::Other(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_key(item: &PolicyItem, column: &str) -> SortKey {
    let value = if column == "id" {
        Some(Value::String(item.id.clone()))
    } else {
        item.attribute(column).cloned()
    };

    if DATE_COLUMNS.contains(&column) {
        return SortKey::Timestamp(value.as_ref().map(timestamp_millis).unwrap_or(0));
    }

    match value {
        None | Some(Value::Null) => SortKey::Empty,
        Some(Value::String(s)) if s.is_empty() => SortKey::Empty,
        Some(Value::String(s)) => SortKey::Text(s.to_lowercase()),
        Some(Value::Bool(b)) => SortKey::Bool(b),
        Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
        Some(other) => SortKey::Other(other.to_string().to_lowercase()),
    }
}

/// Milliseconds since the epoch; empty or unparseable values give 0
fn timestamp_millis(value: &Value) -> i64 {
    match value {
        Value::String(s) => parse_timestamp(s).unwrap_or(0),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc().timestamp_millis())
}

/// Three-way comparison of two items on `column`
pub fn compare_items(
    a: &PolicyItem,
    b: &PolicyItem,
    column: &str,
    direction: SortDirection,
) -> Ordering {
    let ordering = sort_key(a, column).compare(&sort_key(b, column));
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Items ordered by `sort`; the input slice is left untouched
///
/// The sort is stable, so equal items keep their source order.
pub fn sort_items<'a>(items: &'a [PolicyItem], sort: &SortState) -> Vec<&'a PolicyItem> {
    let Some(column) = sort.column.as_deref() else {
        return items.iter().collect();
    };

    let mut keyed: Vec<(SortKey, &PolicyItem)> = items
        .iter()
        .map(|item| (sort_key(item, column), item))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = a.compare(b);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    keyed.into_iter().map(|(_, item)| item).collect()
}
