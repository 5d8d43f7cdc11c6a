//! Policy table view-model
//!
//! Holds the loaded policies, the checked ids and the sort state, and
//! produces the sorted rows a renderer draws. Nothing here performs IO.

pub mod selection;
pub mod sort;

pub use selection::SelectionSet;
pub use sort::{compare_items, sort_items, SortDirection, SortState};

use crate::model::{PolicyItem, STATE_DISABLED, STATE_ENABLED, STATE_REPORT_ONLY};
use chrono::{DateTime, Local};

/// Colour class of a policy's state badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBadge {
    Success,
    Warning,
    Secondary,
}

impl StateBadge {
    pub fn for_state(state: &str) -> Self {
        match state {
            STATE_ENABLED => StateBadge::Success,
            STATE_REPORT_ONLY => StateBadge::Warning,
            _ => StateBadge::Secondary,
        }
    }
}

/// One render-ready table row
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRow {
    pub id: String,
    pub display_name: String,
    pub state: String,
    pub state_badge: StateBadge,
    pub created: String,
    pub modified: String,
    pub selected: bool,
}

impl PolicyRow {
    /// Short state label for narrow columns
    pub fn state_label(&self) -> &str {
        match self.state.as_str() {
            STATE_REPORT_ONLY => "report-only",
            other => other,
        }
    }
}

/// Policy counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub enabled: usize,
    pub report_only: usize,
    pub disabled: usize,
}

#[derive(Debug, Default)]
pub struct TableViewModel {
    items: Vec<PolicyItem>,
    selection: SelectionSet<String>,
    sort: SortState,
}

impl TableViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the backing collection
    ///
    /// Selected ids that still exist stay selected; the rest are pruned.
    pub fn set_items(&mut self, items: Vec<PolicyItem>) {
        self.items = items;
        let items = &self.items;
        self.selection
            .retain(|id| items.iter().any(|item| &item.id == id));
    }

    pub fn items(&self) -> &[PolicyItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&PolicyItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Flip selection of `id`; returns whether it is selected afterwards
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        self.selection.toggle(id.to_string())
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(&id.to_string())
    }

    pub fn select_all(&mut self) {
        self.selection
            .replace(self.items.iter().map(|item| item.id.clone()));
    }

    pub fn clear_all(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &SelectionSet<String> {
        &self.selection
    }

    /// Selected ids in the order they were checked
    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.iter().cloned().collect()
    }

    pub fn set_sort(&mut self, column: &str) {
        self.sort.toggle(column);
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Items in display order
    pub fn project(&self) -> Vec<&PolicyItem> {
        sort_items(&self.items, &self.sort)
    }

    pub fn rows(&self) -> Vec<PolicyRow> {
        self.project()
            .into_iter()
            .map(|item| {
                let state = item.state().unwrap_or("Unknown").to_string();
                PolicyRow {
                    id: item.id.clone(),
                    display_name: item.display_name().unwrap_or("Unnamed Policy").to_string(),
                    state_badge: StateBadge::for_state(&state),
                    state,
                    created: format_date(item.created_date_time()),
                    modified: format_date(item.modified_date_time()),
                    selected: self.selection.contains(&item.id),
                }
            })
            .collect()
    }

    /// Header marker for `column`
    pub fn sort_indicator(&self, column: &str) -> &'static str {
        match (&self.sort.column, self.sort.direction) {
            (Some(active), SortDirection::Ascending) if active == column => "▲",
            (Some(active), SortDirection::Descending) if active == column => "▼",
            _ => "⇅",
        }
    }

    /// "N policies selected", or None when nothing is selected
    pub fn selection_label(&self) -> Option<String> {
        match self.selection.len() {
            0 => None,
            1 => Some("1 policy selected".to_string()),
            n => Some(format!("{} policies selected", n)),
        }
    }

    /// Display name for log lines, falling back to a shortened id
    pub fn label_for(&self, id: &str) -> String {
        self.get(id)
            .and_then(|item| item.display_name())
            .map(str::to_string)
            .unwrap_or_else(|| id.chars().take(8).collect())
    }

    pub fn state_counts(&self) -> StateCounts {
        self.items
            .iter()
            .fold(StateCounts::default(), |mut counts, item| {
                match item.state() {
                    Some(STATE_ENABLED) => counts.enabled += 1,
                    Some(STATE_REPORT_ONLY) => counts.report_only += 1,
                    Some(STATE_DISABLED) => counts.disabled += 1,
                    _ => {}
                }
                counts
            })
    }
}

/// Local date and time, "N/A" when missing, raw text when unparseable
fn format_date(value: Option<&str>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}
