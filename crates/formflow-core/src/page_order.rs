use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::spec::form::Page;

/// Position of a page in the stored `pages` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RawIndex(pub usize);

/// Position of a page in the logical flow a user experiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LogicalIndex(pub usize);

impl fmt::Display for RawIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for LogicalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalPage {
    pub page_id: String,
    pub logical_index: LogicalIndex,
    pub raw_index: RawIndex,
}

/// Canonical page sequence, independent of storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalPageOrder {
    entries: Vec<LogicalPage>,
    by_id: BTreeMap<String, LogicalIndex>,
    by_raw: BTreeMap<RawIndex, LogicalIndex>,
}

/// Computes the logical order of `pages`.
///
/// The walk starts at the first page (in storage order) that no other page
/// links to and follows `nextPage`, or the first resolvable branch target when
/// a page has no `nextPage`. The chain stops at a missing target or at a page
/// already visited, which makes cyclic links terminate with the revisited page
/// left where it first appeared. Pages the chain never reached are appended in
/// storage order.
pub fn compute_logical_order(pages: &[Page]) -> LogicalPageOrder {
    let positions: BTreeMap<&str, usize> = pages
        .iter()
        .enumerate()
        .map(|(position, page)| (page.id.as_str(), position))
        .collect();

    let mut referenced = BTreeSet::new();
    for page in pages {
        for target in page.link_targets() {
            if target != page.id {
                referenced.insert(target);
            }
        }
    }

    let root = pages
        .iter()
        .position(|page| !referenced.contains(page.id.as_str()))
        .unwrap_or(0);

    let mut visited = vec![false; pages.len()];
    let mut sequence = Vec::with_capacity(pages.len());
    let mut cursor = if pages.is_empty() { None } else { Some(root) };

    while let Some(position) = cursor {
        if visited[position] {
            break;
        }
        visited[position] = true;
        sequence.push(position);
        cursor = static_successor(&pages[position], &positions);
    }

    for (position, seen) in visited.iter().enumerate() {
        if !seen {
            sequence.push(position);
        }
    }

    LogicalPageOrder::from_positions(pages, &sequence)
}

fn static_successor(page: &Page, positions: &BTreeMap<&str, usize>) -> Option<usize> {
    if let Some(next) = page.next_page.as_deref() {
        return positions.get(next).copied();
    }
    page.branches
        .iter()
        .find_map(|branch| positions.get(branch.next_page.as_str()).copied())
}

impl LogicalPageOrder {
    fn from_positions(pages: &[Page], sequence: &[usize]) -> Self {
        let mut order = Self::default();
        for (logical, &raw) in sequence.iter().enumerate() {
            let entry = LogicalPage {
                page_id: pages[raw].id.clone(),
                logical_index: LogicalIndex(logical),
                raw_index: RawIndex(raw),
            };
            order
                .by_id
                .insert(entry.page_id.clone(), entry.logical_index);
            order.by_raw.insert(entry.raw_index, entry.logical_index);
            order.entries.push(entry);
        }
        order
    }

    pub fn entries(&self) -> &[LogicalPage] {
        &self.entries
    }

    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    pub fn logical_index(&self, page_id: &str) -> Option<LogicalIndex> {
        self.by_id.get(page_id).copied()
    }

    pub fn is_first(&self, page_id: &str) -> bool {
        self.logical_index(page_id) == Some(LogicalIndex(0))
    }

    pub fn is_last(&self, page_id: &str) -> bool {
        match self.logical_index(page_id) {
            Some(LogicalIndex(index)) => index + 1 == self.entries.len(),
            None => false,
        }
    }

    pub fn page_id_at(&self, index: LogicalIndex) -> Option<&str> {
        self.entries
            .get(index.0)
            .map(|entry| entry.page_id.as_str())
    }

    pub fn to_raw(&self, index: LogicalIndex) -> Option<RawIndex> {
        self.entries.get(index.0).map(|entry| entry.raw_index)
    }

    pub fn to_logical(&self, raw: RawIndex) -> Option<LogicalIndex> {
        self.by_raw.get(&raw).copied()
    }

    /// Raw index of the page that starts the flow.
    pub fn first_raw(&self) -> Option<RawIndex> {
        self.to_raw(LogicalIndex(0))
    }

    pub fn next_raw(&self, raw: RawIndex) -> Option<RawIndex> {
        let LogicalIndex(current) = self.to_logical(raw)?;
        self.to_raw(LogicalIndex(current + 1))
    }

    pub fn previous_raw(&self, raw: RawIndex) -> Option<RawIndex> {
        let LogicalIndex(current) = self.to_logical(raw)?;
        let previous = current.checked_sub(1)?;
        self.to_raw(LogicalIndex(previous))
    }
}
