//! Filtered, row-addressable views over an [`Analysis`].
//!
//! Each query walks one side of the analysis, applies a [`FilterQuery`] and
//! returns a [`FilteredView`]: the passing entries plus a [`RowLayout`]
//! giving each entry's first display row, so a window of rows can be
//! rendered without touching the entries outside it.
use serde::Serialize;
use std::ops::Range;

use crate::graph::{Analysis, AssetId, BatchInclusion};
use crate::repository::ObjectType;
use crate::utils::prefs::InclusionFilter;

pub mod filter;
pub mod session;

pub use filter::{AssetKind, Candidate, FilterQuery, FilterState, GroupScan};
pub use session::Session;

/// Query trait implemented by all view queries.
///
/// Given an immutable reference to an `Analysis`, returns a result of type `R`.
pub trait Query<R> {
    fn run(&self, analysis: &Analysis) -> R;
}

/// Cumulative display-row offsets of a list of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLayout {
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl RowLayout {
    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut layout = Self::default();
        let mut row = 0;
        for c in counts {
            layout.starts.push(row);
            row += c;
            layout.ends.push(row);
        }
        layout
    }

    /// First display row of entry `i`.
    #[must_use]
    pub fn from(&self, i: usize) -> Option<usize> {
        self.starts.get(i).copied()
    }

    #[must_use]
    pub fn rows(&self, i: usize) -> usize {
        match (self.starts.get(i), self.ends.get(i)) {
            (Some(s), Some(e)) => e - s,
            _ => 0,
        }
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Entries overlapping the row window `[offset, offset + limit)`.
    #[must_use]
    pub fn page(&self, offset: usize, limit: Option<usize>) -> Range<usize> {
        let end = limit.map_or(usize::MAX, |l| offset.saturating_add(l));
        let first = self.ends.partition_point(|&e| e <= offset);
        let last = self.starts.partition_point(|&s| s < end);
        first..last.max(first)
    }
}

/// Passing entries with their row layout.
#[derive(Debug, Clone, Default)]
pub struct FilteredView<E> {
    pub entries: Vec<E>,
    pub layout: RowLayout,
}

impl<E> FilteredView<E> {
    /// Entries overlapping a row window; see [`RowLayout::page`].
    #[must_use]
    pub fn page(&self, offset: usize, limit: Option<usize>) -> &[E] {
        let r = self.layout.page(offset, limit);
        &self.entries[r.start.min(self.entries.len())..r.end.min(self.entries.len())]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One asset in the usages view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageEntry {
    pub asset: AssetId,
    pub included: bool,
}

/// Assets with their users, filtered by text, inclusion and scripts.
///
/// Rows per entry: `max(users, sub-assets)`.
pub struct AssetUsagesQuery<'f> {
    pub filter: &'f FilterQuery,
    pub inclusion: InclusionFilter,
    pub ignore_scripts: bool,
}

impl<'f> AssetUsagesQuery<'f> {
    #[must_use]
    pub fn new(filter: &'f FilterQuery) -> Self {
        Self { filter, inclusion: InclusionFilter::All, ignore_scripts: false }
    }

    #[must_use]
    pub fn inclusion(mut self, inclusion: InclusionFilter) -> Self {
        self.inclusion = inclusion;
        self
    }

    #[must_use]
    pub fn ignore_scripts(mut self, ignore: bool) -> Self {
        self.ignore_scripts = ignore;
        self
    }
}

impl Query<FilteredView<UsageEntry>> for AssetUsagesQuery<'_> {
    fn run(&self, analysis: &Analysis) -> FilteredView<UsageEntry> {
        let table = &analysis.assets;
        let usages = &analysis.usages;
        let mut inclusion = BatchInclusion::new(usages);
        let mut entries = Vec::new();
        for node in table.iter() {
            if self.ignore_scripts && node.concrete_type() == Some(&ObjectType::MonoScript) {
                continue;
            }
            let primary = usages.sub_assets(node.id).iter().any(|s| {
                let c = node.object(s.slot).map(|o| Candidate::new(node, o));
                self.filter.matches_primary(c.as_ref())
            });
            if !primary {
                continue;
            }
            let mut scan = self.filter.group_scan();
            for user in usages.usages(node.id).iter().filter_map(|u| table.get(*u)) {
                let c = user.main.as_ref().map(|m| Candidate::new(user, m));
                scan.observe(c.as_ref());
            }
            if !scan.is_satisfied() {
                continue;
            }
            let included = inclusion.is_included(node.id);
            let keep = match self.inclusion {
                InclusionFilter::All => true,
                InclusionFilter::IncludedOnly => included,
                InclusionFilter::ExcludedOnly => !included,
            };
            if keep {
                entries.push(UsageEntry { asset: node.id, included });
            }
        }
        let layout = RowLayout::from_counts(entries.iter().map(|e| {
            usages.usages(e.asset).len().max(usages.sub_assets(e.asset).len())
        }));
        FilteredView { entries, layout }
    }
}

/// Container roots with their outgoing references.
///
/// Rows per entry: one per property, at least one.
pub struct PrefabReferencesQuery<'f> {
    pub filter: &'f FilterQuery,
}

impl<'f> PrefabReferencesQuery<'f> {
    #[must_use]
    pub fn new(filter: &'f FilterQuery) -> Self {
        Self { filter }
    }
}

impl Query<FilteredView<AssetId>> for PrefabReferencesQuery<'_> {
    fn run(&self, analysis: &Analysis) -> FilteredView<AssetId> {
        let table = &analysis.assets;
        let mut entries = Vec::new();
        let mut rows = Vec::new();
        for record in analysis.references.forward_records() {
            let Some(root) = table.get(record.root) else {
                continue;
            };
            let c = root.main.as_ref().map(|m| Candidate::new(root, m));
            if !self.filter.matches_primary(c.as_ref()) {
                continue;
            }
            let mut scan = self.filter.group_scan();
            for node in &record.nodes {
                for comp in &node.components {
                    for prop in &comp.properties {
                        let resolved = table.resolve(prop.object).and_then(|(id, obj)| {
                            table.get(id).map(|asset| Candidate::new(asset, obj))
                        });
                        scan.observe(resolved.as_ref());
                    }
                }
            }
            if scan.is_satisfied() {
                entries.push(record.root);
                rows.push(record.row_count());
            }
        }
        FilteredView { entries, layout: RowLayout::from_counts(rows) }
    }
}

/// Referenced assets with the container roots that reference them.
///
/// Assets nothing references are left out. Rows per entry: one per property.
pub struct ReferencedByQuery<'f> {
    pub filter: &'f FilterQuery,
}

impl<'f> ReferencedByQuery<'f> {
    #[must_use]
    pub fn new(filter: &'f FilterQuery) -> Self {
        Self { filter }
    }
}

impl Query<FilteredView<AssetId>> for ReferencedByQuery<'_> {
    fn run(&self, analysis: &Analysis) -> FilteredView<AssetId> {
        let table = &analysis.assets;
        let mut entries = Vec::new();
        let mut rows = Vec::new();
        for record in analysis.references.reverse_records() {
            if record.referenced_by.is_empty() {
                continue;
            }
            let Some(asset) = table.get(record.asset) else {
                continue;
            };
            if asset.objects().any(|o| self.filter.matches_primary(Some(&Candidate::new(asset, o)))) {
                entries.push(record.asset);
                rows.push(record.row_count());
            }
        }
        FilteredView { entries, layout: RowLayout::from_counts(rows) }
    }
}
