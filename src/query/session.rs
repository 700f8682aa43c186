//! One analysis plus the view state around it.
//!
//! Views are computed on first access and cached until the filter string or
//! the preferences change.
use crate::density::{assess, ContainerDensity, DensityQuery};
use crate::errors::{AnalysisError, FilterParseError};
use crate::graph::{Analysis, AssetId};
use crate::progress::ProgressSink;
use crate::utils::prefs::Preferences;

use super::{
    AssetUsagesQuery, FilterQuery, FilterState, FilteredView, PrefabReferencesQuery, Query,
    ReferencedByQuery, UsageEntry,
};

#[derive(Debug)]
pub struct Session {
    analysis: Analysis,
    filter: FilterState,
    prefs: Preferences,
    recomputations: usize,
    usages: Option<FilteredView<UsageEntry>>,
    prefab_references: Option<FilteredView<AssetId>>,
    referenced_by: Option<FilteredView<AssetId>>,
    density_reports: Option<Vec<ContainerDensity>>,
    density: Option<FilteredView<usize>>,
}

impl Session {
    #[must_use]
    pub fn new(analysis: Analysis, prefs: Preferences) -> Self {
        Self {
            analysis,
            filter: FilterState::default(),
            prefs,
            recomputations: 0,
            usages: None,
            prefab_references: None,
            referenced_by: None,
            density_reports: None,
            density: None,
        }
    }

    #[must_use]
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    #[must_use]
    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    /// Replace the filter string; returns whether the views were invalidated.
    ///
    /// A string that fails to parse leaves the views unfiltered; the error
    /// is available from [`Session::filter_error`].
    pub fn set_filter_string(&mut self, text: &str) -> bool {
        if !self.filter.set_filter_string(text) {
            return false;
        }
        self.usages = None;
        self.prefab_references = None;
        self.referenced_by = None;
        self.density = None;
        true
    }

    #[must_use]
    pub fn filter_string(&self) -> &str {
        self.filter.filter_string()
    }

    #[must_use]
    pub fn filter(&self) -> &FilterQuery {
        self.filter.query()
    }

    #[must_use]
    pub fn filter_error(&self) -> Option<&FilterParseError> {
        self.filter.error()
    }

    /// Update preferences. Only the usages view depends on them; density
    /// grades are computed from the level at render time.
    pub fn set_preferences(&mut self, prefs: Preferences) {
        if prefs.inclusion != self.prefs.inclusion || prefs.ignore_scripts != self.prefs.ignore_scripts {
            self.usages = None;
        }
        self.prefs = prefs;
    }

    /// Number of view computations so far.
    #[must_use]
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    pub fn usages(&mut self) -> &FilteredView<UsageEntry> {
        let Self { analysis, filter, prefs, recomputations, usages, .. } = self;
        usages.get_or_insert_with(|| {
            *recomputations += 1;
            AssetUsagesQuery::new(filter.query())
                .inclusion(prefs.inclusion)
                .ignore_scripts(prefs.ignore_scripts)
                .run(analysis)
        })
    }

    pub fn prefab_references(&mut self) -> &FilteredView<AssetId> {
        let Self { analysis, filter, recomputations, prefab_references, .. } = self;
        prefab_references.get_or_insert_with(|| {
            *recomputations += 1;
            PrefabReferencesQuery::new(filter.query()).run(analysis)
        })
    }

    pub fn referenced_by(&mut self) -> &FilteredView<AssetId> {
        let Self { analysis, filter, recomputations, referenced_by, .. } = self;
        referenced_by.get_or_insert_with(|| {
            *recomputations += 1;
            ReferencedByQuery::new(filter.query()).run(analysis)
        })
    }

    /// Density view; entries index into [`Session::density_reports`].
    ///
    /// The assessment itself runs once per session.
    ///
    /// # Errors
    /// Returns `AnalysisError::Cancelled` when the progress sink cancels the
    /// assessment.
    pub fn density(
        &mut self,
        progress: &mut dyn ProgressSink,
    ) -> Result<&FilteredView<usize>, AnalysisError> {
        if self.density_reports.is_none() {
            self.density_reports = Some(assess(&self.analysis, progress)?);
        }
        let Self { analysis, filter, recomputations, density_reports, density, .. } = self;
        let reports = density_reports.as_deref().unwrap_or_default();
        Ok(density.get_or_insert_with(|| {
            *recomputations += 1;
            DensityQuery::new(filter.query(), reports).run(analysis)
        }))
    }

    #[must_use]
    pub fn density_reports(&self) -> &[ContainerDensity] {
        self.density_reports.as_deref().unwrap_or_default()
    }
}
