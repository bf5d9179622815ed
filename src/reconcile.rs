//! Category reconciliation for compound labels.
//!
//! The export annotates some sub-categories with their parent, e.g.
//! `Ptosis, Oculoplastic and Orbit`. Labels are cut at the first delimiter for
//! matching, and each configured parent gets a synthetic total covering its own
//! rows plus every row that names it.

use std::str::FromStr;

use crate::error::CaseLogError;
use crate::models::{CaseSet, CategoryCounts, Role, RoleCounts};

pub const DEFAULT_DELIMITER: char = ',';
pub const OCULOPLASTICS: &str = "Oculoplastic and Orbit";

/// Rows naming `qualifier` roll up into `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRollup {
    pub qualifier: String,
    pub parent: String,
}

impl ParentRollup {
    pub fn new(qualifier: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            parent: parent.into(),
        }
    }

    fn claims(&self, label: &SplitLabel<'_>) -> bool {
        label.category.contains(self.qualifier.as_str())
            || label
                .annotation
                .is_some_and(|annotation| annotation.contains(self.qualifier.as_str()))
    }
}

impl FromStr for ParentRollup {
    type Err = String;

    /// `qualifier=parent`, or a bare name when both are the same.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (qualifier, parent) = match value.split_once('=') {
            Some((qualifier, parent)) => (qualifier.trim(), parent.trim()),
            None => (value.trim(), value.trim()),
        };
        if qualifier.is_empty() || parent.is_empty() {
            return Err(format!("invalid rollup `{value}`, expected qualifier=parent"));
        }
        Ok(ParentRollup::new(qualifier, parent))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundLabelConvention {
    pub delimiter: char,
    pub rollups: Vec<ParentRollup>,
}

impl Default for CompoundLabelConvention {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            rollups: vec![ParentRollup::new(OCULOPLASTICS, OCULOPLASTICS)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLabel<'a> {
    pub category: &'a str,
    pub annotation: Option<&'a str>,
}

impl CompoundLabelConvention {
    /// Distinct parent names, in first-declared order.
    pub fn parents(&self) -> Vec<&str> {
        let mut parents: Vec<&str> = Vec::new();
        for rollup in self.rollups.iter() {
            if !parents.contains(&rollup.parent.as_str()) {
                parents.push(rollup.parent.as_str());
            }
        }
        parents
    }

    pub fn split<'a>(&self, label: &'a str) -> SplitLabel<'a> {
        match label.split_once(self.delimiter) {
            Some((category, annotation)) => SplitLabel {
                category: category.trim(),
                annotation: Some(annotation.trim()),
            },
            None => SplitLabel {
                category: label.trim(),
                annotation: None,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Counts per truncated category, before any parent rollup.
    pub raw: CategoryCounts,
    pub reconciled: CategoryCounts,
    pub excluded: Vec<CaseLogError>,
    pub uncategorized: usize,
}

pub fn reconcile(cases: &CaseSet, convention: &CompoundLabelConvention) -> Reconciliation {
    let mut excluded = Vec::new();
    let mut uncategorized = 0usize;
    let mut labelled: Vec<(SplitLabel<'_>, Role)> = Vec::with_capacity(cases.len());

    for record in cases.iter() {
        if record.defined_category.trim().is_empty() {
            tracing::debug!(row = record.source_row, "case has no defined category");
            uncategorized += 1;
            continue;
        }

        let label = convention.split(&record.defined_category);
        if label.category.is_empty() {
            let err = CaseLogError::MalformedCategory {
                row: record.source_row,
                label: record.defined_category.clone(),
            };
            tracing::warn!(%err, "excluding case from category counts");
            excluded.push(err);
            continue;
        }
        labelled.push((label, record.resident_role));
    }

    let raw = CategoryCounts::tally(
        labelled
            .iter()
            .map(|(label, role)| (label.category, *role)),
    );

    let mut reconciled = raw.clone();
    for parent in convention.parents() {
        let rollups: Vec<&ParentRollup> = convention
            .rollups
            .iter()
            .filter(|rollup| rollup.parent == parent)
            .collect();

        let mut total = RoleCounts::default();
        for (label, role) in labelled.iter() {
            if label.category == parent || rollups.iter().any(|rollup| rollup.claims(label)) {
                total.add(*role, 1);
            }
        }
        if total.total() == 0 {
            continue;
        }
        // Replaces the parent's direct count; direct rows are inside `total`.
        reconciled.insert(parent, total);
    }

    tracing::info!(
        categories = reconciled.len(),
        excluded = excluded.len(),
        uncategorized,
        "reconciled category counts"
    );

    Reconciliation {
        raw,
        reconciled,
        excluded,
        uncategorized,
    }
}
