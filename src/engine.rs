use crate::error::CaseLogError;
use crate::minimums::{self, RequirementTable, RolePolicy};
use crate::models::{CaseSet, ProgressRow};
use crate::reconcile::{self, CompoundLabelConvention, Reconciliation};

/// Everything a run needs besides the uploaded cases.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub requirements: RequirementTable,
    pub convention: CompoundLabelConvention,
    pub policy: RolePolicy,
}

#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub requirements_source: String,
    pub rows: Vec<ProgressRow>,
    pub excluded: Vec<CaseLogError>,
    pub uncategorized: usize,
}

impl EngineContext {
    pub fn new(requirements: RequirementTable) -> Self {
        Self {
            requirements,
            convention: CompoundLabelConvention::default(),
            policy: RolePolicy::default(),
        }
    }

    pub fn reconcile(&self, cases: &CaseSet) -> Reconciliation {
        reconcile::reconcile(cases, &self.convention)
    }

    pub fn progress(&self, cases: &CaseSet) -> ProgressReport {
        let reconciliation = self.reconcile(cases);
        let rows = minimums::merge_minimums(
            &reconciliation.reconciled,
            &self.requirements,
            self.policy,
        );
        ProgressReport {
            requirements_source: self.requirements.source().to_string(),
            rows,
            excluded: reconciliation.excluded,
            uncategorized: reconciliation.uncategorized,
        }
    }
}
