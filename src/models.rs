use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Resident role after normalization. The export calls the primary role "Surgeon".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum)]
pub enum Role {
    Primary,
    Assistant,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Primary, Role::Assistant];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "Primary",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    #[serde(skip)]
    pub source_row: usize,
    #[serde(rename = "ProcedureDate")]
    pub procedure_date: NaiveDate,
    #[serde(rename = "ResidentRole")]
    pub resident_role: Role,
    #[serde(rename = "CaseID")]
    pub case_id: String,
    #[serde(rename = "AreaDesc")]
    pub area_desc: String,
    #[serde(rename = "TypeDesc")]
    pub type_desc: String,
    #[serde(rename = "DefinedCategories")]
    pub defined_category: String,
    #[serde(rename = "YearOfCase")]
    pub year_of_case: String,
    #[serde(rename = "CPTDesc")]
    pub cpt_desc: String,
}

/// All normalized cases from one uploaded export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseSet {
    records: Vec<CaseRecord>,
}

impl CaseSet {
    pub fn new(records: Vec<CaseRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CaseRecord> {
        self.records.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub primary: usize,
    pub assistant: usize,
}

impl RoleCounts {
    pub fn add(&mut self, role: Role, count: usize) {
        match role {
            Role::Primary => self.primary += count,
            Role::Assistant => self.assistant += count,
        }
    }

    pub fn get(&self, role: Role) -> usize {
        match role {
            Role::Primary => self.primary,
            Role::Assistant => self.assistant,
        }
    }

    pub fn total(&self) -> usize {
        self.primary + self.assistant
    }
}

/// One (category, role) → count cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Role")]
    pub role: Role,
    #[serde(rename = "Count")]
    pub count: usize,
}

/// Counts keyed by category; each key appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    counts: BTreeMap<String, RoleCounts>,
}

impl CategoryCounts {
    pub fn tally<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Role)>,
    {
        let mut counts = Self::default();
        for (category, role) in rows {
            counts.record(category, role);
        }
        counts
    }

    pub fn record(&mut self, category: &str, role: Role) {
        self.counts
            .entry(category.to_string())
            .or_default()
            .add(role, 1);
    }

    pub fn get(&self, category: &str) -> RoleCounts {
        self.counts.get(category).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, category: impl Into<String>, counts: RoleCounts) {
        self.counts.insert(category.into(), counts);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn role_total(&self, role: Role) -> usize {
        self.counts.values().map(|counts| counts.get(role)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, RoleCounts)> + '_ {
        self.counts
            .iter()
            .map(|(category, counts)| (category.as_str(), *counts))
    }

    /// Flattened non-zero cells, ordered by category then role.
    pub fn entries(&self) -> Vec<CategoryCount> {
        self.iter()
            .flat_map(|(category, counts)| {
                Role::ALL.into_iter().filter_map(move |role| {
                    let count = counts.get(role);
                    (count > 0).then(|| CategoryCount {
                        category: category.to_string(),
                        role,
                        count,
                    })
                })
            })
            .collect()
    }
}

/// Whether assistant cases may count toward a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoleScope {
    PrimaryOnly,
    PrimaryAndAssistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRow {
    pub category: String,
    pub minimum: u32,
    pub role_scope: Option<RoleScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRow {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Primary")]
    pub primary_count: usize,
    #[serde(rename = "Assistant")]
    pub assistant_count: usize,
    #[serde(rename = "Total")]
    pub total_count: usize,
    #[serde(rename = "Minimum")]
    pub minimum: u32,
}

impl ProgressRow {
    pub fn new(category: impl Into<String>, primary: usize, assistant: usize, minimum: u32) -> Self {
        Self {
            category: category.into(),
            primary_count: primary,
            assistant_count: assistant,
            total_count: primary + assistant,
            minimum,
        }
    }

    pub fn is_met(&self) -> bool {
        self.total_count >= self.minimum as usize
    }

    pub fn remaining(&self) -> usize {
        (self.minimum as usize).saturating_sub(self.total_count)
    }
}
