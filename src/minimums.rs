use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CaseLogError, Result};
use crate::models::{CategoryCounts, ProgressRow, RequirementRow, RoleScope};

const BUILTIN_SOURCE: &str = "built-in";
const BUILTIN_MINIMUMS: &str = include_str!("../data/minimums.csv");

/// How assistant cases count toward requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RolePolicy {
    /// Assistant cases count toward every category.
    AllRoles,
    /// Honour each requirement's `WhichRole`; a missing flag lets assistant cases count.
    #[default]
    PerRequirement,
}

impl RolePolicy {
    pub fn assistant_counts(self, requirement: &RequirementRow) -> bool {
        match self {
            RolePolicy::AllRoles => true,
            RolePolicy::PerRequirement => {
                requirement.role_scope != Some(RoleScope::PrimaryOnly)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequirementCsvRow {
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Minimum")]
    minimum: u32,
    #[serde(rename = "WhichRole", default)]
    which_role: Option<String>,
}

fn parse_role_scope(raw: &str) -> Option<RoleScope> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "primary" | "primary only" => Some(RoleScope::PrimaryOnly),
        "primary and assistant" | "primary+assistant" | "both" | "all" => {
            Some(RoleScope::PrimaryAndAssistant)
        }
        _ => None,
    }
}

/// Ordered requirement rows; the order is the report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementTable {
    source: String,
    rows: Vec<RequirementRow>,
}

impl RequirementTable {
    pub fn new(source: impl Into<String>, rows: Vec<RequirementRow>) -> Self {
        Self {
            source: source.into(),
            rows,
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_reader(BUILTIN_MINIMUMS.as_bytes(), BUILTIN_SOURCE)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let source = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|err| CaseLogError::Config {
            source_name: source.clone(),
            message: err.to_string(),
        })?;
        Self::from_reader(file, &source)
    }

    pub fn from_reader<R: io::Read>(reader: R, source: &str) -> Result<Self> {
        let config_error = |message: String| CaseLogError::Config {
            source_name: source.to_string(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();

        for result in reader.deserialize::<RequirementCsvRow>() {
            let row = result.map_err(|err| config_error(err.to_string()))?;
            let role_scope = match row.which_role.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_role_scope(raw).ok_or_else(|| {
                    config_error(format!(
                        "unrecognized WhichRole `{raw}` for category `{}`",
                        row.category
                    ))
                })?),
            };
            rows.push(RequirementRow {
                category: row.category,
                minimum: row.minimum,
                role_scope,
            });
        }

        if rows.is_empty() {
            return Err(config_error("no requirement rows".to_string()));
        }

        tracing::info!(source, requirements = rows.len(), "loaded requirements table");
        Ok(Self::new(source, rows))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rows(&self) -> &[RequirementRow] {
        &self.rows
    }
}

/// One progress row per requirement, in table order. Categories without a
/// requirement are dropped; requirements without cases report zero.
pub fn merge_minimums(
    counts: &CategoryCounts,
    requirements: &RequirementTable,
    policy: RolePolicy,
) -> Vec<ProgressRow> {
    requirements
        .rows()
        .iter()
        .map(|requirement| {
            let found = counts.get(&requirement.category);
            let assistant = if policy.assistant_counts(requirement) {
                found.assistant
            } else {
                0
            };
            ProgressRow::new(
                requirement.category.clone(),
                found.primary,
                assistant,
                requirement.minimum,
            )
        })
        .collect()
}
