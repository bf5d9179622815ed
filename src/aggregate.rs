use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::models::{CaseRecord, CaseSet, Role};

/// Per-role view of a case set, used by the overview section.
#[derive(Debug, Clone)]
pub struct RoleOverview<'a> {
    pub role: Role,
    pub role_subset: Vec<&'a CaseRecord>,
    pub total_cases_by_role: BTreeMap<Role, usize>,
    pub unique_surgeries_by_role: BTreeMap<Role, usize>,
    pub max_area_count: usize,
}

impl RoleOverview<'_> {
    pub fn total_cases(&self) -> usize {
        self.total_cases_by_role.get(&self.role).copied().unwrap_or(0)
    }

    pub fn unique_surgeries(&self) -> usize {
        self.unique_surgeries_by_role
            .get(&self.role)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaBreakdown {
    pub area: String,
    pub count: usize,
    pub types: Vec<(String, usize)>,
}

/// Case-table filters. Text matches are case-insensitive substrings; an empty
/// year list keeps every year.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub role: Option<Role>,
    pub type_text: Option<String>,
    pub cpt_text: Option<String>,
    pub years: Vec<String>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl CaseFilter {
    pub fn matches(&self, record: &CaseRecord) -> bool {
        self.role.map_or(true, |role| record.resident_role == role)
            && self
                .type_text
                .as_deref()
                .map_or(true, |text| contains_ignore_case(&record.type_desc, text))
            && self
                .cpt_text
                .as_deref()
                .map_or(true, |text| contains_ignore_case(&record.cpt_desc, text))
            && (self.years.is_empty() || self.years.iter().any(|year| *year == record.year_of_case))
    }

    pub fn apply<'a>(&self, cases: &'a CaseSet) -> Vec<&'a CaseRecord> {
        cases.iter().filter(|record| self.matches(record)).collect()
    }
}

fn zeroed() -> BTreeMap<Role, usize> {
    Role::ALL.into_iter().map(|role| (role, 0)).collect()
}

pub fn overview(cases: &CaseSet, role: Role) -> RoleOverview<'_> {
    let mut total_cases_by_role = zeroed();
    let mut unique_surgeries_by_role = zeroed();
    let mut seen: HashSet<(Role, &str, NaiveDate)> = HashSet::new();

    for record in cases.iter() {
        *total_cases_by_role.entry(record.resident_role).or_insert(0) += 1;
        if seen.insert((
            record.resident_role,
            record.case_id.as_str(),
            record.procedure_date,
        )) {
            *unique_surgeries_by_role
                .entry(record.resident_role)
                .or_insert(0) += 1;
        }
    }

    let role_subset: Vec<&CaseRecord> = cases
        .iter()
        .filter(|record| record.resident_role == role)
        .collect();
    let max_area_count = max_area_count(&role_subset);

    RoleOverview {
        role,
        role_subset,
        total_cases_by_role,
        unique_surgeries_by_role,
        max_area_count,
    }
}

pub fn max_area_count(records: &[&CaseRecord]) -> usize {
    let mut map: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for record in records {
        *map.entry(record.area_desc.as_str()).or_insert(0) += 1;
    }
    map.into_values().max().unwrap_or(0)
}

/// Cases per area, with the type counts inside each area. Sorted by area then type.
pub fn area_breakdown(records: &[&CaseRecord]) -> Vec<AreaBreakdown> {
    let mut map: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for record in records {
        *map.entry(record.area_desc.as_str())
            .or_default()
            .entry(record.type_desc.as_str())
            .or_insert(0) += 1;
    }

    map.into_iter()
        .map(|(area, types)| AreaBreakdown {
            area: area.to_string(),
            count: types.values().sum(),
            types: types
                .into_iter()
                .map(|(type_desc, count)| (type_desc.to_string(), count))
                .collect(),
        })
        .collect()
}

pub fn timeline(records: &[&CaseRecord]) -> BTreeMap<NaiveDate, usize> {
    let mut map = BTreeMap::new();
    for record in records {
        *map.entry(record.procedure_date).or_insert(0) += 1;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_case(role: Role, case_id: &str, day: u32, area: &str, type_desc: &str) -> CaseRecord {
        CaseRecord {
            source_row: 0,
            procedure_date: NaiveDate::from_ymd_opt(2021, 5, day).unwrap(),
            resident_role: role,
            case_id: case_id.to_string(),
            area_desc: area.to_string(),
            type_desc: type_desc.to_string(),
            defined_category: "Cataract".to_string(),
            year_of_case: "PGY3".to_string(),
            cpt_desc: "Cataract removal with IOL".to_string(),
        }
    }

    #[test]
    fn counts_rows_and_deduplicates_surgeries() {
        // C-1 and C-2 each log two procedure rows on the same day.
        let cases = CaseSet::new(vec![
            sample_case(Role::Primary, "C-1", 1, "Lens", "Phaco"),
            sample_case(Role::Primary, "C-1", 1, "Lens", "Anterior vitrectomy"),
            sample_case(Role::Primary, "C-2", 2, "Glaucoma", "Trabeculectomy"),
            sample_case(Role::Primary, "C-2", 2, "Glaucoma", "Tube shunt"),
            sample_case(Role::Primary, "C-3", 3, "Lens", "Phaco"),
            sample_case(Role::Primary, "C-4", 4, "Lens", "Phaco"),
            sample_case(Role::Assistant, "C-5", 5, "Retina", "Vitrectomy"),
            sample_case(Role::Assistant, "C-6", 6, "Retina", "Scleral buckle"),
            sample_case(Role::Assistant, "C-7", 7, "Cornea", "PKP"),
            sample_case(Role::Assistant, "C-1", 8, "Lens", "Phaco"),
        ]);

        let overview = overview(&cases, Role::Primary);
        assert_eq!(overview.total_cases_by_role[&Role::Primary], 6);
        assert_eq!(overview.total_cases_by_role[&Role::Assistant], 4);
        assert_eq!(overview.unique_surgeries_by_role[&Role::Primary], 4);
        assert_eq!(overview.unique_surgeries_by_role[&Role::Assistant], 4);
        assert_eq!(overview.role_subset.len(), 6);
        assert_eq!(overview.max_area_count, 4);
        assert_eq!(overview.total_cases(), 6);
        assert_eq!(overview.unique_surgeries(), 4);
    }

    #[test]
    fn same_case_id_on_different_dates_counts_twice() {
        let cases = CaseSet::new(vec![
            sample_case(Role::Primary, "C-1", 1, "Lens", "Phaco"),
            sample_case(Role::Primary, "C-1", 9, "Lens", "Phaco"),
        ]);
        let overview = overview(&cases, Role::Primary);
        assert_eq!(overview.unique_surgeries(), 2);
    }

    #[test]
    fn empty_set_yields_zero_counts() {
        let cases = CaseSet::default();
        let overview = overview(&cases, Role::Assistant);
        assert!(overview.role_subset.is_empty());
        assert_eq!(overview.max_area_count, 0);
        for role in Role::ALL {
            assert_eq!(overview.total_cases_by_role[&role], 0);
            assert_eq!(overview.unique_surgeries_by_role[&role], 0);
        }
    }

    #[test]
    fn filter_matches_type_cpt_and_year() {
        let mut glaucoma = sample_case(Role::Primary, "C-2", 2, "Glaucoma", "Trabeculectomy");
        glaucoma.cpt_desc = "Trabeculectomy ab externo".to_string();
        glaucoma.year_of_case = "PGY4".to_string();
        let cases = CaseSet::new(vec![
            sample_case(Role::Primary, "C-1", 1, "Lens", "Phaco"),
            glaucoma,
            sample_case(Role::Assistant, "C-3", 3, "Lens", "Phaco"),
        ]);

        let by_type = CaseFilter {
            type_text: Some("PHAC".to_string()),
            ..CaseFilter::default()
        };
        assert_eq!(by_type.apply(&cases).len(), 2);

        let by_cpt = CaseFilter {
            cpt_text: Some("ab ext".to_string()),
            ..CaseFilter::default()
        };
        let found = by_cpt.apply(&cases);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].case_id, "C-2");

        let by_year_and_role = CaseFilter {
            role: Some(Role::Primary),
            years: vec!["PGY3".to_string(), "PGY5".to_string()],
            ..CaseFilter::default()
        };
        let found = by_year_and_role.apply(&cases);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].case_id, "C-1");

        assert_eq!(CaseFilter::default().apply(&cases).len(), 3);
    }

    #[test]
    fn breakdown_nests_types_under_areas() {
        let cases = CaseSet::new(vec![
            sample_case(Role::Primary, "C-1", 1, "Lens", "Phaco"),
            sample_case(Role::Primary, "C-2", 2, "Lens", "Phaco"),
            sample_case(Role::Primary, "C-3", 2, "Lens", "ECCE"),
            sample_case(Role::Primary, "C-4", 3, "Glaucoma", "Trabeculectomy"),
        ]);
        let subset: Vec<&CaseRecord> = cases.iter().collect();

        let breakdown = area_breakdown(&subset);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].area, "Glaucoma");
        assert_eq!(breakdown[1].count, 3);
        assert_eq!(
            breakdown[1].types,
            vec![("ECCE".to_string(), 1), ("Phaco".to_string(), 2)]
        );

        let days = timeline(&subset);
        assert_eq!(days[&NaiveDate::from_ymd_opt(2021, 5, 2).unwrap()], 2);
        assert_eq!(days.len(), 3);
    }
}
