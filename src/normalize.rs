use std::io;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::{CaseLogError, Result};
use crate::models::{CaseRecord, CaseSet, Role};

// `%Y` also accepts two digits, so the `%y` forms must be tried first. A
// four-digit year leaves trailing input under `%y` and falls through.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%d-%b-%y",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// One row of the case log export, as text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawCaseRow {
    #[serde(rename = "ProcedureDate")]
    pub procedure_date: String,
    #[serde(rename = "ResidentRole")]
    pub resident_role: String,
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

/// Anything the normalizer can turn into a [`CaseRecord`].
pub trait NormalizeRow {
    fn normalize(self, row: usize) -> Result<CaseRecord>;
}

impl NormalizeRow for RawCaseRow {
    fn normalize(self, row: usize) -> Result<CaseRecord> {
        normalize_row(row, self)
    }
}

/// Already normalized: the role is typed and the date parsed, so nothing changes.
impl NormalizeRow for CaseRecord {
    fn normalize(self, _row: usize) -> Result<CaseRecord> {
        Ok(self)
    }
}

pub fn parse_procedure_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|value| value.date())
        })
}

/// `Surgeon` becomes `Primary`; `Assistant` passes through.
pub fn normalize_role(row: usize, raw: &str) -> Result<Role> {
    match raw.trim() {
        "Surgeon" => Ok(Role::Primary),
        "Assistant" => Ok(Role::Assistant),
        other => Err(CaseLogError::UnknownRole {
            row,
            role: other.to_string(),
        }),
    }
}

pub fn normalize_row(row: usize, raw: RawCaseRow) -> Result<CaseRecord> {
    let procedure_date =
        parse_procedure_date(&raw.procedure_date).ok_or_else(|| CaseLogError::Parse {
            row,
            message: format!("unparseable procedure date `{}`", raw.procedure_date),
        })?;
    let resident_role = normalize_role(row, &raw.resident_role)?;

    Ok(CaseRecord {
        source_row: row,
        procedure_date,
        resident_role,
        case_id: raw.case_id,
        area_desc: raw.area_desc,
        type_desc: raw.type_desc,
        defined_category: raw.defined_category,
        year_of_case: raw.year_of_case,
        cpt_desc: raw.cpt_desc,
    })
}

/// Reads a headed CSV export. The first bad row aborts the whole read.
pub fn read_case_set<R: io::Read>(reader: R) -> Result<CaseSet> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|err| CaseLogError::from_csv(1, &err))?
        .clone();

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let fallback_row = index + 2;
        let record = result.map_err(|err| CaseLogError::from_csv(fallback_row, &err))?;
        let row = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(fallback_row);
        let raw: RawCaseRow =
            record
                .deserialize(Some(&headers))
                .map_err(|err| CaseLogError::Parse {
                    row,
                    message: err.to_string(),
                })?;
        rows.push((row, raw));
    }

    let cases = normalize_rows(rows)?;
    tracing::info!(rows = cases.len(), "normalized case log");
    Ok(cases)
}

/// Normalizes `(row, input)` pairs. The first failure aborts the whole set.
pub fn normalize_rows<I, T>(rows: I) -> Result<CaseSet>
where
    I: IntoIterator<Item = (usize, T)>,
    T: NormalizeRow,
{
    rows.into_iter()
        .map(|(row, input)| input.normalize(row))
        .collect::<Result<Vec<_>>>()
        .map(CaseSet::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "ProcedureDate,ResidentRole,CaseID,AreaDesc,TypeDesc,DefinedCategories,YearOfCase,CPTDesc";

    fn export(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn surgeon_maps_to_primary() {
        assert_eq!(normalize_role(2, "Surgeon"), Ok(Role::Primary));
        assert_eq!(normalize_role(2, "Assistant"), Ok(Role::Assistant));
    }

    #[test]
    fn primary_is_not_an_export_role() {
        assert!(matches!(
            normalize_role(4, "Primary"),
            Err(CaseLogError::UnknownRole { row: 4, .. })
        ));
        let text = export(&["03/14/2021,Primary,C-1,Lens,Phaco,Cataract,PGY3,Phaco"]);
        assert!(matches!(
            read_case_set(text.as_bytes()),
            Err(CaseLogError::UnknownRole { row: 2, .. })
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = normalize_role(7, "Observer").unwrap_err();
        assert_eq!(
            err,
            CaseLogError::UnknownRole {
                row: 7,
                role: "Observer".to_string()
            }
        );
    }

    #[test]
    fn parses_common_export_dates() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 14);
        assert_eq!(parse_procedure_date("2021-03-14"), expected);
        assert_eq!(parse_procedure_date("03/14/2021"), expected);
        assert_eq!(parse_procedure_date("14-Mar-2021"), expected);
        assert_eq!(parse_procedure_date("2021-03-14 08:30:00"), expected);
        assert_eq!(parse_procedure_date("03/14/21"), expected);
        assert_eq!(parse_procedure_date("14-Mar-21"), expected);
        assert_eq!(parse_procedure_date("03/14/21 08:30"), expected);
        assert_eq!(parse_procedure_date("3/14/2021"), expected);
        assert_eq!(parse_procedure_date("not a date"), None);
    }

    #[test]
    fn reads_export_rows() {
        let text = export(&[
            "03/14/2021,Surgeon,C-1,Lens,Phaco,Cataract,PGY3,Cataract removal with IOL",
            "03/15/2021,Assistant,C-2,Retina,Vitrectomy,Retina/Vitreous,PGY3,Vitrectomy",
        ]);
        let cases = read_case_set(text.as_bytes()).unwrap();
        assert_eq!(cases.len(), 2);
        let records: Vec<&CaseRecord> = cases.iter().collect();
        let first = records[0];
        assert_eq!(first.source_row, 2);
        assert_eq!(first.resident_role, Role::Primary);
        assert_eq!(first.procedure_date, NaiveDate::from_ymd_opt(2021, 3, 14).unwrap());
        assert_eq!(first.defined_category, "Cataract");
        assert_eq!(records[1].resident_role, Role::Assistant);
    }

    #[test]
    fn bad_date_aborts_with_row_number() {
        let text = export(&[
            "03/14/2021,Surgeon,C-1,Lens,Phaco,Cataract,PGY3,Phaco",
            "sometime,Surgeon,C-2,Lens,Phaco,Cataract,PGY3,Phaco",
        ]);
        match read_case_set(text.as_bytes()) {
            Err(CaseLogError::Parse { row, message }) => {
                assert_eq!(row, 3);
                assert!(message.contains("sometime"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_role_aborts_read() {
        let text = export(&["03/14/2021,Fellow,C-1,Lens,Phaco,Cataract,PGY3,Phaco"]);
        assert!(matches!(
            read_case_set(text.as_bytes()),
            Err(CaseLogError::UnknownRole { row: 2, .. })
        ));
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let text = export(&["03/14/2021,Surgeon,C-1"]);
        assert!(matches!(
            read_case_set(text.as_bytes()),
            Err(CaseLogError::Parse { .. })
        ));
    }

    #[test]
    fn empty_export_yields_empty_set() {
        let cases = read_case_set(HEADER.as_bytes()).unwrap();
        assert!(cases.is_empty());
    }

    #[test]
    fn renormalizing_is_a_no_op() {
        let text = export(&[
            "03/14/2021,Surgeon,C-1,Lens,Phaco,Cataract,PGY3,Phaco",
            "2021-04-02,Assistant,C-9,Oculoplastics,Lid,\"Ptosis, Oculoplastic and Orbit\",PGY3,Ptosis repair",
        ]);
        let once = read_case_set(text.as_bytes()).unwrap();
        let twice = normalize_rows(
            once.iter()
                .cloned()
                .map(|record| (record.source_row, record)),
        )
        .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn fields_are_kept_verbatim() {
        let text = export(&[
            " 03/14/2021 , Surgeon ,C-1,Lens, Phaco ,Cataract,PGY3,Phaco ",
        ]);
        let cases = read_case_set(text.as_bytes()).unwrap();
        let record = cases.iter().next().unwrap();
        assert_eq!(record.resident_role, Role::Primary);
        assert_eq!(record.procedure_date, NaiveDate::from_ymd_opt(2021, 3, 14).unwrap());
        assert_eq!(record.type_desc, " Phaco ");
        assert_eq!(record.cpt_desc, "Phaco ");
    }
}
