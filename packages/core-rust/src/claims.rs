//! Built-in schema and read profile for medical claims exports.

use crate::chunk::ReadProfile;
use crate::schema::{ColumnKind, ColumnRule, Constraint, Schema, SchemaError};

/// Identifier-like text: letters, digits and underscore.
pub const CODE_PATTERN: &str = r"^[a-zA-Z0-9_]+$";

/// [`CODE_PATTERN`] plus hyphen, for patient identifiers.
pub const PATIENT_ID_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";

/// The only column that may not be empty.
pub const EMPLOYER_ID: &str = "EMPLOYER_ID";

/// Column allowed to carry hyphens.
pub const UNIQUE_PATIENT_ID: &str = "UNIQUE_PATIENT_ID";

/// Columns parsed through the date normalizer.
pub const DATE_COLUMNS: [&str; 3] = ["SERVICE_START_DATE", "SERVICE_END_DATE", "CLAIM_PAID_DATE"];

/// Currency columns: read as floats and required to be non-negative.
pub const AMOUNT_COLUMNS: [&str; 6] = [
    "COVERED_AMOUNT",
    "PLAN_PAID_AMOUNT",
    "CHARGED_AMOUNT",
    "MEMBER_DEDUCTIBLE_AMOUNT",
    "MEMBER_OOP_AMOUNT",
    "MEMBER_COPAY_AMOUNT",
];

/// Columns stored as categoricals without being validated.
pub const EXTRA_CATEGORICAL_COLUMNS: [&str; 1] = ["EMPLOYER_NAME"];

/// Every validated column, in report order.
pub const COLUMNS: [&str; 58] = [
    "EMPLOYER_ID",
    "CLAIM_STATUS",
    "CLAIM_TYPE",
    "SERVICE_START_DATE",
    "SERVICE_END_DATE",
    "PROVIDER_NPI",
    "PLACE_OF_SERVICE",
    "CPT_PROCEDURE",
    "DIAGNOSIS_1",
    "CLAIM_PAID_DATE",
    "COVERED_AMOUNT",
    "PLAN_PAID_AMOUNT",
    "PATIENT_SSN",
    "INPATIENT_OR_OUTPATIENT",
    "CLAIM_CAUSE",
    "BENEFIT_CODE",
    "NETWORK",
    "PROVIDER_NAME",
    "PROVIDER_PAID_NAME",
    "CHARGED_AMOUNT",
    "UCR",
    "CPT_MODIFIER",
    "DIAGNOSIS_2",
    "DIAGNOSIS_3",
    "DIAGNOSIS_4",
    "DIAGNOSIS_5",
    "MEMBER_DEDUCTIBLE_AMOUNT",
    "MEMBER_OOP_AMOUNT",
    "MEMBER_COPAY_AMOUNT",
    "CLAIM_NUMBER",
    "CLAIM_RECEIVED_DATE",
    "CLAIM_ENTRY_DATE",
    "REMARKS_CODE_1",
    "REMARKS_CODE_2",
    "REMARKS_CODE_3",
    "CHECK_NUMBER",
    "BENEFITS_ASSIGNED",
    "REVENUE_CODE",
    "PROVIDER_EIN",
    "PROVIDER_PAID_NPI",
    "PROVIDER_PAID_ZIP",
    "UNIQUE_PATIENT_ID",
    "LOCATION_CODE",
    "SUB_GROUP_CODE",
    "PLAN_CODE",
    "ADMIT_DATE",
    "DISCHARGE_DATE",
    "ADMISSION_DAYS",
    "DISCHARGE_STATUS_CODE",
    "POINT_OF_ORIGIN_CODE",
    "ADMISSION_DIAGNOSIS_CODE",
    "PATIENT_REASON_DIAGNOSIS_CODE",
    "CLAIM_FORM_TYPE",
    "TYPE_OF_BILL_CODE",
    "ORIGINAL_PROCEDURE_CODE",
    "ORIGINAL_POS_CODE",
    "ORIGINAL_DIAGNOSIS_CODE",
    "ORIGINAL_PROVIDER_CODE",
];

/// Declared kind of a claims column.
///
/// `CLAIM_RECEIVED_DATE`, `ADMIT_DATE` and the other `*_DATE` columns outside
/// [`DATE_COLUMNS`] are plain codes and must match [`CODE_PATTERN`].
#[must_use]
pub fn column_kind(column: &str) -> ColumnKind {
    if DATE_COLUMNS.contains(&column) {
        ColumnKind::Timestamp
    } else if AMOUNT_COLUMNS.contains(&column) {
        ColumnKind::Number
    } else {
        ColumnKind::Text
    }
}

/// Builds the claims schema.
///
/// # Errors
///
/// Only fails if a built-in pattern does not compile.
pub fn claims_schema() -> Result<Schema, SchemaError> {
    let rules = COLUMNS
        .iter()
        .map(|&name| {
            let kind = column_kind(name);
            let rule = ColumnRule::new(name, kind).nullable(name != EMPLOYER_ID);
            Ok(match kind {
                ColumnKind::Text if name == UNIQUE_PATIENT_ID => {
                    rule.check(Constraint::matches(PATIENT_ID_PATTERN)?)
                }
                ColumnKind::Text => rule.check(Constraint::matches(CODE_PATTERN)?),
                ColumnKind::Number => rule.check(Constraint::non_negative()),
                ColumnKind::Timestamp => rule,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    Schema::new(rules)
}

/// Read profile for claims files: every text column (and `EMPLOYER_NAME`) is
/// categorical, amounts are floats, and [`DATE_COLUMNS`] go through the
/// date normalizer.
#[must_use]
pub fn claims_profile(schema: &Schema) -> ReadProfile {
    let text_columns: Vec<String> = schema
        .rules()
        .iter()
        .filter(|rule| rule.kind == ColumnKind::Text)
        .map(|rule| rule.name.clone())
        .collect();
    ReadProfile::from_schema(schema)
        .categorical(text_columns)
        .categorical(EXTRA_CATEGORICAL_COLUMNS)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::chunk::{ChunkBuilder, Coercion, Header};
    use crate::schema::NOT_NULLABLE;

    fn sample_value(column: &str) -> &'static str {
        match column_kind(column) {
            ColumnKind::Timestamp => "01/02/2023",
            ColumnKind::Number => "125.50",
            ColumnKind::Text if column == UNIQUE_PATIENT_ID => "PAT-0001",
            ColumnKind::Text => "CODE_1",
        }
    }

    fn chunk_with(overrides: &[(&str, &str)]) -> crate::chunk::Chunk {
        let schema = claims_schema().unwrap();
        let header = Arc::new(Header::new(COLUMNS.iter().map(|c| (*c).to_string()).collect()));
        let profile = Arc::new(claims_profile(&schema));
        let mut builder = ChunkBuilder::new(header, profile, 0, 0);
        let row: Vec<&str> = COLUMNS
            .iter()
            .map(|c| {
                overrides
                    .iter()
                    .find(|(name, _)| name == c)
                    .map_or_else(|| sample_value(c), |(_, v)| *v)
            })
            .collect();
        builder.push_row(row).unwrap();
        builder.finish()
    }

    #[test]
    fn schema_has_58_unique_columns() {
        let schema = claims_schema().unwrap();
        assert_eq!(schema.len(), 58);
        let unique: HashSet<_> = COLUMNS.iter().collect();
        assert_eq!(unique.len(), 58);
    }

    #[test]
    fn only_employer_id_is_non_nullable() {
        let schema = claims_schema().unwrap();
        let strict: Vec<_> = schema.rules().iter().filter(|r| !r.nullable).map(|r| r.name.as_str()).collect();
        assert_eq!(strict, vec![EMPLOYER_ID]);
    }

    #[test]
    fn profile_coerces_by_column_family() {
        let schema = claims_schema().unwrap();
        let profile = claims_profile(&schema);
        assert_eq!(profile.coercion("COVERED_AMOUNT"), Coercion::Float);
        assert_eq!(profile.coercion("CLAIM_PAID_DATE"), Coercion::Date);
        assert_eq!(profile.coercion("CLAIM_RECEIVED_DATE"), Coercion::Categorical);
        assert_eq!(profile.coercion("EMPLOYER_NAME"), Coercion::Categorical);
        assert_eq!(profile.coercion("UNLISTED"), Coercion::Text);
    }

    #[test]
    fn well_formed_row_passes() {
        let schema = claims_schema().unwrap();
        assert!(schema.validate(&chunk_with(&[])).is_empty());
    }

    #[test]
    fn negative_covered_amount_is_the_only_violation() {
        let schema = claims_schema().unwrap();
        let v = schema.validate(&chunk_with(&[("COVERED_AMOUNT", "-10")]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].column, "COVERED_AMOUNT");
        assert_eq!(v[0].error, serde_json::json!(-10.0));
    }

    #[test]
    fn missing_employer_id_is_reported() {
        let schema = claims_schema().unwrap();
        let v = schema.validate(&chunk_with(&[(EMPLOYER_ID, "")]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].check, NOT_NULLABLE);
    }

    #[test]
    fn hyphen_allowed_only_in_patient_id() {
        let schema = claims_schema().unwrap();
        assert!(schema.validate(&chunk_with(&[(UNIQUE_PATIENT_ID, "A-B-C")])).is_empty());

        let v = schema.validate(&chunk_with(&[("CLAIM_NUMBER", "CL-1")]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].column, "CLAIM_NUMBER");
        assert_eq!(v[0].error, "CL-1");
    }

    #[test]
    fn unparseable_service_date_becomes_null_not_violation() {
        let schema = claims_schema().unwrap();
        assert!(schema.validate(&chunk_with(&[("SERVICE_START_DATE", "yesterday")])).is_empty());
    }

    #[test]
    fn code_date_columns_reject_slashes() {
        let schema = claims_schema().unwrap();
        let v = schema.validate(&chunk_with(&[("CLAIM_RECEIVED_DATE", "01/02/2023")]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].column, "CLAIM_RECEIVED_DATE");
    }
}
