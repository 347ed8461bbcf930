//! 🎓 University CMS application transformer.
//!
//! 🎬 INT. PARTNER IMPORT QUEUE, 6:00 AM
//!
//! The partner's CMS wakes up, stretches, and reaches for a CSV. It expects
//! one row per submitted application, 126 columns wide, the same header as
//! yesterday and the day before. This is where that row gets built.
//!
//! One pass, no state between calls:
//!
//! 1. left-join applications with applicants on `applicantId`
//! 2. keep only `Submitted` applications
//! 3. stamp the effective time (later of the two `time` columns)
//! 4. ask the [`RowFilter`] whether the row belongs to this run
//! 5. evaluate every [`ColumnRule`] of the schema, group by group
//! 6. rewrite booleans to `Yes` / `No` across the whole table
//!
//! Step 3 is the only place a row can fail. What happens next depends on the
//! [`FailureMode`]. Bad embedded JSON is never a failure, just empty cells. 🦆

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::common::{OutputTable, SourceRow, render_cell};
use crate::response::{TransformError, TransformationResponse};
use crate::transforms::collections::{
    Address, EducationHistory, Email, EmbeddedCollection, Phone,
};
use crate::transforms::normalize::{
    DatePart, canonicalize_boolean, date_component, format_phone_number, join_address_lines,
    school_code_suffix, text_of,
};
use crate::transforms::schema::{
    AddressField, ColumnGroup, ColumnRule, EducationField, HOME, MAX_EDUCATION_SLOTS, MOBILE,
    OTHER, OutputSchema, PHI_THETA_KAPPA,
};
use crate::transforms::{DataTransformer, FailureMode, TransformInput};
use crate::window::{RowFilter, effective_instant};

const APPLICANT_ID: &str = "applicantId";
const APPLICATION_ID: &str = "applicationId";
const APPLICATION_STATUS: &str = "applicationStatus";
const SUBMITTED: &str = "Submitted";
const TIME: &str = "time";
const TIME_APPLICATION: &str = "time_application";
const APPLICANT_SUFFIX: &str = "_applicant";
const DIFFERENT_MAILING_ADDRESS: &str = "receiveMailAtDifferentAddress";

#[derive(Debug, Clone)]
pub struct UniversityCmsApplicationTransformer {
    schema: OutputSchema,
    failure_mode: FailureMode,
}

impl UniversityCmsApplicationTransformer {
    pub fn new(schema: OutputSchema, failure_mode: FailureMode) -> Self {
        Self {
            schema,
            failure_mode,
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    /// 🧱 One output record, groups concatenated in header order.
    fn assemble(&self, row: &SourceRow) -> Vec<Value> {
        let parsed = ParsedRow::new(row);
        ColumnGroup::ALL
            .iter()
            .flat_map(|group| {
                self.schema
                    .group(*group)
                    .map(|column| parsed.evaluate(&column.rule))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl DataTransformer for UniversityCmsApplicationTransformer {
    fn transform(
        &self,
        input: &TransformInput,
        filter: &dyn RowFilter,
    ) -> Result<TransformationResponse> {
        let mut table = OutputTable::new(self.schema.column_names());

        if input.applications.is_empty() {
            info!("📭 No data to transform");
            return Ok(TransformationResponse::empty(table));
        }

        let joined = left_join(&input.applications, &input.applicants);
        let joined_count = joined.len();
        let eligible: Vec<SourceRow> = joined
            .into_iter()
            .filter(|row| row.str_field(APPLICATION_STATUS) == Some(SUBMITTED))
            .collect();
        debug!(
            "🔗 joined {joined_count} rows, {} of them submitted",
            eligible.len()
        );

        let mut errors = Vec::new();
        let mut in_window = Vec::with_capacity(eligible.len());
        for mut row in eligible {
            match stamp_effective_time(&mut row) {
                Ok(effective) => {
                    if filter.keep(&row, effective) {
                        in_window.push(row);
                    }
                }
                Err(e) => match self.failure_mode {
                    FailureMode::Isolate => {
                        let failed = describe_row(&row);
                        warn!("⚠️ {failed} could not be timestamped, setting it aside: {e:#}");
                        errors.push(TransformError::new(
                            failed,
                            &e,
                            "Could not compute the effective time",
                        ));
                    }
                    FailureMode::FailFast => {
                        return Err(e.context(format!(
                            "💀 {} could not be timestamped and failure mode is fail_fast",
                            describe_row(&row)
                        )));
                    }
                },
            }
        }

        let total_count = in_window.len() + errors.len();
        info!(
            "📊 Number of applications to transform: {}",
            in_window.len()
        );
        if in_window.is_empty() {
            info!("📭 No data to transform");
            return Ok(TransformationResponse::new(table, errors, total_count));
        }

        for row in &in_window {
            table.push_row(self.assemble(row))?;
        }
        table.map_cells(canonicalize_boolean);

        let application_ids: Vec<String> = table
            .column_values(APPLICATION_ID)
            .unwrap_or_default()
            .into_iter()
            .map(render_cell)
            .collect();
        info!(
            "✅ Number of completed application transforms: {}",
            table.len()
        );
        info!("🪪 ApplicationIds: {application_ids:?}");

        Ok(TransformationResponse::new(table, errors, total_count))
    }

    fn output_stem(&self) -> &'static str {
        "application"
    }
}

/// 🔗 Relational left join on `applicantId`.
///
/// Every application survives. An application with several matching
/// applicants shows up once per match. Applicant columns whose names are
/// already used by the application table get the `_applicant` suffix, and the
/// join key itself isn't copied twice.
fn left_join(applications: &[SourceRow], applicants: &[SourceRow]) -> Vec<SourceRow> {
    let application_columns: HashSet<&str> = applications
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut applicants_by_id: HashMap<String, Vec<&SourceRow>> = HashMap::new();
    for applicant in applicants {
        if let Some(key) = join_key(applicant) {
            applicants_by_id.entry(key).or_default().push(applicant);
        }
    }

    let mut joined = Vec::with_capacity(applications.len());
    for application in applications {
        match join_key(application).and_then(|key| applicants_by_id.get(&key)) {
            Some(matches) => {
                for applicant in matches {
                    joined.push(merge_applicant(application, applicant, &application_columns));
                }
            }
            None => joined.push(application.clone()),
        }
    }
    joined
}

fn join_key(row: &SourceRow) -> Option<String> {
    row.value(APPLICANT_ID).map(Value::to_string)
}

fn merge_applicant(
    application: &SourceRow,
    applicant: &SourceRow,
    application_columns: &HashSet<&str>,
) -> SourceRow {
    let mut merged = application.clone();
    for (name, value) in applicant.fields() {
        if name == APPLICANT_ID {
            continue;
        }
        let target = if application_columns.contains(name.as_str()) {
            format!("{name}{APPLICANT_SUFFIX}")
        } else {
            name.clone()
        };
        merged.insert(target, value.clone());
    }
    merged
}

/// ⏱️ Keeps the application's own `time` as `time_application`, then
/// overwrites `time` with the effective instant.
fn stamp_effective_time(row: &mut SourceRow) -> Result<DateTime<Utc>> {
    let applicant_time = format!("{TIME}{APPLICANT_SUFFIX}");
    let effective = effective_instant(row.get(TIME), row.get(&applicant_time))?;
    let original = row.get(TIME).cloned().unwrap_or(Value::Null);
    row.insert(TIME_APPLICATION, original);
    row.insert(TIME, Value::String(effective.to_rfc3339()));
    Ok(effective)
}

/// 🪪 Identifies a row in failure reports without dumping the applicant's life story.
fn describe_row(row: &SourceRow) -> String {
    let id = |name: &str| row.get(name).map(render_cell).unwrap_or_default();
    format!(
        "applicationId={} applicantId={}",
        id(APPLICATION_ID),
        id(APPLICANT_ID)
    )
}

/// 🪆 A joined row with its embedded collections decoded once.
struct ParsedRow<'a> {
    row: &'a SourceRow,
    phones: EmbeddedCollection<Phone>,
    emails: EmbeddedCollection<Email>,
    affiliations: EmbeddedCollection<String>,
    permanent_address: Option<Address>,
    current_address: Option<Address>,
    education: Vec<Option<EducationHistory>>,
}

impl<'a> ParsedRow<'a> {
    fn new(row: &'a SourceRow) -> Self {
        let addresses = EmbeddedCollection::<Address>::parse(row.get("addresses"));
        let wants_other_address = row.str_field(DIFFERENT_MAILING_ADDRESS) == Some("YES");
        let history = EmbeddedCollection::<EducationHistory>::parse(
            row.get("applicationEducationHistoryRecords"),
        );

        Self {
            row,
            phones: EmbeddedCollection::parse(row.get("phones")),
            emails: EmbeddedCollection::parse(row.get("emails")),
            affiliations: EmbeddedCollection::parse(row.get("demographics_affiliations")),
            permanent_address: addresses.first_of_type(HOME),
            current_address: if wants_other_address {
                addresses.first_of_type(OTHER)
            } else {
                None
            },
            education: (0..MAX_EDUCATION_SLOTS).map(|i| history.at(i)).collect(),
        }
    }

    fn evaluate(&self, rule: &ColumnRule) -> Value {
        match rule {
            ColumnRule::Copy { source } => self.row.get(source).cloned().unwrap_or(Value::Null),
            ColumnRule::Constant(constant) => Value::String((*constant).to_string()),
            ColumnRule::MobilePhone => string_or_null(
                self.phones
                    .first_of_type(MOBILE)
                    .and_then(|phone| phone.phone_number)
                    .as_ref()
                    .and_then(text_of)
                    .and_then(|raw| format_phone_number(&raw)),
            ),
            ColumnRule::HomeEmail => self
                .emails
                .first_of_type(HOME)
                .and_then(|email| email.email_address)
                .unwrap_or(Value::Null),
            ColumnRule::PhiThetaKappa => {
                Value::Bool(self.affiliations.iter().any(|a| a == PHI_THETA_KAPPA))
            }
            ColumnRule::Signature => {
                match (
                    self.row.str_field("personalData_firstName"),
                    self.row.str_field("personalData_lastName"),
                ) {
                    (Some(first), Some(last)) => Value::String(format!("{first} {last}")),
                    _ => Value::Null,
                }
            }
            ColumnRule::PermanentAddressLines => address_lines(self.permanent_address.as_ref()),
            ColumnRule::PermanentAddress(field) => {
                address_field(self.permanent_address.as_ref(), *field)
            }
            ColumnRule::CurrentAddressLines => address_lines(self.current_address.as_ref()),
            ColumnRule::CurrentAddress(field) => {
                address_field(self.current_address.as_ref(), *field)
            }
            ColumnRule::Education { slot, field } => slot
                .checked_sub(1)
                .and_then(|index| self.education.get(index))
                .and_then(Option::as_ref)
                .map(|entry| education_field(entry, *field))
                .unwrap_or(Value::Null),
        }
    }
}

fn string_or_null(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn address_lines(address: Option<&Address>) -> Value {
    address
        .map(|a| Value::String(join_address_lines(a.line1.as_ref(), a.line2.as_ref())))
        .unwrap_or(Value::Null)
}

fn address_field(address: Option<&Address>, field: AddressField) -> Value {
    let Some(address) = address else {
        return Value::Null;
    };
    let value = match field {
        AddressField::City => &address.city,
        AddressField::StateCode => &address.state_code,
        AddressField::ZipCode => &address.zip_code,
        AddressField::Country => &address.country,
        AddressField::EffectiveDate => &address.address_effective_date,
        AddressField::ExpirationDate => &address.address_expiration_date,
    };
    value.clone().unwrap_or(Value::Null)
}

fn education_field(entry: &EducationHistory, field: EducationField) -> Value {
    let raw = |v: &Option<Value>| v.clone().unwrap_or(Value::Null);
    match field {
        EducationField::SchoolCode => string_or_null(school_code_suffix(entry.school_code.as_ref())),
        EducationField::InstitutionName => raw(&entry.education_institution_name),
        EducationField::MonthEntered => {
            string_or_null(date_component(entry.hed_start_date.as_ref(), DatePart::Month))
        }
        EducationField::YearEntered => {
            string_or_null(date_component(entry.hed_start_date.as_ref(), DatePart::Year))
        }
        EducationField::MonthDeparted => {
            string_or_null(date_component(entry.hed_end_date.as_ref(), DatePart::Month))
        }
        EducationField::YearDeparted => {
            string_or_null(date_component(entry.hed_end_date.as_ref(), DatePart::Year))
        }
        EducationField::DegreeEarnedBeforeEnrolling => raw(&entry.degree_earned_before_enrolling),
        EducationField::DegreeEarned => raw(&entry.degree_earned),
        EducationField::Major => raw(&entry.major),
    }
}
