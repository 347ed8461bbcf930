//! 📐 The partner file's header, declared once.
//!
//! Every output column is a `(name, rule)` pair and belongs to exactly one of
//! four groups. The groups always appear in the same order, so the header is
//! the same from run to run no matter who touched the passthrough list.
//!
//! The column names are the partner's. Some of them have spaces. One of them
//! ends in an apostrophe. The importer on the other side is locked, and so is
//! this list. 🔒

/// Education history slots flattened into the file.
pub const MAX_EDUCATION_SLOTS: usize = 9;

/// 📞 Discriminator values the custom and address columns select by.
pub const MOBILE: &str = "MOBILE";
pub const HOME: &str = "HOME";
pub const OTHER: &str = "OTHER";

/// 🎖️ The affiliation that flips `demographics_affiliation` to true.
pub const PHI_THETA_KAPPA: &str = "Phi Theta Kappa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGroup {
    Passthrough,
    Custom,
    Address,
    Education,
}

impl ColumnGroup {
    pub const ALL: [ColumnGroup; 4] = [
        ColumnGroup::Passthrough,
        ColumnGroup::Custom,
        ColumnGroup::Address,
        ColumnGroup::Education,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    City,
    StateCode,
    ZipCode,
    Country,
    EffectiveDate,
    ExpirationDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EducationField {
    SchoolCode,
    InstitutionName,
    MonthEntered,
    YearEntered,
    MonthDeparted,
    YearDeparted,
    DegreeEarnedBeforeEnrolling,
    DegreeEarned,
    Major,
}

impl EducationField {
    /// Per-slot order in the header.
    pub const ALL: [EducationField; 9] = [
        EducationField::SchoolCode,
        EducationField::InstitutionName,
        EducationField::MonthEntered,
        EducationField::YearEntered,
        EducationField::MonthDeparted,
        EducationField::YearDeparted,
        EducationField::DegreeEarnedBeforeEnrolling,
        EducationField::DegreeEarned,
        EducationField::Major,
    ];

    /// 🏷️ Header name for this field in slot `slot` (1-based).
    pub fn column_name(self, slot: usize) -> String {
        let stem = match self {
            EducationField::SchoolCode => "applicationEducationHistoryRecords_schoolCode",
            EducationField::InstitutionName => {
                "applicationEducationHistoryRecords_educationInstitutionName"
            }
            EducationField::MonthEntered => "Month_Entered",
            EducationField::YearEntered => "Year_Entered",
            EducationField::MonthDeparted => "Month_Departed",
            EducationField::YearDeparted => "Year_Departed",
            EducationField::DegreeEarnedBeforeEnrolling => {
                "applicationEducationHistory_degreeEarnedBeforeEnrolling"
            }
            EducationField::DegreeEarned => "applicationEducationHistory_degreeEarned",
            EducationField::Major => "applicationEducationHistoryRecords_major",
        };
        format!("{stem}{slot}")
    }
}

/// 🧮 How one output cell is computed from a joined row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    /// Copy a source column verbatim (same name or renamed).
    Copy { source: String },
    Constant(&'static str),
    MobilePhone,
    HomeEmail,
    PhiThetaKappa,
    Signature,
    PermanentAddressLines,
    PermanentAddress(AddressField),
    CurrentAddressLines,
    CurrentAddress(AddressField),
    Education { slot: usize, field: EducationField },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub group: ColumnGroup,
    pub rule: ColumnRule,
}

impl ColumnSpec {
    fn new(name: impl Into<String>, group: ColumnGroup, rule: ColumnRule) -> Self {
        Self {
            name: name.into(),
            group,
            rule,
        }
    }
}

/// 📋 The ordered column list of the partner file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    columns: Vec<ColumnSpec>,
}

impl OutputSchema {
    /// 🏗️ The university CMS layout with the given passthrough columns up front.
    pub fn university_cms(passthrough_columns: &[String]) -> Self {
        let mut columns: Vec<ColumnSpec> = passthrough_columns
            .iter()
            .map(|name| {
                ColumnSpec::new(
                    name.clone(),
                    ColumnGroup::Passthrough,
                    ColumnRule::Copy {
                        source: name.clone(),
                    },
                )
            })
            .collect();

        columns.extend(custom_columns());
        columns.extend(address_columns());
        columns.extend(education_columns());

        // -- 🧹 group order is the contract, whatever order the pushes happened in
        columns.sort_by_key(|c| ColumnGroup::ALL.iter().position(|g| *g == c.group));
        Self { columns }
    }

    /// The passthrough list used when the runtime config doesn't override it.
    pub fn default_passthrough_columns() -> Vec<String> {
        [
            "applicationId",
            "applicantId",
            "applicationStatus",
            "submittedDate",
            "personalData_firstName",
            "personalData_middleName",
            "personalData_lastName",
            "personalData_preferredName",
            "personalData_birthDate",
            "personalData_gender",
            "demographics_ethnicity",
            "demographics_race",
            "demographics_citizenshipStatus",
            "demographics_countryOfCitizenship",
            "academicPlan_programCode",
            "academicPlan_degreeLevel",
            "academicPlan_studentType",
            "militaryAffiliation_isMilitary",
            "militaryAffiliation_branch",
            "additionalQuestions_felonyConviction",
            "additionalQuestions_previouslyAttended",
            "additionalQuestions_agreeToTerms",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn group(&self, group: ColumnGroup) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(move |c| c.group == group)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn custom_columns() -> Vec<ColumnSpec> {
    use ColumnGroup::Custom;
    let copy = |source: &str| ColumnRule::Copy {
        source: source.to_string(),
    };
    vec![
        ColumnSpec::new("campuscode_online", Custom, ColumnRule::Constant("Online")),
        ColumnSpec::new("phones_phoneNumber", Custom, ColumnRule::MobilePhone),
        ColumnSpec::new("phones_doNotText", Custom, ColumnRule::Constant("Yes")),
        ColumnSpec::new("emails_emailAddress", Custom, ColumnRule::HomeEmail),
        ColumnSpec::new("demographics_affiliation", Custom, ColumnRule::PhiThetaKappa),
        ColumnSpec::new(
            "additionalQuestions_signature",
            Custom,
            ColumnRule::Signature,
        ),
        ColumnSpec::new("payment_waived", Custom, ColumnRule::Constant("Waived")),
        ColumnSpec::new(
            "militaryAffiliation_plannedBenefits",
            Custom,
            copy("militaryAffiliation_educationBenefit"),
        ),
        ColumnSpec::new("startTerm", Custom, copy("academicPlan_enrollmentTerm")),
        ColumnSpec::new(
            "additionalQuestions_Disciplinary_Notification_Statement__c'",
            Custom,
            copy("additionalQuestions_disciplinaryNotificationStatementConfirmation"),
        ),
    ]
}

fn address_columns() -> Vec<ColumnSpec> {
    use AddressField::*;
    use ColumnGroup::Address;
    vec![
        ColumnSpec::new("Permanent address", Address, ColumnRule::PermanentAddressLines),
        ColumnSpec::new(
            "Permanent address - City",
            Address,
            ColumnRule::PermanentAddress(City),
        ),
        ColumnSpec::new(
            "Permanent address - State",
            Address,
            ColumnRule::PermanentAddress(StateCode),
        ),
        ColumnSpec::new(
            "Permanent address - Zip",
            Address,
            ColumnRule::PermanentAddress(ZipCode),
        ),
        ColumnSpec::new(
            "Permanent address - Country",
            Address,
            ColumnRule::PermanentAddress(Country),
        ),
        ColumnSpec::new(
            "Alternate address available",
            Address,
            ColumnRule::Copy {
                source: "receiveMailAtDifferentAddress".to_string(),
            },
        ),
        ColumnSpec::new(
            "Current address - Address",
            Address,
            ColumnRule::CurrentAddressLines,
        ),
        ColumnSpec::new(
            "Current address - City",
            Address,
            ColumnRule::CurrentAddress(City),
        ),
        ColumnSpec::new(
            "Current address - State",
            Address,
            ColumnRule::CurrentAddress(StateCode),
        ),
        ColumnSpec::new(
            "Current address - Zip",
            Address,
            ColumnRule::CurrentAddress(ZipCode),
        ),
        ColumnSpec::new(
            "Current address - Country",
            Address,
            ColumnRule::CurrentAddress(Country),
        ),
        ColumnSpec::new(
            "Alternate address from date",
            Address,
            ColumnRule::CurrentAddress(EffectiveDate),
        ),
        ColumnSpec::new(
            "Alternate address to date",
            Address,
            ColumnRule::CurrentAddress(ExpirationDate),
        ),
    ]
}

fn education_columns() -> Vec<ColumnSpec> {
    (1..=MAX_EDUCATION_SLOTS)
        .flat_map(|slot| {
            EducationField::ALL.into_iter().map(move |field| {
                ColumnSpec::new(
                    field.column_name(slot),
                    ColumnGroup::Education,
                    ColumnRule::Education { slot, field },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_header_has_the_right_headcount() {
        let passthrough = OutputSchema::default_passthrough_columns();
        let schema = OutputSchema::university_cms(&passthrough);

        assert_eq!(schema.group(ColumnGroup::Passthrough).count(), 22);
        assert_eq!(schema.group(ColumnGroup::Custom).count(), 10);
        assert_eq!(schema.group(ColumnGroup::Address).count(), 13);
        assert_eq!(schema.group(ColumnGroup::Education).count(), 81);
        assert_eq!(schema.len(), 22 + 10 + 13 + 81);
    }

    #[test]
    fn the_one_where_groups_never_cut_in_line() {
        let schema = OutputSchema::university_cms(&["applicationId".to_string()]);
        let positions: Vec<usize> = schema
            .columns()
            .iter()
            .map(|c| ColumnGroup::ALL.iter().position(|g| *g == c.group).unwrap_or(99))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(schema.columns()[0].name, "applicationId");
    }

    #[test]
    fn the_one_where_the_apostrophe_survives_the_audit() {
        let schema = OutputSchema::university_cms(&[]);
        assert!(
            schema
                .column_names()
                .iter()
                .any(|n| n == "additionalQuestions_Disciplinary_Notification_Statement__c'")
        );
    }

    #[test]
    fn the_one_where_education_slots_count_from_one() {
        let names = OutputSchema::university_cms(&[]).column_names();
        assert!(names.contains(&"applicationEducationHistoryRecords_schoolCode1".to_string()));
        assert!(names.contains(&"applicationEducationHistoryRecords_major9".to_string()));
        assert!(!names.contains(&"Month_Entered0".to_string()));
        assert!(!names.contains(&"Month_Entered10".to_string()));
    }
}
