//! 🔄 Transforms: where nested applications become flat partner rows 🎭
//!
//! 🎬 COLD OPEN, INT. REGISTRAR'S BASEMENT, THE NIGHT BEFORE THE IMPORT WINDOW
//!
//! The partner's importer accepts exactly one thing: a CSV with a header it
//! memorised in 2017. Our lake holds rows with JSON arrays folded into their
//! cells. Somebody has to do the unfolding. This module is that somebody.
//!
//! ## Layout 📐
//!
//! ```text
//!   applicant rows ─┐
//!                   ├─▶ join ─▶ eligible? ─▶ effective time ─▶ RowFilter ─▶ OutputSchema ─▶ OutputTable
//!   application rows┘
//! ```
//!
//! - [`collections`] unfolds the embedded JSON arrays.
//! - [`normalize`] scrubs individual values.
//! - [`schema`] declares the partner header.
//! - [`university_cms`] runs the whole pass above.
//!
//! [`TransformerRegistry`] decides which transformer a run gets, keyed by
//! flow and tenant. Ask for something it doesn't know and it says so, loudly,
//! before any data is read. 🦆

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::SourceRow;
use crate::response::TransformationResponse;
use crate::window::RowFilter;

pub mod collections;
pub mod normalize;
pub mod schema;
pub mod university_cms;

pub use schema::OutputSchema;
pub use university_cms::UniversityCmsApplicationTransformer;

/// 🧯 What happens when one row's computation blows up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The row becomes a `TransformError`, the batch keeps going.
    #[default]
    Isolate,
    /// The first bad row fails the whole transform.
    FailFast,
}

/// 🗂️ Which data flow a transformer serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    InstitutionApplication,
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowType::InstitutionApplication => write!(f, "institution_application"),
        }
    }
}

/// 📥 The two tables a transformer reads, already loaded.
#[derive(Debug, Clone, Default)]
pub struct TransformInput {
    pub applicants: Vec<SourceRow>,
    pub applications: Vec<SourceRow>,
}

/// 🔌 The seam every transformer plugs into.
pub trait DataTransformer: std::fmt::Debug {
    /// One full pass. `Err` only for failures that abort the batch.
    fn transform(
        &self,
        input: &TransformInput,
        filter: &dyn RowFilter,
    ) -> Result<TransformationResponse>;

    /// Stem of the delivered file's name (`<stem>-<timestamp>.csv`).
    fn output_stem(&self) -> &'static str;
}

/// 🎭 Every transformer the registry can hand out.
#[derive(Debug)]
pub enum TransformerBackend {
    UniversityCmsApplication(UniversityCmsApplicationTransformer),
}

impl DataTransformer for TransformerBackend {
    fn transform(
        &self,
        input: &TransformInput,
        filter: &dyn RowFilter,
    ) -> Result<TransformationResponse> {
        match self {
            TransformerBackend::UniversityCmsApplication(t) => t.transform(input, filter),
        }
    }

    fn output_stem(&self) -> &'static str {
        match self {
            TransformerBackend::UniversityCmsApplication(t) => t.output_stem(),
        }
    }
}

/// 🧰 Knobs a transformer is built with.
#[derive(Debug, Clone)]
pub struct TransformerSettings {
    pub failure_mode: FailureMode,
    pub passthrough_columns: Vec<String>,
}

impl Default for TransformerSettings {
    fn default() -> Self {
        Self {
            failure_mode: FailureMode::default(),
            passthrough_columns: OutputSchema::default_passthrough_columns(),
        }
    }
}

type Constructor = fn(&TransformerSettings) -> TransformerBackend;

/// 📇 `(flow, tenant)` → transformer constructor.
#[derive(Debug, Clone)]
pub struct TransformerRegistry {
    entries: Vec<(FlowType, &'static str, Constructor)>,
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self {
            entries: vec![(
                FlowType::InstitutionApplication,
                "UNIVERSITY",
                build_university_cms,
            )],
        }
    }
}

fn build_university_cms(settings: &TransformerSettings) -> TransformerBackend {
    TransformerBackend::UniversityCmsApplication(UniversityCmsApplicationTransformer::new(
        OutputSchema::university_cms(&settings.passthrough_columns),
        settings.failure_mode,
    ))
}

impl TransformerRegistry {
    /// 🔍 Looks up and builds the transformer. Tenant codes match case-insensitively.
    pub fn resolve(
        &self,
        flow: FlowType,
        tenant_code: &str,
        settings: &TransformerSettings,
    ) -> Result<TransformerBackend> {
        let Some((_, tenant, constructor)) = self
            .entries
            .iter()
            .find(|(f, t, _)| *f == flow && t.eq_ignore_ascii_case(tenant_code))
        else {
            bail!(
                "💀 No transformer registered for flow '{flow}' and tenant '{tenant_code}'. \
                 We checked the whole rolodex. Twice."
            );
        };
        info!("🧭 resolved transformer for flow '{flow}' and tenant '{tenant}'");
        Ok(constructor(settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_university_gets_its_transformer() -> Result<()> {
        let registry = TransformerRegistry::default();
        let transformer = registry.resolve(
            FlowType::InstitutionApplication,
            "university",
            &TransformerSettings::default(),
        )?;
        assert!(matches!(
            transformer,
            TransformerBackend::UniversityCmsApplication(_)
        ));
        assert_eq!(transformer.output_stem(), "application");
        Ok(())
    }

    #[test]
    fn the_one_where_a_stranger_asks_for_a_transformer() {
        let registry = TransformerRegistry::default();
        let err = registry
            .resolve(
                FlowType::InstitutionApplication,
                "COLLEGE",
                &TransformerSettings::default(),
            )
            .expect_err("💀 an unknown tenant should not get a transformer");
        let message = err.to_string();
        assert!(message.contains("COLLEGE"));
        assert!(message.contains("institution_application"));
    }

    #[test]
    fn the_one_where_failure_mode_reads_from_config() -> Result<()> {
        #[derive(Deserialize)]
        struct Holder {
            mode: FailureMode,
        }
        let holder: Holder = toml::from_str(r#"mode = "fail_fast""#)?;
        assert_eq!(holder.mode, FailureMode::FailFast);
        assert_eq!(FailureMode::default(), FailureMode::Isolate);
        Ok(())
    }
}
