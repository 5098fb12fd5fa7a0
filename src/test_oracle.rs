//! Canned type oracle for tests.
//!
//! Structural queries are answered from a fixed table keyed by identifier.
//! Asking about an identifier the probe code never declares is an error, so
//! tests also catch probes that were not emitted. Type errors are "found" by
//! searching the probe text for a needle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::diagnostic::Severity;
use crate::oracle::{OracleDiagnostic, OracleError, SourceUnit, TypeOracle, TypeShape};

pub(crate) const ROOT_TYPE: &str = "RootBindingContext<ViewModel>";
pub(crate) const CONTEXT_MEMBERS: [&str; 5] = ["$data", "$parent", "$parents", "$root", "$rawData"];

#[derive(Debug)]
pub(crate) struct CannedUnit {
    pub name: String,
    pub text: String,
    pub revision: usize,
}

#[derive(Default)]
pub(crate) struct CannedOracle {
    shapes: BTreeMap<String, TypeShape>,
    errors: Vec<(String, u32, String)>,
    unreachable: bool,
    pub compiles: AtomicUsize,
}

impl CannedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, shape: TypeShape) -> Self {
        self.shapes.insert(identifier.to_string(), shape);
        self
    }

    pub fn known(self, identifier: &str, type_id: &str, members: &[&str]) -> Self {
        self.with(identifier, TypeShape::known(type_id, members))
    }

    /// A context `context_<n>` of type `type_id` whose data has `data`.
    pub fn context(self, context: usize, type_id: &str, data: &[&str]) -> Self {
        let mut members: Vec<&str> = CONTEXT_MEMBERS.to_vec();
        members.extend_from_slice(data);
        self.known(&format!("context_{}", context), type_id, &CONTEXT_MEMBERS)
            .known(&format!("scope_context_{}", context), "scope", &members)
    }

    /// Reports `message` wherever `needle` first occurs in the probe text.
    pub fn error_at(mut self, needle: &str, code: u32, message: &str) -> Self {
        self.errors
            .push((needle.to_string(), code, message.to_string()));
        self
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

fn declares(text: &str, identifier: &str) -> bool {
    text.contains(&format!("const {} ", identifier))
        || text.contains(&format!("const {}:", identifier))
}

impl TypeOracle for CannedOracle {
    type Unit = CannedUnit;

    fn compile(
        &self,
        source: &SourceUnit,
        previous: Option<CannedUnit>,
    ) -> Result<CannedUnit, OracleError> {
        if self.unreachable {
            return Err(OracleError::Unreachable("canned oracle is offline".to_string()));
        }
        if let Some(previous) = previous {
            if previous.revision + 1 != source.revision || !source.text.starts_with(&previous.text)
            {
                return Err(OracleError::Protocol(format!(
                    "revision {} does not extend revision {}",
                    source.revision, previous.revision
                )));
            }
        }
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(CannedUnit {
            name: source.name.clone(),
            text: source.text.clone(),
            revision: source.revision,
        })
    }

    fn inspect(
        &self,
        unit: &CannedUnit,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, TypeShape>, OracleError> {
        identifiers
            .iter()
            .map(|identifier| {
                if !declares(&unit.text, identifier) {
                    return Err(OracleError::MissingIdentifier {
                        unit: unit.name.clone(),
                        identifier: identifier.clone(),
                    });
                }
                let shape = self
                    .shapes
                    .get(identifier)
                    .cloned()
                    .unwrap_or(TypeShape::Dynamic);
                Ok((identifier.clone(), shape))
            })
            .collect()
    }

    fn diagnostics(&self, unit: &CannedUnit) -> Result<Vec<OracleDiagnostic>, OracleError> {
        Ok(self
            .errors
            .iter()
            .filter_map(|(needle, code, message)| {
                let start = unit.text.find(needle.as_str())?;
                Some(OracleDiagnostic {
                    file: unit.name.clone(),
                    start: start as u32,
                    length: needle.len() as u32,
                    message: message.clone(),
                    code: *code,
                    severity: Severity::Error,
                })
            })
            .collect())
    }
}
