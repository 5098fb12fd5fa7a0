//! Type oracle interface.
//!
//! The oracle is an external static type checker. The engine hands it probe
//! source text, asks for the structural type of named values, and collects the
//! type errors it finds in the probe text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::diagnostic::Severity;

/// One revision of a view's probe code, as submitted for compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub name: String,
    pub text: String,
    pub revision: usize,
}

/// What the oracle knows about the static type of one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeShape {
    /// `type_id` is the oracle's canonical type text; equal ids are equal types.
    #[serde(rename_all = "camelCase")]
    Known {
        type_id: String,
        members: Vec<String>,
    },
    /// `any`, `unknown`, or otherwise not narrowable.
    Dynamic,
}

impl TypeShape {
    pub fn known(type_id: &str, members: &[&str]) -> Self {
        TypeShape::Known {
            type_id: type_id.to_string(),
            members: members.iter().map(|member| member.to_string()).collect(),
        }
    }

    pub fn type_id(&self) -> Option<&str> {
        match self {
            TypeShape::Known { type_id, .. } => Some(type_id),
            TypeShape::Dynamic => None,
        }
    }

    pub fn members(&self) -> &[String] {
        match self {
            TypeShape::Known { members, .. } => members,
            TypeShape::Dynamic => &[],
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, TypeShape::Dynamic)
    }
}

/// A type error in probe code, positioned in that code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleDiagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message: String,
    pub code: u32,
    pub severity: Severity,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("type oracle unreachable: {0}")]
    Unreachable(String),
    #[error("unknown compiled unit '{0}'")]
    UnknownUnit(String),
    #[error("identifier '{identifier}' is not declared in '{unit}'")]
    MissingIdentifier { unit: String, identifier: String },
    #[error("type oracle protocol error: {0}")]
    Protocol(String),
}

/// Static type oracle shared by every view of a run.
///
/// Calls are blocking from the engine's side; an implementation backed by a
/// remote checker waits inside these methods. `compile` receives the unit of
/// the previous revision so the checker can reuse its work.
pub trait TypeOracle: Sync {
    type Unit: Send;

    fn compile(
        &self,
        source: &SourceUnit,
        previous: Option<Self::Unit>,
    ) -> Result<Self::Unit, OracleError>;

    /// Shape of each requested identifier. Every requested identifier is
    /// present in the result.
    fn inspect(
        &self,
        unit: &Self::Unit,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, TypeShape>, OracleError>;

    fn diagnostics(&self, unit: &Self::Unit) -> Result<Vec<OracleDiagnostic>, OracleError>;
}
