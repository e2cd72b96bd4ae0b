//! Versioned trial field schema.
//!
//! Exactly one schema definition exists per format version; it is passed
//! into normalization explicitly so field names and types are declared
//! in a single place rather than re-validated ad hoc downstream.

use serde::{Deserialize, Serialize};

/// Target type of a per-trial scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Boolean outcome flag (nonzero in the raw file means `true`).
    Bool,
    /// Integer identifier.
    Int,
    /// Floating-point measurement, timestamps included (seconds).
    Float,
    /// Categorical code, stored as its string rendering so external
    /// code tables can be applied by key.
    Category,
}

/// One declared per-trial field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Required fields must be present in every raw recording.
    pub required: bool,
}

impl FieldSpec {
    fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// The declared per-trial field set for one recording format version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSchema {
    version: u32,
    fields: Vec<FieldSpec>,
}

impl TrialSchema {
    /// Schema of the current recording format.
    ///
    /// `timeoutcome` only appears in sessions recorded after the outcome
    /// event was added to the rig, so it is optional.
    pub fn v1() -> Self {
        use FieldKind::*;
        Self {
            version: 1,
            fields: vec![
                FieldSpec::required("trialnumber", Int),
                FieldSpec::required("fractals", Category),
                FieldSpec::required("targAngle", Float),
                FieldSpec::required("targAmp", Float),
                FieldSpec::required("goodtrial", Bool),
                FieldSpec::required("fixreq", Bool),
                FieldSpec::required("datapixxtime", Float),
                FieldSpec::required("trialstarttime", Float),
                FieldSpec::required("timefpon", Float),
                FieldSpec::required("timefpoff", Float),
                FieldSpec::required("windowchosen", Bool),
                FieldSpec::required("timetargetoff", Float),
                FieldSpec::required("feedid", Category),
                FieldSpec::required("TrialTypeSave", Category),
                FieldSpec::required("timefpabort", Float),
                FieldSpec::required("repeatflag", Bool),
                FieldSpec::required("monkeynotinitiated", Bool),
                FieldSpec::optional("timeoutcome", Float),
            ],
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Default for TrialSchema {
    fn default() -> Self {
        Self::v1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_declares_trialnumber() {
        let schema = TrialSchema::v1();
        let field = schema.field("trialnumber").unwrap();
        assert_eq!(field.kind, FieldKind::Int);
        assert!(field.required);
    }

    #[test]
    fn test_v1_timeoutcome_is_optional() {
        let schema = TrialSchema::v1();
        assert!(!schema.field("timeoutcome").unwrap().required);
    }

    #[test]
    fn test_schema_round_trips_through_json() {
        let schema = TrialSchema::v1();
        let json = serde_json::to_string(&schema).unwrap();
        let back: TrialSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version(), schema.version());
        assert_eq!(back.fields().len(), schema.fields().len());
    }
}
