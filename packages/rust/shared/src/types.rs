//! Core domain records persisted in the knowledge store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::naming::{action_from_method, normalize_key, tokens_for};

/// Action label of a step whose block matched no classification rule.
pub const NOTE_ACTION: &str = "note";

// ---------------------------------------------------------------------------
// DocTriple / DocFunctionRecord
// ---------------------------------------------------------------------------

/// A (factory, method) pair observed on a documentation page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocTriple {
    /// API type name, e.g. `HybridShapeFactory`.
    pub factory: String,
    /// Creation method name, e.g. `AddNewPlaneOffset`.
    pub method: String,
    /// Page where the pair was observed.
    pub url: String,
}

impl DocTriple {
    pub fn new(factory: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            method: method.into(),
            url: url.into(),
        }
    }
}

/// One row of `doc_functions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocFunctionRecord {
    /// Lowercase `factory.method`; unique, first-seen wins.
    pub function_key: String,
    pub factory: String,
    pub method: String,
    /// snake_case label derived from the method, e.g. `create_plane_offset`.
    pub action_label: String,
    /// Page where the function was first observed.
    pub doc_url: String,
    /// Sorted lowercase word tokens of factory + method.
    pub tokens: Vec<String>,
}

impl From<&DocTriple> for DocFunctionRecord {
    fn from(triple: &DocTriple) -> Self {
        Self {
            function_key: normalize_key(&triple.factory, &triple.method),
            factory: triple.factory.clone(),
            method: triple.method.clone(),
            action_label: action_from_method(&triple.method),
            doc_url: triple.url.clone(),
            tokens: tokens_for(&triple.factory, &triple.method),
        }
    }
}

// ---------------------------------------------------------------------------
// HarvestedStep
// ---------------------------------------------------------------------------

/// One row of `harvested_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedStep {
    /// 1-based position in discovery order within one harvest run.
    pub step_id: u32,
    /// Matched rule key, or [`NOTE_ACTION`].
    pub action_label: String,
    /// Source line chosen to represent the step.
    pub description: String,
    /// Non-empty extracted parameters.
    pub params: Map<String, Value>,
    /// Entity identifiers created by the step.
    pub produces: Vec<String>,
    /// Entity identifiers consulted but not created by the step.
    pub references: Vec<String>,
    /// Reserved for code generation; always `None` at harvest time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_lang: Option<String>,
    /// Reserved for code generation; always `None` at harvest time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
}

impl HarvestedStep {
    /// Whether this step is a placeholder for an unrecognized block.
    pub fn is_note(&self) -> bool {
        self.action_label == NOTE_ACTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_from_triple_derives_key_label_and_tokens() {
        let triple = DocTriple::new(
            "HybridShapeFactory",
            "AddNewPlaneOffset",
            "http://docs.example.com/online/interfaces/HybridShapeFactory.htm",
        );
        let record = DocFunctionRecord::from(&triple);

        assert_eq!(record.function_key, "hybridshapefactory.addnewplaneoffset");
        assert_eq!(record.action_label, "create_plane_offset");
        assert_eq!(record.doc_url, triple.url);
        assert!(record.tokens.contains(&"plane".to_string()));
        assert!(!record.tokens.contains(&"add".to_string()));
    }

    #[test]
    fn step_serialization_omits_reserved_fields() {
        let step = HarvestedStep {
            step_id: 1,
            action_label: NOTE_ACTION.into(),
            description: "Open the part design workbench".into(),
            params: Map::new(),
            produces: vec![],
            references: vec![],
            code_lang: None,
            generated_code: None,
        };
        let json = serde_json::to_string(&step).expect("serialize");
        assert!(!json.contains("generated_code"));
        assert!(step.is_note());
    }
}
