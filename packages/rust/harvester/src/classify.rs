//! Line classification against a [`RuleSet`].

use std::collections::BTreeSet;

use serde_json::Value;

use cadkb_shared::NOTE_ACTION;

use crate::entity::recognize;
use crate::rules::{Params, RuleSet};

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Matched rule's action label, or [`NOTE_ACTION`].
    pub action: String,
    /// Compacted parameters.
    pub params: Params,
    /// Entities created by the step, in source order.
    pub produces: Vec<String>,
    /// Entities consulted but not created, sorted case-insensitively.
    pub references: Vec<String>,
}

impl Classification {
    /// Placeholder for a step block that matched no rule.
    pub fn note() -> Self {
        Self {
            action: NOTE_ACTION.to_string(),
            params: Params::new(),
            produces: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn is_note(&self) -> bool {
        self.action == NOTE_ACTION
    }
}

/// Classify `line` with the first rule whose trigger matches.
///
/// Returns `None` when no rule triggers.
pub fn classify_line(rules: &RuleSet, line: &str) -> Option<Classification> {
    let rule = rules.first_match(line)?;
    let entities = recognize(line);

    let params = compact_params(rule.extract_params(line, &entities));
    let produces = rule.extract_produces(&entities);

    let produced: BTreeSet<&str> = produces.iter().map(String::as_str).collect();
    let mut references: Vec<String> = entities
        .into_iter()
        .map(|e| e.text)
        .filter(|text| !produced.contains(text.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    references.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

    Some(Classification {
        action: rule.action.to_string(),
        params,
        produces,
        references,
    })
}

/// Drop keys whose value is null, an empty string, an empty array or an
/// empty object.
pub fn compact_params(params: Params) -> Params {
    params
        .into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(line: &str) -> Option<Classification> {
        classify_line(&RuleSet::standard(), line)
    }

    #[test]
    fn offset_plane_end_to_end() {
        let c = classify("Create offset plane, offset 25 mm, from xy plane").expect("classified");
        assert_eq!(c.action, "create_plane_offset");
        assert_eq!(c.params["offset_mm"], json!(25.0));
        assert_eq!(c.params["reference_plane"], json!("xy plane"));
        assert!(c.produces.is_empty());
        assert_eq!(c.references, vec!["xy plane"]);
    }

    #[test]
    fn offset_plane_naming_its_result() {
        let c = classify("Create offset plane Plane.1, offset 10 mm from yz plane").unwrap();
        assert_eq!(c.produces, vec!["Plane.1"]);
        assert_eq!(c.references, vec!["yz plane"]);
    }

    #[test]
    fn earlier_rule_wins_on_overlapping_triggers() {
        let line = "Modify the H parameter of Point.2 on the xy plane to 40";
        let rules = RuleSet::standard();
        let triggered: Vec<&str> = rules
            .rules()
            .iter()
            .filter(|rule| rule.triggers(line))
            .map(|rule| rule.action)
            .collect();
        assert_eq!(triggered, vec!["create_point_on_plane", "set_parameter"]);

        let c = classify(line).unwrap();
        assert_eq!(c.action, "create_point_on_plane");
    }

    #[test]
    fn produces_and_references_are_disjoint() {
        let lines = [
            "Create spline Spline.1 through Point.1, Point.2 and Point.3",
            "Create point by coordinate with x value of 50 from Point.1 giving Point.4",
            "Join Multi-sections Surface.1 and Extrude.1 into Join.1",
            "Create line Line.2 by Point-Direction through Point.3 along Plane.1",
            "Extrude surface Extrude.2 from Spline.1 along Line.1",
        ];

        for line in lines {
            let c = classify(line).expect("classified");
            for produced in &c.produces {
                assert!(
                    !c.references.contains(produced),
                    "{produced} both produced and referenced in {line:?}"
                );
            }
        }
    }

    #[test]
    fn references_are_deduplicated_and_sorted() {
        let c = classify("Symmetry of Join.2 and Extrude.1 about zx plane, keep Join.2").unwrap();
        assert_eq!(c.action, "symmetry");
        assert_eq!(c.references, vec!["Extrude.1", "Join.2", "zx plane"]);
        assert_eq!(c.params["elements"], json!(["Join.2", "Extrude.1", "Join.2"]));
        assert_eq!(c.params["reference"], json!("zx plane"));
    }

    #[test]
    fn compaction_drops_empty_values() {
        let params: Params = serde_json::from_value(json!({
            "axis": null,
            "point": "Point.3",
            "label": "",
            "points": [],
            "extra": {},
            "offset_mm": 0.0,
        }))
        .unwrap();
        let compacted = compact_params(params);
        assert_eq!(
            Value::Object(compacted),
            json!({"point": "Point.3", "offset_mm": 0.0})
        );
    }

    #[test]
    fn tangency_without_axis_keeps_point_only() {
        let c = classify("Set axis tangency on Point.3").unwrap();
        assert_eq!(c.action, "set_tangency_axis");
        assert_eq!(Value::Object(c.params), json!({"point": "Point.3"}));
        assert!(c.produces.is_empty());
        assert_eq!(c.references, vec!["Point.3"]);
    }

    #[test]
    fn spline_without_points_drops_empty_list() {
        let c = classify("Create a spline through the selected points").unwrap();
        assert_eq!(c.action, "create_spline_through_points");
        assert!(c.params.is_empty());
    }

    #[test]
    fn unmatched_line_is_none() {
        assert!(classify("Save the document and close the window").is_none());
    }

    #[test]
    fn note_is_empty() {
        let note = Classification::note();
        assert!(note.is_note());
        assert!(note.params.is_empty() && note.produces.is_empty() && note.references.is_empty());
    }
}
