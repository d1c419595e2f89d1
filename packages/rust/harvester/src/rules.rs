//! The ordered construction-rule table.
//!
//! A [`Rule`] pairs a trigger pattern with three independent extractors:
//! base parameters, secondary parameters and produced entity kinds. Rules are
//! evaluated in table order and the first trigger that matches wins, so the
//! order of [`RuleSet::standard`] is part of its behavior.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::entity::{EntityKind, EntityRef, all_of, first_of};

/// Parameter mapping produced by an extractor.
pub type Params = Map<String, Value>;

/// Extracts parameters from a line and its recognized entities. `None` means
/// the extractor found nothing and contributes no keys.
pub type ParamExtractor = fn(&str, &[EntityRef]) -> Option<Params>;

// ---------------------------------------------------------------------------
// Shared patterns
// ---------------------------------------------------------------------------

static MM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*mm\b").expect("valid regex"));

static DEG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*deg\b").expect("valid regex"));

static H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bH\b.*?(-?\d+(?:\.\d+)?)").expect("valid regex"));

static V_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bV\b.*?(-?\d+(?:\.\d+)?)").expect("valid regex"));

static X_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bx\s*value\s*of\s*(-?\d+(?:\.\d+)?)").expect("valid regex")
});

static AXIS_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([XYZ])\s*axis").expect("valid regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

static PARAM_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Spline|Plane|Point|Line|Tension)\.\d+").expect("valid regex")
});

static DELETE_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+(?:\s*Output)?\.\d+").expect("valid regex"));

static THICK_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Join\.\d+|Surface\.\d+").expect("valid regex"));

const PLANE_REFS: &[EntityKind] = &[EntityKind::NamedPlane, EntityKind::Plane];

// ---------------------------------------------------------------------------
// Rule / RuleSet
// ---------------------------------------------------------------------------

/// One classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Action label recorded for lines this rule classifies.
    pub action: &'static str,
    trigger: Regex,
    params: ParamExtractor,
    more: ParamExtractor,
    produces: &'static [EntityKind],
}

impl Rule {
    fn new(
        action: &'static str,
        trigger: &str,
        params: ParamExtractor,
        more: ParamExtractor,
        produces: &'static [EntityKind],
    ) -> Self {
        Self {
            action,
            trigger: Regex::new(trigger).expect("valid trigger regex"),
            params,
            more,
            produces,
        }
    }

    pub fn triggers(&self, line: &str) -> bool {
        self.trigger.is_match(line)
    }

    /// Base parameters, overridden key by key by the secondary extractor.
    pub fn extract_params(&self, line: &str, entities: &[EntityRef]) -> Params {
        let mut params = (self.params)(line, entities).unwrap_or_default();
        if let Some(more) = (self.more)(line, entities) {
            params.extend(more);
        }
        params
    }

    /// Entities this rule creates, in source order.
    pub fn extract_produces(&self, entities: &[EntityRef]) -> Vec<String> {
        all_of(entities, self.produces)
    }
}

/// Immutable, ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// The construction-step rules, in tie-break order.
    pub fn standard() -> Self {
        use EntityKind as K;

        let rules = vec![
            Rule::new(
                "create_plane_offset",
                r"(?i)\boffset\s+plane\b",
                plane_offset_params,
                offset_mm,
                &[K::Plane],
            ),
            Rule::new(
                "create_point_on_plane",
                r"(?i)\bpoint\b.*\bon\b.*\bplane",
                point_on_plane_params,
                h_and_v,
                &[K::Point],
            ),
            Rule::new(
                "create_point_coord_with_reference",
                r"(?i)\bpoint\b.*\bcoordinate",
                x_value,
                reference_point,
                &[K::Point],
            ),
            Rule::new(
                "create_spline_through_points",
                r"(?i)\bcreate\b.*\bspline\b.*\bthrough\b",
                spline_points,
                nothing,
                &[K::Spline],
            ),
            Rule::new(
                "set_tangency_axis",
                r"(?i)\baxis tangency\b",
                tangency_params,
                nothing,
                &[],
            ),
            Rule::new(
                "set_parameter",
                r"(?i)\b(change|modify)\b.*\bparameter\b",
                parameter_target,
                parameter_value,
                &[],
            ),
            Rule::new(
                "create_line_point_direction",
                r"(?i)\bline\b.*\bPoint-?Direction\b",
                line_point_direction_params,
                nothing,
                &[K::Line],
            ),
            Rule::new(
                "create_line_angle_normal",
                r"(?i)\bline\b.*\bangle/normal\b|\bangle\b.*\bnormal\b",
                line_angle_normal_params,
                nothing,
                &[K::Line],
            ),
            Rule::new(
                "extrude_surface",
                r"(?i)\bextrude\s+surface\b",
                extrude_params,
                nothing,
                &[K::Extrude],
            ),
            Rule::new(
                "multi_section_surface",
                r"(?i)\bmulti-?section[s]?\s+surface\b",
                multi_section_curves,
                tangent_surfaces,
                &[K::MultiSectionSurface],
            ),
            Rule::new(
                "symmetry",
                r"(?i)\bsymmetry\b",
                symmetry_elements,
                plane_reference,
                &[],
            ),
            Rule::new("delete", r"(?i)\bdelete\b", delete_target, nothing, &[]),
            Rule::new("join", r"(?i)\bjoin\b", join_elements, nothing, &[K::Join]),
            Rule::new(
                "thick_surface",
                r"(?i)\bthick\s+surface\b",
                thick_surface_params,
                nothing,
                &[K::ThickSurface],
            ),
        ];

        Self { rules }
    }

    /// First rule whose trigger matches `line`.
    pub fn first_match(&self, line: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.triggers(line))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.action)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn number(raw: &str) -> Option<Value> {
    raw.parse::<f64>().ok().map(Value::from)
}

/// Decode capture group 1 of the first match of `re`.
fn captured_number(re: &Regex, line: &str) -> Option<Value> {
    number(re.captures(line)?.get(1)?.as_str())
}

/// First number that is not part of an identifier such as `Spline.1`.
fn free_standing_number(line: &str) -> Option<Value> {
    NUMBER_RE
        .find_iter(line)
        .find(|m| {
            let before = line[..m.start()].chars().next_back();
            let after = line[m.end()..].chars().next();
            !before.is_some_and(|c| c.is_alphanumeric() || c == '.' || c == '_')
                && !after.is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
        .and_then(|m| number(m.as_str()))
}

fn one(key: &str, value: Value) -> Params {
    let mut params = Params::new();
    params.insert(key.to_string(), value);
    params
}

/// Build a mapping from optional values, skipping absent ones.
fn some_of<const N: usize>(entries: [(&str, Option<Value>); N]) -> Option<Params> {
    let params: Params = entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();
    (!params.is_empty()).then_some(params)
}

fn text(value: Option<String>) -> Option<Value> {
    value.map(Value::String)
}

fn list(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

fn nothing(_: &str, _: &[EntityRef]) -> Option<Params> {
    None
}

fn plane_offset_params(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one("reference_plane", first_of(entities, PLANE_REFS)?.into()))
}

fn offset_mm(line: &str, _: &[EntityRef]) -> Option<Params> {
    Some(one("offset_mm", captured_number(&MM_RE, line)?))
}

fn point_on_plane_params(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one("plane", first_of(entities, PLANE_REFS)?.into()))
}

fn h_and_v(line: &str, _: &[EntityRef]) -> Option<Params> {
    some_of([
        ("H", captured_number(&H_RE, line)),
        ("V", captured_number(&V_RE, line)),
    ])
}

fn x_value(line: &str, _: &[EntityRef]) -> Option<Params> {
    Some(one("x", captured_number(&X_VALUE_RE, line)?))
}

fn reference_point(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one("reference", first_of(entities, &[EntityKind::Point])?.into()))
}

fn spline_points(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one("points", list(all_of(entities, &[EntityKind::Point]))))
}

fn tangency_params(line: &str, entities: &[EntityRef]) -> Option<Params> {
    let axis = AXIS_LETTER_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|letter| format!("{} axis", letter.as_str()));
    some_of([
        ("axis", text(axis)),
        ("point", text(first_of(entities, &[EntityKind::Point]))),
    ])
}

fn parameter_target(line: &str, _: &[EntityRef]) -> Option<Params> {
    let target = PARAM_TARGET_RE.find(line)?;
    Some(one("target", target.as_str().into()))
}

/// Name/value of a modified parameter, chosen by keyword: tension first,
/// then offset, then an `H` value.
fn parameter_value(line: &str, _: &[EntityRef]) -> Option<Params> {
    let lower = line.to_lowercase();

    let (name, value) = if let Some(v) = lower
        .contains("tension")
        .then(|| free_standing_number(line))
        .flatten()
    {
        ("Tension", v)
    } else if let Some(v) = lower
        .contains("offset")
        .then(|| captured_number(&MM_RE, line))
        .flatten()
    {
        ("Offset", v)
    } else {
        ("H", captured_number(&H_RE, line)?)
    };

    some_of([("name", Some(name.into())), ("value", Some(value))])
}

fn line_point_direction_params(_: &str, entities: &[EntityRef]) -> Option<Params> {
    use EntityKind as K;
    some_of([
        ("point", text(first_of(entities, &[K::Point]))),
        (
            "direction",
            text(first_of(entities, &[K::NamedPlane, K::Plane, K::Line])),
        ),
    ])
}

fn line_angle_normal_params(line: &str, entities: &[EntityRef]) -> Option<Params> {
    use EntityKind as K;
    some_of([
        ("point", text(first_of(entities, &[K::Point]))),
        ("support", text(first_of(entities, PLANE_REFS))),
        ("curve", text(first_of(entities, &[K::Line, K::Spline]))),
        ("angle_deg", captured_number(&DEG_RE, line)),
    ])
}

fn extrude_params(_: &str, entities: &[EntityRef]) -> Option<Params> {
    use EntityKind as K;
    some_of([
        ("profile", text(first_of(entities, &[K::Spline]))),
        ("direction", text(first_of(entities, &[K::Line, K::NamedPlane]))),
    ])
}

/// Every spline is recorded both as a section and as a guide; the line
/// alone does not say which is which.
fn multi_section_curves(_: &str, entities: &[EntityRef]) -> Option<Params> {
    let splines = all_of(entities, &[EntityKind::Spline]);
    some_of([
        ("sections", Some(list(splines.clone()))),
        ("guides", Some(list(splines))),
    ])
}

fn tangent_surfaces(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one(
        "tangent_surfaces",
        list(all_of(entities, &[EntityKind::Extrude])),
    ))
}

fn symmetry_elements(_: &str, entities: &[EntityRef]) -> Option<Params> {
    use EntityKind as K;
    let elements = all_of(
        entities,
        &[K::MultiSectionSurface, K::Extrude, K::Join, K::ThickSurface],
    );
    Some(one("elements", list(elements)))
}

fn plane_reference(_: &str, entities: &[EntityRef]) -> Option<Params> {
    Some(one("reference", first_of(entities, PLANE_REFS)?.into()))
}

fn delete_target(line: &str, _: &[EntityRef]) -> Option<Params> {
    Some(one("target", DELETE_TARGET_RE.find(line)?.as_str().into()))
}

fn join_elements(_: &str, entities: &[EntityRef]) -> Option<Params> {
    use EntityKind as K;
    let elements = all_of(entities, &[K::MultiSectionSurface, K::Extrude]);
    Some(one("elements", list(elements)))
}

fn thick_surface_params(line: &str, _: &[EntityRef]) -> Option<Params> {
    some_of([
        (
            "object",
            THICK_OBJECT_RE.find(line).map(|m| m.as_str().into()),
        ),
        ("thickness_mm", captured_number(&MM_RE, line)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::recognize;
    use serde_json::json;

    fn params_for(line: &str) -> (&'static str, Params) {
        let rules = RuleSet::standard();
        let rule = rules.first_match(line).expect("rule should trigger");
        (rule.action, rule.extract_params(line, &recognize(line)))
    }

    #[test]
    fn standard_table_order() {
        let actions: Vec<&str> = RuleSet::standard().actions().collect();
        assert_eq!(actions.len(), 14);
        assert_eq!(actions[0], "create_plane_offset");
        assert_eq!(actions[1], "create_point_on_plane");
        assert_eq!(actions[5], "set_parameter");
        assert_eq!(actions[13], "thick_surface");
    }

    #[test]
    fn point_on_plane_extracts_both_h_and_v() {
        let (action, params) = params_for("Create a point on the xy plane with H 20 and V -15.5");
        assert_eq!(action, "create_point_on_plane");
        assert_eq!(params["plane"], json!("xy plane"));
        assert_eq!(params["H"], json!(20.0));
        assert_eq!(params["V"], json!(-15.5));
    }

    #[test]
    fn point_coordinate_with_reference() {
        let (action, params) =
            params_for("Create point by coordinate with x value of 120 from Point.1");
        assert_eq!(action, "create_point_coord_with_reference");
        assert_eq!(params["x"], json!(120.0));
        assert_eq!(params["reference"], json!("Point.1"));
    }

    #[test]
    fn tension_value_skips_identifier_numbers() {
        let (action, params) =
            params_for("Modify the tension parameter of Spline.1 to 0.75");
        assert_eq!(action, "set_parameter");
        assert_eq!(params["target"], json!("Spline.1"));
        assert_eq!(params["name"], json!("Tension"));
        assert_eq!(params["value"], json!(0.75));
    }

    #[test]
    fn parameter_falls_back_to_offset_then_h() {
        let (_, params) = params_for("Change the offset parameter of Plane.2 to 40 mm");
        assert_eq!(params["name"], json!("Offset"));
        assert_eq!(params["value"], json!(40.0));

        let (_, params) = params_for("Change parameter H to 12 for Point.3");
        assert_eq!(params["name"], json!("H"));
        assert_eq!(params["value"], json!(12.0));
    }

    #[test]
    fn parameter_without_value_keeps_target_only() {
        let (_, params) = params_for("Change the parameter of Line.4");
        assert_eq!(params.len(), 1);
        assert_eq!(params["target"], json!("Line.4"));
    }

    #[test]
    fn tangency_axis_reads_letter_and_point() {
        let (action, params) = params_for("Set axis tangency at Point.2 along Z axis");
        assert_eq!(action, "set_tangency_axis");
        assert_eq!(params["axis"], json!("Z axis"));
        assert_eq!(params["point"], json!("Point.2"));
    }

    #[test]
    fn line_angle_normal_collects_geometry() {
        let (action, params) = params_for(
            "Create line Angle/Normal to curve Spline.1 at Point.3 with support Plane.1, 90 deg",
        );
        assert_eq!(action, "create_line_angle_normal");
        assert_eq!(params["point"], json!("Point.3"));
        assert_eq!(params["support"], json!("Plane.1"));
        assert_eq!(params["curve"], json!("Spline.1"));
        assert_eq!(params["angle_deg"], json!(90.0));
    }

    #[test]
    fn multi_section_sections_and_guides_share_splines() {
        let (action, params) = params_for(
            "Create multi-sections surface from Spline.1 and Spline.2 tangent to Extrude.1",
        );
        assert_eq!(action, "multi_section_surface");
        assert_eq!(params["sections"], json!(["Spline.1", "Spline.2"]));
        assert_eq!(params["guides"], params["sections"]);
        assert_eq!(params["tangent_surfaces"], json!(["Extrude.1"]));
    }

    #[test]
    fn delete_and_thick_surface_targets() {
        let (action, params) = params_for("Delete Extrude Output.1");
        assert_eq!(action, "delete");
        assert_eq!(params["target"], json!("Extrude Output.1"));

        let (action, params) = params_for("Create thick surface from Surface.1, thickness 2.5 mm");
        assert_eq!(action, "thick_surface");
        assert_eq!(params["object"], json!("Surface.1"));
        assert_eq!(params["thickness_mm"], json!(2.5));
    }

    #[test]
    fn unmatched_line_has_no_rule() {
        assert!(RuleSet::standard().first_match("Open the workbench").is_none());
    }
}
