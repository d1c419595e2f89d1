//! Entity identifier grammar.
//!
//! An entity is either a typed instance (`Plane.2`, `Spline.1`,
//! `Multi-sections Surface.1`), a named coordinate plane (`xy plane`) or a
//! named axis (`x axis`). Every rule's produced entities and the global
//! reference scan go through [`recognize`], so both see identical strings.

use std::sync::LazyLock;

use regex::Regex;

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<typed>(?P<kind>Point|Line|Plane|Spline|Extrude|Join|ThickSurface|Multi-?sections? Surface)\.\d+)|(?P<plane>\b(?:xy|yz|zx)\s*plane)|(?P<axis>\b[XYZ]\s*axis)",
    )
    .expect("valid regex")
});

/// Kind of a recognized entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Point,
    Line,
    Plane,
    Spline,
    Extrude,
    Join,
    ThickSurface,
    MultiSectionSurface,
    /// `xy plane`, `yz plane`, `zx plane`.
    NamedPlane,
    /// `x axis`, `y axis`, `z axis`.
    Axis,
}

impl EntityKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let kind = match lower.as_str() {
            "point" => Self::Point,
            "line" => Self::Line,
            "plane" => Self::Plane,
            "spline" => Self::Spline,
            "extrude" => Self::Extrude,
            "join" => Self::Join,
            "thicksurface" => Self::ThickSurface,
            _ if lower.starts_with("multi") => Self::MultiSectionSurface,
            _ => return None,
        };
        Some(kind)
    }
}

/// One entity occurrence in a line, in source spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub text: String,
}

/// All entity identifiers in `line`, left to right.
pub fn recognize(line: &str) -> Vec<EntityRef> {
    ENTITY_RE
        .captures_iter(line)
        .filter_map(|caps| {
            if let (Some(typed), Some(kind)) = (caps.name("typed"), caps.name("kind")) {
                let kind = EntityKind::from_type_name(kind.as_str())?;
                return Some(EntityRef {
                    kind,
                    text: typed.as_str().to_string(),
                });
            }
            if let Some(plane) = caps.name("plane") {
                return Some(EntityRef {
                    kind: EntityKind::NamedPlane,
                    text: plane.as_str().to_string(),
                });
            }
            caps.name("axis").map(|axis| EntityRef {
                kind: EntityKind::Axis,
                text: axis.as_str().to_string(),
            })
        })
        .collect()
}

/// Texts of every entity of one of `kinds`, in order, duplicates kept.
pub fn all_of(entities: &[EntityRef], kinds: &[EntityKind]) -> Vec<String> {
    entities
        .iter()
        .filter(|e| kinds.contains(&e.kind))
        .map(|e| e.text.clone())
        .collect()
}

/// Text of the leftmost entity of one of `kinds`.
pub fn first_of(entities: &[EntityRef], kinds: &[EntityKind]) -> Option<String> {
    entities
        .iter()
        .find(|e| kinds.contains(&e.kind))
        .map(|e| e.text.clone())
}
