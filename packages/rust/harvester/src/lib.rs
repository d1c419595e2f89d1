//! Instruction harvesting: PDF text extraction, step segmentation and
//! rule-based line classification.
//!
//! This crate provides:
//! - [`pdf`] — Ordered PDF text sources with soft failure
//! - [`segment`] — `Step N` segmentation with a line-by-line fallback
//! - [`rules`] — The ordered construction-rule table
//! - [`classify`] — Line classification, parameter compaction, references
//! - [`entity`] — The shared entity identifier grammar

pub mod classify;
pub mod entity;
pub mod pdf;
pub mod rules;
pub mod segment;

#[cfg(test)]
mod testutil;

use std::path::Path;

use tracing::{debug, info, instrument};

use cadkb_shared::HarvestConfig;

pub use classify::{Classification, classify_line, compact_params};
pub use pdf::{LopdfSource, PageTextSource, PdfExtractSource, default_sources, extract_pdf_text_pages};
pub use rules::{Params, Rule, RuleSet};
pub use segment::{Segmentation, StepBlock, segment};

/// A classified step in discovery order, before it is numbered.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedStep {
    /// Source line chosen to represent the step.
    pub description: String,
    pub classification: Classification,
}

/// Classify the steps of an instructions text.
///
/// With step markers, each block yields exactly one step: the first line
/// that classifies, or a note built from the block's first line. Without
/// markers, each classifying line is a step and the rest are dropped.
pub fn harvest_text(text: &str, rules: &RuleSet, config: &HarvestConfig) -> Vec<ClassifiedStep> {
    let segmentation = segment(text, config.min_line_len);
    if segmentation.is_empty() {
        debug!("no qualifying instruction text");
        return Vec::new();
    }

    match segmentation {
        Segmentation::Steps(blocks) => blocks
            .into_iter()
            .filter_map(|block| classify_block(block, rules))
            .collect(),
        Segmentation::Lines(lines) => {
            debug!(lines = lines.len(), "no step markers, classifying line by line");
            lines
                .into_iter()
                .filter_map(|line| {
                    classify_line(rules, &line).map(|classification| ClassifiedStep {
                        description: line,
                        classification,
                    })
                })
                .collect()
        }
    }
}

fn classify_block(block: StepBlock, rules: &RuleSet) -> Option<ClassifiedStep> {
    let classified = block.lines.iter().find_map(|line| {
        classify_line(rules, line).map(|classification| ClassifiedStep {
            description: line.clone(),
            classification,
        })
    });

    match classified {
        Some(step) => Some(step),
        None => {
            debug!(marker = %block.marker, "block matched no rule, recording note");
            let description = block.lines.into_iter().next()?;
            Some(ClassifiedStep {
                description,
                classification: Classification::note(),
            })
        }
    }
}

/// Extract, join and classify the steps of an instructions PDF.
///
/// An unreadable document yields no steps.
#[instrument(skip_all, fields(pdf = %path.display()))]
pub fn harvest_pdf(
    path: &Path,
    sources: &[Box<dyn PageTextSource>],
    rules: &RuleSet,
    config: &HarvestConfig,
) -> Vec<ClassifiedStep> {
    let pages = extract_pdf_text_pages(path, sources);
    let text = pages.join("\n");
    let steps = harvest_text(&text, rules, config);

    info!(
        pages = pages.len(),
        rules = rules.len(),
        steps = steps.len(),
        notes = steps.iter().filter(|s| s.classification.is_note()).count(),
        "harvested instructions"
    );
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadkb_shared::NOTE_ACTION;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/text/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn harvest(text: &str) -> Vec<ClassifiedStep> {
        harvest_text(text, &RuleSet::standard(), &HarvestConfig::default())
    }

    fn actions(steps: &[ClassifiedStep]) -> Vec<&str> {
        steps.iter().map(|s| s.classification.action.as_str()).collect()
    }

    #[test]
    fn unmatched_block_becomes_note() {
        let text = "Step 1\nCreate offset plane, offset 25 mm, from xy plane\n\
                    Step 2\nOpen the part design workbench\nCheck the tree";
        let steps = harvest(text);

        assert_eq!(steps.len(), 2);
        assert_eq!(actions(&steps), vec!["create_plane_offset", NOTE_ACTION]);
        assert_eq!(steps[1].description, "Open the part design workbench");
        assert!(steps[1].classification.params.is_empty());
    }

    #[test]
    fn first_classifying_line_represents_the_block() {
        let text = "Step 4\nSelect the sketch\nExtrude surface Extrude.1 from Spline.1 along Line.1\n\
                    Join Extrude.1 and Extrude.2";
        let steps = harvest(text);

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].classification.action, "extrude_surface");
        assert!(steps[0].description.starts_with("Extrude surface"));
    }

    #[test]
    fn fallback_keeps_only_classified_lines() {
        let text = "Open the workbench\nJoin Extrude.1 and Extrude.2 into Join.1\nSave everything";
        let steps = harvest(text);

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].classification.action, "join");
        assert_eq!(steps[0].classification.produces, vec!["Join.1"]);
    }

    #[test]
    fn instructions_fixture() {
        let steps = harvest(&load_fixture("sample_instructions.txt"));

        assert_eq!(
            actions(&steps),
            vec![
                "create_plane_offset",
                "create_point_on_plane",
                "create_point_coord_with_reference",
                "create_spline_through_points",
                "set_tangency_axis",
                "set_parameter",
                NOTE_ACTION,
                "create_line_point_direction",
                "extrude_surface",
                "multi_section_surface",
                "join",
                "thick_surface",
            ]
        );
        for step in &steps {
            let c = &step.classification;
            assert!(c.produces.iter().all(|p| !c.references.contains(p)));
        }
    }

    #[test]
    fn harvests_steps_from_a_real_pdf() {
        let path = std::env::temp_dir().join(format!("cadkb-harvest-{}.pdf", std::process::id()));
        testutil::write_text_pdf(
            &path,
            &[
                &["Step 1", "Create offset plane, offset 25 mm, from xy plane"],
                &["Step 2", "Join Extrude.1 and Extrude.2 into Join.1"],
            ],
        );

        let steps = harvest_pdf(
            &path,
            &default_sources(),
            &RuleSet::standard(),
            &HarvestConfig::default(),
        );
        let _ = std::fs::remove_file(&path);

        assert_eq!(actions(&steps), vec!["create_plane_offset", "join"]);
        assert_eq!(steps[1].classification.produces, vec!["Join.1"]);
    }

    #[test]
    fn unreadable_pdf_yields_no_steps() {
        let missing = std::env::temp_dir().join("cadkb-missing-instructions.pdf");
        let steps = harvest_pdf(
            &missing,
            &default_sources(),
            &RuleSet::standard(),
            &HarvestConfig::default(),
        );
        assert!(steps.is_empty());
    }
}
