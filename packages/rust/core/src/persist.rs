//! Step persister: numbers classified steps and appends them to
//! `harvested_steps`.

use tracing::debug;

use cadkb_harvester::ClassifiedStep;
use cadkb_shared::{HarvestedStep, Result};
use cadkb_storage::Storage;

/// Assign `step_id` 1..N in order.
pub fn number_steps(steps: Vec<ClassifiedStep>) -> Vec<HarvestedStep> {
    steps
        .into_iter()
        .zip(1u32..)
        .map(|(step, step_id)| HarvestedStep {
            step_id,
            action_label: step.classification.action,
            description: step.description,
            params: step.classification.params,
            produces: step.classification.produces,
            references: step.classification.references,
            code_lang: None,
            generated_code: None,
        })
        .collect()
}

/// Number and write `steps` in one transaction. Returns the rows written.
pub async fn persist_steps(storage: &Storage, steps: Vec<ClassifiedStep>) -> Result<usize> {
    let numbered = number_steps(steps);
    let notes = numbered.iter().filter(|s| s.is_note()).count();
    let written = storage.insert_harvested_steps(&numbered).await?;
    debug!(written, notes, "persisted harvested steps");
    Ok(written)
}
