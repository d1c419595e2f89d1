//! Identifier tokenizer shared by the documentation index and the step
//! classifier.
//!
//! API identifiers such as `AddNewPlaneOffset` are split into lowercase word
//! fragments; the fragments build both the lexical `tokens` of a documented
//! function and its snake_case action label.

use std::collections::BTreeSet;

/// Fragments that carry no meaning for lexical matching.
const GENERIC_TOKENS: [&str; 2] = ["add", "new"];

/// Creation prefixes stripped from a method name before deriving its action
/// label. Longest first.
const CREATION_PREFIXES: [&str; 2] = ["addnew", "add"];

/// Split an identifier into lowercase word fragments.
///
/// Segments on lower-to-upper transitions, on an uppercase run followed by a
/// capitalized word (`XYPlane` → `xy`, `plane`) and on digit runs. An
/// uppercase run that is not followed by a lowercase letter carries no word
/// and is skipped, as are all non-alphanumeric characters.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_ascii_uppercase() {
            let upper_end = run_end(&chars, i, |c| c.is_ascii_uppercase());
            let followed_by_lower = chars.get(upper_end).is_some_and(|c| c.is_ascii_lowercase());

            if upper_end - i >= 2 && followed_by_lower {
                // Acronym: the last capital starts the next word.
                parts.push(collect_lower(&chars[i..upper_end - 1]));
                i = upper_end - 1;
            } else if followed_by_lower && upper_end - i == 1 {
                let word_end = run_end(&chars, i + 1, |c| c.is_ascii_lowercase());
                parts.push(collect_lower(&chars[i..word_end]));
                i = word_end;
            } else {
                i = upper_end;
            }
        } else if c.is_ascii_lowercase() {
            let word_end = run_end(&chars, i, |c| c.is_ascii_lowercase());
            parts.push(collect_lower(&chars[i..word_end]));
            i = word_end;
        } else if c.is_ascii_digit() {
            let digits_end = run_end(&chars, i, |c| c.is_ascii_digit());
            parts.push(chars[i..digits_end].iter().collect());
            i = digits_end;
        } else {
            i += 1;
        }
    }

    parts
}

fn run_end(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && pred(chars[end]) {
        end += 1;
    }
    end
}

fn collect_lower(chars: &[char]) -> String {
    chars.iter().map(|c| c.to_ascii_lowercase()).collect()
}

/// Composite identity of a documented function: lowercase `factory.method`.
pub fn normalize_key(factory: &str, method: &str) -> String {
    format!("{}.{}", factory.trim(), method.trim()).to_lowercase()
}

/// Derive the action label of a creation method.
///
/// `AddNewPlaneOffset` → `create_plane_offset`, `AddLine` → `create_line`.
pub fn action_from_method(method: &str) -> String {
    let trimmed = method.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let stem = CREATION_PREFIXES
        .iter()
        .find(|prefix| lowered.starts_with(*prefix))
        .map_or(trimmed, |prefix| &trimmed[prefix.len()..]);

    format!("create_{}", split_identifier(stem).join("_"))
}

/// Lexical tokens of a (factory, method) pair, sorted and de-duplicated,
/// without the generic `add`/`new` fragments.
pub fn tokens_for(factory: &str, method: &str) -> Vec<String> {
    split_identifier(factory)
        .into_iter()
        .chain(split_identifier(method))
        .filter(|t| !GENERIC_TOKENS.contains(&t.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
