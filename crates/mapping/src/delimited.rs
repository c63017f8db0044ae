use crate::sanitize::sanitize_path;
use crate::MappingPlan;
use guidfix_core::TreePair;

const DELIMITER: char = '|';

/// Parse `incorrect|correct` lines. Blank lines and `#` comments are ignored;
/// anything else without exactly one delimiter and two non-empty sides is
/// counted as rejected.
pub fn parse_delimited(text: &str) -> MappingPlan {
    let mut plan = MappingPlan::default();

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed = trimmed
            .split_once(DELIMITER)
            .filter(|(_, correct)| !correct.contains(DELIMITER))
            .and_then(|(incorrect, correct)| {
                Some(TreePair::new(
                    sanitize_path(incorrect)?,
                    sanitize_path(correct)?,
                ))
            });

        match parsed {
            Some(pair) => plan.pairs.push(pair),
            None => {
                log::warn!("Ignoring malformed mapping line {}: {trimmed}", line_no + 1);
                plan.rejected += 1;
            }
        }
    }

    plan
}
