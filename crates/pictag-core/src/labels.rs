//! Label formatting and the verdict message shown to users

/// Minimum winning probability for a confident verdict (inclusive)
pub const CONFIDENCE_THRESHOLD: f32 = 0.55;

/// Format a raw label-table entry for display.
///
/// Underscores become spaces, the comma-separated synonym list is joined with
/// `" / "`, and the first character is uppercased. The rest of the string keeps
/// its original casing, so `"great_white_shark, white_shark"` becomes
/// `"Great white shark / White shark"`.
pub fn pretty_label(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let joined = spaced
        .trim()
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" / ");

    let mut chars = joined.chars();
    let formatted: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    // A label made only of separators formats to nothing; keep it visible.
    if formatted.is_empty() && !raw.is_empty() {
        return raw.to_string();
    }
    formatted
}

/// Build the human-readable message for a top-1 prediction.
pub fn verdict_message(pretty: &str, confidence: f32) -> String {
    let subject = pretty.to_lowercase();
    if confidence >= CONFIDENCE_THRESHOLD {
        format!("Looks like {subject}.")
    } else {
        format!("Not sure. Closest match: {subject}.")
    }
}

/// Index and value of the highest probability, first one wins on ties.
///
/// NaN entries are skipped. Returns `None` when no finite entry exists.
pub fn top1(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .fold(None, |best, (idx, p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((idx, p)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_label_synonyms() {
        assert_eq!(
            pretty_label("great_white_shark, white_shark"),
            "Great white shark / White shark"
        );
    }

    #[test]
    fn test_pretty_label_single() {
        assert_eq!(pretty_label("tabby_cat"), "Tabby cat");
    }

    #[test]
    fn test_pretty_label_keeps_inner_case() {
        assert_eq!(
            pretty_label("tench, Tinca tinca"),
            "Tench / Tinca tinca"
        );
        assert_eq!(pretty_label("  ice_cream ,icecream "), "Ice cream / icecream");
    }

    #[test]
    fn test_pretty_label_empty() {
        assert_eq!(pretty_label(""), "");
        assert_eq!(pretty_label("_"), "_");
    }

    #[test]
    fn test_pretty_label_non_ascii_first_char() {
        assert_eq!(pretty_label("éclair"), "Éclair");
    }

    #[test]
    fn test_verdict_confident() {
        let msg = verdict_message("Tabby cat", 0.9);
        assert_eq!(msg, "Looks like tabby cat.");
    }

    #[test]
    fn test_verdict_unsure() {
        let msg = verdict_message("Great white shark / White shark", 0.3);
        assert_eq!(msg, "Not sure. Closest match: great white shark / white shark.");
    }

    #[test]
    fn test_verdict_threshold_is_inclusive() {
        assert!(verdict_message("Tabby cat", 0.55).starts_with("Looks like "));
        assert!(verdict_message("Tabby cat", 0.5499).starts_with("Not sure. Closest match: "));
    }

    #[test]
    fn test_top1() {
        assert_eq!(top1(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top1(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(top1(&[f32::NAN, 0.4]), Some((1, 0.4)));
        assert_eq!(top1(&[]), None);
    }
}
