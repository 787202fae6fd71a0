use std::collections::BTreeSet;

/// Heading label with wiki heading markers and emphasis quotes removed.
///
/// `=== '''Nom commun''' ===` becomes `Nom commun`.
pub fn clean_label(heading: &str) -> String {
    let trimmed = heading.trim().trim_matches('=').trim();
    trimmed.replace("'''", "").replace("''", "").trim().to_owned()
}

/// Random-mode acceptance test for an entry's headings, in document order.
///
/// Accepts when the first heading is the configured language, at least three
/// headings exist and the third one names an allowed part of speech.
pub fn qualifies(
    headings: &[String],
    allowed_language_heading: &str,
    allowed_parts_of_speech: &BTreeSet<String>,
) -> bool {
    rejection_reason(headings, allowed_language_heading, allowed_parts_of_speech).is_none()
}

/// Why [`qualifies`] said no, for log lines.
pub fn rejection_reason(
    headings: &[String],
    allowed_language_heading: &str,
    allowed_parts_of_speech: &BTreeSet<String>,
) -> Option<String> {
    if headings.len() < 3 {
        return Some(format!("only {} headings", headings.len()));
    }
    let language = clean_label(&headings[0]);
    if language != allowed_language_heading.trim() {
        return Some(format!("language section is {language:?}"));
    }
    let part_of_speech = clean_label(&headings[2]);
    if !allowed_parts_of_speech.contains(&part_of_speech) {
        return Some(format!("part of speech {part_of_speech:?} not allowed"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn headings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn rejects_other_language() {
        let h = headings(&["German", "Pronunciation", "Noun"]);
        assert!(!qualifies(&h, "French", &set(&["Noun"])));
        assert_eq!(
            rejection_reason(&h, "French", &set(&["Noun"])),
            Some("language section is \"German\"".to_owned())
        );
    }

    #[test]
    fn accepts_wiki_headings_with_markers() {
        let h = headings(&["== Français ==", "=== Étymologie ===", "=== Nom commun ==="]);
        let allowed = set(&["Nom commun", "Verbe"]);
        assert!(qualifies(&h, "Français", &allowed));
        assert_eq!(rejection_reason(&h, "Français", &allowed), None);
    }

    #[test]
    fn needs_three_headings() {
        let h = headings(&["== Français ==", "=== Nom commun ==="]);
        assert!(!qualifies(&h, "Français", &set(&["Nom commun"])));
    }

    #[test]
    fn rejects_unlisted_part_of_speech() {
        let h = headings(&["== Français ==", "=== Étymologie ===", "=== Conjonction ==="]);
        assert!(!qualifies(&h, "Français", &set(&["Nom commun"])));
    }

    #[test]
    fn emphasis_markers_are_ignored() {
        assert_eq!(clean_label("=== '''Nom commun''' ==="), "Nom commun");
        assert_eq!(clean_label("''Verbe''"), "Verbe");
        assert_eq!(clean_label("Adverbe"), "Adverbe");
    }

    #[test]
    fn verdict_is_stable_across_calls() {
        let h = headings(&["== Français ==", "=== Étymologie ===", "=== Verbe ==="]);
        let allowed = set(&["Verbe"]);
        let first = qualifies(&h, "Français", &allowed);
        for _ in 0..3 {
            assert_eq!(qualifies(&h, "Français", &allowed), first);
        }
    }
}
