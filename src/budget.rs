//! Fits an entry's definitions into a post-sized character budget.
//!
//! Two policies are supported:
//!
//! * [`BudgetPolicy::Running`] numbers each definition and adds whole lines
//!   while they fit. The first line that would overflow is cut so that the
//!   post ends exactly at the limit with [`ELLIPSIS`].
//! * [`BudgetPolicy::Legacy`] treats the definitions as one block of raw
//!   markup, strips known parasite annotations, stops at the Nth `=` heading
//!   marker and then cuts the block to the remaining room.
//!
//! Lengths are counted in `char`s, including the `\n` that joins each body
//! line to the text before it, so `total_length` is the length of
//! [`PostPayload::render`]. The header is never cut, so a header that is
//! already over the limit yields a payload with no body.

use crate::formats::{DefinitionCandidate, PostPayload, opens_line};

pub const ELLIPSIS: &str = "[…]";

pub const RUNNING_LIMIT: usize = 300;
pub const LEGACY_LIMIT: usize = 180;
pub const LEGACY_HEADING_MARKERS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPolicy {
    Running {
        limit: usize,
    },
    Legacy {
        limit: usize,
        max_heading_markers: usize,
    },
}

impl BudgetPolicy {
    pub fn running() -> Self {
        Self::Running {
            limit: RUNNING_LIMIT,
        }
    }

    pub fn legacy() -> Self {
        Self::Legacy {
            limit: LEGACY_LIMIT,
            max_heading_markers: LEGACY_HEADING_MARKERS,
        }
    }

    pub fn limit(&self) -> usize {
        match *self {
            Self::Running { limit } | Self::Legacy { limit, .. } => limit,
        }
    }

    #[must_use]
    pub fn with_limit(self, limit: usize) -> Self {
        match self {
            Self::Running { .. } => Self::Running { limit },
            Self::Legacy {
                max_heading_markers,
                ..
            } => Self::Legacy {
                limit,
                max_heading_markers,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Budgeter {
    policy: BudgetPolicy,
    parasites: Vec<String>,
}

impl Budgeter {
    pub fn new(policy: BudgetPolicy, parasites: Vec<String>) -> Self {
        Self { policy, parasites }
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    pub fn build(
        &self,
        header_prefix: &str,
        first_line: &str,
        definitions: &[DefinitionCandidate],
    ) -> PostPayload {
        let payload = match self.policy {
            BudgetPolicy::Running { limit } => {
                build_running(header_prefix, first_line, definitions, limit)
            }
            BudgetPolicy::Legacy {
                limit,
                max_heading_markers,
            } => build_legacy(
                header_prefix,
                first_line,
                definitions,
                &self.parasites,
                limit,
                max_heading_markers,
            ),
        };
        tracing::debug!(
            policy = ?self.policy,
            lines = payload.body_lines.len(),
            total_length = payload.total_length,
            truncated = payload.truncated,
            "budgeted post"
        );
        payload
    }
}

pub fn build_running(
    header_prefix: &str,
    first_line: &str,
    definitions: &[DefinitionCandidate],
    limit: usize,
) -> PostPayload {
    let header_line = format!("{header_prefix}{first_line}");
    let marker_len = char_len(ELLIPSIS);
    let mut running = char_len(&header_line);
    let mut body_lines = Vec::new();
    let mut truncated = false;

    for definition in definitions {
        let formatted = format!("{} - {}", definition.index, definition.text);
        let separator = usize::from(!body_lines.is_empty() || opens_line(&header_line));
        let candidate_len = separator + char_len(&formatted);

        if running + candidate_len > limit {
            let Some(allowance) = limit.checked_sub(running + separator + marker_len) else {
                tracing::debug!(
                    index = definition.index,
                    running,
                    limit,
                    "no room left for a cut definition"
                );
                break;
            };
            let mut line = take_chars(&formatted, allowance);
            line.push_str(ELLIPSIS);
            running += separator + allowance + marker_len;
            body_lines.push(line);
            truncated = true;
            break;
        }

        running += candidate_len;
        body_lines.push(formatted);
    }

    PostPayload {
        header_line,
        body_lines,
        total_length: running,
        truncated,
    }
}

pub fn build_legacy(
    header_prefix: &str,
    first_line: &str,
    definitions: &[DefinitionCandidate],
    parasites: &[String],
    limit: usize,
    max_heading_markers: usize,
) -> PostPayload {
    let header_line = format!("{header_prefix}{first_line}");
    let header_len = char_len(&header_line);

    let block = definitions
        .iter()
        .map(|definition| definition.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let block = strip_parasites(&block, parasites);
    let block = cut_at_heading_marker(&block, max_heading_markers);

    let separator = usize::from(opens_line(&header_line));
    let room = limit.saturating_sub(header_len + separator);
    let (block, truncated) = if char_len(&block) <= room {
        (block, false)
    } else {
        match room.checked_sub(char_len(ELLIPSIS)) {
            Some(allowance) => {
                let mut cut = take_chars(&block, allowance);
                cut.push_str(ELLIPSIS);
                (cut, true)
            }
            None => (String::new(), false),
        }
    };

    let total_length = if block.is_empty() {
        header_len
    } else {
        header_len + separator + char_len(&block)
    };
    let body_lines = if block.is_empty() {
        Vec::new()
    } else {
        block.split('\n').map(str::to_owned).collect()
    };

    PostPayload {
        header_line,
        body_lines,
        total_length,
        truncated,
    }
}

/// Removes every parasite substring, repeating until nothing changes so that
/// stripping is idempotent even when a removal exposes a new occurrence.
pub fn strip_parasites(text: &str, parasites: &[String]) -> String {
    let mut current = text.to_owned();
    loop {
        let mut next = current.clone();
        for parasite in parasites.iter().filter(|p| !p.is_empty()) {
            if next.contains(parasite.as_str()) {
                tracing::debug!(parasite = %parasite, "stripping parasite");
                next = next.replace(parasite.as_str(), "");
            }
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Keeps everything before the `max_markers`-th `=` character.
fn cut_at_heading_marker(text: &str, max_markers: usize) -> String {
    if max_markers == 0 {
        return text.to_owned();
    }
    let cut = text
        .char_indices()
        .filter(|(_, ch)| *ch == '=')
        .nth(max_markers - 1)
        .map(|(byte_idx, _)| byte_idx);
    match cut {
        Some(byte_idx) => {
            tracing::debug!(dropped = %&text[byte_idx..], "heading marker limit reached");
            text[..byte_idx].trim_end().to_owned()
        }
        None => text.to_owned(),
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Dictionary entry — Noun\n";

    fn defs(texts: &[&str]) -> Vec<DefinitionCandidate> {
        DefinitionCandidate::enumerate(texts.iter().copied())
    }

    #[test]
    fn everything_fits_under_a_generous_budget() {
        let payload = build_running(HEADER, "", &defs(&["a fruit", "a color"]), 300);
        assert_eq!(payload.body_lines, vec!["1 - a fruit", "2 - a color"]);
        assert!(!payload.truncated);
        assert_eq!(payload.total_length, char_len(HEADER) + 11 + 1 + 11);
        assert_eq!(char_len(&payload.render()), payload.total_length);
    }

    #[test]
    fn tight_budget_cuts_first_definition_with_marker() {
        let payload = build_running(HEADER, "", &defs(&["a fruit", "a color"]), 30);
        assert_eq!(payload.body_lines.len(), 1);
        let line = &payload.body_lines[0];
        assert!(line.ends_with(ELLIPSIS));
        assert_eq!(line, "1 -[…]");
        assert!(payload.truncated);
        assert!(payload.total_length <= 30);
    }

    #[test]
    fn cut_line_uses_exactly_the_remaining_room() {
        let definitions = defs(&["short", "a considerably longer second sense", "third"]);
        let header_len = char_len(HEADER);
        for limit in header_len + 3..header_len + 60 {
            let payload = build_running(HEADER, "", &definitions, limit);
            assert!(payload.total_length <= limit, "limit {limit}");
            if !payload.truncated {
                continue;
            }
            let last = payload.body_lines.last().map(String::as_str).unwrap_or("");
            let before = char_len(&payload.render()) - char_len(last);
            let kept = last.strip_suffix(ELLIPSIS).map(char_len);
            assert_eq!(kept, Some(limit - before - char_len(ELLIPSIS)), "limit {limit}");
        }
    }

    #[test]
    fn total_length_never_exceeds_limit() {
        let definitions = defs(&["un", "deux trois", "quatre cinq six sept", "huit"]);
        let header_len = char_len(HEADER) + char_len("Pomme");
        for limit in header_len..header_len + 80 {
            let running = build_running(HEADER, "Pomme", &definitions, limit);
            assert!(running.total_length <= limit);
            assert_eq!(char_len(&running.render()), running.total_length);
            let legacy = build_legacy(HEADER, "Pomme", &definitions, &[], limit, 7);
            assert!(legacy.total_length <= limit);
            assert_eq!(char_len(&legacy.render()), legacy.total_length);
        }
    }

    #[test]
    fn rendered_post_fits_the_limit_when_cut() {
        let senses = [
            "Fruit du pommier, de forme ronde, à la peau rouge, verte ou jaune selon la variété.",
            "Pomme de terre, tubercule comestible cultivé dans le monde entier pour sa fécule.",
            "Partie arrondie d'un objet rappelant la forme du fruit, comme une pomme d'arrosoir.",
            "Cœur de certains légumes pommés, comme le chou ou la laitue, serré en boule.",
        ];
        let header = "📚 Wiktionnaire - Le mot du jour est :\n\n";
        let payload = build_running(header, "Pomme — nom commun", &defs(&senses), 300);
        assert!(payload.truncated);
        assert_eq!(payload.total_length, 300);
        assert_eq!(char_len(&payload.render()), 300);
    }

    #[test]
    fn header_is_kept_even_when_over_budget() {
        let payload = build_running(HEADER, "Pomme", &defs(&["a fruit"]), 5);
        assert_eq!(payload.header_line, format!("{HEADER}Pomme"));
        assert!(payload.body_lines.is_empty());
        assert!(!payload.truncated);
    }

    #[test]
    fn later_definitions_are_dropped_after_a_cut() {
        let definitions = defs(&["alpha", "beta gamma delta", "epsilon"]);
        let limit = char_len(HEADER) + char_len("1 - alpha") + 1 + 8;
        let payload = build_running(HEADER, "", &definitions, limit);
        assert_eq!(payload.body_lines.len(), 2);
        assert_eq!(payload.body_lines[0], "1 - alpha");
        assert_eq!(payload.body_lines[1], "2 - b[…]");
        assert!(payload.truncated);
    }

    #[test]
    fn legacy_strips_parasites_before_counting() {
        let parasites = vec!["(pluriel à préciser)".to_owned()];
        let block = "pomme (pluriel à préciser) \\pɔm\\\nFruit du pommier.";
        let payload = build_legacy("", "", &defs(&[block]), &parasites, 180, 7);
        assert_eq!(payload.body_lines, vec!["pomme  \\pɔm\\", "Fruit du pommier."]);
        assert!(!payload.truncated);
    }

    #[test]
    fn legacy_stops_at_seventh_heading_marker() {
        let block = "=== Nom commun ===\npomme\nFruit.\n==== Synonymes ====\npomme de reinette";
        let payload = build_legacy("", "", &defs(&[block]), &[], 180, 7);
        assert_eq!(
            payload.body_lines,
            vec!["=== Nom commun ===", "pomme", "Fruit."]
        );
        assert!(!payload.truncated);
    }

    #[test]
    fn legacy_cuts_whole_block_to_limit() {
        let long = "x".repeat(400);
        let payload = build_legacy("Head\n", "Word\n", &defs(&[long.as_str()]), &[], 180, 7);
        assert_eq!(payload.total_length, 180);
        assert!(payload.truncated);
        let last = payload.body_lines.last().map(String::as_str).unwrap_or("");
        assert!(last.ends_with(ELLIPSIS));
    }

    #[test]
    fn parasite_stripping_is_idempotent() {
        let parasites = vec!["ab".to_owned(), "\\Prononciation ?\\".to_owned()];
        for input in ["aabb", "x \\Prononciation ?\\ y", "plain", "aabbab"] {
            let once = strip_parasites(input, &parasites);
            assert_eq!(strip_parasites(&once, &parasites), once, "{input}");
        }
        assert_eq!(strip_parasites("aabb", &parasites), "");
    }

    #[test]
    fn policies_carry_their_default_limits() {
        assert_eq!(BudgetPolicy::running().limit(), 300);
        assert_eq!(BudgetPolicy::legacy().limit(), 180);
        assert_eq!(BudgetPolicy::legacy().with_limit(120).limit(), 120);
    }

    #[test]
    fn budgeter_dispatches_on_policy() {
        let budgeter = Budgeter::new(BudgetPolicy::running(), Vec::new());
        let payload = budgeter.build(HEADER, "", &defs(&["a fruit"]));
        assert_eq!(payload.body_lines, vec!["1 - a fruit"]);

        let budgeter = Budgeter::new(BudgetPolicy::legacy(), Vec::new());
        let payload = budgeter.build(HEADER, "", &defs(&["a fruit"]));
        assert_eq!(payload.body_lines, vec!["a fruit"]);
    }
}
