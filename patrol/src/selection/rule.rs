use std::fmt;

use super::{Candidate, Level};

/// Minimum longest-common-subsequence ratio for a fuzzy item match.
const ITEM_LCS_RATIO: f32 = 0.6;

const CATEGORY_NOISE: [char; 9] = [' ', '　', '·', ':', '：', '[', ']', '【', '】'];

/// One line of a priority list.
///
/// `<category>`, `<category> <item>` where item may be a level, or bare text matched against the
/// whole recognized text of secondary candidates.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PriorityRule {
    Bare(String),
    Category { category: String, item: String },
}

impl PriorityRule {
    pub fn parse(rule: &str) -> Option<PriorityRule> {
        let rule = rule.trim();
        if rule.is_empty() {
            return None;
        }

        Some(match rule.split_once(' ') {
            Some((category, item)) => PriorityRule::Category {
                category: category.trim().to_string(),
                item: item.trim().to_string(),
            },
            None => PriorityRule::Bare(rule.to_string()),
        })
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            PriorityRule::Bare(rule) => {
                is_category_match(&candidate.category, rule)
                    || candidate.name == *rule
                    || candidate.text == *rule
            }
            PriorityRule::Category { category, item } => {
                if !is_category_match(&candidate.category, category) {
                    return false;
                }
                if item.is_empty() {
                    return true;
                }
                if let Ok(level) = item.parse::<Level>()
                    && level.is_known()
                {
                    return candidate.level == level;
                }

                candidate.name == *item
                    || candidate.text.ends_with(item.as_str())
                    || find_by_lcs(item, &candidate.name, ITEM_LCS_RATIO)
                    || find_by_lcs(item, &candidate.text, ITEM_LCS_RATIO)
            }
        }
    }
}

impl fmt::Display for PriorityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityRule::Bare(rule) => write!(f, "{rule}"),
            PriorityRule::Category { category, item } if item.is_empty() => write!(f, "{category}"),
            PriorityRule::Category { category, item } => write!(f, "{category} {item}"),
        }
    }
}

/// Splits priority text input into trimmed, non-empty lines.
pub fn parse_rules(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strips separators and brackets from a category and resolves known aliases.
pub fn normalize_category(category: &str) -> String {
    let normalized = category
        .trim()
        .chars()
        .filter(|c| !CATEGORY_NOISE.contains(c))
        .collect::<String>();

    match normalized.as_str() {
        "击破" => "异常击破".to_string(),
        _ => normalized,
    }
}

/// Whether a recognized `category` matches the `rule` category.
///
/// Besides equality, normalized forms match when either contains the other so partially
/// recognized categories still match.
pub fn is_category_match(category: &str, rule: &str) -> bool {
    if category == rule {
        return true;
    }

    let category = normalize_category(category);
    let rule = normalize_category(rule);
    if category.is_empty() || rule.is_empty() {
        return false;
    }

    category == rule || category.contains(&rule) || rule.contains(&category)
}

/// Length of the longest common subsequence of `a` and `b` in characters.
pub fn lcs_length(a: &str, b: &str) -> usize {
    let b = b.chars().collect::<Vec<_>>();
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for a in a.chars() {
        for (j, b) in b.iter().enumerate() {
            current[j + 1] = if a == *b {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Whether at least `ratio` of the characters of `source` appear in order in `target`.
pub fn find_by_lcs(source: &str, target: &str, ratio: f32) -> bool {
    let length = source.chars().count();
    if length == 0 {
        return false;
    }

    lcs_length(source, target) as f32 >= length as f32 * ratio
}

#[cfg(test)]
mod tests {
    use std::assert_matches;

    use super::*;
    use crate::geometry::Rect;

    fn candidate(text: &str) -> Candidate {
        Candidate::from_ocr(text, Rect::new(0, 0, 100, 20)).unwrap()
    }

    #[test]
    fn parse_splits_on_first_space() {
        assert_matches!(PriorityRule::parse("  "), None);
        assert_eq!(
            PriorityRule::parse(" 通用 "),
            Some(PriorityRule::Bare("通用".to_string()))
        );
        assert_eq!(
            PriorityRule::parse("通用 强力 喷水枪"),
            Some(PriorityRule::Category {
                category: "通用".to_string(),
                item: "强力 喷水枪".to_string(),
            })
        );
    }

    #[test]
    fn parse_rules_drops_blank_lines() {
        let rules = parse_rules("通用 A\n\n  冰 \r\n\t\n[击破]叩击");

        assert_eq!(rules, vec!["通用 A", "冰", "[击破]叩击"]);
    }

    #[test]
    fn normalize_category_strips_noise_and_aliases() {
        assert_eq!(normalize_category(" 【异常·击破】 "), "异常击破");
        assert_eq!(normalize_category("击破："), "异常击破");
        assert_eq!(normalize_category("[通 用]"), "通用");
    }

    #[test]
    fn is_category_match_allows_containment() {
        assert!(is_category_match("通用", "通用"));
        assert!(is_category_match("击破", "异常·击破"));
        assert!(is_category_match("冰属性", "冰"));
        assert!(!is_category_match("冰", "火"));
        assert!(!is_category_match("", "·"));
    }

    #[test]
    fn matches_bare_rule() {
        let primary = candidate("[通用]喷水枪");
        let secondary = candidate("啦啦啦");

        assert!(PriorityRule::Bare("通用".into()).matches(&primary));
        assert!(PriorityRule::Bare("喷水枪".into()).matches(&primary));
        assert!(PriorityRule::Bare("啦啦啦".into()).matches(&secondary));
        assert!(!PriorityRule::Bare("冰".into()).matches(&primary));
    }

    #[test]
    fn matches_category_with_level() {
        let mut primary = candidate("[通用]喷水枪");
        let rule = PriorityRule::parse("通用 A").unwrap();

        assert!(!rule.matches(&primary));
        primary.level = Level::A;
        assert!(rule.matches(&primary));
        assert!(!PriorityRule::parse("冰 A").unwrap().matches(&primary));
    }

    #[test]
    fn matches_category_with_fuzzy_item() {
        let primary = candidate("[通用]强力喷水枪");

        assert!(PriorityRule::parse("通用 强力喷水枪").unwrap().matches(&primary));
        assert!(PriorityRule::parse("通用 喷水枪").unwrap().matches(&primary));
        assert!(PriorityRule::parse("通用 强力水炮").unwrap().matches(&primary));
        assert!(!PriorityRule::parse("通用 冰霜护盾").unwrap().matches(&primary));
        assert!(PriorityRule::parse("通用 ").unwrap().matches(&primary));
    }

    #[test]
    fn lcs_length_counts_characters() {
        assert_eq!(lcs_length("强力水炮", "强力喷水枪"), 3);
        assert_eq!(lcs_length("", "abc"), 0);
        assert_eq!(lcs_length("abcde", "ace"), 3);
        assert!(find_by_lcs("abcde", "ace", 0.6));
        assert!(!find_by_lcs("abcde", "ac", 0.6));
        assert!(!find_by_lcs("", "ac", 0.6));
    }
}
