//! Text rendering helpers for container diagnostics.
//!
//! Used by the container's error types to print resolution chains and
//! "did you mean?" hints with readable type names.

use std::collections::HashSet;

/// Joins a resolution chain with arrows.
///
/// # Examples
/// ```
/// use ambar_support::rendering::render_chain;
///
/// let chain = ["OrderService", "OrderRepository", "OrderService"];
/// assert_eq!(render_chain(&chain), "OrderService → OrderRepository → OrderService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Strips module paths from a fully qualified type name, keeping
/// generic structure intact.
///
/// ```
/// use ambar_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("shop::orders::OrderService"), "OrderService");
/// assert_eq!(
///     shorten_type_name("alloc::vec::Vec<alloc::sync::Arc<dyn shop::Plugin>>"),
///     "Vec<Arc<dyn Plugin>>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Quick typo heuristic: names of similar length sharing at least 60% of
/// their characters position by position.
pub fn is_close(a: &str, b: &str) -> bool {
    if a.len().abs_diff(b.len()) > 3 {
        return false;
    }

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return true;
    }

    let common = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    common * 100 / max_len >= 60
}

/// Ranks `available` type names by similarity to `requested` and returns
/// at most `limit` of them, best first.
pub fn suggest_similar(requested: &str, available: &[&str], limit: usize) -> Vec<String> {
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut seen = HashSet::new();
    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| seen.insert(name))
        .filter_map(|&name| {
            let short = shorten_type_name(name).to_lowercase();
            if short == requested_short {
                return None;
            }
            if short.contains(&requested_short) || requested_short.contains(&short) {
                return Some((name, 100));
            }
            if is_close(&short, &requested_short) {
                return Some((name, 80));
            }

            let prefix = short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();
            (prefix >= 3).then_some((name, prefix * 10))
        })
        .collect();

    // stable: equal scores keep registration order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_one() {
        assert_eq!(render_chain(&["A"]), "A");
    }

    #[test]
    fn empty_chain() {
        let chain: [&str; 0] = [];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn shorten_keeps_plain_names() {
        assert_eq!(shorten_type_name("u32"), "u32");
    }

    #[test]
    fn shorten_slices_and_references() {
        assert_eq!(shorten_type_name("&[core::option::Option<u8>]"), "&[Option<u8>]");
    }

    #[test]
    fn close_names() {
        assert!(is_close("mailer", "mailre"));
        assert!(is_close("database", "databse"));
        assert!(!is_close("database", "clock"));
    }

    #[test]
    fn suggests_typo() {
        let available = ["shop::Mailer", "shop::Clock", "shop::MailQueue"];
        let suggestions = suggest_similar("shop::Mialer", &available, 3);
        assert_eq!(suggestions.first().map(String::as_str), Some("shop::Mailer"));
    }

    #[test]
    fn exact_match_is_not_a_suggestion() {
        let available = ["shop::Mailer"];
        assert!(suggest_similar("shop::Mailer", &available, 3).is_empty());
    }

    #[test]
    fn unrelated_names_give_nothing() {
        let available = ["shop::Database"];
        assert!(suggest_similar("XyzAbc", &available, 3).is_empty());
    }

    #[test]
    fn overridden_registrations_suggested_once() {
        // equal scores interleave the repeated name with another one
        let available = ["shop::Mailer", "shop::Mailet", "shop::Mailer"];
        let suggestions = suggest_similar("shop::Mailr", &available, 3);
        assert_eq!(suggestions, vec!["shop::Mailer".to_string(), "shop::Mailet".to_string()]);
    }
}
