//! Rule Matcher
//!
//! Picks the initial tag of a new client from class/instance/title patterns.

use crate::config::Rule;

/// Stand-in for a missing WM_CLASS component
pub const BROKEN: &str = "broken";

/// Tag assigned by the rule table, if any rule matches.
///
/// A rule matches when each pattern it sets is a substring of the
/// corresponding attribute. Later matches override earlier ones.
pub fn apply_rules(rules: &[Rule], class: &str, instance: &str, title: &str) -> Option<u32> {
    rules
        .iter()
        .filter(|rule| {
            matches(rule.title.as_deref(), title)
                && matches(rule.class.as_deref(), class)
                && matches(rule.instance.as_deref(), instance)
        })
        .map(|rule| rule.tag)
        .last()
}

fn matches(pattern: Option<&str>, value: &str) -> bool {
    pattern.is_none_or(|p| value.contains(p))
}
