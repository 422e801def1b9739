use std::collections::BTreeSet;

use crate::records::EmailInput;

/// Splits the recipients into individual addresses.
///
/// Only whitespace is removed; addresses are not validated beyond that.
pub fn parse_emails(input: &EmailInput) -> Vec<String> {
    let items: Vec<&str> = match input {
        EmailInput::List(items) => items.iter().map(String::as_str).collect(),
        EmailInput::Text(text) => text.split(',').collect(),
    };
    items
        .into_iter()
        .map(clean_email)
        .filter(|email| !email.is_empty())
        .collect()
}

/// Set union of both lists, returned sorted.
pub fn merge_emails(defaults: &[String], extra: &[String]) -> Vec<String> {
    defaults
        .iter()
        .chain(extra)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn clean_email(email: &str) -> String {
    email.chars().filter(|ch| !ch.is_whitespace()).collect()
}
