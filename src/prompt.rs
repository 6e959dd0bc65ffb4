//! Reading a traversal step from the user.

use crate::graph::EdgeChoice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Empty line or `q`.
    Quit,
    /// Zero-based position in the page's choices.
    Pick(usize),
    /// Number outside the listed range.
    OutOfRange(usize),
    /// Anything else narrows the list by edge name.
    Filter(String),
}

impl Selection {
    pub fn parse(line: &str, choices: usize) -> Self {
        let input = line.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("q") {
            return Selection::Quit;
        }
        match input.parse::<usize>() {
            Ok(number) if (1..=choices).contains(&number) => Selection::Pick(number - 1),
            Ok(number) => Selection::OutOfRange(number),
            Err(_) => Selection::Filter(input.to_string()),
        }
    }
}

/// Choices whose edge name contains `filter`, ignoring case and spaces,
/// paired with their position in `choices`.
pub fn matching<'a>(choices: &'a [EdgeChoice], filter: Option<&str>) -> Vec<(usize, &'a EdgeChoice)> {
    let needle = filter.map(squash).unwrap_or_default();
    choices
        .iter()
        .enumerate()
        .filter(|(_, choice)| squash(&choice.edge_name).contains(&needle))
        .collect()
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}
