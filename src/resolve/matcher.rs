//! Picks the child folder that a folder code refers to.
//!
//! Codes in the spreadsheet are usually a prefix of the real folder name
//! (`0701-0057` for `0701-0057_BCP`), so matching runs through a fixed list
//! of [`MatchStrategy`] tiers and stops at the first tier with a candidate.
//! All comparisons are case-insensitive and only folders are considered.

use crate::remote::DriveItem;

/// One matching tier. Earlier tiers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Name equals the code.
    Exact,
    /// Name starts with the code.
    Prefix,
    /// Name contains the code anywhere.
    Contains,
}

impl MatchStrategy {
    /// Tiers in the order they are tried.
    pub const ORDER: [MatchStrategy; 3] = [
        MatchStrategy::Exact,
        MatchStrategy::Prefix,
        MatchStrategy::Contains,
    ];

    fn accepts(self, name_lower: &str, wanted_lower: &str) -> bool {
        match self {
            MatchStrategy::Exact => name_lower == wanted_lower,
            MatchStrategy::Prefix => name_lower.starts_with(wanted_lower),
            MatchStrategy::Contains => name_lower.contains(wanted_lower),
        }
    }

    /// Folders in `children` accepted by this tier, in listing order.
    pub fn candidates<'a>(self, children: &'a [DriveItem], wanted_lower: &str) -> Vec<&'a DriveItem> {
        children
            .iter()
            .filter(|c| c.is_folder() && self.accepts(&c.name.to_lowercase(), wanted_lower))
            .collect()
    }
}

/// A matched folder and the tier that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMatch<'a> {
    pub item: &'a DriveItem,
    pub strategy: MatchStrategy,
}

/// Match `code` against the folders in `children`.
///
/// Returns `None` for a blank code or when no tier has a candidate.
///
/// Within the prefix tier the longest name wins, so `0701-0057_BCP_2024`
/// beats `0701-0057_BCP`; ties fall back to the lowercase name, then the raw
/// name, so the result never depends on listing order. Exact and contains
/// tiers take the first candidate in listing order.
pub fn match_folder<'a>(children: &'a [DriveItem], code: &str) -> Option<FolderMatch<'a>> {
    let wanted = code.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    MatchStrategy::ORDER.iter().find_map(|&strategy| {
        let found = strategy.candidates(children, &wanted);
        let item = match strategy {
            MatchStrategy::Prefix => found.into_iter().max_by(|a, b| {
                a.name
                    .chars()
                    .count()
                    .cmp(&b.name.chars().count())
                    // reversed so the smallest name wins among equals under max_by
                    .then_with(|| b.name.to_lowercase().cmp(&a.name.to_lowercase()))
                    .then_with(|| b.name.cmp(&a.name))
            }),
            _ => found.into_iter().next(),
        }?;
        Some(FolderMatch { item, strategy })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders(names: &[&str]) -> Vec<DriveItem> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| DriveItem::folder(format!("id{i}"), *n))
            .collect()
    }

    #[test]
    fn exact_beats_prefix() {
        let children = folders(&["0701-0057_BCP", "0701-0057"]);
        let m = match_folder(&children, "0701-0057").unwrap();
        assert_eq!(m.item.name, "0701-0057");
        assert_eq!(m.strategy, MatchStrategy::Exact);
    }

    #[test]
    fn prefix_prefers_longest_name() {
        let children = folders(&["0701-0057_BCP", "0701-0057_BCP_2024", "X_0701-0057"]);
        let m = match_folder(&children, "0701-0057").unwrap();
        assert_eq!(m.item.name, "0701-0057_BCP_2024");
        assert_eq!(m.strategy, MatchStrategy::Prefix);
    }

    #[test]
    fn prefix_tie_is_order_independent() {
        let a = folders(&["0701-B", "0701-A"]);
        let b = folders(&["0701-A", "0701-B"]);
        assert_eq!(match_folder(&a, "0701").unwrap().item.name, "0701-A");
        assert_eq!(match_folder(&b, "0701").unwrap().item.name, "0701-A");
    }

    #[test]
    fn contains_takes_first_in_listing_order() {
        let children = folders(&["X_0701-0057", "Y_0701-0057"]);
        let m = match_folder(&children, "0701-0057").unwrap();
        assert_eq!(m.item.name, "X_0701-0057");
        assert_eq!(m.strategy, MatchStrategy::Contains);
    }

    #[test]
    fn case_insensitive_and_trimmed() {
        let children = folders(&["Proveedor_ABC"]);
        assert!(match_folder(&children, "  proveedor_abc ").is_some());
    }

    #[test]
    fn files_are_ignored() {
        let children = vec![
            DriveItem::file("f1", "0701-0057.pdf", 10),
            DriveItem::folder("d1", "other"),
        ];
        assert!(match_folder(&children, "0701-0057").is_none());
    }

    #[test]
    fn blank_code_never_matches() {
        let children = folders(&["anything"]);
        assert!(match_folder(&children, "   ").is_none());
    }
}
