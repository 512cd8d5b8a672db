//! Report-wide citation checks

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::text::citation_markers;

/// Cross-check of inline markers against the reference list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCheck {
    /// Marker ids used in the text
    pub cited: BTreeSet<u32>,
    /// Cited but absent from the reference list
    pub orphaned: Vec<u32>,
    /// Listed but never cited
    pub uncited: Vec<u32>,
    /// Reference ids run 1..=N without gaps
    pub sequential: bool,
}

impl CitationCheck {
    /// No orphaned markers and sequential numbering
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.sequential
    }
}

/// Check the markers in `texts` against `references`
pub fn validate_citations<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    references: &BTreeSet<u32>,
) -> CitationCheck {
    let cited: BTreeSet<u32> = texts
        .into_iter()
        .flat_map(citation_markers)
        .collect();
    let sequential = match references.last() {
        Some(&max) => references.len() == max as usize && references.first() == Some(&1),
        None => true,
    };
    CitationCheck {
        orphaned: cited.difference(references).copied().collect(),
        uncited: references.difference(&cited).copied().collect(),
        cited,
        sequential,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_orphans_and_uncited() {
        let refs: BTreeSet<u32> = [1, 2, 3].into();
        let check = validate_citations(["Growth [1] and [4].", "Margins [1]."], &refs);
        assert_eq!(check.orphaned, vec![4]);
        assert_eq!(check.uncited, vec![2, 3]);
        assert!(check.sequential);
        assert!(!check.is_clean());
    }

    #[test]
    fn gaps_break_sequence() {
        let refs: BTreeSet<u32> = [1, 2, 5].into();
        let check = validate_citations(["[1] [2] [5]"], &refs);
        assert!(check.orphaned.is_empty());
        assert!(!check.sequential);
    }

    #[test]
    fn empty_is_clean() {
        let check = validate_citations(std::iter::empty(), &BTreeSet::new());
        assert!(check.is_clean());
    }
}
