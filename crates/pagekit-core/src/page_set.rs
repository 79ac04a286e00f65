//! Binding parsed page ranges to a concrete document
//!
//! [`validate`] is the only way to obtain a [`PageIndex`], so every index
//! that reaches the recomposer has been checked against a page count.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PageKitError, Result};
use crate::range::PageRangeExpression;

/// A 1-based page position that has been checked against a document's page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(u32);

impl PageIndex {
    pub fn get(self) -> u32 {
        self.0
    }

    /// Position in a 0-based page list.
    pub fn offset(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a validated selection is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Deduplicated and sorted ascending (extract, remove).
    Set,
    /// Written order and duplicates kept (split ranges).
    Sequence,
    /// Written order kept; must name every page exactly once (reorder).
    Permutation,
}

/// Validated page selection for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    pages: Vec<PageIndex>,
    page_count: u32,
}

impl PageSet {
    /// Every page of a document, in order.
    pub fn all(page_count: u32) -> Self {
        Self {
            pages: (1..=page_count).map(PageIndex).collect(),
            page_count,
        }
    }

    pub fn pages(&self) -> &[PageIndex] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page count of the document this set was validated against.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.get()).collect()
    }

    /// Pages of the document not in this set, ascending.
    pub fn complement(&self) -> Result<PageSet> {
        let present: BTreeSet<PageIndex> = self.pages.iter().copied().collect();
        let pages: Vec<PageIndex> = (1..=self.page_count)
            .map(PageIndex)
            .filter(|p| !present.contains(p))
            .collect();

        if pages.is_empty() {
            return Err(PageKitError::EmptyResultSet(format!(
                "removing these pages would leave none of the {} pages",
                self.page_count
            )));
        }

        Ok(PageSet {
            pages,
            page_count: self.page_count,
        })
    }
}

/// Bind a parsed expression to a document with `page_count` pages.
pub fn validate(expr: &PageRangeExpression, page_count: u32, policy: Policy) -> Result<PageSet> {
    // Bounds are checked per token before expanding, so "1-4000000000"
    // against a small document fails without allocating.
    for token in expr.tokens() {
        if token.end() > page_count {
            let index = if token.start() > page_count {
                token.start()
            } else {
                page_count + 1
            };
            return Err(PageKitError::OutOfBounds { index, page_count });
        }
    }

    let expanded: Vec<PageIndex> = expr.expand().map(PageIndex).collect();

    if expanded.is_empty() {
        return Err(PageKitError::EmptyResultSet(format!(
            "'{}' does not name any page",
            expr
        )));
    }

    let pages = match policy {
        Policy::Set => {
            let unique: BTreeSet<PageIndex> = expanded.into_iter().collect();
            unique.into_iter().collect()
        }
        Policy::Sequence => expanded,
        Policy::Permutation => {
            check_permutation(&expanded, page_count)?;
            expanded
        }
    };

    Ok(PageSet { pages, page_count })
}

fn check_permutation(pages: &[PageIndex], page_count: u32) -> Result<()> {
    let mut seen = vec![0u32; page_count as usize];
    for page in pages {
        seen[page.offset()] += 1;
    }

    let missing: Vec<u32> = (1..=page_count)
        .filter(|&p| seen[(p - 1) as usize] == 0)
        .collect();
    let duplicated: Vec<u32> = (1..=page_count)
        .filter(|&p| seen[(p - 1) as usize] > 1)
        .collect();

    if missing.is_empty() && duplicated.is_empty() {
        Ok(())
    } else {
        Err(PageKitError::PermutationMismatch {
            missing,
            duplicated,
        })
    }
}
