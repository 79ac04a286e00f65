//! Page range grammar
//!
//! Turns strings like `"1-3, 5, 8-10"` into an ordered list of tokens.
//! Nothing here knows about documents: `"99"` parses fine and is only
//! rejected once bound to a page count by [`crate::page_set::validate`].

use std::fmt;
use std::str::FromStr;

use crate::error::{PageKitError, Result, SyntaxReason};

/// One comma-separated element of a page range string, as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    Single(u32),
    /// Inclusive on both ends.
    Range(u32, u32),
}

impl RangeToken {
    pub fn start(&self) -> u32 {
        match *self {
            RangeToken::Single(page) => page,
            RangeToken::Range(start, _) => start,
        }
    }

    pub fn end(&self) -> u32 {
        match *self {
            RangeToken::Single(page) => page,
            RangeToken::Range(_, end) => end,
        }
    }

    /// Pages covered by this token, in ascending order.
    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start()..=self.end()
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeToken::Single(page) => write!(f, "{}", page),
            RangeToken::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

/// Parsed but unvalidated page specification. Token order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRangeExpression {
    tokens: Vec<RangeToken>,
}

impl PageRangeExpression {
    pub fn new(tokens: Vec<RangeToken>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[RangeToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every page the expression names, in written order, duplicates kept.
    pub fn expand(&self) -> impl Iterator<Item = u32> + '_ {
        self.tokens.iter().flat_map(RangeToken::pages)
    }
}

impl fmt::Display for PageRangeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for PageRangeExpression {
    type Err = PageKitError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse page range string like "1-3, 5, 8-10" into ordered tokens
pub fn parse(input: &str) -> Result<PageRangeExpression> {
    let mut tokens = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        tokens.push(parse_token(part)?);
    }

    Ok(PageRangeExpression { tokens })
}

fn parse_token(part: &str) -> Result<RangeToken> {
    if let Some((start, end)) = part.split_once('-') {
        // Range like "1-3"
        let start = parse_page(part, start)?;
        let end = parse_page(part, end)?;

        if start > end {
            return Err(syntax(part, SyntaxReason::Inverted { start, end }));
        }

        Ok(RangeToken::Range(start, end))
    } else {
        // Single page like "5"
        Ok(RangeToken::Single(parse_page(part, part)?))
    }
}

fn parse_page(token: &str, text: &str) -> Result<u32> {
    let text = text.trim();
    // u32::from_str accepts a leading '+', which is not part of the grammar
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(syntax(token, SyntaxReason::NotNumeric));
    }

    let page: u32 = text
        .parse()
        .map_err(|_| syntax(token, SyntaxReason::NotNumeric))?;

    if page == 0 {
        return Err(syntax(token, SyntaxReason::Zero));
    }

    Ok(page)
}

fn syntax(token: &str, reason: SyntaxReason) -> PageKitError {
    PageKitError::Syntax {
        token: token.to_string(),
        reason,
    }
}
