//! Fragment splitting along natural boundaries
//!
//! The primary pass cuts the payload at blank lines and declaration starts
//! at delimiter depth zero. Oversized fragments are split recursively at
//! interior depth-zero points; fragments split out of one original unit are
//! chained sequentially so the graph builder can preserve their order.
//! A fragment whose interior never returns to depth zero cannot be split
//! without breaking syntactic validity and is kept whole.

use crate::context::is_declaration_start;
use crate::error::DecompositionError;

/// One contiguous slice of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fragment {
    /// Fragment text
    pub text: String,
    /// 1-based first line in the payload
    pub start_line: u32,
    /// 1-based last line in the payload (inclusive)
    pub end_line: u32,
    /// Must run after the previous fragment of the same split group
    pub chained_to_prev: bool,
}

impl Fragment {
    fn from_lines(lines: &[(u32, &str)], chained: bool) -> Self {
        Self {
            text: lines
                .iter()
                .map(|(_, l)| *l)
                .collect::<Vec<_>>()
                .join("\n"),
            start_line: lines.first().map(|(n, _)| *n).unwrap_or(1),
            end_line: lines.last().map(|(n, _)| *n).unwrap_or(1),
            chained_to_prev: chained,
        }
    }

    /// Number of lines in the fragment
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Verify the payload is parseable: non-empty with balanced delimiters
pub(crate) fn check_payload(payload: &str) -> Result<(), DecompositionError> {
    if payload.trim().is_empty() {
        return Err(DecompositionError::EmptyPayload);
    }

    let mut depth: i64 = 0;
    for (line_no, line) in payload.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(DecompositionError::UnparsablePayload(format!(
                    "unexpected closing delimiter on line {}",
                    line_no + 1
                )));
            }
        }
    }
    if depth != 0 {
        return Err(DecompositionError::UnparsablePayload(format!(
            "{depth} unclosed delimiters"
        )));
    }
    Ok(())
}

/// Split the payload into fragments no larger than `granularity` where the
/// syntax allows it
pub(crate) fn split_payload(
    payload: &str,
    granularity: usize,
    max_depth: usize,
) -> Result<Vec<Fragment>, DecompositionError> {
    check_payload(payload)?;

    let mut out = Vec::new();
    for fragment in primary_split(payload) {
        refine(fragment, granularity, 0, max_depth, &mut out)?;
    }
    Ok(out)
}

/// Cut at blank lines and declaration starts at depth zero
fn primary_split(payload: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut current: Vec<(u32, &str)> = Vec::new();
    let mut depth: i64 = 0;

    for (idx, line) in payload.lines().enumerate() {
        let line_no = idx as u32 + 1;

        if depth == 0 {
            let blank = line.trim().is_empty();
            if blank {
                if !current.is_empty() {
                    fragments.push(Fragment::from_lines(&current, false));
                    current.clear();
                }
                continue;
            }
            if is_declaration_start(line) && !current.is_empty() {
                fragments.push(Fragment::from_lines(&current, false));
                current.clear();
            }
        }

        current.push((line_no, line));
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            }
        }
    }

    if !current.is_empty() {
        fragments.push(Fragment::from_lines(&current, false));
    }
    fragments
}

/// Recursively split an oversized fragment at interior depth-zero points
fn refine(
    fragment: Fragment,
    granularity: usize,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<Fragment>,
) -> Result<(), DecompositionError> {
    if fragment.line_count() <= granularity {
        out.push(fragment);
        return Ok(());
    }
    if depth >= max_depth {
        return Err(DecompositionError::RecursionDepthExceeded);
    }

    let pieces = balanced_cut(&fragment, granularity);
    if pieces.len() <= 1 {
        // Unsplittable without breaking syntactic validity.
        out.push(fragment);
        return Ok(());
    }

    for piece in pieces {
        refine(piece, granularity, depth + 1, max_depth, out)?;
    }
    Ok(())
}

/// Cut at lines where the delimiter depth returns to zero, packing up to
/// `granularity` lines per piece; children after the first are chained to
/// preserve the original order
fn balanced_cut(fragment: &Fragment, granularity: usize) -> Vec<Fragment> {
    let lines: Vec<(u32, &str)> = fragment
        .text
        .lines()
        .enumerate()
        .map(|(i, l)| (fragment.start_line + i as u32, l))
        .collect();

    let mut pieces = Vec::new();
    let mut current: Vec<(u32, &str)> = Vec::new();
    let mut depth: i64 = 0;

    for &(line_no, line) in &lines {
        current.push((line_no, line));
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            }
        }
        if depth == 0 && current.len() >= granularity {
            pieces.push(Fragment::from_lines(&current, !pieces.is_empty()));
            current.clear();
        }
    }
    if !current.is_empty() {
        pieces.push(Fragment::from_lines(&current, !pieces.is_empty()));
    }
    pieces
}
