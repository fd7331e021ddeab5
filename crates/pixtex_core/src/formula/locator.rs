//! Locates `$...$` math fragments in buffer text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static MATH_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^$\n]+)\$").expect("Math fragment regex must compile"));

/// Inner span of one `$...$` fragment, the delimiters excluded.
///
/// Offsets are byte offsets into the full text the fragment was located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: usize,
    pub end: usize,
}

/// Yields the fragments lying fully inside `range`, in text order.
///
/// Scanning starts at `range.start`, hence a fragment straddling the range
/// boundary is not seen at all. An unpaired `$` never produces a fragment,
/// nor does a pair spanning a line break. Both ends of `range` must lie on
/// char boundaries.
pub fn locate_fragments(text: &str, range: Range<usize>) -> impl Iterator<Item = Fragment> + '_ {
    let end = range.end.min(text.len());
    let start = range.start.min(end);
    MATH_FRAGMENT
        .captures_iter(&text[start..end])
        .filter_map(move |caps| {
            caps.get(1).map(|inner| Fragment {
                start: start + inner.start(),
                end: start + inner.end(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(text: &str) -> Vec<&str> {
        locate_fragments(text, 0..text.len())
            .map(|fragment| &text[fragment.start..fragment.end])
            .collect()
    }

    #[test]
    fn test_fragments_in_text_order() {
        assert_eq!(all("a $x^2$ b $y$ c"), ["x^2", "y"]);
        assert_eq!(all("$\\alpha$$\\beta$"), ["\\alpha", "\\beta"]);
    }

    #[test]
    fn test_inner_span_excludes_delimiters() {
        let text = "a $x^2$ b";
        let fragments: Vec<Fragment> = locate_fragments(text, 0..text.len()).collect();
        assert_eq!(fragments, [Fragment { start: 3, end: 6 }]);
    }

    #[test]
    fn test_unterminated_and_empty_fragments() {
        assert!(all("a $x^2 b").is_empty());
        assert!(all("no math here").is_empty());
        assert!(all("$$").is_empty());
    }

    #[test]
    fn test_fragment_does_not_span_lines() {
        assert!(all("$x\ny$").is_empty());
        assert_eq!(all("$x$\n$y$"), ["x", "y"]);
    }

    #[test]
    fn test_range_restricts_the_scan() {
        let text = "a $x^2$ b $y$ c";
        let within: Vec<&str> = locate_fragments(text, 0..9)
            .map(|fragment| &text[fragment.start..fragment.end])
            .collect();
        assert_eq!(within, ["x^2"]);

        // Fragments lying before the range start are not seen.
        let tail: Vec<&str> = locate_fragments(text, 7..text.len())
            .map(|fragment| &text[fragment.start..fragment.end])
            .collect();
        assert_eq!(tail, ["y"]);
    }
}
