//! Fixed-width text layout.
//!
//! All widths count characters, not bytes, so accented text lines up once
//! encoded as CP850.

use arca_core::{Amount, Quantity};

/// Columns on 80 mm paper.
pub const COLUMNS_80MM: usize = 42;
/// Columns on 58 mm paper.
pub const COLUMNS_58MM: usize = 32;

/// Item table header.
pub const ITEM_HEADER: &str = "PRODUCTO         CANT  P.U    TOTAL";

const NAME_WIDTH: usize = 17;
const QTY_WIDTH: usize = 5;
const PRICE_WIDTH: usize = 7;
const TOTAL_WIDTH: usize = 8;

/// Formats lines for a given paper width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFormatter {
    width: usize,
}

impl LineFormatter {
    /// Formatter for an explicit column count.
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Formatter for a paper width: 80 and 58 mm map to their column
    /// counts, any other value is taken as the column count itself.
    pub fn for_paper(paper_width_mm: u16) -> Self {
        match paper_width_mm {
            80 => Self::new(COLUMNS_80MM),
            58 => Self::new(COLUMNS_58MM),
            other => Self::new(usize::from(other)),
        }
    }

    /// Column count.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pads on the left to center `text`; text wider than the line is cut.
    pub fn center(&self, text: &str) -> String {
        center_in(text, self.width)
    }

    /// `left` and `right` at opposite edges; cut to width when they collide.
    pub fn justify(&self, left: &str, right: &str) -> String {
        let used = char_len(left) + char_len(right);
        if used >= self.width {
            return take_chars(&format!("{left}{right}"), self.width);
        }
        format!("{left}{}{right}", " ".repeat(self.width - used))
    }

    /// Cuts `text` to the line width.
    pub fn fit(&self, text: &str) -> String {
        take_chars(text, self.width)
    }

    /// A full-width line of `ch`.
    pub fn separator(&self, ch: char) -> String {
        std::iter::repeat_n(ch, self.width).collect()
    }

    /// Word-wraps `text` into lines no wider than the formatter.
    ///
    /// Words longer than a line are split.
    pub fn wrap(&self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let mut word = word.to_string();
            while char_len(&word) > self.width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(take_chars(&word, self.width));
                word = word.chars().skip(self.width).collect();
            }
            if current.is_empty() {
                current = word;
            } else if char_len(&current) + 1 + char_len(&word) <= self.width {
                current.push(' ');
                current.push_str(&word);
            } else {
                lines.push(std::mem::replace(&mut current, word));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// One row of the item table.
    pub fn item_row(
        &self,
        name: &str,
        quantity: Quantity,
        unit_price: Amount,
        total: Amount,
    ) -> String {
        let row = format!(
            "{:<NAME_WIDTH$} {:>QTY_WIDTH$} {:>PRICE_WIDTH$} {:>TOTAL_WIDTH$}",
            truncate(name, NAME_WIDTH),
            quantity.to_string(),
            unit_price.grouped(),
            total.grouped(),
        );
        take_chars(&row, self.width)
    }
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self::new(COLUMNS_80MM)
    }
}

/// Centers `text` within `width` columns.
pub fn center_in(text: &str, width: usize) -> String {
    let len = char_len(text);
    if len >= width {
        return take_chars(text, width);
    }
    format!("{}{text}", " ".repeat((width - len) / 2))
}

/// Shortens `text` to `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if char_len(text) <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", take_chars(text, keep))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_paper_widths() {
        assert_eq!(LineFormatter::for_paper(80).width(), 42);
        assert_eq!(LineFormatter::for_paper(58).width(), 32);
        assert_eq!(LineFormatter::for_paper(48).width(), 48);
    }

    #[test]
    fn test_center_pads_left_only() {
        let f = LineFormatter::new(10);
        assert_eq!(f.center("abcd"), "   abcd");
        assert_eq!(f.center("abcdefghijkl"), "abcdefghij");
    }

    #[test]
    fn test_center_counts_characters() {
        let f = LineFormatter::new(11);
        assert_eq!(f.center("Crédito"), "  Crédito");
    }

    #[test]
    fn test_justify() {
        let f = LineFormatter::new(20);
        assert_eq!(f.justify("TOTAL:", "$1,210.00"), "TOTAL:     $1,210.00");
        assert_eq!(f.justify("SUBTOTAL:", "$123,456,789.00"), "SUBTOTAL:$123,456,78");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Yerba Mate Playadito 1kg", 17), "Yerba Mate Pla...");
        assert_eq!(truncate("Pan", 17), "Pan");
        assert_eq!(truncate("Ñoquis de papa caseros", 10), "Ñoquis ...");
    }

    #[test]
    fn test_item_row() {
        let f = LineFormatter::new(42);
        let row = f.item_row(
            "Yerba Mate Playadito 1kg",
            Quantity::units(2),
            "3500".parse().unwrap(),
            "7000".parse().unwrap(),
        );
        assert_eq!(row, "Yerba Mate Pla... 2.000 3,500.00 7,000.00");
    }

    #[test]
    fn test_item_row_cut_to_width() {
        let f = LineFormatter::new(32);
        let row = f.item_row(
            "Queso",
            "0.350".parse().unwrap(),
            "9000".parse().unwrap(),
            "3150".parse().unwrap(),
        );
        assert_eq!(row.chars().count(), 32);
        assert!(row.starts_with("Queso             0.350"));
    }

    #[test]
    fn test_wrap() {
        let f = LineFormatter::new(42);
        assert_eq!(
            f.wrap("Transparencia Fiscal al Consumidor - Ley 27.743"),
            vec!["Transparencia Fiscal al Consumidor - Ley", "27.743"]
        );
        let narrow = LineFormatter::new(4);
        assert_eq!(narrow.wrap("abcdefghij k"), vec!["abcd", "efgh", "ij k"]);
        assert!(f.wrap("   ").is_empty());
    }

    proptest! {
        #[test]
        fn test_lines_never_exceed_width(
            width in 1usize..64,
            left in "\\PC{0,50}",
            right in "\\PC{0,50}",
        ) {
            let f = LineFormatter::new(width);
            prop_assert!(f.center(&left).chars().count() <= width);
            prop_assert!(f.justify(&left, &right).chars().count() <= width);
            prop_assert_eq!(f.separator('-').chars().count(), width);
            for line in f.wrap(&left) {
                prop_assert!(line.chars().count() <= width);
            }
        }

        #[test]
        fn test_truncate_bounds(text in "\\PC{0,60}", max in 3usize..40) {
            prop_assert!(truncate(&text, max).chars().count() <= max);
        }
    }
}
