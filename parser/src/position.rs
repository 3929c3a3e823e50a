//! FILENAME: parser/src/position.rs
//! PURPOSE: Bijection between (row, col) coordinates and A1-style labels.
//! CONTEXT: Mirrors the original `Position`/`common.cpp` pair (FromString /
//! ToString), but uses signed coordinates so the two sentinel positions
//! (-1,-1) for a deleted reference and (-2,-2) for a parse failure can be
//! represented directly instead of via a side-channel "valid" flag.

/// Upper bound (exclusive) on rows addressable by the grid.
pub const MAX_ROWS: i32 = 16384;
/// Upper bound (exclusive) on columns addressable by the grid.
pub const MAX_COLS: i32 = 16384;

/// A cell coordinate. Ordinary positions have `0 <= row < MAX_ROWS` and
/// `0 <= col < MAX_COLS`. Two sentinels escape that range on purpose:
/// `(-1, -1)` marks a reference whose target was deleted (renders as
/// `#REF!`); `(-2, -2)` marks a label that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Position { row, col }
    }

    /// Sentinel for a reference to a cell whose row/col band was deleted.
    pub const REF_DELETED: Position = Position::new(-1, -1);
    /// Sentinel for a label that could not be parsed as a cell reference.
    pub const PARSE_ERROR: Position = Position::new(-2, -2);

    /// True for positions with both coordinates inside the addressable grid.
    /// Neither sentinel is valid.
    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.col >= 0 && self.row < MAX_ROWS && self.col < MAX_COLS
    }

    /// Canonical `A1`-style label. Empty string for any negative coordinate
    /// (covers both sentinels); `#!REF` for a column at or beyond the grid's
    /// addressable range.
    pub fn to_label(&self) -> String {
        if self.row < 0 || self.col < 0 {
            return String::new();
        }
        if self.col >= MAX_COLS {
            return "#!REF".to_string();
        }
        let mut label = column_to_letters(self.col);
        label.push_str(&(self.row + 1).to_string());
        label
    }

    /// Parses an `A1`-style label (`A1`, `AA100`, ..., `XFD16384`). Any
    /// malformed input — empty, lowercase, mixed letters/digits, trailing
    /// letters, an out-of-range result — yields `PARSE_ERROR` rather than an
    /// `Err`, matching the original's "parse failure is a position" design.
    pub fn from_label(label: &str) -> Position {
        let bytes = label.as_bytes();
        let split = bytes.iter().position(|b| !b.is_ascii_uppercase());
        let (letters, digits) = match split {
            None => return Position::PARSE_ERROR, // no digits at all
            Some(0) => return Position::PARSE_ERROR, // no leading letters
            Some(i) => (&label[..i], &label[i..]),
        };

        if letters.is_empty() || letters.len() > 3 || digits.is_empty() {
            return Position::PARSE_ERROR;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Position::PARSE_ERROR;
        }

        let mut col: i64 = 0;
        for b in letters.bytes() {
            col = col * 26 + (b - b'A') as i64 + 1;
        }
        let col = col - 1;

        let row: i64 = match digits.parse() {
            Ok(n) => n,
            Err(_) => return Position::PARSE_ERROR,
        };
        let row = row - 1;

        if row < 0 || col < 0 || row >= MAX_ROWS as i64 || col >= MAX_COLS as i64 {
            return Position::PARSE_ERROR;
        }

        Position::new(row as i32, col as i32)
    }
}

/// Renders a 0-based column index as 1-3 uppercase letters (`A`, `AA`, `XFD`).
fn column_to_letters(mut col: i32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        col = col / 26 - 1;
        if col < 0 {
            break;
        }
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII uppercase letters are valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_ordinary_positions() {
        for (label, row, col) in [
            ("A1", 0, 0),
            ("B2", 1, 1),
            ("Z1", 0, 25),
            ("AA1", 0, 26),
            ("AB1", 0, 27),
            ("ZZ1", 0, 701),
            ("AAA1", 0, 702),
            ("XFD16384", 16383, 16383),
        ] {
            let pos = Position::from_label(label);
            assert_eq!(pos, Position::new(row, col), "parsing {label}");
            assert_eq!(pos.to_label(), label, "formatting {row},{col}");
        }
    }

    #[test]
    fn rejects_malformed_labels() {
        for bad in ["", "1", "a1", "A", "R2D2", "-A1", " A1", "A1 ", "AAAA1"] {
            assert_eq!(Position::from_label(bad), Position::PARSE_ERROR, "{bad}");
        }
    }

    #[test]
    fn rejects_row_and_col_beyond_the_addressable_grid() {
        // One past the last addressable row/col in each axis.
        for bad in ["A123456", "XFD16385", "XFE16384"] {
            assert_eq!(Position::from_label(bad), Position::PARSE_ERROR, "{bad}");
        }
    }

    #[test]
    fn sentinels_are_invalid_and_unlabeled() {
        assert!(!Position::REF_DELETED.is_valid());
        assert!(!Position::PARSE_ERROR.is_valid());
        assert_eq!(Position::REF_DELETED.to_label(), "");
        assert_eq!(Position::PARSE_ERROR.to_label(), "");
    }

    #[test]
    fn column_beyond_range_is_literal_ref() {
        let pos = Position::new(0, MAX_COLS);
        assert_eq!(pos.to_label(), "#!REF");
    }
}
