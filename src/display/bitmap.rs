/*
 *  display/bitmap.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bar levels to AiP1640 row bitmap
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! The panel is two 8x8 blocks side by side. Bars are drawn as columns but
//! the controller latches rows, so each half is transposed. The two halves
//! are wired with opposite bit order, hence the asymmetric rotations.

use serde::{Deserialize, Serialize};

use crate::display::error::DisplayError;
use crate::display::protocol::MAX_ROWS;

/// Bars per frame (8 per half)
pub const BAR_COUNT: usize = 16;
const HALF: usize = BAR_COUNT / 2;
/// Tallest bar, a full column
pub const MAX_LEVEL: u8 = 8;

/// Sixteen bar levels, left half first.
pub type Frame = [u8; BAR_COUNT];
/// One byte per chip row register.
pub type RowBitmap = [u8; MAX_ROWS];

/// Vertical reading direction of the bar stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Normal,
    Reversed,
}

/// Level -> column pattern lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTable {
    patterns: [u8; MAX_LEVEL as usize + 1],
}

/// Process-wide table, built at compile time.
pub static COLUMN_TABLE: ColumnTable = ColumnTable::new();

impl ColumnTable {
    pub const fn new() -> Self {
        let mut patterns = [0u8; MAX_LEVEL as usize + 1];
        let mut level = 0;
        while level <= MAX_LEVEL as usize {
            // `level` low bits lit, pixel 0 at the MSB
            let column = ((1u16 << level) - 1) as u8;
            patterns[level] = column.reverse_bits();
            level += 1;
        }
        Self { patterns }
    }

    /// Pattern for a level, `None` above [`MAX_LEVEL`].
    #[inline]
    pub fn pattern(&self, level: u8) -> Option<u8> {
        self.patterns.get(level as usize).copied()
    }

    /// Render a frame to the 16 row registers.
    pub fn transform(
        &self,
        frame: &Frame,
        mirror: bool,
        orientation: Orientation,
    ) -> Result<RowBitmap, DisplayError> {
        check_frame(frame)?;

        let (mut left, mut right) = frame.split_at(HALF);
        if mirror {
            std::mem::swap(&mut left, &mut right);
        }

        let mut left_cols = self.columns(left);
        let mut right_cols = self.columns(right);

        if orientation == Orientation::Reversed {
            left_cols.reverse();
            right_cols.reverse();
        }

        let mut rows = [0u8; MAX_ROWS];
        rows[..HALF].copy_from_slice(&rotate_left(&left_cols));
        rows[HALF..].copy_from_slice(&rotate_right(&right_cols));
        Ok(rows)
    }

    fn columns(&self, levels: &[u8]) -> [u8; HALF] {
        let mut cols = [0u8; HALF];
        for (col, &level) in cols.iter_mut().zip(levels) {
            *col = self.patterns[level as usize];
        }
        cols
    }
}

impl Default for ColumnTable {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ColumnTable::transform`] on the shared table.
pub fn transform(frame: &Frame, mirror: bool, orientation: Orientation) -> Result<RowBitmap, DisplayError> {
    COLUMN_TABLE.transform(frame, mirror, orientation)
}

/// Reject any level the column table cannot draw.
pub fn check_frame(frame: &[u8]) -> Result<(), DisplayError> {
    match frame.iter().position(|&level| level > MAX_LEVEL) {
        Some(index) => Err(DisplayError::InvalidLevel { index, level: frame[index] }),
        None => Ok(()),
    }
}

/// Row `i` bit `7 - j` takes column `j` bit `i`.
fn rotate_left(cols: &[u8; HALF]) -> [u8; HALF] {
    let mut rows = [0u8; HALF];
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, &col) in cols.iter().enumerate() {
            if col & (1 << i) != 0 {
                *row |= 1 << (7 - j);
            }
        }
    }
    rows
}

/// Row `i` bit `j` takes column `j` bit `7 - i`.
fn rotate_right(cols: &[u8; HALF]) -> [u8; HALF] {
    let mut rows = [0u8; HALF];
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, &col) in cols.iter().enumerate() {
            if col & (1 << (7 - i)) != 0 {
                *row |= 1 << j;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    // inverse of rotate_left: column j bit i = row i bit (7 - j)
    fn unrotate_left(rows: &[u8]) -> [u8; HALF] {
        let mut cols = [0u8; HALF];
        for (i, &row) in rows.iter().enumerate() {
            for (j, col) in cols.iter_mut().enumerate() {
                if row & (1 << (7 - j)) != 0 {
                    *col |= 1 << i;
                }
            }
        }
        cols
    }

    // inverse of rotate_right: column j bit (7 - i) = row i bit j
    fn unrotate_right(rows: &[u8]) -> [u8; HALF] {
        let mut cols = [0u8; HALF];
        for (i, &row) in rows.iter().enumerate() {
            for (j, col) in cols.iter_mut().enumerate() {
                if row & (1 << j) != 0 {
                    *col |= 1 << (7 - i);
                }
            }
        }
        cols
    }

    const ALL_LAYOUTS: [(bool, Orientation); 4] = [
        (false, Orientation::Normal),
        (false, Orientation::Reversed),
        (true, Orientation::Normal),
        (true, Orientation::Reversed),
    ];

    #[test]
    fn test_column_patterns() {
        let table = ColumnTable::new();
        for level in 0..=MAX_LEVEL {
            let pattern = table.pattern(level).unwrap();
            assert_eq!(pattern.count_ones(), level as u32);
            // lit pixels grow from the MSB down
            assert_eq!(pattern.reverse_bits(), ((1u16 << level) - 1) as u8);
            assert_eq!(pattern.reverse_bits().reverse_bits(), pattern);
        }
        assert_eq!(table.pattern(1), Some(0x80));
        assert_eq!(table.pattern(3), Some(0xE0));
        assert_eq!(table.pattern(8), Some(0xFF));
        assert_eq!(table.pattern(9), None);
    }

    #[test]
    fn test_static_table_matches_fresh_table() {
        assert_eq!(COLUMN_TABLE, ColumnTable::default());
    }

    #[test]
    fn test_blank_and_full_frames() {
        for (mirror, orientation) in ALL_LAYOUTS {
            assert_eq!(transform(&[0; BAR_COUNT], mirror, orientation).unwrap(), [0x00; MAX_ROWS]);
            assert_eq!(transform(&[8; BAR_COUNT], mirror, orientation).unwrap(), [0xFF; MAX_ROWS]);
        }
    }

    #[test]
    fn test_edge_bars_fixture() {
        let frame = [8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8];
        assert_eq!(transform(&frame, false, Orientation::Normal).unwrap(), [0x80; MAX_ROWS]);
        // both flags move the lit columns to the opposite edge of each half
        assert_eq!(transform(&frame, false, Orientation::Reversed).unwrap(), [0x01; MAX_ROWS]);
        assert_eq!(transform(&frame, true, Orientation::Normal).unwrap(), [0x01; MAX_ROWS]);
        assert_eq!(transform(&frame, true, Orientation::Reversed).unwrap(), [0x80; MAX_ROWS]);
    }

    #[test]
    fn test_short_bars() {
        let mut frame = [0u8; BAR_COUNT];
        frame[0] = 1;
        frame[1] = 2;
        frame[8] = 1;
        let rows = transform(&frame, false, Orientation::Normal).unwrap();
        let mut expected = [0u8; MAX_ROWS];
        expected[6] = 0x40;
        expected[7] = 0xC0;
        expected[8] = 0x01;
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_deterministic() {
        let frame = [3, 1, 4, 1, 5, 0, 2, 6, 5, 3, 5, 8, 7, 0, 2, 1];
        for (mirror, orientation) in ALL_LAYOUTS {
            let a = transform(&frame, mirror, orientation).unwrap();
            let b = transform(&frame, mirror, orientation).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_rotation_preserves_bar_heights() {
        let frame = [3, 1, 4, 1, 5, 0, 2, 6, 5, 3, 5, 8, 7, 0, 2, 1];
        let rows = transform(&frame, false, Orientation::Normal).unwrap();
        let left: Vec<u32> = unrotate_left(&rows[..HALF]).iter().map(|c| c.count_ones()).collect();
        let right: Vec<u32> = unrotate_right(&rows[HALF..]).iter().map(|c| c.count_ones()).collect();
        let want_left: Vec<u32> = frame[..HALF].iter().map(|&l| l as u32).collect();
        let want_right: Vec<u32> = frame[HALF..].iter().map(|&l| l as u32).collect();
        assert_eq!(left, want_left);
        assert_eq!(right, want_right);

        // mirrored: halves swap wholesale
        let rows = transform(&frame, true, Orientation::Normal).unwrap();
        let left: Vec<u32> = unrotate_left(&rows[..HALF]).iter().map(|c| c.count_ones()).collect();
        assert_eq!(left, want_right);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut frame = [0u8; BAR_COUNT];
        frame[11] = 9;
        match transform(&frame, false, Orientation::Normal) {
            Err(DisplayError::InvalidLevel { index, level }) => {
                assert_eq!(index, 11);
                assert_eq!(level, 9);
            }
            other => panic!("expected InvalidLevel, got {:?}", other),
        }
    }

    #[test]
    fn test_orientation_serde() {
        let o: Orientation = serde_json::from_str("\"reversed\"").unwrap();
        assert_eq!(o, Orientation::Reversed);
        assert_eq!(serde_json::to_string(&Orientation::Normal).unwrap(), "\"normal\"");
    }
}
