//! Pixel adjacency for connected-component operations

use serde::{Deserialize, Serialize};

/// Which neighbours of a pixel count as connected to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Horizontal and vertical neighbours only
    Four,
    /// Horizontal, vertical and diagonal neighbours
    #[default]
    Eight,
}

const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const EIGHT: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    /// Relative (row, col) offsets of the connected neighbours, center excluded
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }

    /// Visit the in-bounds neighbours of `(row, col)` in a `rows x cols` grid
    pub fn for_each_neighbor<F>(&self, row: usize, col: usize, rows: usize, cols: usize, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        for &(dr, dc) in self.offsets() {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                f(nr as usize, nc as usize);
            }
        }
    }
}
