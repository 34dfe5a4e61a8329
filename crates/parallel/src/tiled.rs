//! Disjoint tiling of rasters
//!
//! Tiles are non-overlapping, laid out from the top-left corner. The last
//! tile of a row or column may extend past the raster edge; its `rows`/`cols`
//! are clipped to the raster while `size` keeps the nominal tile size.

/// A tile covering a subset of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of raster rows covered by this tile
    pub rows: usize,
    /// Number of raster columns covered by this tile
    pub cols: usize,
    /// Nominal tile size (side length before clipping)
    pub size: usize,
}

impl Tile {
    /// Whether the tile was clipped at the raster edge (and is therefore padded)
    pub fn is_padded(&self) -> bool {
        self.rows < self.size || self.cols < self.size
    }

    /// Row range in source coordinates
    pub fn row_range(&self) -> std::ops::Range<usize> {
        self.row_offset..self.row_offset + self.rows
    }

    /// Column range in source coordinates
    pub fn col_range(&self) -> std::ops::Range<usize> {
        self.col_offset..self.col_offset + self.cols
    }
}

/// Iterator over disjoint tiles covering a raster
pub struct TileIterator {
    total_rows: usize,
    total_cols: usize,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    /// Create a new tile iterator. A zero tile size is treated as 1.
    pub fn new(total_rows: usize, total_cols: usize, tile_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            tile_size: tile_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }

    /// Number of tiles along (rows, cols)
    pub fn grid_shape(&self) -> (usize, usize) {
        (
            self.total_rows.div_ceil(self.tile_size),
            self.total_cols.div_ceil(self.tile_size),
        )
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let tile = Tile {
            row_offset: self.current_row,
            col_offset: self.current_col,
            rows: self.tile_size.min(self.total_rows - self.current_row),
            cols: self.tile_size.min(self.total_cols - self.current_col),
            size: self.tile_size,
        };

        self.current_col += self.tile_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}
