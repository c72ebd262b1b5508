//! Block windows for out-of-core raster processing
//!
//! A classification run never holds a full multi-band image in one matrix;
//! it walks the raster in rectangular blocks. Edge blocks are clipped to the
//! image bounds, so a block never overruns the raster extent.

/// A rectangular window of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Row of the upper-left corner in the source raster
    pub row: usize,
    /// Column of the upper-left corner in the source raster
    pub col: usize,
    /// Number of rows in this block
    pub rows: usize,
    /// Number of columns in this block
    pub cols: usize,
}

impl Block {
    /// Create a new block
    pub fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self { row, col, rows, cols }
    }

    /// Number of pixels covered by this block
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the block covers no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert block-local coordinates to source raster coordinates
    pub fn to_source(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row + local_row, self.col + local_col)
    }
}

/// Row-major iterator over the blocks covering a raster.
///
/// Blocks are visited top-to-bottom, then left-to-right within a row of
/// blocks. The last block in each dimension is clipped to the remaining
/// extent.
pub struct BlockIterator {
    total_rows: usize,
    total_cols: usize,
    block_rows: usize,
    block_cols: usize,
    current_row: usize,
    current_col: usize,
}

impl BlockIterator {
    /// Create an iterator over `block_rows` x `block_cols` windows
    pub fn new(total_rows: usize, total_cols: usize, block_rows: usize, block_cols: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            block_rows: block_rows.max(1),
            block_cols: block_cols.max(1),
            current_row: 0,
            current_col: 0,
        }
    }

    /// Iterator over square blocks of the given size
    pub fn squares(total_rows: usize, total_cols: usize, block_size: usize) -> Self {
        Self::new(total_rows, total_cols, block_size, block_size)
    }
}

impl Iterator for BlockIterator {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let rows = self.block_rows.min(self.total_rows - self.current_row);
        let cols = self.block_cols.min(self.total_cols - self.current_col);
        let block = Block::new(self.current_row, self.current_col, rows, cols);

        self.current_col += self.block_cols;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.block_rows;
        }

        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_iterator_order() {
        let blocks: Vec<_> = BlockIterator::squares(8, 8, 4).collect();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], Block::new(0, 0, 4, 4));
        assert_eq!(blocks[1], Block::new(0, 4, 4, 4));
        assert_eq!(blocks[2], Block::new(4, 0, 4, 4));
        assert_eq!(blocks[3], Block::new(4, 4, 4, 4));
    }

    #[test]
    fn test_edge_blocks_clipped() {
        let blocks: Vec<_> = BlockIterator::squares(10, 7, 4).collect();
        for block in &blocks {
            assert!(block.row + block.rows <= 10);
            assert!(block.col + block.cols <= 7);
        }
        // Last block in each dimension carries the remainder
        let last = blocks.last().unwrap();
        assert_eq!((last.rows, last.cols), (2, 3));
    }

    #[test]
    fn test_blocks_cover_every_pixel_once() {
        let (rows, cols) = (13, 9);
        let mut covered = vec![0u32; rows * cols];

        for block in BlockIterator::new(rows, cols, 5, 3) {
            for r in block.row..block.row + block.rows {
                for c in block.col..block.col + block.cols {
                    covered[r * cols + c] += 1;
                }
            }
        }

        assert!(covered.iter().all(|&n| n == 1), "blocks must partition the raster");
    }

    #[test]
    fn test_empty_raster() {
        assert_eq!(BlockIterator::squares(0, 10, 4).count(), 0);
        assert_eq!(BlockIterator::squares(10, 0, 4).count(), 0);
    }
}
