//! Tiled classification of multi-band rasters
//!
//! Applies a trained model bundle to a band stack block by block, so the
//! full image never has to materialize as one sample matrix. An optional
//! inclusion mask limits prediction to its non-zero pixels; everything else
//! keeps the background label 0.
//!
//! In parallel mode blocks are computed concurrently, but results are
//! merged into the output raster by a single sequential writer, so the
//! shared raster never sees concurrent writes.

use crate::bundle::ModelBundle;
use crate::stack::BandStack;
use mapcover_core::{Block, BlockIterator, Error, Raster, Result};
use ndarray::Axis;
use rayon::prelude::*;

/// Label written for pixels excluded by the mask
pub const BACKGROUND_LABEL: u8 = 0;

/// Default block edge length when the caller does not provide one
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Parameters for a classification run
#[derive(Debug, Clone)]
pub struct ClassifyParams {
    /// Square block edge length; `None` uses [`DEFAULT_BLOCK_SIZE`]
    pub block_size: Option<usize>,
    /// Compute blocks concurrently
    pub parallel: bool,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            block_size: None,
            parallel: true,
        }
    }
}

/// Classify a band stack with a trained model bundle.
///
/// All validation (bundle coherence, band count, mask extent) happens
/// before the output raster is allocated; a failing check never leaves a
/// partially written result. Output pixels carry the original class labels,
/// with 0 for masked-out pixels.
pub fn classify(
    stack: &BandStack<'_>,
    bundle: &ModelBundle,
    mask: Option<&Raster<u8>>,
    params: &ClassifyParams,
) -> Result<Raster<u8>> {
    // Pre-flight checks, cheapest first
    bundle.validate()?;
    if bundle.dim() != stack.dim() {
        return Err(Error::DimensionMismatch {
            expected: bundle.dim(),
            actual: stack.dim(),
        });
    }

    let (rows, cols) = stack.shape();
    if let Some(mask) = mask {
        if mask.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: mask.rows(),
                ac: mask.cols(),
            });
        }
    }

    let scaling = bundle.scaling()?;
    let model = bundle.classifier()?;

    let block_size = params.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1);
    let blocks: Vec<Block> = BlockIterator::squares(rows, cols, block_size).collect();

    let process = |block: Block| -> Result<(Block, Vec<u8>)> {
        let x = stack.read_block(&block);

        let selected: Vec<usize> = match mask {
            Some(mask) => {
                let mut idx = Vec::new();
                for lr in 0..block.rows {
                    for lc in 0..block.cols {
                        let (r, c) = block.to_source(lr, lc);
                        if unsafe { mask.get_unchecked(r, c) } != 0 {
                            idx.push(lr * block.cols + lc);
                        }
                    }
                }
                idx
            }
            None => (0..block.len()).collect(),
        };

        let mut labels = vec![BACKGROUND_LABEL; block.len()];
        if !selected.is_empty() {
            let picked = x.select(Axis(0), &selected);
            let scaled = scaling.apply(&picked.view())?;
            let predicted = model.predict(&scaled.view(), None)?;
            for (&i, &label) in selected.iter().zip(predicted.iter()) {
                labels[i] = label;
            }
        }

        Ok((block, labels))
    };

    // Compute phase: one task per block; the collect is the join barrier
    // and any block failure aborts the whole call
    let results: Vec<(Block, Vec<u8>)> = if params.parallel {
        blocks.into_par_iter().map(process).collect::<Result<_>>()?
    } else {
        blocks.into_iter().map(process).collect::<Result<_>>()?
    };

    // Merge phase: single writer, blocks are spatially disjoint
    let mut output: Raster<u8> = stack.reference_band().with_same_meta(rows, cols);
    for (block, labels) in results {
        for lr in 0..block.rows {
            for lc in 0..block.cols {
                let (r, c) = block.to_source(lr, lc);
                unsafe { output.set_unchecked(r, c, labels[lr * block.cols + lc]) };
            }
        }
    }

    Ok(output)
}
