use tracing::warn;

use crate::codec::CountryIdCodec;
use crate::raster::{RasterImage, RasterSize};

/// Marker written to selected pixels of the mask raster.
pub const SELECTED: [u8; 4] = [255, 255, 255, 255];

/// Cleared pixels are fully transparent.
pub const UNSELECTED: [u8; 4] = [0, 0, 0, 0];

/// Set of selected country indices, stored as a bitset over the dense
/// 1-based index space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    words: Vec<u64>,
    len: usize,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(index: u32) -> (usize, u64) {
        ((index / 64) as usize, 1u64 << (index % 64))
    }

    /// Returns `true` if the index was not already present.
    pub fn insert_index(&mut self, index: u32) -> bool {
        let (word, bit) = Self::slot(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        if self.words[word] & bit != 0 {
            return false;
        }
        self.words[word] |= bit;
        self.len += 1;
        true
    }

    /// Returns `true` if the index was present.
    pub fn remove_index(&mut self, index: u32) -> bool {
        let (word, bit) = Self::slot(index);
        if word >= self.words.len() || self.words[word] & bit == 0 {
            return false;
        }
        self.words[word] &= !bit;
        self.len -= 1;
        true
    }

    pub fn contains_index(&self, index: u32) -> bool {
        let (word, bit) = Self::slot(index);
        word < self.words.len() && self.words[word] & bit != 0
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Selected indices in ascending order.
    pub fn iter_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &bits)| {
            (0..64)
                .filter(move |b| bits & (1u64 << b) != 0)
                .map(move |b| w as u32 * 64 + b)
        })
    }
}

/// Raster highlighting the selected countries.
///
/// Same dimensions as the picking texture it is derived from; a shader
/// samples both with identical UVs, so the per-pixel correspondence is
/// exact. Callers batch selection changes and repaint once per change set
/// rather than per toggled country.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionMask {
    raster: RasterImage,
}

impl SelectionMask {
    pub fn new(size: RasterSize) -> Self {
        Self {
            raster: RasterImage::new(size),
        }
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    /// Rebuilds the whole mask from the picking texture: every pixel whose
    /// decoded index is in `selected` becomes [`SELECTED`], everything else
    /// [`UNSELECTED`]. An empty set clears the mask. A mask whose size does
    /// not match the picking texture is left untouched.
    pub fn repaint(&mut self, codec: &CountryIdCodec, selected: &SelectionSet) {
        let texture = codec.texture();
        if self.raster.size() != texture.size() {
            warn!(
                mask = ?self.raster.size(),
                texture = ?texture.size(),
                "selection mask size does not match the picking texture, skipping repaint"
            );
            return;
        }

        if selected.is_empty() {
            self.raster.fill(UNSELECTED);
            return;
        }

        for y in 0..self.raster.height() {
            for x in 0..self.raster.width() {
                let p = texture.pixel(x, y);
                let index = crate::codec::decode_rgb(p[0], p[1], p[2]);
                let rgba = if index != 0 && selected.contains_index(index) {
                    SELECTED
                } else {
                    UNSELECTED
                };
                self.raster.set_pixel(x, y, rgba);
            }
        }
    }
}

impl CountryIdCodec {
    /// Convenience entry point mirroring [`SelectionMask::repaint`].
    pub fn paint_selection_mask(&self, mask: &mut SelectionMask, selected: &SelectionSet) {
        mask.repaint(self, selected);
    }
}
