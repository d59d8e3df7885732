use foundation::math::stable_total_cmp_f64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

impl RasterSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// CPU-side RGBA raster.
///
/// Consumers uploading this as a GPU texture must use nearest-neighbor
/// filtering, clamped edges, and no mipmaps: pixel values are exact color
/// codes and any interpolation or mip blending corrupts them.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(size: RasterSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            pixels: vec![0; size.pixel_count() * 4],
        }
    }

    pub fn from_pixels(size: RasterSize, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != size.pixel_count() * 4 {
            return None;
        }
        Some(Self {
            width: size.width,
            height: size.height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> RasterSize {
        RasterSize::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    /// Flat-fills a polygon (exterior ring + holes, lon/lat degrees) through
    /// the equirectangular projection. Even-odd scanline fill; no
    /// anti-aliasing, no stroke, so edges stay crisp single-color blocks.
    ///
    /// Returns `true` if at least one pixel was painted.
    pub fn fill_polygon(&mut self, rings: &[Vec<[f64; 2]>], rgba: [u8; 4]) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }

        let mut painted = false;
        let mut crossings: Vec<f64> = Vec::new();

        for y in 0..self.height {
            // Latitude at the pixel row center.
            let lat = 90.0 - (y as f64 + 0.5) * 180.0 / self.height as f64;

            crossings.clear();
            for ring in rings {
                collect_crossings(ring, lat, &mut crossings);
            }
            if crossings.is_empty() {
                continue;
            }
            crossings.sort_by(|a, b| stable_total_cmp_f64(*a, *b));

            for span in crossings.chunks_exact(2) {
                let (enter, exit) = (span[0], span[1]);
                // Pixels whose center longitude falls inside [enter, exit).
                let f_start = (enter + 180.0) / 360.0 * self.width as f64 - 0.5;
                let f_end = (exit + 180.0) / 360.0 * self.width as f64 - 0.5;
                let x_start = f_start.ceil().max(0.0) as u32;
                let x_end = f_end.floor().min(self.width as f64 - 1.0);
                if x_end < 0.0 {
                    continue;
                }
                for x in x_start..=x_end as u32 {
                    self.set_pixel(x, y, rgba);
                    painted = true;
                }
            }
        }
        painted
    }
}

/// Ray-casting crossings of a ring against one latitude line.
fn collect_crossings(ring: &[[f64; 2]], lat: f64, out: &mut Vec<f64>) {
    let n = ring.len();
    if n < 3 {
        return;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) {
            out.push(xi + (lat - yi) * (xj - xi) / (yj - yi));
        }
        j = i;
    }
}

#[cfg(test)]
mod tests {
    use super::{RasterImage, RasterSize};

    // 36x18 raster: each pixel covers 10x10 degrees.
    fn small() -> RasterImage {
        RasterImage::new(RasterSize::new(36, 18))
    }

    #[test]
    fn new_raster_is_fully_transparent() {
        let img = small();
        assert!(img.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn fill_polygon_paints_interior_pixel_centers() {
        let mut img = small();
        // 40x40 degree box on the equator, aligned with pixel edges.
        let ring = vec![
            [0.0, -20.0],
            [40.0, -20.0],
            [40.0, 20.0],
            [0.0, 20.0],
            [0.0, -20.0],
        ];
        assert!(img.fill_polygon(&[ring], [9, 9, 9, 255]));

        let mut count = 0;
        for y in 0..img.height() {
            for x in 0..img.width() {
                if img.pixel(x, y) == [9, 9, 9, 255] {
                    count += 1;
                    // lon in [0,40), lat in (-20,20)
                    let lon = (x as f64 + 0.5) / 36.0 * 360.0 - 180.0;
                    let lat = 90.0 - (y as f64 + 0.5) * 180.0 / 18.0;
                    assert!(lon > 0.0 && lon < 40.0, "painted outside at lon {lon}");
                    assert!(lat > -20.0 && lat < 20.0, "painted outside at lat {lat}");
                }
            }
        }
        assert_eq!(count, 4 * 4);
    }

    #[test]
    fn holes_are_not_painted() {
        let mut img = small();
        let outer = vec![
            [-60.0, -40.0],
            [60.0, -40.0],
            [60.0, 40.0],
            [-60.0, 40.0],
            [-60.0, -40.0],
        ];
        let hole = vec![
            [-20.0, -10.0],
            [20.0, -10.0],
            [20.0, 10.0],
            [-20.0, 10.0],
            [-20.0, -10.0],
        ];
        img.fill_polygon(&[outer, hole], [1, 2, 3, 255]);

        // Center of the hole stays unpainted; a point between outer and hole
        // boundaries is painted.
        let center = img.pixel(18, 9);
        assert_eq!(center, [0, 0, 0, 0]);
        let annulus = img.pixel(14, 9); // lon -35, lat 5: inside outer, outside hole
        assert_eq!(annulus, [1, 2, 3, 255]);
    }

    #[test]
    fn degenerate_ring_paints_nothing() {
        let mut img = small();
        assert!(!img.fill_polygon(&[vec![[0.0, 0.0], [1.0, 1.0]]], [1, 1, 1, 255]));
    }
}
