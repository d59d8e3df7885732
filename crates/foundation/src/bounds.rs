/// Axis-aligned lon/lat bounding box in degrees.
///
/// Grows by scanning coordinates; an untouched box is empty and reports
/// `min > max` on both axes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LonLatBounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl LonLatBounds {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.min[0] = self.min[0].min(lon);
        self.min[1] = self.min[1].min(lat);
        self.max[0] = self.max[0].max(lon);
        self.max[1] = self.max[1].max(lat);
    }

    /// `[min_lon, min_lat, max_lon, max_lat]`, the GeoJSON bbox order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min[0], self.min[1], self.max[0], self.max[1]]
    }

    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self {
            min: [bbox[0], bbox[1]],
            max: [bbox[2], bbox[3]],
        }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }
}

#[cfg(test)]
mod tests {
    use super::LonLatBounds;

    #[test]
    fn empty_box_reports_empty() {
        let b = LonLatBounds::empty();
        assert!(b.is_empty());
    }

    #[test]
    fn extend_grows_to_cover_points() {
        let mut b = LonLatBounds::empty();
        b.extend(10.0, -5.0);
        b.extend(-20.0, 40.0);
        assert!(!b.is_empty());
        assert_eq!(b.to_array(), [-20.0, -5.0, 10.0, 40.0]);
        assert_eq!(b.width(), 30.0);
        assert_eq!(b.height(), 45.0);
    }

    #[test]
    fn bbox_array_round_trip() {
        let b = LonLatBounds::from_array([-180.0, -90.0, 180.0, 90.0]);
        assert_eq!(b.to_array(), [-180.0, -90.0, 180.0, 90.0]);
    }
}
