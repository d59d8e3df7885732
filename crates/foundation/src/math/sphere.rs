//! Equirectangular lon/lat to sphere mapping.
//!
//! Both the picking rasterizer and the triangulator stage their work in plain
//! lon/lat degree space and only project to 3D at the last moment, so the
//! mapping lives here rather than in either consumer.

use super::Vec3;

/// Wraps a longitude in degrees into `[-180, 180)`.
pub fn normalize_lon_deg(lon_deg: f64) -> f64 {
    let mut lon = (lon_deg + 180.0) % 360.0;
    if lon < 0.0 {
        lon += 360.0;
    }
    lon - 180.0
}

/// Projects a lon/lat pair (degrees) onto a sphere of the given radius.
///
/// Conventions:
/// - `phi = (90 - lat) * pi/180` (polar angle from the +y axis)
/// - `theta = (lon + 180) * pi/180` after longitude normalization
/// - `x = -r sin(phi) cos(theta)`, `y = r cos(phi)`, `z = r sin(phi) sin(theta)`
///
/// The +y axis is the north pole; lon 0 / lat 0 lands on the -x side, which is
/// the orientation globe viewers expect for an equirectangular unwrap.
pub fn lon_lat_to_sphere(lon_deg: f64, lat_deg: f64, radius: f64) -> Vec3 {
    let lon = normalize_lon_deg(lon_deg);
    let phi = (90.0 - lat_deg).to_radians();
    let theta = (lon + 180.0).to_radians();

    Vec3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::{lon_lat_to_sphere, normalize_lon_deg};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn normalizes_longitudes_into_half_open_range() {
        assert_close(normalize_lon_deg(0.0), 0.0, 1e-12);
        assert_close(normalize_lon_deg(190.0), -170.0, 1e-12);
        assert_close(normalize_lon_deg(-190.0), 170.0, 1e-12);
        assert_close(normalize_lon_deg(180.0), -180.0, 1e-12);
        assert_close(normalize_lon_deg(540.0), -180.0, 1e-12);
    }

    #[test]
    fn poles_map_to_y_axis() {
        let north = lon_lat_to_sphere(45.0, 90.0, 2.0);
        assert_close(north.x, 0.0, 1e-12);
        assert_close(north.y, 2.0, 1e-12);
        assert_close(north.z, 0.0, 1e-12);

        let south = lon_lat_to_sphere(-10.0, -90.0, 2.0);
        assert_close(south.y, -2.0, 1e-12);
    }

    #[test]
    fn projected_points_sit_on_the_sphere() {
        for &(lon, lat) in &[(0.0, 0.0), (12.5, 41.9), (-74.0, 40.7), (179.9, -85.0)] {
            let v = lon_lat_to_sphere(lon, lat, 3.5);
            assert_close(v.length(), 3.5, 1e-9);
        }
    }
}
