//! Geodetic → ECEF conversion on the WGS-84 ellipsoid.
//!
//! The platform stores entity locations as Earth-centered, Earth-fixed
//! Cartesian coordinates rather than latitude/longitude.

/// WGS-84 semi-major axis, meters.
pub const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
/// WGS-84 flattening.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Convert geodetic coordinates (degrees, meters) to ECEF (meters).
pub fn geodetic_to_ecef(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> EcefPoint {
    let lat = latitude_deg.to_radians();
    let lon = longitude_deg.to_radians();

    // First eccentricity squared: e² = f(2 − f)
    let e2 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);
    // Prime-vertical radius of curvature at this latitude.
    let n = WGS84_SEMI_MAJOR_AXIS_M / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    EcefPoint {
        x: (n + altitude_m) * lat.cos() * lon.cos(),
        y: (n + altitude_m) * lat.cos() * lon.sin(),
        z: (n * (1.0 - e2) + altitude_m) * lat.sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE_M: f64 = 1e-6;

    #[test]
    fn test_equator_prime_meridian() {
        let p = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert!((p.x - WGS84_SEMI_MAJOR_AXIS_M).abs() < TOLERANCE_M);
        assert!(p.y.abs() < TOLERANCE_M);
        assert!(p.z.abs() < TOLERANCE_M);
    }

    #[test]
    fn test_equator_ninety_east() {
        let p = geodetic_to_ecef(0.0, 90.0, 0.0);
        assert!(p.x.abs() < TOLERANCE_M);
        assert!((p.y - WGS84_SEMI_MAJOR_AXIS_M).abs() < TOLERANCE_M);
        assert!(p.z.abs() < TOLERANCE_M);
    }

    #[test]
    fn test_north_pole_is_semi_minor_axis() {
        let semi_minor = WGS84_SEMI_MAJOR_AXIS_M * (1.0 - WGS84_FLATTENING);
        let p = geodetic_to_ecef(90.0, 0.0, 0.0);
        assert!(p.x.abs() < 1e-3);
        assert!(p.y.abs() < 1e-3);
        assert!((p.z - semi_minor).abs() < 1e-3);
    }

    #[test]
    fn test_altitude_extends_radially_at_equator() {
        let p = geodetic_to_ecef(0.0, 0.0, 1000.0);
        assert!((p.x - (WGS84_SEMI_MAJOR_AXIS_M + 1000.0)).abs() < TOLERANCE_M);
    }

    #[test]
    fn test_southern_hemisphere_negative_z() {
        let p = geodetic_to_ecef(-33.87, 151.21, 0.0);
        assert!(p.z < 0.0);
        // Radius stays between the ellipsoid's semi-minor and semi-major axes.
        let r = (p.x * p.x + p.y * p.y + p.z * p.z).sqrt();
        assert!(r > WGS84_SEMI_MAJOR_AXIS_M * (1.0 - WGS84_FLATTENING));
        assert!(r < WGS84_SEMI_MAJOR_AXIS_M);
    }
}
