//! WGS84 spherical coordinates of the simulated world.
//!
//! The world frame is a local tangent plane anchored at a geodetic reference
//! point.  With a heading of zero its axes are east/north/up; a non-zero
//! heading rotates the world frame counter-clockwise about up.  Conversion to
//! latitude/longitude/altitude goes through Earth-centred Earth-fixed (ECEF)
//! coordinates so it stays accurate far from the reference point.

use nalgebra::{Matrix3, Vector3};

/// WGS84 semi-major axis, metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// First eccentricity squared.
const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// A geodetic position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Metres above the WGS84 ellipsoid.
    pub altitude: f64,
}

/// Geodetic anchor of the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SphericalCoordinates {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation: f64,
    pub heading_deg: f64,
}

impl SphericalCoordinates {
    pub fn new(latitude_deg: f64, longitude_deg: f64, elevation: f64, heading_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            elevation,
            heading_deg,
        }
    }

    /// Convert a world-frame position (metres) to a geodetic position.
    pub fn spherical_from_local(&self, local: &Vector3<f64>) -> Geodetic {
        let heading = self.heading_deg.to_radians();
        let (sin_h, cos_h) = heading.sin_cos();
        let enu = Vector3::new(
            cos_h * local.x - sin_h * local.y,
            sin_h * local.x + cos_h * local.y,
            local.z,
        );

        let lat = self.latitude_deg.to_radians();
        let lon = self.longitude_deg.to_radians();
        let origin = geodetic_to_ecef(lat, lon, self.elevation);
        let ecef = origin + enu_to_ecef(lat, lon) * enu;

        let (lat, lon, altitude) = ecef_to_geodetic(&ecef);
        Geodetic {
            latitude_deg: lat.to_degrees(),
            longitude_deg: lon.to_degrees(),
            altitude,
        }
    }
}

fn prime_vertical_radius(lat: f64) -> f64 {
    WGS84_A / (1.0 - WGS84_E2 * lat.sin().powi(2)).sqrt()
}

fn geodetic_to_ecef(lat: f64, lon: f64, h: f64) -> Vector3<f64> {
    let n = prime_vertical_radius(lat);
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vector3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + h) * sin_lat,
    )
}

/// Rotation taking local east/north/up vectors into ECEF.
fn enu_to_ecef(lat: f64, lon: f64) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Matrix3::new(
        -sin_lon, -sin_lat * cos_lon, cos_lat * cos_lon,
        cos_lon, -sin_lat * sin_lon, cos_lat * sin_lon,
        0.0, cos_lat, sin_lat,
    )
}

/// Iterative ECEF → (lat rad, lon rad, h m).  Converges to well below a
/// millimetre in a handful of iterations anywhere near the surface.
fn ecef_to_geodetic(ecef: &Vector3<f64>) -> (f64, f64, f64) {
    let lon = ecef.y.atan2(ecef.x);
    let p = ecef.x.hypot(ecef.y);
    let mut lat = ecef.z.atan2(p * (1.0 - WGS84_E2));
    let mut h = 0.0;

    for _ in 0..8 {
        let n = prime_vertical_radius(lat);
        h = if lat.cos().abs() > 1e-6 {
            p / lat.cos() - n
        } else {
            ecef.z / lat.sin() - n * (1.0 - WGS84_E2)
        };
        lat = ecef.z.atan2(p * (1.0 - WGS84_E2 * n / (n + h)));
    }

    (lat, lon, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zurich() -> SphericalCoordinates {
        SphericalCoordinates::new(47.3667, 8.5500, 500.0, 0.0)
    }

    #[test]
    fn origin_maps_to_reference() {
        let g = zurich().spherical_from_local(&Vector3::zeros());
        assert!((g.latitude_deg - 47.3667).abs() < 1e-9);
        assert!((g.longitude_deg - 8.55).abs() < 1e-9);
        assert!((g.altitude - 500.0).abs() < 1e-6);
    }

    #[test]
    fn north_offset_increases_latitude() {
        let g = zurich().spherical_from_local(&Vector3::new(0.0, 1000.0, 0.0));
        let lat = 47.3667_f64.to_radians();
        let meridional = WGS84_A * (1.0 - WGS84_E2) / (1.0 - WGS84_E2 * lat.sin().powi(2)).powf(1.5);
        let expected = (1000.0 / (meridional + 500.0)).to_degrees();
        assert!((g.latitude_deg - 47.3667 - expected).abs() < 1e-5);
        assert!((g.longitude_deg - 8.55).abs() < 1e-9);
    }

    #[test]
    fn east_offset_increases_longitude() {
        let g = zurich().spherical_from_local(&Vector3::new(1000.0, 0.0, 0.0));
        let lat = 47.3667_f64.to_radians();
        let radius = (prime_vertical_radius(lat) + 500.0) * lat.cos();
        let expected = 1000.0_f64.atan2(radius).to_degrees();
        assert!((g.longitude_deg - 8.55 - expected).abs() < 1e-9);
        assert!(g.latitude_deg > 47.3667 - 1e-4 && g.latitude_deg < 47.3667 + 1e-4);
    }

    #[test]
    fn up_offset_increases_altitude() {
        let g = zurich().spherical_from_local(&Vector3::new(0.0, 0.0, 100.0));
        assert!((g.altitude - 600.0).abs() < 1e-6);
        assert!((g.latitude_deg - 47.3667).abs() < 1e-9);
    }

    #[test]
    fn heading_rotates_world_frame() {
        let mut sc = zurich();
        sc.heading_deg = 90.0;
        // With a 90° heading the world x axis points north.
        let rotated = sc.spherical_from_local(&Vector3::new(1000.0, 0.0, 0.0));
        let north = zurich().spherical_from_local(&Vector3::new(0.0, 1000.0, 0.0));
        assert!((rotated.latitude_deg - north.latitude_deg).abs() < 1e-9);
        assert!((rotated.longitude_deg - north.longitude_deg).abs() < 1e-9);
    }

    #[test]
    fn ecef_roundtrip_at_equator() {
        let ecef = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert!((ecef.x - WGS84_A).abs() < 1e-6);
        let (lat, lon, h) = ecef_to_geodetic(&ecef);
        assert!(lat.abs() < 1e-12 && lon.abs() < 1e-12 && h.abs() < 1e-6);
    }
}
