//! Web Mercator projection utilities.
//!
//! Used only at the surface boundary; the engine itself stores geographic
//! coordinates exclusively.

use livetrack::GeoPoint;

#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Project a geographic point to fractional tile coordinates at `zoom`.
    pub fn project(point: GeoPoint, zoom: u8) -> (f64, f64) {
        let n = 2_f64.powi(i32::from(zoom));
        let x = ((point.lon + 180.0) / 360.0) * n;
        let lat_rad = point.lat.to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n;
        (x, y)
    }

    /// Convert fractional tile coordinates back to a geographic point.
    pub fn unproject(x: f64, y: f64, zoom: u8) -> GeoPoint {
        let n = 2_f64.powi(i32::from(zoom));
        let lon = x / n * 360.0 - 180.0;
        let lat_rad = ((std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh()).atan();
        GeoPoint::new(lon, lat_rad.to_degrees())
    }
}
