// src/services/geohash.rs
// DOCUMENTATION: Geohash spatial indexing
// PURPOSE: Encode coordinates into fixed-precision cells and build the 9-block
// grid used to approximate a circular search radius

use crate::errors::AnalysisError;
use geo_types::Point;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// 5 bits per character, 60 bits fit in a u64
pub const MAX_PRECISION: usize = 12;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Geographic bounds of a cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

#[cfg(test)]
impl CellBounds {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat < self.max_lat && lng >= self.min_lng && lng < self.max_lng
    }
}

/// Row/column address of a cell: the de-interleaved geohash bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellIndex {
    lat: u64,
    lng: u64,
    precision: usize,
}

/// (longitude bits, latitude bits); longitude takes the extra bit on odd totals
fn bit_split(precision: usize) -> (u32, u32) {
    let total = (5 * precision) as u32;
    ((total + 1) / 2, total / 2)
}

fn check_precision(precision: usize) -> Result<(), AnalysisError> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(AnalysisError::ValidationError(format!(
            "geohash precision must be between 1 and {}, got {}",
            MAX_PRECISION, precision
        )));
    }
    Ok(())
}

fn quantize(value: f64, min: f64, max: f64, bits: u32) -> u64 {
    let cells = 1u64 << bits;
    let scaled = ((value - min) / (max - min) * cells as f64).floor();
    (scaled.max(0.0) as u64).min(cells - 1)
}

impl CellIndex {
    fn from_coordinate(lat: f64, lng: f64, precision: usize) -> Result<Self, AnalysisError> {
        check_precision(precision)?;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AnalysisError::InvalidCoordinate(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AnalysisError::InvalidCoordinate(format!(
                "longitude {} outside [-180, 180]",
                lng
            )));
        }

        let (lng_bits, lat_bits) = bit_split(precision);
        Ok(Self {
            lat: quantize(lat, -90.0, 90.0, lat_bits),
            lng: quantize(lng, -180.0, 180.0, lng_bits),
            precision,
        })
    }

    fn parse(cell: &str) -> Result<Self, AnalysisError> {
        let precision = cell.len();
        check_precision(precision)?;

        let (mut lat, mut lng) = (0u64, 0u64);
        let mut bit_no = 0usize;
        for ch in cell.bytes() {
            let value = BASE32
                .iter()
                .position(|b| *b == ch)
                .ok_or_else(|| {
                    AnalysisError::ValidationError(format!("malformed geohash cell: {}", cell))
                })? as u64;

            for shift in (0..5).rev() {
                let bit = (value >> shift) & 1;
                if bit_no % 2 == 0 {
                    lng = (lng << 1) | bit;
                } else {
                    lat = (lat << 1) | bit;
                }
                bit_no += 1;
            }
        }

        Ok(Self {
            lat,
            lng,
            precision,
        })
    }

    fn to_geohash(self) -> String {
        let (mut lng_pos, mut lat_pos) = bit_split(self.precision);
        let mut out = String::with_capacity(self.precision);
        let mut chunk = 0u8;

        for bit_no in 0..5 * self.precision {
            let bit = if bit_no % 2 == 0 {
                lng_pos -= 1;
                (self.lng >> lng_pos) & 1
            } else {
                lat_pos -= 1;
                (self.lat >> lat_pos) & 1
            };
            chunk = (chunk << 1) | bit as u8;
            if bit_no % 5 == 4 {
                out.push(BASE32[chunk as usize] as char);
                chunk = 0;
            }
        }
        out
    }

    /// Move by whole cells. Longitude wraps at the antimeridian; stepping over
    /// a pole keeps the edge row and jumps to the opposite meridian.
    fn shifted(self, d_lat: i64, d_lng: i64) -> Self {
        let (lng_bits, lat_bits) = bit_split(self.precision);
        let lng_cells = 1i64 << lng_bits;
        let lat_cells = 1i64 << lat_bits;

        let mut lat = self.lat as i64 + d_lat;
        let mut lng = self.lng as i64 + d_lng;
        if lat < 0 || lat >= lat_cells {
            lat = lat.clamp(0, lat_cells - 1);
            lng += lng_cells / 2;
        }

        Self {
            lat: lat as u64,
            lng: lng.rem_euclid(lng_cells) as u64,
            precision: self.precision,
        }
    }

    fn bounds(self) -> CellBounds {
        let (lng_bits, lat_bits) = bit_split(self.precision);
        let lat_step = 180.0 / (1u64 << lat_bits) as f64;
        let lng_step = 360.0 / (1u64 << lng_bits) as f64;
        CellBounds {
            min_lat: -90.0 + self.lat as f64 * lat_step,
            max_lat: -90.0 + (self.lat + 1) as f64 * lat_step,
            min_lng: -180.0 + self.lng as f64 * lng_step,
            max_lng: -180.0 + (self.lng + 1) as f64 * lng_step,
        }
    }
}

/// Encode a coordinate into a cell id of the given precision
pub fn encode(lat: f64, lng: f64, precision: usize) -> Result<String, AnalysisError> {
    Ok(CellIndex::from_coordinate(lat, lng, precision)?.to_geohash())
}

/// Bounds of a cell id
pub fn decode_bounds(cell: &str) -> Result<CellBounds, AnalysisError> {
    Ok(CellIndex::parse(cell)?.bounds())
}

/// The 8 adjacent cells in order N, NE, E, SE, S, SW, W, NW
pub fn neighbors(cell: &str) -> Result<[String; 8], AnalysisError> {
    let index = CellIndex::parse(cell)?;
    Ok([
        index.shifted(1, 0).to_geohash(),
        index.shifted(1, 1).to_geohash(),
        index.shifted(0, 1).to_geohash(),
        index.shifted(-1, 1).to_geohash(),
        index.shifted(-1, 0).to_geohash(),
        index.shifted(-1, -1).to_geohash(),
        index.shifted(0, -1).to_geohash(),
        index.shifted(1, -1).to_geohash(),
    ])
}

/// Center cell followed by its 8 neighbors
pub fn grid9(lat: f64, lng: f64, precision: usize) -> Result<Vec<String>, AnalysisError> {
    let center = encode(lat, lng, precision)?;
    let mut cells = Vec::with_capacity(9);
    cells.extend(neighbors(&center)?);
    cells.insert(0, center);
    Ok(cells)
}

/// Great-circle distance in meters (x = longitude, y = latitude)
pub fn haversine_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lng = (b.x() - a.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.y().to_radians().cos() * b.y().to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_METERS * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Approximate (height, width) of a cell in meters at the given latitude
pub fn cell_dimensions_meters(precision: usize, lat: f64) -> (f64, f64) {
    let (lng_bits, lat_bits) = bit_split(precision.clamp(1, MAX_PRECISION));
    let height = 180.0 / (1u64 << lat_bits) as f64 * METERS_PER_DEGREE;
    let width = 360.0 / (1u64 << lng_bits) as f64 * METERS_PER_DEGREE * lat.to_radians().cos();
    (height, width)
}

/// Radius around (lat, lng) that its 9-block grid is guaranteed to cover:
/// the shortest way from the origin out of the block
pub fn grid_reach_meters(lat: f64, lng: f64, precision: usize) -> Result<f64, AnalysisError> {
    let bounds = decode_bounds(&encode(lat, lng, precision)?)?;
    let height = bounds.max_lat - bounds.min_lat;
    let width = bounds.max_lng - bounds.min_lng;
    let north = (bounds.max_lat + height).min(90.0);
    let south = (bounds.min_lat - height).max(-90.0);

    // Meridians converge, so the block is narrowest on its poleward edge
    let edge_lat = if lat >= 0.0 { north } else { south };
    let along_edge =
        |to_lng: f64| haversine_distance(Point::new(lng, edge_lat), Point::new(to_lng, edge_lat));

    let origin = Point::new(lng, lat);
    Ok([
        haversine_distance(origin, Point::new(lng, north)),
        haversine_distance(origin, Point::new(lng, south)),
        along_edge(bounds.max_lng + width),
        along_edge(bounds.min_lng - width),
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min))
}

/// Smallest distance from any point in the center cell to the outer edge of
/// its 9-block grid, i.e. the largest radius the grid is guaranteed to cover
pub fn min_grid_reach_meters(precision: usize, lat: f64) -> f64 {
    let (height, width) = cell_dimensions_meters(precision, lat);
    height.min(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(encode(42.6, -5.6, 5).unwrap(), "ezs42");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(37.5663, 126.9779, 7).unwrap();
        let b = encode(37.5663, 126.9779, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
        assert!(a.starts_with(&encode(37.5663, 126.9779, 6).unwrap()));
    }

    #[test]
    fn test_encode_rejects_invalid_coordinates() {
        assert!(matches!(
            encode(90.5, 0.0, 6),
            Err(AnalysisError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            encode(0.0, -180.01, 6),
            Err(AnalysisError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            encode(f64::NAN, 0.0, 6),
            Err(AnalysisError::InvalidCoordinate(_))
        ));
        assert!(encode(90.0, 180.0, 6).is_ok());
    }

    #[test]
    fn test_neighbors_known_vector() {
        let n = neighbors("ezs42").unwrap();
        assert_eq!(
            n,
            ["ezs48", "ezs49", "ezs43", "ezs41", "ezs40", "ezefp", "ezefr", "ezefx"]
        );
    }

    #[test]
    fn test_neighbors_cross_alphabet_edges() {
        // East of a cell ending in 'z' rolls into a different parent cell
        let n = neighbors("zzzzzz").unwrap();
        assert!(n.contains(&"bpbpbp".to_string()));
        assert!(n.iter().all(|c| c.len() == 6));
    }

    #[test]
    fn test_grid9_has_nine_distinct_cells() {
        let samples = [
            (37.5663, 126.9779),
            (0.0, 0.0),
            (-33.8688, 151.2093),
            (89.9999, 179.9999),
            (-90.0, -180.0),
            (12.34, 180.0),
        ];
        for precision in [1, 5, 6, 7, 12] {
            for (lat, lng) in samples {
                let grid = grid9(lat, lng, precision).unwrap();
                assert_eq!(grid.len(), 9);
                assert_eq!(grid.iter().collect::<HashSet<_>>().len(), 9, "{:?}", grid);
                assert_eq!(grid[0], encode(lat, lng, precision).unwrap());
            }
        }
    }

    #[test]
    fn test_grid9_ordering_is_deterministic() {
        let a = grid9(37.5663, 126.9779, 6).unwrap();
        let b = grid9(37.5663, 126.9779, 6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], "wydm9q");
    }

    #[test]
    fn test_decode_bounds_contains_encoded_point() {
        let cell = encode(37.5663, 126.9779, 7).unwrap();
        let bounds = decode_bounds(&cell).unwrap();
        assert!(bounds.contains(37.5663, 126.9779));

        let (lat, lng) = bounds.center();
        assert_eq!(encode(lat, lng, 7).unwrap(), cell);
    }

    #[test]
    fn test_malformed_cell_is_rejected() {
        assert!(neighbors("wydm9a").is_err());
        assert!(neighbors("").is_err());
    }

    #[test]
    fn test_haversine_distance() {
        let seoul_city_hall = Point::new(126.9779, 37.5663);
        assert_eq!(haversine_distance(seoul_city_hall, seoul_city_hall), 0.0);

        // One degree of latitude is ~111.2km
        let north = Point::new(126.9779, 38.5663);
        let d = haversine_distance(seoul_city_hall, north);
        assert!((d - 111_195.0).abs() < 100.0, "{}", d);
    }

    #[test]
    fn test_grid_reach_at_default_precision() {
        let reach = min_grid_reach_meters(6, 37.5);
        assert!(reach > 500.0 && reach < 700.0, "{}", reach);
        assert!(min_grid_reach_meters(7, 37.5) < 200.0);
    }

    #[test]
    fn test_grid_reach_shrinks_toward_the_poles() {
        let seoul = grid_reach_meters(37.5663, 126.9779, 6).unwrap();
        assert!(seoul >= min_grid_reach_meters(6, 37.5663) * 0.99, "{}", seoul);
        assert!(seoul > 500.0);

        let arctic = grid_reach_meters(80.0, 20.0, 6).unwrap();
        assert!(arctic < 500.0, "{}", arctic);
        assert!(arctic > 150.0, "{}", arctic);
    }

    #[test]
    fn test_points_within_reach_fall_inside_grid() {
        use crate::services::testing::offset_east;

        for (lat, lng) in [(37.5663, 126.9779), (60.17, 24.94), (80.0, 20.0), (-33.86, 151.2)] {
            let reach = grid_reach_meters(lat, lng, 6).unwrap();
            let cells = grid9(lat, lng, 6).unwrap();
            let d = reach * 0.99;
            let d_lat = (d / EARTH_RADIUS_METERS).to_degrees();

            let east = offset_east(lat, lng, d);
            let west = offset_east(lat, lng, -d);
            for (p_lat, p_lng) in [east, west, (lat + d_lat, lng), (lat - d_lat, lng)] {
                let cell = encode(p_lat, p_lng, 6).unwrap();
                assert!(cells.contains(&cell), "({}, {}) reach {}", lat, lng, reach);
            }
        }
    }
}
