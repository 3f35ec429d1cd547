//! Polygon-to-mask rasterization.
//!
//! Masks follow the masked-edit backend's convention: white pixels are kept
//! as they are, black pixels mark the region the backend may regenerate.
//! Pixels are sampled at integer lattice coordinates, so pixel `(x, y)` is
//! editable when the point `(x, y)` lies inside or on any polygon.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, ImageReader, Luma};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Pixel value for regions the edit must leave untouched.
pub const PRESERVE: u8 = 255;

/// Pixel value for regions the edit may modify.
pub const EDITABLE: u8 = 0;

/// Longest accepted image side, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 16_384;

/// Largest accepted image area. A mask costs one byte per pixel.
pub const MAX_IMAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// Tolerance for deciding whether a lattice point lies on an edge.
const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A 2-D point in image pixel coordinates. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    fn coincides(&self, other: &Point) -> bool {
        (self.x - other.x).abs() < EPSILON && (self.y - other.y).abs() < EPSILON
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// A closed region described by its vertices in order.
///
/// The last vertex connects back to the first; repeating the first vertex
/// at the end is allowed and harmless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<Point>);

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Signed area via the shoelace formula (positive for counter-clockwise
    /// vertex order in a y-up frame).
    pub fn signed_area(&self) -> f64 {
        edges(&self.0)
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            / 2.0
    }

    /// Fewer than three distinct vertices, or every vertex on one line.
    ///
    /// Self-intersecting rings can have zero signed area while still
    /// enclosing pixels, so area alone does not decide this.
    pub fn is_degenerate(&self) -> bool {
        let Some(&origin) = self.0.first() else {
            return true;
        };
        let Some(&other) = self.0.iter().find(|p| !p.coincides(&origin)) else {
            return true;
        };
        self.0.iter().all(|p| {
            let cross = (other.x - origin.x) * (p.y - origin.y) - (other.y - origin.y) * (p.x - origin.x);
            cross.abs() < EPSILON
        })
    }
}

/// Iterate the closing edges of a vertex ring.
fn edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Width and height of a raster in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    /// Both sides must be positive and within [`MAX_IMAGE_SIDE`] and
    /// [`MAX_IMAGE_PIXELS`].
    pub fn new(width: u32, height: u32) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Image dimensions must be positive, got {width}x{height}"
            )));
        }
        if width > MAX_IMAGE_SIDE
            || height > MAX_IMAGE_SIDE
            || u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS
        {
            return Err(CoreError::InvalidInput(format!(
                "Image is too large ({width}x{height}); the limit is \
                 {MAX_IMAGE_SIDE} pixels per side and {MAX_IMAGE_PIXELS} pixels in total"
            )));
        }
        Ok(Self { width, height })
    }
}

/// Read the dimensions of an encoded image (PNG, JPEG or WebP) from its
/// header without decoding the pixel data.
pub fn image_dimensions(bytes: &[u8]) -> Result<ImageDimensions, CoreError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::InvalidInput(format!("Unreadable image: {e}")))?
        .into_dimensions()
        .map_err(|e| CoreError::InvalidInput(format!("Unsupported or corrupt image: {e}")))?;
    ImageDimensions::new(width, height)
}

// ---------------------------------------------------------------------------
// Mask
// ---------------------------------------------------------------------------

/// Single-channel edit mask, same size as the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    raster: GrayImage,
}

impl Mask {
    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions {
            width: self.raster.width(),
            height: self.raster.height(),
        }
    }

    /// Raw pixel value at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.raster.get_pixel(x, y).0[0]
    }

    pub fn is_editable(&self, x: u32, y: u32) -> bool {
        self.pixel(x, y) == EDITABLE
    }

    /// Number of pixels marked editable.
    pub fn editable_count(&self) -> usize {
        self.raster.as_raw().iter().filter(|&&v| v == EDITABLE).count()
    }

    /// Row-major pixel values.
    pub fn as_raw(&self) -> &[u8] {
        self.raster.as_raw()
    }

    /// Encode as an 8-bit grayscale PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CoreError> {
        let mut bytes = Vec::new();
        self.raster
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CoreError::Internal(format!("Failed to encode mask as PNG: {e}")))?;
        Ok(bytes)
    }
}

/// Rasterize `polygons` into a mask of the given size.
///
/// The mask starts fully [`PRESERVE`]; each polygon's closed interior is set
/// to [`EDITABLE`] by scan-line fill. Polygons only ever add editable
/// pixels, so the result does not depend on their order. Degenerate
/// polygons are skipped and geometry outside the raster is clipped.
pub fn build_mask(dimensions: ImageDimensions, polygons: &[Polygon]) -> Result<Mask, CoreError> {
    let ImageDimensions { width, height } = ImageDimensions::new(dimensions.width, dimensions.height)?;

    for (index, polygon) in polygons.iter().enumerate() {
        if !polygon.points().iter().all(Point::is_finite) {
            return Err(CoreError::InvalidInput(format!(
                "Polygon {index} contains a non-finite coordinate"
            )));
        }
    }

    let mut raster = GrayImage::from_pixel(width, height, Luma([PRESERVE]));
    for polygon in polygons.iter().filter(|p| !p.is_degenerate()) {
        fill_polygon(&mut raster, polygon.points());
    }

    Ok(Mask { raster })
}

/// Scan-line fill of one polygon, boundary included.
fn fill_polygon(raster: &mut GrayImage, points: &[Point]) {
    let (min_y, max_y) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.y), hi.max(p.y))
        });

    let first_row = min_y.ceil().max(0.0);
    let last_row = max_y.floor().min(f64::from(raster.height() - 1));
    if first_row > last_row {
        return;
    }

    let mut crossings: Vec<f64> = Vec::with_capacity(points.len());

    for row in (first_row as u32)..=(last_row as u32) {
        let y = f64::from(row);

        // Interior: even-odd crossings. Edges are half-open in y so a vertex
        // shared by two edges is counted exactly once.
        crossings.clear();
        for (a, b) in edges(points) {
            let (lo, hi) = if a.y <= b.y { (a, b) } else { (b, a) };
            if lo.y <= y && y < hi.y {
                crossings.push(lo.x + (y - lo.y) * (hi.x - lo.x) / (hi.y - lo.y));
            }
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks_exact(2) {
            fill_span(raster, row, pair[0], pair[1]);
        }

        // Boundary: horizontal edges and the upper end of each edge are not
        // covered by the half-open rule above.
        for (a, b) in edges(points) {
            if (a.y - y).abs() < EPSILON && (b.y - y).abs() < EPSILON {
                fill_span(raster, row, a.x.min(b.x), a.x.max(b.x));
            } else if a.y.min(b.y) <= y && y <= a.y.max(b.y) {
                let x = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
                fill_span(raster, row, x, x);
            }
        }
    }
}

/// Mark every lattice column in `[x0, x1]` on `row`, clipped to the raster.
fn fill_span(raster: &mut GrayImage, row: u32, x0: f64, x1: f64) {
    let start = (x0 - EPSILON).ceil().max(0.0);
    let end = (x1 + EPSILON).floor().min(f64::from(raster.width() - 1));
    if start > end {
        return;
    }
    for x in (start as u32)..=(end as u32) {
        raster.put_pixel(x, row, Luma([EDITABLE]));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn polygon(points: &[[f64; 2]]) -> Polygon {
        Polygon::new(points.iter().copied().map(Point::from).collect())
    }

    fn dims(width: u32, height: u32) -> ImageDimensions {
        ImageDimensions::new(width, height).unwrap()
    }

    // -- Empty and invalid input --------------------------------------------

    #[test]
    fn empty_polygon_list_preserves_everything() {
        for (w, h) in [(1, 1), (7, 3), (64, 48)] {
            let mask = build_mask(dims(w, h), &[]).unwrap();
            assert_eq!(mask.dimensions(), dims(w, h));
            assert!(mask.as_raw().iter().all(|&v| v == PRESERVE));
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_matches!(ImageDimensions::new(0, 10), Err(CoreError::InvalidInput(_)));
        let raw = ImageDimensions { width: 10, height: 0 };
        assert_matches!(build_mask(raw, &[]), Err(CoreError::InvalidInput(_)));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let bad = polygon(&[[0.0, 0.0], [f64::NAN, 1.0], [1.0, 1.0]]);
        assert_matches!(
            build_mask(dims(4, 4), &[bad]),
            Err(CoreError::InvalidInput(msg)) if msg.contains("Polygon 0")
        );
    }

    // -- Fill semantics -----------------------------------------------------

    #[test]
    fn square_fills_rows_and_columns_zero_through_ten() {
        let square = polygon(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        let mask = build_mask(dims(20, 20), &[square]).unwrap();

        for y in 0..20 {
            for x in 0..20 {
                let inside = x <= 10 && y <= 10;
                assert_eq!(mask.is_editable(x, y), inside, "pixel ({x}, {y})");
            }
        }
        assert_eq!(mask.editable_count(), 121);
    }

    #[test]
    fn triangle_interior_and_boundary_are_editable() {
        let triangle = polygon(&[[2.0, 2.0], [17.0, 2.0], [2.0, 17.0]]);
        let mask = build_mask(dims(20, 20), &[triangle]).unwrap();

        for y in 0..20u32 {
            for x in 0..20u32 {
                let inside = x >= 2 && y >= 2 && x + y <= 19;
                assert_eq!(mask.is_editable(x, y), inside, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn concave_notch_stays_preserved() {
        // A "U" shape: the notch between the arms is outside the polygon.
        let u_shape = polygon(&[
            [0.0, 0.0],
            [9.0, 0.0],
            [9.0, 9.0],
            [6.0, 9.0],
            [6.0, 3.0],
            [3.0, 3.0],
            [3.0, 9.0],
            [0.0, 9.0],
        ]);
        let mask = build_mask(dims(10, 10), &[u_shape]).unwrap();

        assert!(mask.is_editable(1, 8));
        assert!(mask.is_editable(8, 8));
        assert!(mask.is_editable(4, 1));
        assert!(!mask.is_editable(4, 6));
        assert!(!mask.is_editable(5, 8));
    }

    #[test]
    fn fractional_vertices_cover_enclosed_lattice_points() {
        let rect = polygon(&[[0.5, 0.5], [3.5, 0.5], [3.5, 2.5], [0.5, 2.5]]);
        let mask = build_mask(dims(5, 5), &[rect]).unwrap();

        for y in 0..5 {
            for x in 0..5 {
                let inside = (1..=3).contains(&x) && (1..=2).contains(&y);
                assert_eq!(mask.is_editable(x, y), inside, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn geometry_outside_the_raster_is_clipped() {
        let square = polygon(&[[-5.0, -5.0], [5.0, -5.0], [5.0, 5.0], [-5.0, 5.0]]);
        let mask = build_mask(dims(10, 10), &[square]).unwrap();
        assert_eq!(mask.editable_count(), 36);
        assert!(mask.is_editable(0, 0));
        assert!(mask.is_editable(5, 5));
        assert!(!mask.is_editable(6, 5));

        let far_away = polygon(&[[100.0, 100.0], [200.0, 100.0], [150.0, 180.0]]);
        let mask = build_mask(dims(10, 10), &[far_away]).unwrap();
        assert_eq!(mask.editable_count(), 0);
    }

    #[test]
    fn overlapping_polygons_union_regardless_of_order() {
        let a = polygon(&[[1.0, 1.0], [8.0, 1.0], [8.0, 8.0], [1.0, 8.0]]);
        let b = polygon(&[[5.0, 5.0], [14.0, 5.0], [14.0, 14.0], [5.0, 14.0]]);

        let ab = build_mask(dims(16, 16), &[a.clone(), b.clone()]).unwrap();
        let ba = build_mask(dims(16, 16), &[b, a]).unwrap();

        assert_eq!(ab, ba);
        // 8x8 + 10x10 minus the 4x4 overlap.
        assert_eq!(ab.editable_count(), 64 + 100 - 16);
        assert!(ab.is_editable(6, 6));
    }

    #[test]
    fn clockwise_and_counter_clockwise_fill_identically() {
        let ccw = polygon(&[[1.0, 1.0], [6.0, 1.0], [6.0, 4.0], [1.0, 4.0]]);
        let cw = polygon(&[[1.0, 1.0], [1.0, 4.0], [6.0, 4.0], [6.0, 1.0]]);
        assert_eq!(
            build_mask(dims(8, 8), &[ccw]).unwrap(),
            build_mask(dims(8, 8), &[cw]).unwrap()
        );
    }

    // -- Degenerate polygons ------------------------------------------------

    #[test]
    fn degenerate_polygons_contribute_nothing() {
        let two_points = polygon(&[[0.0, 0.0], [5.0, 5.0]]);
        let collinear = polygon(&[[0.0, 0.0], [2.0, 2.0], [4.0, 4.0]]);
        let repeated = polygon(&[[3.0, 3.0], [3.0, 3.0], [3.0, 3.0]]);
        let empty = Polygon::default();

        assert!(two_points.is_degenerate());
        assert!(collinear.is_degenerate());
        assert!(repeated.is_degenerate());

        let mask = build_mask(dims(8, 8), &[two_points, collinear, repeated, empty]).unwrap();
        assert_eq!(mask.editable_count(), 0);
    }

    #[test]
    fn self_intersecting_bowtie_fills_both_lobes() {
        let bowtie = polygon(&[[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]]);
        assert_eq!(bowtie.signed_area(), 0.0);
        assert!(!bowtie.is_degenerate());

        let mask = build_mask(dims(20, 20), &[bowtie]).unwrap();

        assert!(mask.is_editable(1, 5));
        assert!(mask.is_editable(9, 5));
        assert!(mask.is_editable(5, 5));
        assert!(!mask.is_editable(5, 1));
        assert!(!mask.is_editable(5, 9));
        assert!(!mask.is_editable(12, 5));
        // Row y spans [0, min(y, 10 - y)] and [max(y, 10 - y), 10].
        let expected: usize = (0..=10u32)
            .map(|y| {
                let inner = y.min(10 - y) as usize;
                if inner == 5 { 11 } else { 2 * (inner + 1) }
            })
            .sum();
        assert_eq!(mask.editable_count(), expected);
    }

    #[test]
    fn signed_area_follows_vertex_order() {
        let square = polygon(&[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]);
        assert_eq!(square.signed_area(), 4.0);
        let reversed = Polygon::new(square.points().iter().rev().copied().collect());
        assert_eq!(reversed.signed_area(), -4.0);
    }

    // -- Encoding -----------------------------------------------------------

    #[test]
    fn png_encoding_keeps_size_and_values() {
        let square = polygon(&[[0.0, 0.0], [3.0, 0.0], [3.0, 3.0], [0.0, 3.0]]);
        let mask = build_mask(dims(6, 5), &[square]).unwrap();
        let png = mask.to_png().unwrap();

        assert_eq!(image_dimensions(&png).unwrap(), dims(6, 5));
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.as_raw(), mask.as_raw());
    }

    /// A PNG holding only a signature, an IHDR and empty IDAT/IEND chunks.
    fn png_header(width: u32, height: u32) -> Vec<u8> {
        fn crc32(bytes: &[u8]) -> u32 {
            let mut crc = 0xFFFF_FFFFu32;
            for &byte in bytes {
                crc ^= u32::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
                }
            }
            !crc
        }
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            let start = out.len();
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            let crc = crc32(&out[start..]);
            out.extend_from_slice(&crc.to_be_bytes());
        }

        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[8, 0, 0, 0, 0]);

        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        chunk(&mut out, b"IHDR", &ihdr);
        chunk(&mut out, b"IDAT", &[]);
        chunk(&mut out, b"IEND", &[]);
        out
    }

    #[test]
    fn oversized_header_is_rejected_before_allocation() {
        assert_matches!(
            image_dimensions(&png_header(200_000, 200_000)),
            Err(CoreError::InvalidInput(_))
        );
        assert_eq!(image_dimensions(&png_header(640, 480)).unwrap(), dims(640, 480));
    }

    #[test]
    fn dimension_limits_cover_side_and_area() {
        assert!(ImageDimensions::new(MAX_IMAGE_SIDE, 1).is_ok());
        assert_matches!(
            ImageDimensions::new(MAX_IMAGE_SIDE + 1, 1),
            Err(CoreError::InvalidInput(_))
        );
        assert_matches!(
            ImageDimensions::new(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE),
            Err(CoreError::InvalidInput(_))
        );
        let raw = ImageDimensions { width: 200_000, height: 200_000 };
        assert_matches!(build_mask(raw, &[]), Err(CoreError::InvalidInput(_)));
    }

    #[test]
    fn image_dimensions_rejects_garbage() {
        assert_matches!(
            image_dimensions(b"definitely not an image"),
            Err(CoreError::InvalidInput(_))
        );
    }

    #[test]
    fn polygons_deserialize_from_nested_arrays() {
        let polygons: Vec<Polygon> =
            serde_json::from_str("[[[0, 0], [10.5, 0], [10, 10]], []]").unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].points()[1], Point::new(10.5, 0.0));
        assert!(polygons[1].points().is_empty());

        let json = serde_json::to_string(&polygons[0]).unwrap();
        assert_eq!(json, "[[0.0,0.0],[10.5,0.0],[10.0,10.0]]");
    }
}
