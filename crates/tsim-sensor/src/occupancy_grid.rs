//! Occupancy and visibility grid rasterizer.
//!
//! # Frames
//!
//! The grid is centred on the sensor origin and axis-aligned with it.
//! A sensor-frame point `(x, y)` lands in pixel
//! `((x + width·res/2) / res, (y + height·res/2) / res)`; column grows with
//! `x`, row with `y`.
//!
//! # Rasterization
//!
//! Each primitive contributes two convex-ish polygons: the **occupied**
//! polygon (its hull) and the **invisible** polygon (the wedge it shadows
//! out to the field boundary).  Both are traced edge by edge with
//! [`GridTraversal`]; per row only the leftmost and rightmost touched
//! columns matter, which become a `+1` / `−1` pair in that layer.  `build`
//! integrates each row with a running prefix sum.

use std::f64::consts::{PI, TAU};

use tracing::{debug, trace};

use tsim_core::{Point, Pose};

use crate::{GridTraversal, Primitive, SensorError, SensorResult};

/// Per-cell marker counter.  Also bounds the number of primitives per frame.
type MarkerCount = i16;

// ── OccupancyGrid ─────────────────────────────────────────────────────────────

/// A built cost grid.  `data` is row-major, `height × width`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccupancyGrid {
    /// Metres per cell.
    pub resolution: f64,
    pub height:     usize,
    pub width:      usize,
    /// Sensor pose in the map frame at the time of the frame.
    pub origin:     Pose,
    pub data:       Vec<i8>,
}

impl OccupancyGrid {
    #[inline]
    pub fn cost(&self, row: usize, col: usize) -> Option<i8> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// `(row, col)` of the cell containing map-frame point `world`, if any.
    pub fn cell_of(&self, world: Point) -> Option<(usize, usize)> {
        let local = self.origin.inverse_transform_point(world);
        let col = ((local.x + self.width as f64 * self.resolution / 2.0) / self.resolution).floor();
        let row = ((local.y + self.height as f64 * self.resolution / 2.0) / self.resolution).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Number of cells carrying `cost`.
    pub fn count(&self, cost: i8) -> usize {
        self.data.iter().filter(|&&c| c == cost).count()
    }
}

// ── OccupancyGridBuilder ──────────────────────────────────────────────────────

/// Accumulates primitives for one sensor frame and builds the cost grid.
///
/// # Usage
///
/// ```
/// use tsim_core::{BoundingBox, Point, Pose};
/// use tsim_sensor::{BoxPrimitive, OccupancyGridBuilder};
///
/// let mut builder = OccupancyGridBuilder::new(1.0, 20, 20, 100, 50).unwrap();
/// builder.reset(Pose::default());
/// builder
///     .add(&BoxPrimitive::new(Pose::new(Point::xy(3.5, 0.0), 0.0), BoundingBox::centered(2.0, 3.0, 1.0)))
///     .unwrap();
/// let grid = builder.build();
/// assert_eq!(grid.cost(10, 13), Some(100));
/// ```
#[derive(Clone, Debug)]
pub struct OccupancyGridBuilder {
    resolution:      f64,
    height:          usize,
    width:           usize,
    occupied_cost:   i8,
    invisible_cost:  i8,

    origin:          Pose,
    primitive_count: MarkerCount,

    occupied:        Vec<MarkerCount>,
    invisible:       Vec<MarkerCount>,

    // Scratch row extents, reused across polygons.
    mincols:         Vec<i32>,
    maxcols:         Vec<i32>,
}

impl OccupancyGridBuilder {
    pub fn new(
        resolution:     f64,
        height:         usize,
        width:          usize,
        occupied_cost:  i8,
        invisible_cost: i8,
    ) -> SensorResult<Self> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(SensorError::InvalidConfig(format!("resolution must be positive, got {resolution}")));
        }
        if height == 0 || width == 0 {
            return Err(SensorError::InvalidConfig(format!("grid must be non-empty, got {height}x{width}")));
        }
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(SensorError::InvalidConfig(format!("grid too large: {height}x{width}")));
        }
        Ok(Self {
            resolution,
            height,
            width,
            occupied_cost,
            invisible_cost,
            origin: Pose::default(),
            primitive_count: 0,
            occupied: vec![0; height * width],
            invisible: vec![0; height * width],
            mincols: vec![0; height],
            maxcols: vec![0; height],
        })
    }

    #[inline]
    pub fn origin(&self) -> Pose {
        self.origin
    }

    /// Primitives added since the last reset.
    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.primitive_count as usize
    }

    /// Start a new frame with the sensor at `origin`.
    pub fn reset(&mut self, origin: Pose) {
        self.origin = origin;
        self.primitive_count = 0;
        self.occupied.fill(0);
        self.invisible.fill(0);
    }

    /// Mark `primitive` and the region it hides from the sensor.
    ///
    /// Fails once more than `i16::MAX` primitives have been added since the
    /// last reset; the frame is then unusable until the next reset.
    pub fn add<P: Primitive + ?Sized>(&mut self, primitive: &P) -> SensorResult<()> {
        if self.primitive_count == MarkerCount::MAX {
            return Err(SensorError::PrimitiveOverflow { max: MarkerCount::MAX });
        }
        self.primitive_count += 1;

        let occupied: Vec<Point> = primitive
            .convex_hull_2d()
            .into_iter()
            .map(|p| self.origin.inverse_transform_point(p))
            .collect();
        if occupied.is_empty() {
            return Ok(());
        }
        let invisible = self.invisible_area(&occupied);
        trace!(vertices = occupied.len(), shadow = invisible.len(), "grid primitive");

        let invisible_px = self.to_pixels(&invisible);
        let occupied_px = self.to_pixels(&occupied);
        mark_polygon(
            &mut self.invisible,
            &mut self.mincols,
            &mut self.maxcols,
            self.width,
            &invisible_px,
        );
        mark_polygon(
            &mut self.occupied,
            &mut self.mincols,
            &mut self.maxcols,
            self.width,
            &occupied_px,
        );
        Ok(())
    }

    /// Integrate the marker layers into a cost grid.  Does not consume the
    /// frame; building twice gives the same grid.
    pub fn build(&self) -> OccupancyGrid {
        let mut data = vec![0i8; self.height * self.width];
        for row in 0..self.height {
            let (mut occupied, mut invisible) = (0i32, 0i32);
            for col in 0..self.width {
                let i = row * self.width + col;
                occupied += i32::from(self.occupied[i]);
                invisible += i32::from(self.invisible[i]);
                data[i] = if occupied > 0 {
                    self.occupied_cost
                } else if invisible > 0 {
                    self.invisible_cost
                } else {
                    0
                };
            }
        }
        debug!(
            primitives = self.primitive_count,
            height = self.height,
            width = self.width,
            "occupancy grid built"
        );
        OccupancyGrid {
            resolution: self.resolution,
            height:     self.height,
            width:      self.width,
            origin:     self.origin,
            data,
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn to_pixels(&self, polygon: &[Point]) -> Vec<(f64, f64)> {
        let half_w = self.width as f64 * self.resolution / 2.0;
        let half_h = self.height as f64 * self.resolution / 2.0;
        polygon
            .iter()
            .map(|p| ((p.x + half_w) / self.resolution, (p.y + half_h) / self.resolution))
            .collect()
    }

    /// Shadow of a sensor-frame polygon: from its first bearing extreme out
    /// to the field rectangle, around the rectangle's corners, and back in
    /// through the other extreme.
    fn invisible_area(&self, occupied: &[Point]) -> Vec<Point> {
        let real_w = self.width as f64 * self.resolution / 2.0;
        let real_h = self.height as f64 * self.resolution / 2.0;

        // Counter-clockwise from bottom-left.
        let corner = |i: usize| -> Point {
            match i % 4 {
                0 => Point::xy(-real_w, -real_h),
                1 => Point::xy(real_w, -real_h),
                2 => Point::xy(real_w, real_h),
                _ => Point::xy(-real_w, real_h),
            }
        };
        // Side `i` lies between corners `i - 1` and `i`.
        let projection = |p: Point, i: usize| -> Point {
            match i % 4 {
                0 => Point::xy(-real_w, p.y * -real_w / p.x),
                1 => Point::xy(p.x * -real_h / p.y, -real_h),
                2 => Point::xy(real_w, p.y * real_w / p.x),
                _ => Point::xy(p.x * real_h / p.y, real_h),
            }
        };

        let (mut minp, mut maxp) = bearing_extremes(occupied, Point::theta);
        if maxp.theta() - minp.theta() > PI {
            // The hull straddles the -x axis: compare on [0, 2π) instead.
            let shifted = |p: Point| {
                let theta = p.theta();
                if theta < 0.0 { theta + TAU } else { theta }
            };
            (minp, maxp) = bearing_extremes(occupied, shifted);
        }
        let min_angle = minp.theta();
        let mut max_angle = maxp.theta();
        if min_angle > max_angle {
            max_angle += TAU;
        }

        let lap = |i: usize| TAU * (i / 4) as f64;
        let mut res = Vec::with_capacity(8);
        let mut i = 0usize;
        while corner(i).theta() + lap(i) < min_angle {
            i += 1;
        }
        res.push(minp);
        res.push(projection(minp, i));
        while corner(i).theta() + lap(i) < max_angle {
            res.push(corner(i));
            i += 1;
        }
        res.push(projection(maxp, i));
        res.push(maxp);
        res
    }
}

/// First vertex with the smallest key and last vertex with the largest.
fn bearing_extremes(polygon: &[Point], key: impl Fn(Point) -> f64) -> (Point, Point) {
    let mut minp = polygon[0];
    let mut maxp = polygon[0];
    for &p in &polygon[1..] {
        if key(p) < key(minp) {
            minp = p;
        }
        if key(p) >= key(maxp) {
            maxp = p;
        }
    }
    (minp, maxp)
}

/// Trace the closed ring `pixels` and add its per-row `+1` / `−1` extents
/// to `layer`.
fn mark_polygon(
    layer:   &mut [MarkerCount],
    mincols: &mut [i32],
    maxcols: &mut [i32],
    width:   usize,
    pixels:  &[(f64, f64)],
) {
    let height = mincols.len();
    let width_i = width as i32;
    mincols.fill(width_i);
    maxcols.fill(-1);

    for (k, &(px, py)) in pixels.iter().enumerate() {
        let (qx, qy) = pixels[(k + 1) % pixels.len()];
        for (col, row) in GridTraversal::new(px, py, qx, qy) {
            if row >= 0 && (row as usize) < height {
                let r = row as usize;
                mincols[r] = mincols[r].min(col);
                maxcols[r] = maxcols[r].max(col);
            }
        }
    }

    for row in 0..height {
        let (min, max) = (mincols[row], maxcols[row]);
        if max < 0 || min >= width_i || min > max {
            continue;
        }
        layer[width * row + min.max(0) as usize] += 1;
        if max + 1 < width_i {
            layer[width * row + (max + 1) as usize] -= 1;
        }
    }
}
