//! Cells crossed by a line segment (Amanatides–Woo voxel traversal).
//!
//! Coordinates are in cell units: cell `(col, row)` covers
//! `[col, col + 1) × [row, row + 1)`.

/// Iterator over the `(col, row)` cells a segment passes through, in order
/// from the start cell to the end cell inclusive.
///
/// Every step moves to a 4-connected neighbour, so rasterizing a closed
/// polygon's edges leaves no gaps in any row.
#[derive(Clone, Debug)]
pub struct GridTraversal {
    col:       i32,
    row:       i32,
    end_col:   i32,
    end_row:   i32,
    step_col:  i32,
    step_row:  i32,
    t_max_x:   f64,
    t_max_y:   f64,
    t_delta_x: f64,
    t_delta_y: f64,
    remaining: u32,
    done:      bool,
}

/// Parametric distance (in units of the whole segment) to the first cell
/// boundary crossed along one axis, and the distance between boundaries.
fn axis_setup(start: f64, delta: f64) -> (i32, f64, f64) {
    if delta > 0.0 {
        (1, (start.floor() + 1.0 - start) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        (-1, (start - start.floor()) / -delta, 1.0 / -delta)
    } else {
        (0, f64::INFINITY, f64::INFINITY)
    }
}

impl GridTraversal {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let col = x0.floor() as i32;
        let row = y0.floor() as i32;
        let end_col = x1.floor() as i32;
        let end_row = y1.floor() as i32;
        let (step_col, t_max_x, t_delta_x) = axis_setup(x0, x1 - x0);
        let (step_row, t_max_y, t_delta_y) = axis_setup(y0, y1 - y0);
        let remaining = (end_col - col).unsigned_abs() + (end_row - row).unsigned_abs();
        Self {
            col,
            row,
            end_col,
            end_row,
            step_col,
            step_row,
            t_max_x,
            t_max_y,
            t_delta_x,
            t_delta_y,
            remaining,
            done: false,
        }
    }
}

impl Iterator for GridTraversal {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let cell = (self.col, self.row);
        if self.remaining == 0 {
            self.done = true;
            return Some(cell);
        }
        self.remaining -= 1;

        // Once one axis has reached the end cell only the other may move;
        // this keeps float drift from overshooting.
        let step_x = if self.col == self.end_col {
            false
        } else if self.row == self.end_row {
            true
        } else {
            self.t_max_x < self.t_max_y
        };
        if step_x {
            self.col += self.step_col;
            self.t_max_x += self.t_delta_x;
        } else {
            self.row += self.step_row;
            self.t_max_y += self.t_delta_y;
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.done { 0 } else { self.remaining as usize + 1 };
        (n, Some(n))
    }
}

impl ExactSizeIterator for GridTraversal {}
