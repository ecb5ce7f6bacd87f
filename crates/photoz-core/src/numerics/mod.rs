//! Grid, interpolation and quadrature helpers shared by the flux-grid builder,
//! the likelihood evaluator and the metrics.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("interpolation needs at least 2 samples with matching lengths, got x={x_len}, y={y_len}")]
    InvalidTable { x_len: usize, y_len: usize },
    #[error("x={x} lies outside the tabulated range [{lower}, {upper}]")]
    OutOfDomain { x: f64, lower: f64, upper: f64 },
}

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

pub fn log_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if !(start.is_finite() && end.is_finite() && start > 0.0 && end > start) {
        return None;
    }

    let mut grid: Vec<f64> = linear_grid(start.log10(), end.log10(), count)?
        .into_iter()
        .map(|exponent| 10.0_f64.powf(exponent))
        .collect();
    grid[0] = start;
    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Trapezoidal rule over a (possibly non-uniform) abscissa.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut correction = 0.0;
    for index in 1..x.len() {
        let area = 0.5 * (x[index] - x[index - 1]) * (y[index] + y[index - 1]);
        kahan_add(&mut sum, &mut correction, area);
    }
    sum
}

/// Linear interpolation that refuses to extrapolate.
pub fn interpolate_strict(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Result<f64, InterpolationError> {
    if x_grid.len() < 2 || x_grid.len() != y_grid.len() {
        return Err(InterpolationError::InvalidTable {
            x_len: x_grid.len(),
            y_len: y_grid.len(),
        });
    }

    let lower = x_grid[0];
    let upper = x_grid[x_grid.len() - 1];
    if !(x >= lower && x <= upper) {
        return Err(InterpolationError::OutOfDomain { x, lower, upper });
    }

    Ok(interpolate_within(x, x_grid, y_grid))
}

/// Linear interpolation clamped to the end values outside the table.
pub fn interpolate_linear(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x_grid.is_empty() || x_grid.len() != y_grid.len() || x.is_nan() {
        return None;
    }

    let last_index = x_grid.len() - 1;
    if x <= x_grid[0] {
        return Some(y_grid[0]);
    }
    if x >= x_grid[last_index] {
        return Some(y_grid[last_index]);
    }

    Some(interpolate_within(x, x_grid, y_grid))
}

fn interpolate_within(x: f64, x_grid: &[f64], y_grid: &[f64]) -> f64 {
    let upper = x_grid
        .partition_point(|&value| value < x)
        .clamp(1, x_grid.len() - 1);
    let lower = upper - 1;
    let x0 = x_grid[lower];
    let x1 = x_grid[upper];
    if x1 == x0 {
        return y_grid[upper];
    }

    let interpolation = (x - x0) / (x1 - x0);
    y_grid[lower] + interpolation * (y_grid[upper] - y_grid[lower])
}

/// Index of the first maximum, ignoring NaN entries.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some(current) if values[current] >= value => {}
            _ => best = Some(index),
        }
    }
    best
}

/// Indices ordered by decreasing value, ties broken by index.
pub fn deterministic_argsort_descending(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_unstable_by(|lhs, rhs| {
        values[*rhs]
            .total_cmp(&values[*lhs])
            .then_with(|| lhs.cmp(rhs))
    });
    indices
}

pub fn within_tolerance(lhs: f64, rhs: f64, abs_tol: f64, rel_tol: f64) -> bool {
    let abs_diff = (lhs - rhs).abs();
    let scale = lhs.abs().max(rhs.abs());
    abs_diff <= abs_tol || abs_diff <= rel_tol * scale
}
