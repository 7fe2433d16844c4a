//! Agglomerative hierarchical clustering over a pairwise distance matrix.
//!
//! [`observation_distances`] turns matrix rows into Euclidean distances between them when
//! the rows are to be clustered as observation vectors.
//!
//! Merges follow the global minimum of the current cluster distances. After each merge the
//! distances to the new cluster are derived with the Lance–Williams update of the method.
//! Leaves are clusters `0..n`; the cluster formed at step `k` gets id `n + k`.

use bio_types::LinkageMethod;

/// One agglomeration step. `left < right` always.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    /// Number of leaves under the new cluster.
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    #[error("at least two observations are required, got {0}")]
    TooFewObservations(usize),
    #[error("distance matrix is not square: {rows} rows but row {row} has {len} entries")]
    NotSquare { rows: usize, row: usize, len: usize },
    #[error("distance matrix is not symmetric at ({i}, {j})")]
    Asymmetric { i: usize, j: usize },
    #[error("distance matrix has a non-finite entry at ({i}, {j})")]
    NonFiniteInput { i: usize, j: usize },
    #[error("{method} linkage produced a non-finite distance at merge {step}")]
    NonFinite { method: LinkageMethod, step: usize },
    #[error("malformed merge tree: {0}")]
    MalformedTree(String),
}

fn validate(distances: &[Vec<f64>]) -> Result<(), ClusterError> {
    let n = distances.len();
    if n < 2 {
        return Err(ClusterError::TooFewObservations(n));
    }
    for (row, values) in distances.iter().enumerate() {
        if values.len() != n {
            return Err(ClusterError::NotSquare {
                rows: n,
                row,
                len: values.len(),
            });
        }
    }
    for i in 0..n {
        for j in 0..n {
            let (a, b) = (distances[i][j], distances[j][i]);
            if !a.is_finite() {
                return Err(ClusterError::NonFiniteInput { i, j });
            }
            if (a - b).abs() > 1e-9 * a.abs().max(b.abs()).max(1.0) {
                return Err(ClusterError::Asymmetric { i, j });
            }
        }
    }
    Ok(())
}

/// Distance from cluster `i` to the union of `x` and `y`.
fn lance_williams(
    method: LinkageMethod,
    d_xi: f64,
    d_yi: f64,
    d_xy: f64,
    size_x: f64,
    size_y: f64,
    size_i: f64,
) -> f64 {
    match method {
        LinkageMethod::Single => d_xi.min(d_yi),
        LinkageMethod::Complete => d_xi.max(d_yi),
        LinkageMethod::Average => (size_x * d_xi + size_y * d_yi) / (size_x + size_y),
        LinkageMethod::Weighted => 0.5 * (d_xi + d_yi),
        LinkageMethod::Centroid => {
            let s = size_x + size_y;
            ((size_x * d_xi * d_xi + size_y * d_yi * d_yi - size_x * size_y * d_xy * d_xy / s)
                / s)
                .sqrt()
        }
        LinkageMethod::Median => {
            (0.5 * (d_xi * d_xi + d_yi * d_yi) - 0.25 * d_xy * d_xy).sqrt()
        }
        LinkageMethod::Ward => {
            let t = 1.0 / (size_x + size_y + size_i);
            ((size_i + size_x) * t * d_xi * d_xi + (size_i + size_y) * t * d_yi * d_yi
                - size_i * t * d_xy * d_xy)
                .sqrt()
        }
    }
}

/// Euclidean distances between the rows of `rows`, which must all have `rows.len()` entries.
pub fn observation_distances(rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClusterError> {
    let n = rows.len();
    if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
        return Err(ClusterError::NotSquare {
            rows: n,
            row,
            len: values.len(),
        });
    }
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = rows[i]
                .iter()
                .zip(&rows[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            out[i][j] = d;
            out[j][i] = d;
        }
    }
    Ok(out)
}

/// Cluster the `n x n` matrix into `n - 1` merges, ordered by step.
pub fn linkage(distances: &[Vec<f64>], method: LinkageMethod) -> Result<Vec<Merge>, ClusterError> {
    validate(distances)?;
    let n = distances.len();
    let mut d = distances.to_vec();
    let mut active = vec![true; n];
    let mut cluster = (0..n).collect::<Vec<usize>>();
    let mut size = vec![1usize; n];
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..n - 1 {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in (i + 1..n).filter(|&j| active[j]) {
                if best.map_or(true, |(_, _, b)| d[i][j] < b) {
                    best = Some((i, j, d[i][j]));
                }
            }
        }
        let (x, y, d_xy) = best.ok_or(ClusterError::NonFinite { method, step })?;
        let (size_x, size_y) = (size[x] as f64, size[y] as f64);
        for i in 0..n {
            if !active[i] || i == x || i == y {
                continue;
            }
            let v = lance_williams(method, d[x][i], d[y][i], d_xy, size_x, size_y, size[i] as f64);
            if !v.is_finite() {
                return Err(ClusterError::NonFinite { method, step });
            }
            d[x][i] = v;
            d[i][x] = v;
        }
        let (a, b) = (cluster[x], cluster[y]);
        merges.push(Merge {
            left: a.min(b),
            right: a.max(b),
            height: d_xy,
            size: size[x] + size[y],
        });
        active[y] = false;
        cluster[x] = n + step;
        size[x] += size[y];
    }
    Ok(merges)
}
