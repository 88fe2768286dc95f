// Self-similarity and novelty
// Dense affinity over frame features, a column-difference novelty curve and
// height/distance peak picking over that curve

use ndarray::{Array2, Axis};

/// Symmetric affinity `exp(-d / bandwidth)` between every pair of rows.
/// The bandwidth is the median pairwise distance, floored at `bandwidth_floor`.
pub fn affinity_matrix(features: &Array2<f32>, bandwidth_floor: f64) -> Array2<f64> {
    let n = features.nrows();
    if n == 0 {
        return Array2::zeros((0, 0));
    }

    let features = features.mapv(|x| x as f64);
    let gram = features.dot(&features.t());
    let norms: Vec<f64> = (0..n).map(|i| gram[[i, i]]).collect();

    let mut distances = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (norms[i] + norms[j] - 2.0 * gram[[i, j]]).max(0.0).sqrt();
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }

    let bandwidth = median_off_diagonal(&distances).max(bandwidth_floor);
    log::debug!("Affinity over {} frames, bandwidth {:.4}", n, bandwidth);

    distances.mapv(|d| (-d / bandwidth).exp())
}

fn median_off_diagonal(distances: &Array2<f64>) -> f64 {
    let n = distances.nrows();
    let mut upper: Vec<f64> = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            upper.push(distances[[i, j]]);
        }
    }
    median(&mut upper)
}

/// Median of a slice (mean of the two middle values for even lengths), 0 if empty
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// novelty[t] = || A[:, t+1] - A[:, t] ||, one value per adjacent column pair
pub fn novelty_curve(affinity: &Array2<f64>) -> Vec<f64> {
    let n = affinity.ncols();
    if n < 2 {
        return Vec::new();
    }

    let columns: Vec<_> = affinity.axis_iter(Axis(1)).collect();
    columns
        .windows(2)
        .map(|pair| {
            pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(b, a)| (b - a).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

/// Scale into [0, 1] by the maximum
pub fn normalize_curve(curve: &[f64], epsilon: f64) -> Vec<f64> {
    let max = curve.iter().cloned().fold(0.0f64, f64::max);
    curve.iter().map(|v| v / (max + epsilon)).collect()
}

/// mean + factor * population stddev
pub fn adaptive_threshold(curve: &[f64], factor: f64) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    let n = curve.len() as f64;
    let mean = curve.iter().sum::<f64>() / n;
    let variance = curve.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    mean + factor * variance.sqrt()
}

/// Indices of local maxima with `curve[i] >= height`, thinned so that no two kept
/// peaks are closer than `distance` samples. Taller peaks win; plateaus report
/// their middle index; the first and last samples are never peaks.
pub fn pick_peaks(curve: &[f64], height: f64, distance: usize) -> Vec<usize> {
    let n = curve.len();
    if n < 3 {
        return Vec::new();
    }

    let mut maxima = Vec::new();
    let mut i = 1;
    while i < n - 1 {
        if curve[i - 1] < curve[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && curve[ahead] == curve[i] {
                ahead += 1;
            }
            if curve[ahead] < curve[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    maxima.retain(|&p| curve[p] >= height);

    if distance <= 1 || maxima.len() < 2 {
        return maxima;
    }

    // Visit peaks tallest first; later (shorter) peaks inside the window are dropped
    let mut order: Vec<usize> = (0..maxima.len()).collect();
    order.sort_by(|&a, &b| {
        curve[maxima[b]]
            .partial_cmp(&curve[maxima[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut keep = vec![true; maxima.len()];
    for &idx in &order {
        if !keep[idx] {
            continue;
        }
        let peak = maxima[idx];

        let mut k = idx;
        while k > 0 && peak - maxima[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = idx + 1;
        while k < maxima.len() && maxima[k] - peak < distance {
            keep[k] = false;
            k += 1;
        }
    }

    maxima
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}
