/// Generate sine wave samples
pub fn sine(fs: f32, f: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * f * (i as f32) / fs).sin())
        .collect()
}

/// `num` evenly spaced values over `[start, stop]` (inclusive).
pub fn linspace(start: f32, stop: f32, num: usize) -> Vec<f32> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f32;
            (0..num).map(|i| start + step * i as f32).collect()
        }
    }
}

/// Standardize in place to zero mean and unit variance.
pub fn zscore(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let n = x.len() as f32;
    let mean = x.iter().sum::<f32>() / n;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let std = var.sqrt().max(1e-8);
    for v in x.iter_mut() {
        *v = (*v - mean) / std;
    }
}

/// `(min, max)` over finite values, `None` when there are none.
pub fn finite_range(x: &[f32]) -> Option<(f32, f32)> {
    x.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let t = linspace(0.0, 5.0, 2500);
        assert_eq!(t.len(), 2500);
        assert_eq!(t[0], 0.0);
        assert!((t[2499] - 5.0).abs() < 1e-4);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 1.0, 1), vec![3.0]);
    }

    #[test]
    fn zscore_centers_and_scales() {
        let mut x = vec![1.0, 2.0, 3.0, 4.0];
        zscore(&mut x);
        let mean = x.iter().sum::<f32>() / 4.0;
        let var = x.iter().map(|v| v * v).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zscore_of_flat_lead_is_zero() {
        let mut x = vec![7.0; 10];
        zscore(&mut x);
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn finite_range_skips_nan() {
        assert_eq!(finite_range(&[f32::NAN, 2.0, -1.0]), Some((-1.0, 2.0)));
        assert_eq!(finite_range(&[]), None);
    }
}
