//! Trailing simple moving average used by the Feature Engine's baselines.
//!
//! Per the volume/spread baseline rules, `SMA_N(volume)` and `SMA_M(spread)`
//! average the window of bars *before* the current one. The caller slices
//! off the current bar; this module only averages a trailing window of an
//! already-prior slice.

/// Mean of the last `window` elements of `prior` (all of `prior` if shorter
/// than `window`). Returns `0.0` for an empty slice or a zero window.
pub fn trailing_mean(prior: &[f64], window: usize) -> f64 {
    if prior.is_empty() || window == 0 {
        return 0.0;
    }
    let start = prior.len().saturating_sub(window);
    let slice = &prior[start..];
    slice.iter().sum::<f64>() / slice.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_full_window() {
        let prior = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(trailing_mean(&prior, 5), 12.0);
    }

    #[test]
    fn averages_last_n_when_window_smaller_than_len() {
        let prior = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(trailing_mean(&prior, 3), 13.0);
    }

    #[test]
    fn averages_whatever_is_available_when_fewer_than_window() {
        let prior = [10.0, 20.0];
        assert_eq!(trailing_mean(&prior, 20), 15.0);
    }

    #[test]
    fn empty_prior_is_zero() {
        assert_eq!(trailing_mean(&[], 20), 0.0);
    }

    #[test]
    fn zero_window_is_zero() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0], 0), 0.0);
    }
}
