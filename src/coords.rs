//! Conversions between the two time frames markers live in.
//!
//! *Buffer age* is the number of seconds left before a sample is evicted from
//! the scope buffer. *Plot age* is the same instant measured from the left
//! edge of the visible window. Only the buffer age is ever advanced; the plot
//! age is always derived from it so the two frames cannot drift apart.

/// Plot-window position of a marker with the given buffer age.
pub fn to_plot_age(buffer_age: f64, buffer_plot_offset: f64) -> f64 {
    buffer_age - buffer_plot_offset
}

/// Buffer age of a point clicked at `plot_age` in the window.
pub fn to_buffer_age(plot_age: f64, buffer_plot_offset: f64) -> f64 {
    plot_age + buffer_plot_offset
}

/// Age after `elapsed` seconds of new samples. Negative results mean the
/// sample has left the buffer.
pub fn advance(age: f64, elapsed: f64) -> f64 {
    age - elapsed
}

/// Seconds covered by `count` samples at `sample_rate`.
pub fn elapsed_seconds(count: usize, sample_rate: f64) -> f64 {
    count as f64 / sample_rate
}

/// Buffer age of the `k`-th of `n` samples that just arrived. The newest
/// sample (`k = n - 1`) sits one sample period short of `buffer_duration`.
pub fn arrival_age(k: usize, n: usize, buffer_duration: f64, sample_rate: f64) -> f64 {
    buffer_duration - (n - k) as f64 / sample_rate
}

/// Absolute time of the instant at `buffer_age`, counted back from the
/// newest buffered sample, which always sits at `arrival_age(n - 1, n, ..)`.
/// Ages older than the retained data extrapolate at the nominal rate.
pub fn absolute_time_at(
    buffer_age: f64,
    buffer_duration: f64,
    sample_rate: f64,
    newest_timestamp: f64,
) -> f64 {
    let newest_age = buffer_duration - 1.0 / sample_rate;
    newest_timestamp - (newest_age - buffer_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_age_is_derived_from_buffer_age() {
        let offset = 20.0;
        let age = advance(25.0, 6.0);
        assert_eq!(age, 19.0);
        assert_eq!(to_plot_age(age, offset), -1.0);
        assert_eq!(to_buffer_age(3.0, offset), 23.0);
    }

    #[test]
    fn arrival_ages_end_one_period_short_of_the_buffer() {
        assert_eq!(arrival_age(9, 10, 30.0, 10.0), 29.9);
        assert_eq!(arrival_age(0, 10, 30.0, 10.0), 29.0);
        assert_eq!(elapsed_seconds(50, 100.0), 0.5);
    }

    #[test]
    fn absolute_time_counts_back_from_newest_sample() {
        // Newest sample (age 2.9 in a 3 s buffer at 10 Hz) stamped 102.9.
        assert!((absolute_time_at(2.9, 3.0, 10.0, 102.9) - 102.9).abs() < 1e-9);
        assert!((absolute_time_at(0.0, 3.0, 10.0, 102.9) - 100.0).abs() < 1e-9);
        // Before the buffer has filled, older ages run past the first sample.
        assert!((absolute_time_at(0.5, 3.0, 10.0, 1.4) - -1.0).abs() < 1e-9);
    }
}
