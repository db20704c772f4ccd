//! Synthetic hourly wind-speed generator for demos and tests.

use crate::core::WindSeries;
use crate::error::{ForecastError, Result};
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Weibull};
use std::f64::consts::PI;

/// Mean wind speed in m/s.
const BASE_SPEED: f64 = 7.0;
/// Amplitude of the daily cycle.
const DIURNAL_AMPLITUDE: f64 = 2.0;
/// AR(1) persistence of the hourly anomaly.
const PERSISTENCE: f64 = 0.85;
const NOISE_STD: f64 = 0.7;
const GUST_PROBABILITY: f64 = 0.04;

/// Generate `n` hourly observations starting 2024-01-01T00:00Z.
///
/// The series combines a diurnal cycle peaking in the afternoon, an AR(1)
/// anomaly and occasional Weibull-distributed gusts. Values are clipped at
/// zero.
///
/// # Example
///
/// ```
/// use tubecast::data::synthetic_wind;
///
/// let series = synthetic_wind(48, 7).unwrap();
/// assert_eq!(series.len(), 48);
/// assert!(series.values().iter().all(|&v| v >= 0.0));
/// ```
pub fn synthetic_wind(n: usize, seed: u64) -> Result<WindSeries> {
    if n == 0 {
        return Err(ForecastError::EmptyData);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE_STD)
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let gust = Weibull::new(2.5, 1.8).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ForecastError::TimestampError("invalid start time".to_string()))?;

    let mut anomaly = 0.0;
    let mut values = Vec::with_capacity(n);
    let mut timestamps = Vec::with_capacity(n);
    for t in 0..n {
        let hour = (t % 24) as f64;
        // minimum around 03:00, maximum around 15:00
        let diurnal = DIURNAL_AMPLITUDE * (2.0 * PI * (hour - 9.0) / 24.0).sin();
        anomaly = PERSISTENCE * anomaly + noise.sample(&mut rng);
        let gusts = if rng.gen_bool(GUST_PROBABILITY) {
            gust.sample(&mut rng)
        } else {
            0.0
        };

        values.push((BASE_SPEED + diurnal + anomaly + gusts).max(0.0));
        timestamps.push(start + Duration::hours(t as i64));
    }

    Ok(WindSeries::new(timestamps, values)?.with_label("wind_speed"))
}
