//! Gradual changes of output values.
//!
//! Instruments connected to sensitive samples must not see abrupt jumps, so
//! outputs are moved in small linear steps with a pause after each write.

use std::thread::sleep;
use std::time::Duration;

use anyhow::anyhow;

use crate::parameter::NumericParameter;
use crate::Error;

pub const DEFAULT_STEPS: usize = 40;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);
/// Upper bound on the number of values [`step_values`] produces.
pub const MAX_STEP_COUNT: usize = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampMode {
    /// All parameters advance together, one sample each per step.
    Lockstep,
    /// Each parameter is ramped completely before the next one starts.
    Sequential,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RampOptions {
    pub steps: usize,
    pub delay: Duration,
    pub mode: RampMode,
}

impl Default for RampOptions {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            delay: DEFAULT_DELAY,
            mode: RampMode::Lockstep,
        }
    }
}

/// `n` evenly spaced samples from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut ret: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            ret[n - 1] = stop;
            ret
        }
    }
}

/// Values visited when moving from `start` to `stop` in increments of at most
/// `step`. `start` itself is not included, `stop` always is.
pub fn step_values(start: f64, stop: f64, step: f64) -> crate::Result<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(Error::argument(anyhow!("Ramp step must be positive, got {}", step)));
    }
    let distance = stop - start;
    let ratio = distance.abs() / step;
    if !ratio.is_finite() || ratio > MAX_STEP_COUNT as f64 {
        return Err(Error::argument(anyhow!(
            "Ramp from {} to {} in steps of {} exceeds {} steps",
            start,
            stop,
            step,
            MAX_STEP_COUNT
        )));
    }
    // a ratio a rounding error above an integer must not add a step
    let count = if distance == 0.0 {
        0
    } else {
        ((ratio - 1e-9).ceil() as usize).max(1)
    };
    let increment = step.copysign(distance);
    let mut ret: Vec<f64> = (1..count).map(|i| start + increment * i as f64).collect();
    if count > 0 {
        ret.push(stop);
    }
    Ok(ret)
}

/// Move every parameter to its target (zero when `targets` is `None`).
///
/// Nothing is written if the arguments are inconsistent. An error while
/// writing stops the ramp; values already applied are left in place.
pub fn paramp(
    params: &mut [&mut dyn NumericParameter],
    targets: Option<&[f64]>,
    options: &RampOptions,
) -> crate::Result<()> {
    let targets: Vec<f64> = match targets {
        Some(targets) => {
            if targets.len() != params.len() {
                return Err(Error::argument(anyhow!(
                    "final and param must be the same length ({} != {})",
                    targets.len(),
                    params.len()
                )));
            }
            targets.to_vec()
        }
        None => vec![0.0; params.len()],
    };

    let mut points = Vec::with_capacity(params.len());
    for (param, target) in params.iter_mut().zip(&targets) {
        let start = param.get()?;
        log::debug!("ramping {} from {} to {} in {} steps", param.name(), start, target, options.steps);
        points.push(linspace(start, *target, options.steps));
    }

    match options.mode {
        RampMode::Lockstep => {
            for step in 0..options.steps {
                for (param, values) in params.iter_mut().zip(&points) {
                    param.set(values[step])?;
                }
                sleep(options.delay);
            }
        }
        RampMode::Sequential => {
            for (param, values) in params.iter_mut().zip(&points) {
                for value in values {
                    param.set(*value)?;
                    sleep(options.delay);
                }
            }
        }
    }
    Ok(())
}

/// Ramp a single parameter to `target`.
pub fn ramp_to(param: &mut dyn NumericParameter, target: f64, options: &RampOptions) -> crate::Result<()> {
    paramp(&mut [param], Some(&[target]), options)
}

/// Ramp a single parameter in fixed increments, pausing `delay` between writes.
pub fn sweep(param: &mut dyn NumericParameter, target: f64, step: f64, delay: Duration) -> crate::Result<()> {
    let start = param.get()?;
    let values = step_values(start, target, step)?;
    let last = values.len();
    for (i, value) in values.into_iter().enumerate() {
        param.set(value)?;
        if i + 1 < last {
            sleep(delay);
        }
    }
    Ok(())
}
