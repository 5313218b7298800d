use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use labdrivers::parameter::NumericParameter;
use labdrivers::ramp::{paramp, ramp_to, sweep, RampMode, RampOptions};
use labdrivers::Error;

type Journal = Rc<RefCell<Vec<(String, f64)>>>;

/// In-memory parameter recording every value it is set to.
struct Recorder {
    name: String,
    value: f64,
    limit: f64,
    journal: Journal,
}

impl Recorder {
    fn new(name: &str, value: f64, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            value,
            limit: f64::INFINITY,
            journal: journal.clone(),
        }
    }
}

impl NumericParameter for Recorder {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn get(&mut self) -> labdrivers::Result<f64> {
        Ok(self.value)
    }

    fn set(&mut self, value: f64) -> labdrivers::Result<()> {
        if value.abs() > self.limit {
            return Err(Error::internal(anyhow!("device refused {}", value)));
        }
        self.journal.borrow_mut().push((self.name.clone(), value));
        self.value = value;
        Ok(())
    }
}

fn no_delay(steps: usize, mode: RampMode) -> RampOptions {
    RampOptions {
        steps,
        delay: Duration::from_millis(0),
        mode,
    }
}

fn names_and_values(journal: &Journal) -> Vec<(String, f64)> {
    journal.borrow().clone()
}

fn entry(name: &str, value: f64) -> (String, f64) {
    (name.to_string(), value)
}

#[test]
fn defaults() {
    let options = RampOptions::default();
    assert_eq!(options.steps, 40);
    assert_eq!(options.delay, Duration::from_millis(50));
    assert_eq!(options.mode, RampMode::Lockstep);
}

#[test]
fn lockstep_interleaves_parameters() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 0.0, &journal);
    let mut b = Recorder::new("b", 4.0, &journal);
    let mut params: [&mut dyn NumericParameter; 2] = [&mut a, &mut b];
    paramp(&mut params, Some(&[2.0, 0.0]), &no_delay(3, RampMode::Lockstep)).unwrap();
    assert_eq!(
        names_and_values(&journal),
        vec![
            entry("a", 0.0),
            entry("b", 4.0),
            entry("a", 1.0),
            entry("b", 2.0),
            entry("a", 2.0),
            entry("b", 0.0),
        ]
    );
}

#[test]
fn sequential_finishes_one_parameter_first() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 0.0, &journal);
    let mut b = Recorder::new("b", 4.0, &journal);
    let mut params: [&mut dyn NumericParameter; 2] = [&mut a, &mut b];
    paramp(&mut params, Some(&[2.0, 0.0]), &no_delay(3, RampMode::Sequential)).unwrap();
    assert_eq!(
        names_and_values(&journal),
        vec![
            entry("a", 0.0),
            entry("a", 1.0),
            entry("a", 2.0),
            entry("b", 4.0),
            entry("b", 2.0),
            entry("b", 0.0),
        ]
    );
}

#[test]
fn missing_targets_mean_zero() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 3.0, &journal);
    let mut b = Recorder::new("b", -6.0, &journal);
    {
        let mut params: [&mut dyn NumericParameter; 2] = [&mut a, &mut b];
        paramp(&mut params, None, &no_delay(4, RampMode::Lockstep)).unwrap();
    }
    assert_eq!(a.value, 0.0);
    assert_eq!(b.value, 0.0);
    assert_eq!(journal.borrow().len(), 8);
}

#[test]
fn length_mismatch_is_rejected_before_any_write() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 1.0, &journal);
    let mut b = Recorder::new("b", 1.0, &journal);
    let mut params: [&mut dyn NumericParameter; 2] = [&mut a, &mut b];
    let err = paramp(&mut params, Some(&[0.0]), &RampOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Argument(_)));
    assert!(err.to_string().contains("final and param must be the same length"));
    assert!(journal.borrow().is_empty());
}

#[test]
fn degenerate_step_counts() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 1.5, &journal);
    ramp_to(&mut a, 5.0, &no_delay(0, RampMode::Lockstep)).unwrap();
    assert!(journal.borrow().is_empty());
    ramp_to(&mut a, 5.0, &no_delay(1, RampMode::Lockstep)).unwrap();
    assert_eq!(names_and_values(&journal), vec![entry("a", 1.5)]);
}

#[test]
fn error_aborts_remaining_steps() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 0.0, &journal);
    let mut b = Recorder::new("b", 0.0, &journal);
    b.limit = 1.5;
    {
        let mut params: [&mut dyn NumericParameter; 2] = [&mut a, &mut b];
        let err = paramp(&mut params, Some(&[4.0, 4.0]), &no_delay(5, RampMode::Lockstep));
        assert!(err.is_err());
    }
    // b refuses 2.0 in the third step, a keeps the value it already reached
    assert_eq!(
        names_and_values(&journal),
        vec![
            entry("a", 0.0),
            entry("b", 0.0),
            entry("a", 1.0),
            entry("b", 1.0),
            entry("a", 2.0),
        ]
    );
    assert_eq!(a.value, 2.0);
    assert_eq!(b.value, 1.0);
}

#[test]
fn delay_is_applied_per_step() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 0.0, &journal);
    let options = RampOptions {
        steps: 4,
        delay: Duration::from_millis(20),
        mode: RampMode::Lockstep,
    };
    let begin = Instant::now();
    ramp_to(&mut a, 1.0, &options).unwrap();
    assert!(begin.elapsed() >= Duration::from_millis(80));
}

#[test]
fn sweep_uses_fixed_increments() {
    let journal = Journal::default();
    let mut a = Recorder::new("a", 1.0, &journal);
    sweep(&mut a, -1.0, 0.5, Duration::from_millis(0)).unwrap();
    assert_eq!(
        names_and_values(&journal),
        vec![entry("a", 0.5), entry("a", 0.0), entry("a", -0.5), entry("a", -1.0)]
    );
    assert!(sweep(&mut a, 1.0, 0.0, Duration::from_millis(0)).is_err());
}
