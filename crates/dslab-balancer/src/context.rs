//! Simulated clock and per-component logging context.

use std::cell::Cell;
use std::rc::Rc;

use sugars::rc;

/// Simulation clock shared by all components of a single simulation run.
#[derive(Clone, Default)]
pub struct Clock {
    time: Rc<Cell<f64>>,
}

impl Clock {
    /// Creates a clock set to zero.
    pub fn new() -> Self {
        Self { time: rc!(Cell::new(0.)) }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.time.get()
    }

    /// Moves the clock forward. The clock never goes back in time.
    pub fn advance_to(&self, time: f64) {
        if time > self.time.get() {
            self.time.set(time);
        }
    }
}

/// Gives a component its name and access to the simulation clock, used mostly for logging.
#[derive(Clone)]
pub struct SimulationContext {
    name: String,
    clock: Clock,
}

impl SimulationContext {
    /// Creates a context bound to the specified clock.
    pub fn new(name: &str, clock: &Clock) -> Self {
        Self {
            name: name.to_owned(),
            clock: clock.clone(),
        }
    }

    /// Creates a context with its own clock, which stays at zero unless advanced through [`Self::clock`].
    pub fn standalone(name: &str) -> Self {
        Self::new(name, &Clock::new())
    }

    /// Creates a context for another component sharing the same clock.
    pub fn derive(&self, name: &str) -> Self {
        Self::new(name, &self.clock)
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Returns the clock this context reads time from.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
