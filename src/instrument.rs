//! Gain automation and the instrument's fixed tone envelope.
//!
//! Automation follows the scheduling model of a Web Audio `AudioParam`:
//! events are placed on the output clock and each ramp runs from the
//! previous event's time and value to its own.

/// How the value approaches an automation event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ramp {
    /// Jump to the value at the event time.
    Set,
    /// Straight line from the previous event.
    Linear,
    /// Constant-ratio curve from the previous event.
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationEvent {
    /// Absolute output-clock time in seconds.
    pub time: f64,
    pub value: f64,
    pub ramp: Ramp,
}

/// A parameter value scheduled over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Automation {
    default: f64,
    events: Vec<AutomationEvent>,
}

impl Automation {
    pub fn new(default: f64) -> Self {
        Self {
            default,
            events: Vec::new(),
        }
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(AutomationEvent {
            time,
            value,
            ramp: Ramp::Set,
        })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(AutomationEvent {
            time,
            value,
            ramp: Ramp::Linear,
        })
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(AutomationEvent {
            time,
            value,
            ramp: Ramp::Exponential,
        })
    }

    /// Events in time order; equal times keep insertion order.
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    fn insert(&mut self, event: AutomationEvent) -> &mut Self {
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
        self
    }

    /// Value of the parameter at output-clock time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let next = self.events.partition_point(|e| e.time <= t);
        let (start_time, start_value) = match next.checked_sub(1) {
            Some(prev) => (self.events[prev].time, self.events[prev].value),
            None => (0.0, self.default),
        };

        let Some(target) = self.events.get(next) else {
            return start_value;
        };

        let span = target.time - start_time;
        if span <= 0.0 {
            return start_value;
        }
        let progress = ((t - start_time) / span).clamp(0.0, 1.0);

        match target.ramp {
            Ramp::Set => start_value,
            Ramp::Linear => start_value + (target.value - start_value) * progress,
            Ramp::Exponential => {
                // Undefined for a zero start or a sign change; hold instead.
                if start_value == 0.0 || start_value.signum() != target.value.signum() {
                    start_value
                } else {
                    start_value * (target.value / start_value).powf(progress)
                }
            }
        }
    }
}

/// Envelope shape shared by every tone the instrument plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instrument {
    /// Attack time in seconds (0 → peak, linear)
    pub attack: f64,
    /// Gain reached at the end of the attack
    pub peak: f64,
    /// Gain the exponential tail decays toward
    pub floor: f64,
    /// Generator start-to-stop span in seconds
    pub length: f64,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            attack: 0.01,
            peak: 1.0,
            floor: 0.001,
            length: 1.0,
        }
    }
}

impl Instrument {
    /// Gain automation for a tone starting at `start` on the output clock.
    pub fn gain_automation(&self, start: f64) -> Automation {
        let mut gain = Automation::new(1.0);
        gain.set_value_at_time(0.0, start)
            .linear_ramp_to_value_at_time(self.peak, start + self.attack)
            .exponential_ramp_to_value_at_time(self.floor, start + self.length);
        gain
    }
}
