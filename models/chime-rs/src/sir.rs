use log::trace;
use serde::Serialize;

/// Compartment sizes of a closed population on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SirState {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl SirState {
    pub fn new(susceptible: f64, infected: f64, recovered: f64) -> Self {
        SirState {
            susceptible,
            infected,
            recovered,
        }
    }

    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    /// Advances one day. `population` is the constant total of the run.
    pub fn advance(&self, beta: f64, gamma: f64, population: f64) -> SirState {
        let s_to_i = (beta * self.susceptible * self.infected / population).min(self.susceptible);
        let i_to_r = gamma * self.infected;
        SirState {
            susceptible: (self.susceptible - s_to_i).max(0.0),
            infected: (self.infected + s_to_i - i_to_r).max(0.0),
            recovered: (self.recovered + i_to_r).min(population),
        }
    }
}

/// Daily growth rate of an epidemic doubling every `doubling_time` days.
pub fn growth_rate(doubling_time: f64) -> f64 {
    2.0_f64.powf(1.0 / doubling_time) - 1.0
}

/// Contact rate that makes the infected compartment grow at `growth_rate`
/// when `susceptible` of `population` are susceptible, reduced by
/// `relative_contact_rate`.
pub fn beta(
    growth_rate: f64,
    gamma: f64,
    susceptible: f64,
    population: f64,
    relative_contact_rate: f64,
) -> f64 {
    (growth_rate + gamma) * population / susceptible * (1.0 - relative_contact_rate)
}

/// `days` consecutive days simulated with contact rate `beta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicySegment {
    pub beta: f64,
    pub days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SirDay {
    pub day: u32,
    pub state: SirState,
}

/// A deterministic SIR run. Iterating it replays the run from the initial
/// state every time.
#[derive(Debug, Clone)]
pub struct SirSimulation {
    initial: SirState,
    gamma: f64,
    policy: Vec<PolicySegment>,
}

impl SirSimulation {
    pub fn new(initial: SirState, gamma: f64, policy: Vec<PolicySegment>) -> Self {
        SirSimulation {
            initial,
            gamma,
            policy,
        }
    }

    pub fn initial(&self) -> &SirState {
        &self.initial
    }

    pub fn n_days(&self) -> u32 {
        self.policy.iter().map(|segment| segment.days).sum()
    }

    pub fn iter(&self) -> SirSteps<'_> {
        SirSteps {
            simulation: self,
            state: self.initial,
            population: self.initial.total(),
            day: 0,
            segment: 0,
            segment_day: 0,
            finished: false,
        }
    }

    /// People newly infected on each day, the drop in the susceptible
    /// compartment since the previous day. Day 0 has none.
    pub fn new_infections(&self) -> Vec<f64> {
        let mut previous = self.initial.susceptible;
        self.iter()
            .map(|SirDay { state, .. }| {
                let infections = (previous - state.susceptible).max(0.0);
                previous = state.susceptible;
                infections
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a SirSimulation {
    type Item = SirDay;
    type IntoIter = SirSteps<'a>;

    fn into_iter(self) -> SirSteps<'a> {
        self.iter()
    }
}

pub struct SirSteps<'a> {
    simulation: &'a SirSimulation,
    state: SirState,
    population: f64,
    day: u32,
    segment: usize,
    segment_day: u32,
    finished: bool,
}

impl Iterator for SirSteps<'_> {
    type Item = SirDay;

    fn next(&mut self) -> Option<SirDay> {
        if self.finished {
            return None;
        }
        let current = SirDay {
            day: self.day,
            state: self.state,
        };
        loop {
            match self.simulation.policy.get(self.segment) {
                Some(segment) if self.segment_day < segment.days => {
                    if self.segment_day == 0 {
                        trace!(
                            "day {}: beta {} for {} days",
                            self.day, segment.beta, segment.days
                        );
                    }
                    self.state =
                        self.state
                            .advance(segment.beta, self.simulation.gamma, self.population);
                    self.segment_day += 1;
                    self.day += 1;
                    break;
                }
                Some(_) => {
                    self.segment += 1;
                    self.segment_day = 0;
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = (self.simulation.n_days() - self.day) as usize + 1;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SirSteps<'_> {}
