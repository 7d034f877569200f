//! Pattern generators - synthesize multi-round schedules from a few numbers.
//!
//! A [`PatternKind`] is a registry entry. It declares its arguments, parses
//! raw user input into a [`PatternGenerator`], and the generator then builds
//! a schedule for any client count.

use crate::partition::ClientId;
use crate::timeline::{EventKind, Participant, Timeline};
use thiserror::Error;
use tracing::debug;

/// Invalid pattern selection or arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Too many arguments: expected {expected}, got {got}")]
    TooManyArguments { expected: usize, got: usize },

    #[error("Argument '{name}' is not a number: {value}")]
    NotANumber { name: &'static str, value: String },

    #[error("Argument '{name}' out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Declared argument of a pattern. All arguments are numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
}

/// Output of a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSchedule {
    /// Active round count of the schedule
    pub rounds: u32,
    pub timeline: Timeline,
}

/// Builds a schedule for a given number of clients.
pub trait PatternGenerator: Send + Sync {
    fn generate(&self, clients: usize) -> GeneratedSchedule;
}

// =============================================================================
// REGISTRY
// =============================================================================

const EVEN_LATENCY_ARGS: &[ArgSpec] = &[
    ArgSpec { name: "Percentage (0-1)" },
    ArgSpec { name: "Latency (agg Rounds)" },
];

/// Registered patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    EvenLatency,
}

impl PatternKind {
    pub fn all() -> Vec<PatternKind> {
        vec![PatternKind::EvenLatency]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::EvenLatency => "Even Latency",
        }
    }

    pub fn arg_specs(&self) -> &'static [ArgSpec] {
        match self {
            PatternKind::EvenLatency => EVEN_LATENCY_ARGS,
        }
    }

    /// Parses `args` in declaration order and builds the generator.
    pub fn configure(&self, args: &[&str]) -> Result<Box<dyn PatternGenerator>, PatternError> {
        let numbers = parse_args(self.arg_specs(), args)?;

        match self {
            PatternKind::EvenLatency => {
                let fraction = numbers[0];
                let latency = numbers[1];
                if latency < 0.0 || latency.fract() != 0.0 || latency > u32::MAX as f64 {
                    return Err(PatternError::OutOfRange {
                        name: EVEN_LATENCY_ARGS[1].name,
                        value: latency,
                    });
                }
                Ok(Box::new(EvenLatency::new(fraction, latency as u32)?))
            }
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PatternKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], " ").trim() {
            "even latency" => Ok(PatternKind::EvenLatency),
            _ => Err(PatternError::UnknownPattern(s.to_string())),
        }
    }
}

fn parse_args(specs: &[ArgSpec], args: &[&str]) -> Result<Vec<f64>, PatternError> {
    if args.len() > specs.len() {
        return Err(PatternError::TooManyArguments {
            expected: specs.len(),
            got: args.len(),
        });
    }

    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let raw = args
                .get(i)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or(PatternError::MissingArgument(spec.name))?;

            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PatternError::NotANumber {
                    name: spec.name,
                    value: raw.to_string(),
                })
        })
        .collect()
}

// =============================================================================
// EVEN LATENCY
// =============================================================================

/// A fraction of clients is slow: they retrieve at round 0 and only report
/// back at the end of the period, while everyone else alternates
/// retrieve/communicate with an aggregation after every communicate.
///
/// ```text
/// fraction 0.5, latency 1, 4 clients (period 3):
///
/// round   0      1      2
/// C-0     RETR   .      COMM
/// C-1     RETR   .      COMM
/// C-2     RETR   COMM   RETR
/// C-3     RETR   COMM   RETR
/// Agg     .      AGG    .
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvenLatency {
    fraction: f64,
    latency: u32,
}

impl EvenLatency {
    pub fn new(fraction: f64, latency: u32) -> Result<Self, PatternError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(PatternError::OutOfRange {
                name: EVEN_LATENCY_ARGS[0].name,
                value: fraction,
            });
        }
        Ok(Self { fraction, latency })
    }

    /// Rounds in one cycle, `2 * latency + 1`.
    pub fn period(&self) -> u32 {
        self.latency.saturating_mul(2).saturating_add(1)
    }

    /// Size of the late group for `clients`.
    pub fn late_clients(&self, clients: usize) -> usize {
        (clients as f64 * self.fraction).floor() as usize
    }
}

impl PatternGenerator for EvenLatency {
    fn generate(&self, clients: usize) -> GeneratedSchedule {
        let period = self.period();
        let late = self.late_clients(clients);
        let mut timeline = Timeline::new();

        for round in 0..period {
            let communicate = (round + 1) % 2 == 0;

            for client in 0..clients {
                let participant = Participant::Client(client as ClientId);
                if client < late {
                    if round == 0 {
                        timeline.set_event(round, participant, Some(EventKind::Retr));
                    }
                    if round == period - 1 {
                        timeline.set_event(round, participant, Some(EventKind::Comm));
                    }
                } else {
                    let kind = if communicate { EventKind::Comm } else { EventKind::Retr };
                    timeline.set_event(round, participant, Some(kind));
                }
            }

            if communicate {
                timeline.set_event(round, Participant::Aggregator, Some(EventKind::Agg));
            }
        }

        debug!(clients, late, period, "generated even latency schedule");

        GeneratedSchedule {
            rounds: period,
            timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_at(schedule: &GeneratedSchedule, round: u32, client: ClientId) -> Option<EventKind> {
        schedule.timeline.event_for(round, Participant::Client(client))
    }

    #[test]
    fn test_even_latency_half_late() {
        let generator = PatternKind::EvenLatency.configure(&["0.5", "1"]).unwrap();
        let schedule = generator.generate(4);

        assert_eq!(schedule.rounds, 3);

        for late in 0..2 {
            assert_eq!(kind_at(&schedule, 0, late), Some(EventKind::Retr));
            assert_eq!(kind_at(&schedule, 1, late), None);
            assert_eq!(kind_at(&schedule, 2, late), Some(EventKind::Comm));
        }
        for normal in 2..4 {
            assert_eq!(kind_at(&schedule, 0, normal), Some(EventKind::Retr));
            assert_eq!(kind_at(&schedule, 1, normal), Some(EventKind::Comm));
            assert_eq!(kind_at(&schedule, 2, normal), Some(EventKind::Retr));
        }

        let agg_rounds: Vec<u32> = schedule
            .timeline
            .rounds()
            .filter(|&r| schedule.timeline.event_for(r, Participant::Aggregator).is_some())
            .collect();
        assert_eq!(agg_rounds, vec![1]);
    }

    #[test]
    fn test_zero_latency_late_client_communicates() {
        let schedule = EvenLatency::new(1.0, 0).unwrap().generate(2);

        assert_eq!(schedule.rounds, 1);
        assert_eq!(kind_at(&schedule, 0, 0), Some(EventKind::Comm));
        assert_eq!(schedule.timeline.events(0).len(), 2);
    }

    #[test]
    fn test_no_clients_keeps_only_aggregation_rounds() {
        let schedule = EvenLatency::new(0.3, 2).unwrap().generate(0);

        assert_eq!(schedule.rounds, 5);
        assert_eq!(schedule.timeline.rounds().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_configure_validates_arguments() {
        let kind = PatternKind::EvenLatency;

        assert_eq!(
            kind.configure(&["0.5"]).err(),
            Some(PatternError::MissingArgument("Latency (agg Rounds)"))
        );
        assert!(matches!(
            kind.configure(&["half", "1"]).err(),
            Some(PatternError::NotANumber { .. })
        ));
        assert!(matches!(
            kind.configure(&["1.5", "1"]).err(),
            Some(PatternError::OutOfRange { .. })
        ));
        assert!(matches!(
            kind.configure(&["0.5", "1.5"]).err(),
            Some(PatternError::OutOfRange { .. })
        ));
        assert!(matches!(
            kind.configure(&["0.5", "1", "2"]).err(),
            Some(PatternError::TooManyArguments { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_pattern_kind_from_str() {
        assert_eq!("Even Latency".parse::<PatternKind>().unwrap(), PatternKind::EvenLatency);
        assert_eq!("even_latency".parse::<PatternKind>().unwrap(), PatternKind::EvenLatency);
        assert!("burst".parse::<PatternKind>().is_err());
    }
}
