//! Timeline Event Model - sparse round-indexed communication schedules.
//!
//! A [`Timeline`] maps a round index to the events of that round. Two rules
//! hold at all times:
//! - at most one event per participant per round
//! - a round with no events is absent (presence of a round is observable)
//!
//! Both are enforced on every mutation and on deserialization.
//!
//! # Export Order
//!
//! ```text
//! rounds:  ascending over present indices only
//! events:  RETR < COMM < AGG, ties keep insertion order
//! ```

use crate::partition::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round index.
pub type Round = u32;

/// Wire id of the aggregator participant.
pub const AGGREGATOR_WIRE_ID: i64 = -1;

/// Event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// Client sends its update
    Comm,
    /// Client retrieves the current state
    Retr,
    /// Aggregation step
    Agg,
}

impl EventKind {
    /// Position in the canonical export order.
    pub fn export_rank(&self) -> u8 {
        match self {
            EventKind::Retr => 0,
            EventKind::Comm => 1,
            EventKind::Agg => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Comm => "COMM",
            EventKind::Retr => "RETR",
            EventKind::Agg => "AGG",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who an event belongs to. Serialized as the client id, or `-1` for the
/// aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Participant {
    Client(ClientId),
    Aggregator,
}

impl From<Participant> for i64 {
    fn from(participant: Participant) -> Self {
        match participant {
            Participant::Client(id) => id as i64,
            Participant::Aggregator => AGGREGATOR_WIRE_ID,
        }
    }
}

impl TryFrom<i64> for Participant {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == AGGREGATOR_WIRE_ID {
            return Ok(Participant::Aggregator);
        }
        ClientId::try_from(value)
            .map(Participant::Client)
            .map_err(|_| format!("invalid participant id: {}", value))
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Participant::Client(id) => write!(f, "C-{}", id),
            Participant::Aggregator => write!(f, "Agg"),
        }
    }
}

/// One scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub client: Participant,
}

impl RoundEvent {
    pub fn new(kind: EventKind, client: Participant) -> Self {
        Self { kind, client }
    }
}

/// Exported `[type, client]` pair.
pub type ExportedEvent = (EventKind, Participant);

type RawTimeline = BTreeMap<Round, Vec<RoundEvent>>;

/// Sparse round → events mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawTimeline", into = "RawTimeline")]
pub struct Timeline {
    rounds: RawTimeline,
}

impl From<RawTimeline> for Timeline {
    /// Re-establishes the invariants on untrusted input: later events for a
    /// participant replace earlier ones, empty rounds are dropped.
    fn from(raw: RawTimeline) -> Self {
        let mut timeline = Timeline::new();
        for (round, events) in raw {
            for event in events {
                timeline.set_event(round, event.client, Some(event.kind));
            }
        }
        timeline
    }
}

impl From<Timeline> for RawTimeline {
    fn from(timeline: Timeline) -> Self {
        timeline.rounds
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no round has events.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Number of present rounds.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// Present round indices, ascending.
    pub fn rounds(&self) -> impl Iterator<Item = Round> + '_ {
        self.rounds.keys().copied()
    }

    /// True if `round` has at least one event.
    pub fn contains_round(&self, round: Round) -> bool {
        self.rounds.contains_key(&round)
    }

    /// Events of `round` in insertion order.
    pub fn events(&self, round: Round) -> &[RoundEvent] {
        self.rounds.get(&round).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Event of `participant` at `round`.
    pub fn event_for(&self, round: Round, participant: Participant) -> Option<EventKind> {
        self.events(round)
            .iter()
            .find(|e| e.client == participant)
            .map(|e| e.kind)
    }

    /// Sets or clears the event of `participant` at `round`.
    ///
    /// A new event goes to the end of the round. Clearing the last event of
    /// a round removes the round.
    pub fn set_event(&mut self, round: Round, participant: Participant, kind: Option<EventKind>) {
        let events = self.rounds.entry(round).or_default();
        events.retain(|e| e.client != participant);

        if let Some(kind) = kind {
            events.push(RoundEvent::new(kind, participant));
        }

        if events.is_empty() {
            self.rounds.remove(&round);
        }
    }

    /// Copies `from`'s schedule onto `to` for rounds `0..rounds`.
    pub fn copy_client(&mut self, from: Participant, to: Participant, rounds: Round) {
        for round in 0..rounds {
            let kind = self.event_for(round, from);
            self.set_event(round, to, kind);
        }
    }

    /// Clears `participant`'s events for rounds `0..rounds`.
    pub fn clear_client(&mut self, participant: Participant, rounds: Round) {
        for round in 0..rounds {
            self.set_event(round, participant, None);
        }
    }

    /// Canonical export form: one inner list per present round, ascending,
    /// each sorted `RETR < COMM < AGG` with ties in insertion order.
    pub fn canonical_rounds(&self) -> Vec<Vec<ExportedEvent>> {
        self.rounds
            .values()
            .map(|events| {
                let mut exported: Vec<ExportedEvent> =
                    events.iter().map(|e| (e.kind, e.client)).collect();
                exported.sort_by_key(|(kind, _)| kind.export_rank());
                exported
            })
            .collect()
    }
}

/// A grid cell as displayed: slots past `rounds` mirror earlier rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    /// Round the slot reads from
    pub round: Round,
    /// False for mirrored slots
    pub active: bool,
    pub kind: Option<EventKind>,
}

/// A named schedule with its active round count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTimeline {
    pub name: String,
    pub timeline: Timeline,
    /// Only round indices below this are meaningful
    pub rounds: u32,
}

impl NamedTimeline {
    pub fn new(name: impl Into<String>, rounds: u32) -> Self {
        Self {
            name: name.into(),
            timeline: Timeline::new(),
            rounds,
        }
    }

    /// Cell shown at grid slot `slot` for `participant`.
    ///
    /// Returns `None` when `rounds` is zero, as nothing is active then.
    pub fn slot(&self, slot: u32, participant: Participant) -> Option<SlotView> {
        if self.rounds == 0 {
            return None;
        }

        let active = slot < self.rounds;
        let round = if active { slot } else { slot % self.rounds };

        Some(SlotView {
            round,
            active,
            kind: self.timeline.event_for(round, participant),
        })
    }
}
