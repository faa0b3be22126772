//! Authoritative per-zone state for one grid step.

use assembly_guide_zones::OccupancyReading;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    /// Latest detector verdict.
    pub live: bool,
    /// Set once the zone's page finished; never cleared within the step.
    pub completed: bool,
}

/// Zone states indexed by absolute zone index.
///
/// Only detection writes `live` (through [`ZoneBoard::apply_readings`]) and only
/// the page machine writes `completed`. Both writers live in this crate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneBoard {
    zones: Vec<ZoneState>,
}

impl ZoneBoard {
    pub fn new(total: usize) -> Self {
        Self {
            zones: vec![ZoneState::default(); total],
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ZoneState> {
        self.zones.get(index).copied()
    }

    pub fn states(&self) -> &[ZoneState] {
        &self.zones
    }

    pub fn completed_count(&self) -> usize {
        self.zones.iter().filter(|z| z.completed).count()
    }

    /// Record detector readings. Completed zones and unknown indices are skipped.
    /// Returns how many `live` flags changed.
    pub(crate) fn apply_readings(&mut self, readings: &[OccupancyReading]) -> usize {
        let mut changed = 0;
        for r in readings {
            let Some(z) = self.zones.get_mut(r.index) else {
                log::warn!("reading for unknown zone {}", r.index);
                continue;
            };
            if z.completed {
                continue;
            }
            if z.live != r.occupied {
                z.live = r.occupied;
                changed += 1;
            }
        }
        changed
    }

    /// Mark `range` permanently completed and drop their live flags.
    pub(crate) fn complete(&mut self, range: Range<usize>) {
        let len = self.zones.len();
        for z in &mut self.zones[clamp(range, len)] {
            z.completed = true;
            z.live = false;
        }
    }

    /// Whether every zone in `range` is live, or completed when `allow_completed`.
    pub fn all_satisfied(&self, range: Range<usize>, allow_completed: bool) -> bool {
        let zones = &self.zones[clamp(range, self.zones.len())];
        !zones.is_empty()
            && zones
                .iter()
                .all(|z| z.live || (allow_completed && z.completed))
    }

    pub fn any_live(&self, range: Range<usize>) -> bool {
        self.zones[clamp(range, self.zones.len())]
            .iter()
            .any(|z| z.live)
    }
}

fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_guide_zones::{OccupancySignals, SignalVotes};

    fn reading(index: usize, occupied: bool) -> OccupancyReading {
        OccupancyReading {
            index,
            signals: OccupancySignals::default(),
            votes: SignalVotes::default(),
            score: if occupied { 7 } else { 0 },
            occupied,
        }
    }

    #[test]
    fn completed_zones_ignore_readings() {
        let mut board = ZoneBoard::new(4);
        board.apply_readings(&[reading(0, true), reading(1, true)]);
        board.complete(0..2);
        assert_eq!(board.get(0), Some(ZoneState { live: false, completed: true }));

        let changed = board.apply_readings(&[reading(0, true), reading(2, true)]);
        assert_eq!(changed, 1);
        assert!(!board.states()[0].live);
        assert!(board.states()[2].live);
    }

    #[test]
    fn satisfaction_counts_completed_only_when_allowed() {
        let mut board = ZoneBoard::new(4);
        board.complete(0..2);
        board.apply_readings(&[reading(2, true), reading(3, true)]);
        assert!(board.all_satisfied(0..4, true));
        assert!(!board.all_satisfied(0..4, false));
        assert!(board.all_satisfied(2..4, false));
    }

    #[test]
    fn out_of_range_is_harmless() {
        let mut board = ZoneBoard::new(2);
        assert_eq!(board.apply_readings(&[reading(9, true)]), 0);
        board.complete(1..10);
        assert!(board.states()[1].completed);
        assert!(!board.all_satisfied(5..8, true));
        assert!(!board.any_live(0..2));
    }
}
