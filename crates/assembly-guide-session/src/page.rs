//! Page and countdown state machine for one grid step.
//!
//! ```text
//!   Active --all required live--> Countdown --any required clear--> Active
//!   Countdown --0, not last page--> WaitingForClear --page reads clear--> Active (page + 1)
//!   Countdown --0, last page--> Done --all live clear--> Terminal
//! ```
//!
//! Timers are deadlines checked in [`PageMachine::tick`]. Leaving a state
//! drops its deadline, so a cancelled countdown can never fire.

use crate::board::ZoneBoard;
use crate::config::TimingConfig;
use assembly_guide_zones::{OccupancyReading, Zone, ZoneLayout};
use std::ops::Range;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageState {
    Active,
    Countdown { remaining: u32, next_tick: Instant },
    WaitingForClear,
    Done,
    Terminal,
}

/// Transitions reported back to the caller, mostly for logging and rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageEvent {
    CountdownStarted { page: usize, ticks: u32 },
    CountdownTick { page: usize, remaining: u32 },
    CountdownCancelled { page: usize },
    PageCompleted { page: usize },
    PageAdvanced { page: usize },
    StepDone,
    Terminal,
}

#[derive(Clone, Debug)]
pub struct PageMachine {
    layout: ZoneLayout,
    board: ZoneBoard,
    page: usize,
    state: PageState,
    /// Latest verdicts for the zones of a page waiting to be cleared.
    clearance: Vec<bool>,
    countdown_ticks: u32,
    tick_period: Duration,
}

impl PageMachine {
    pub fn new(layout: ZoneLayout, timing: &TimingConfig) -> Self {
        let state = if layout.total() == 0 {
            PageState::Terminal
        } else {
            PageState::Active
        };
        Self {
            board: ZoneBoard::new(layout.total()),
            layout,
            page: 0,
            state,
            clearance: Vec::new(),
            countdown_ticks: timing.countdown_ticks.max(1),
            tick_period: timing.tick_period(),
        }
    }

    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    pub fn board(&self) -> &ZoneBoard {
        &self.board
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == PageState::Terminal
    }

    fn is_last_page(&self) -> bool {
        self.layout.is_last_page(self.page)
    }

    fn page_range(&self) -> Range<usize> {
        self.layout.page_range(self.page)
    }

    /// Zones shown on the current page.
    pub fn page_zones(&self) -> Vec<Zone> {
        self.layout.page_zones(self.page)
    }

    /// Zones the detector should score on the next frame.
    ///
    /// While waiting for clearance these are the just-completed zones; their
    /// readings only feed the clearance check and never reach the board.
    pub fn detection_zones(&self) -> Vec<Zone> {
        match self.state {
            PageState::Terminal => Vec::new(),
            PageState::WaitingForClear => self.page_zones(),
            _ => self
                .page_zones()
                .into_iter()
                .filter(|z| !self.board.get(z.index).is_some_and(|s| s.completed))
                .collect(),
        }
    }

    fn required_satisfied(&self) -> bool {
        if self.is_last_page() {
            self.board.all_satisfied(0..self.layout.total(), true)
        } else {
            self.board.all_satisfied(self.page_range(), false)
        }
    }

    /// Feed one frame's readings and evaluate the resulting transition.
    ///
    /// Readings for zones outside the current page are dropped.
    pub fn observe(&mut self, readings: &[OccupancyReading], now: Instant) -> Option<PageEvent> {
        let range = self.page_range();
        let current: Vec<OccupancyReading> = readings
            .iter()
            .filter(|r| range.contains(&r.index))
            .copied()
            .collect();

        match self.state {
            PageState::Terminal => return None,
            PageState::WaitingForClear => {
                for r in &current {
                    if let Some(slot) = self.clearance.get_mut(r.index - range.start) {
                        *slot = r.occupied;
                    }
                }
            }
            _ => {
                self.board.apply_readings(&current);
            }
        }
        self.evaluate(now)
    }

    fn evaluate(&mut self, now: Instant) -> Option<PageEvent> {
        match self.state {
            PageState::Active if self.required_satisfied() => {
                self.state = PageState::Countdown {
                    remaining: self.countdown_ticks,
                    next_tick: now + self.tick_period,
                };
                log::info!(
                    "page {}: all zones filled, countdown {}",
                    self.page,
                    self.countdown_ticks
                );
                Some(PageEvent::CountdownStarted {
                    page: self.page,
                    ticks: self.countdown_ticks,
                })
            }
            PageState::Countdown { .. } if !self.required_satisfied() => {
                self.state = PageState::Active;
                log::info!("page {}: zone cleared, countdown cancelled", self.page);
                Some(PageEvent::CountdownCancelled { page: self.page })
            }
            PageState::WaitingForClear if !self.clearance.iter().any(|&o| o) => {
                self.page += 1;
                self.clearance.clear();
                self.state = PageState::Active;
                log::info!("advancing to page {}", self.page);
                Some(PageEvent::PageAdvanced { page: self.page })
            }
            PageState::Done if !self.board.any_live(self.page_range()) => {
                self.state = PageState::Terminal;
                log::info!("grid step cleared");
                Some(PageEvent::Terminal)
            }
            _ => None,
        }
    }

    /// Advance deadlines up to `now`. Returns the last transition, if any.
    pub fn tick(&mut self, now: Instant) -> Option<PageEvent> {
        let mut event = None;
        while let PageState::Countdown {
            remaining,
            next_tick,
        } = self.state
        {
            if now < next_tick {
                break;
            }
            let remaining = remaining.saturating_sub(1);
            if remaining > 0 {
                self.state = PageState::Countdown {
                    remaining,
                    next_tick: next_tick + self.tick_period,
                };
                log::debug!("page {}: countdown {}", self.page, remaining);
                event = Some(PageEvent::CountdownTick {
                    page: self.page,
                    remaining,
                });
                continue;
            }

            if self.is_last_page() {
                self.state = PageState::Done;
                log::info!("page {}: last page complete, waiting for removal", self.page);
                event = Some(PageEvent::StepDone);
            } else {
                let range = self.page_range();
                self.board.complete(range.clone());
                // assume still occupied until a frame proves otherwise
                self.clearance = vec![true; range.len()];
                self.state = PageState::WaitingForClear;
                log::info!("page {}: complete, waiting for clear", self.page);
                event = Some(PageEvent::PageCompleted { page: self.page });
            }
        }
        event
    }

    /// Remaining countdown ticks, if counting down.
    pub fn countdown(&self) -> Option<u32> {
        match self.state {
            PageState::Countdown { remaining, .. } => Some(remaining),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_guide_core::CanonicalSize;
    use assembly_guide_zones::{
        GridLayout, OccupancySignals, SignalVotes, ZoneShape, ZoneSize,
    };

    fn machine(amount: usize) -> PageMachine {
        let layout = ZoneLayout::new(
            GridLayout {
                shape: ZoneShape::Rectangle,
                size: ZoneSize::Medium,
                amount,
            },
            CanonicalSize::default(),
        );
        PageMachine::new(layout, &TimingConfig::default())
    }

    fn readings(range: Range<usize>, occupied: bool) -> Vec<OccupancyReading> {
        range
            .map(|index| OccupancyReading {
                index,
                signals: OccupancySignals::default(),
                votes: SignalVotes::default(),
                score: 0,
                occupied,
            })
            .collect()
    }

    fn run_countdown(m: &mut PageMachine, start: Instant) -> Instant {
        let mut t = start;
        for _ in 0..5 {
            t += Duration::from_secs(1);
            m.tick(t);
        }
        t
    }

    #[test]
    fn partial_fill_stays_active() {
        let mut m = machine(10);
        let t0 = Instant::now();
        let mut r = readings(0..8, true);
        r[3].occupied = false;
        assert_eq!(m.observe(&r, t0), None);
        assert_eq!(m.state(), PageState::Active);
    }

    #[test]
    fn countdown_cancels_without_completing() {
        let mut m = machine(10);
        let t0 = Instant::now();
        m.observe(&readings(0..8, true), t0);
        assert_eq!(m.countdown(), Some(5));

        m.tick(t0 + Duration::from_secs(2));
        assert_eq!(m.countdown(), Some(3));

        let mut r = readings(0..8, true);
        r[0].occupied = false;
        assert_eq!(
            m.observe(&r, t0 + Duration::from_millis(2500)),
            Some(PageEvent::CountdownCancelled { page: 0 })
        );
        // the old deadline is gone
        assert_eq!(m.tick(t0 + Duration::from_secs(10)), None);
        assert_eq!(m.state(), PageState::Active);
        assert_eq!(m.board().completed_count(), 0);
    }

    #[test]
    fn late_tick_catches_up() {
        let mut m = machine(10);
        let t0 = Instant::now();
        m.observe(&readings(0..8, true), t0);
        assert_eq!(
            m.tick(t0 + Duration::from_secs(5)),
            Some(PageEvent::PageCompleted { page: 0 })
        );
        assert_eq!(m.state(), PageState::WaitingForClear);
    }

    #[test]
    fn waits_for_clear_then_advances() {
        let mut m = machine(10);
        let t0 = Instant::now();
        m.observe(&readings(0..8, true), t0);
        let t = run_countdown(&mut m, t0);
        assert_eq!(m.state(), PageState::WaitingForClear);
        assert_eq!(m.board().completed_count(), 8);
        assert!(m.board().states()[..8].iter().all(|z| !z.live));

        // still occupied: stays put, board untouched
        assert_eq!(m.observe(&readings(0..8, true), t), None);
        assert!(m.board().states()[..8].iter().all(|z| !z.live));

        assert_eq!(
            m.observe(&readings(0..8, false), t),
            Some(PageEvent::PageAdvanced { page: 1 })
        );
        let idx: Vec<usize> = m.detection_zones().iter().map(|z| z.index).collect();
        assert_eq!(idx, vec![8, 9]);
    }

    #[test]
    fn final_page_done_then_terminal() {
        let mut m = machine(3);
        let t0 = Instant::now();
        m.observe(&readings(0..3, true), t0);
        run_countdown(&mut m, t0);
        assert_eq!(m.state(), PageState::Done);
        assert_eq!(m.board().completed_count(), 0);

        let mut r = readings(0..3, false);
        r[1].occupied = true;
        assert_eq!(m.observe(&r, t0), None);
        assert_eq!(
            m.observe(&readings(0..3, false), t0),
            Some(PageEvent::Terminal)
        );
        assert!(m.is_terminal());
        assert!(m.detection_zones().is_empty());
    }

    #[test]
    fn stale_readings_for_other_pages_are_ignored() {
        let mut m = machine(10);
        let t0 = Instant::now();
        assert_eq!(m.observe(&readings(8..10, true), t0), None);
        assert!(!m.board().any_live(0..10));
    }

    #[test]
    fn empty_layout_is_terminal() {
        assert!(machine(0).is_terminal());
    }
}
