//! Walks the ordered steps of a preset and keeps the cursor persisted.

use crate::catalog::{Catalog, ImageRecord, StepRecord};
use crate::config::CompletionPolicy;
use crate::cursor::{CursorStore, SessionCursor};
use crate::error::{DataNotFound, SessionError};
use assembly_guide_zones::GridLayout;
use std::sync::Arc;

/// A step with its catalog references resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum StepKind {
    Image(ImageRecord),
    Grid {
        grid_layout_id: String,
        layout: GridLayout,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStep {
    pub index: usize,
    pub record: StepRecord,
    pub kind: StepKind,
}

/// Result of [`Sequencer::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    /// Wrapped back to step 0 under [`CompletionPolicy::Loop`].
    Looped,
    /// Past the last step under [`CompletionPolicy::Halt`]; the cursor is cleared.
    Finished,
}

pub struct Sequencer {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn CursorStore>,
    preset_id: String,
    steps: Vec<StepRecord>,
    index: usize,
    policy: CompletionPolicy,
    finished: bool,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("preset_id", &self.preset_id)
            .field("index", &self.index)
            .field("steps", &self.steps.len())
            .field("policy", &self.policy)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Sequencer {
    /// Load `preset_id` and resume from the persisted cursor when it belongs
    /// to this preset and still points at an existing step.
    pub fn open(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn CursorStore>,
        preset_id: &str,
        policy: CompletionPolicy,
    ) -> Result<Self, SessionError> {
        let steps = catalog.steps_for_preset(preset_id)?;
        if steps.is_empty() {
            return Err(DataNotFound::Preset(preset_id.to_string()).into());
        }

        let index = match store.load()? {
            Some(c) if c.preset_id == preset_id && c.step_index < steps.len() => {
                log::info!("resuming preset {preset_id} at step {}", c.step_index);
                c.step_index
            }
            Some(c) => {
                log::warn!(
                    "ignoring cursor for preset {} step {}; starting {preset_id} at 0",
                    c.preset_id,
                    c.step_index
                );
                0
            }
            None => 0,
        };

        let seq = Self {
            catalog,
            store,
            preset_id: preset_id.to_string(),
            steps,
            index,
            policy,
            finished: false,
        };
        seq.persist()?;
        Ok(seq)
    }

    pub fn preset_id(&self) -> &str {
        &self.preset_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Resolve the current step against the catalog.
    pub fn current(&self) -> Result<ResolvedStep, SessionError> {
        let record = self.steps[self.index].clone();
        let invalid = |reason| SessionError::InvalidStep {
            preset: self.preset_id.clone(),
            index: self.index,
            reason,
        };

        let kind = if let Some(image_id) = &record.image_id {
            StepKind::Image(self.catalog.image(image_id)?)
        } else if let Some(grid_layout_id) = &record.grid_layout_id {
            let layout = self.catalog.grid_layout(grid_layout_id)?;
            if layout.amount == 0 {
                return Err(invalid("grid layout has no items"));
            }
            StepKind::Grid {
                grid_layout_id: grid_layout_id.clone(),
                layout,
            }
        } else {
            return Err(invalid("step references neither an image nor a grid layout"));
        };

        Ok(ResolvedStep {
            index: self.index,
            record,
            kind,
        })
    }

    /// Move past the current step, applying the completion policy at the end.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        if self.finished {
            return Ok(Advance::Finished);
        }
        if self.index + 1 < self.steps.len() {
            self.index += 1;
            self.persist()?;
            log::info!("preset {}: step {}", self.preset_id, self.index);
            return Ok(Advance::Next(self.index));
        }

        match self.policy {
            CompletionPolicy::Loop => {
                self.index = 0;
                self.persist()?;
                log::info!("preset {}: all steps done, looping", self.preset_id);
                Ok(Advance::Looped)
            }
            CompletionPolicy::Halt => {
                self.finished = true;
                self.store.clear()?;
                log::info!("preset {}: all steps done", self.preset_id);
                Ok(Advance::Finished)
            }
        }
    }

    fn persist(&self) -> Result<(), SessionError> {
        let record = &self.steps[self.index];
        let cursor = SessionCursor {
            preset_id: self.preset_id.clone(),
            step_index: self.index,
            grid_layout_id: if record.image_id.is_some() {
                None
            } else {
                record.grid_layout_id.clone()
            },
        };
        self.store.save(&cursor)?;
        Ok(())
    }
}
