//! Read-only preset catalog: ordered steps, grid layouts and images.

use crate::error::{CatalogError, DataNotFound};
use assembly_guide_zones::GridLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::Path};

/// One step of a preset as stored in the catalog.
///
/// When both references are present the image wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    /// Position within the preset; steps are played in ascending order.
    pub step: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_layout_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

pub trait Catalog: Send + Sync {
    /// Steps of `preset_id`, sorted by [`StepRecord::step`]. An unknown preset is
    /// reported as [`DataNotFound::Preset`].
    fn steps_for_preset(&self, preset_id: &str) -> Result<Vec<StepRecord>, DataNotFound>;
    fn grid_layout(&self, id: &str) -> Result<GridLayout, DataNotFound>;
    fn image(&self, id: &str) -> Result<ImageRecord, DataNotFound>;
}

/// Catalog held in memory, loadable from a single JSON document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryCatalog {
    pub presets: BTreeMap<String, Vec<StepRecord>>,
    pub grid_layouts: BTreeMap<String, GridLayout>,
    pub images: BTreeMap<String, ImageRecord>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preset(mut self, id: impl Into<String>, steps: Vec<StepRecord>) -> Self {
        self.presets.insert(id.into(), steps);
        self
    }

    pub fn with_grid_layout(mut self, id: impl Into<String>, layout: GridLayout) -> Self {
        self.grid_layouts.insert(id.into(), layout);
        self
    }

    pub fn with_image(mut self, id: impl Into<String>, image: ImageRecord) -> Self {
        self.images.insert(id.into(), image);
        self
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Catalog for InMemoryCatalog {
    fn steps_for_preset(&self, preset_id: &str) -> Result<Vec<StepRecord>, DataNotFound> {
        let mut steps = self
            .presets
            .get(preset_id)
            .cloned()
            .ok_or_else(|| DataNotFound::Preset(preset_id.to_string()))?;
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    fn grid_layout(&self, id: &str) -> Result<GridLayout, DataNotFound> {
        self.grid_layouts
            .get(id)
            .copied()
            .ok_or_else(|| DataNotFound::GridLayout(id.to_string()))
    }

    fn image(&self, id: &str) -> Result<ImageRecord, DataNotFound> {
        self.images
            .get(id)
            .cloned()
            .ok_or_else(|| DataNotFound::Image(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_guide_zones::{ZoneShape, ZoneSize};

    fn step(id: &str, order: u32, image: Option<&str>, grid: Option<&str>) -> StepRecord {
        StepRecord {
            step_id: id.to_string(),
            step: order,
            image_id: image.map(str::to_string),
            grid_layout_id: grid.map(str::to_string),
        }
    }

    #[test]
    fn steps_are_returned_in_order() {
        let catalog = InMemoryCatalog::new().with_preset(
            "p",
            vec![
                step("b", 2, None, Some("g")),
                step("a", 1, Some("i"), None),
            ],
        );
        let steps = catalog.steps_for_preset("p").expect("preset");
        assert_eq!(steps[0].step_id, "a");
        assert_eq!(steps[1].step_id, "b");
    }

    #[test]
    fn missing_entries_are_data_not_found() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(
            catalog.steps_for_preset("nope"),
            Err(DataNotFound::Preset("nope".into()))
        );
        assert_eq!(
            catalog.grid_layout("g"),
            Err(DataNotFound::GridLayout("g".into()))
        );
        assert_eq!(catalog.image("i"), Err(DataNotFound::Image("i".into())));
    }

    #[test]
    fn json_round_trip() {
        let catalog = InMemoryCatalog::new()
            .with_preset("p", vec![step("s1", 1, None, Some("g"))])
            .with_grid_layout(
                "g",
                GridLayout {
                    shape: ZoneShape::Rectangle,
                    size: ZoneSize::Medium,
                    amount: 10,
                },
            )
            .with_image(
                "i",
                ImageRecord {
                    path: "step1.png".into(),
                    description: "Lay out the frame".into(),
                },
            );
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        catalog.write_json(&path).expect("write");
        let back = InMemoryCatalog::load_json(&path).expect("load");
        assert_eq!(back, catalog);
    }
}
