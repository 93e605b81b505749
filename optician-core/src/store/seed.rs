//! Demo catalog for a fresh installation

use super::ShopStore;
use crate::models::CategoryInput;
use crate::Result;
use tracing::info;

/// Name of the preset created alongside the demo catalog
pub const DEFAULT_PRESET_NAME: &str = "Default Preset";

impl ShopStore {
    /// Populate an empty catalog with sample lenses and a default preset
    ///
    /// Returns `false` without touching anything when categories exist.
    pub fn seed_demo_data(&self) -> Result<bool> {
        if !self.category_tree()?.is_empty() {
            return Ok(false);
        }

        let single_vision = self.create_category(CategoryInput::folder("Single Vision", None))?;

        let minus =
            self.create_category(CategoryInput::folder("Minus (-)", Some(single_vision.id)))?;

        let hc = self.create_category(CategoryInput::folder("HC", Some(minus.id)))?;
        self.create_category(CategoryInput::item("-6.00 to -2.00", hc.id, 650.0, 520.0))?;

        let arc = self.create_category(CategoryInput::folder("ARC", Some(minus.id)))?;
        self.create_category(CategoryInput::item("-6.00 to -2.00", arc.id, 750.0, 600.0))?;

        let mut plus = CategoryInput::folder("Plus (+)", Some(single_vision.id));
        plus.sort_order = 1;
        let plus = self.create_category(plus)?;

        let bluecut = self.create_category(CategoryInput::folder("BLUECUT", Some(plus.id)))?;
        self.create_category(CategoryInput::item("+2.00 to +6.00", bluecut.id, 1200.0, 900.0))?;

        if self.list_presets()?.is_empty() {
            let preset = self.create_preset(DEFAULT_PRESET_NAME)?;
            self.activate_preset(preset.preset.id)?;
        }

        info!("Seeded demo catalog");
        Ok(true)
    }
}
