//! HiPS `properties` file describing a directory of tiles.
//!
//! ```text
//! hips_order_min           = 0
//! hips_order               = 7
//! max_vmag                 = 6.5
//! type                     = stars
//! hips_tile_format         = eph
//! hips_release_date        = 2024-05-01T12:00Z
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;

use crate::error::{EphError, Result};
use crate::nuniq::TILE_EXTENSION;

pub const PROPERTIES_FILE: &str = "properties";

#[derive(Debug, Clone)]
pub struct HipsProperties {
    pub order_min: u32,
    /// Deepest order holding tiles, when known.
    pub order_max: Option<u32>,
    /// Faintest magnitude stored at order 0, for star surveys.
    pub max_vmag: Option<f32>,
    /// Survey type, e.g. `stars` or `dso`.
    pub survey_type: String,
    pub release_date: DateTime<Utc>,
    /// Extra `key = value` lines appended after the standard ones.
    pub extra: Vec<(String, String)>,
}

impl HipsProperties {
    pub fn new(survey_type: impl Into<String>) -> Self {
        Self {
            order_min: 0,
            order_max: None,
            max_vmag: None,
            survey_type: survey_type.into(),
            release_date: Utc::now(),
            extra: Vec::new(),
        }
    }

    fn entries(&self) -> Vec<(String, String)> {
        let mut e = vec![("hips_order_min".to_string(), self.order_min.to_string())];
        if let Some(o) = self.order_max {
            e.push(("hips_order".into(), o.to_string()));
        }
        if let Some(v) = self.max_vmag {
            e.push(("max_vmag".into(), v.to_string()));
        }
        e.push(("type".into(), self.survey_type.clone()));
        e.push(("hips_tile_format".into(), TILE_EXTENSION.into()));
        e.push((
            "hips_release_date".into(),
            self.release_date.format("%Y-%m-%dT%H:%MZ").to_string(),
        ));
        e.extend(self.extra.iter().cloned());
        e
    }

    /// Render as `key = value` lines, keys padded to 24 columns.
    pub fn render(&self) -> String {
        self.entries()
            .iter()
            .map(|(k, v)| format!("{k:<24} = {v}\n"))
            .collect()
    }

    /// Write `<dir>/properties`, creating `dir` if needed.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| EphError::io(dir, e))?;
        let path = dir.join(PROPERTIES_FILE);
        fs::write(&path, self.render()).map_err(|e| EphError::io(&path, e))?;
        info!("wrote {}", path.display());
        Ok(path)
    }
}
