// Shared helpers: text tables, TOML config and persisted view preferences
pub mod table {
    fn width(s: &str) -> usize {
        s.chars().count()
    }

    // Separator line
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (cell, &w) in cells.iter().zip(widths) {
            s.push(' ');
            s.push_str(cell);
            s.push_str(&" ".repeat(w.saturating_sub(width(cell))));
            s.push_str(" |");
        }
        s
    }

    /// Render an ASCII table. Missing cells render empty; extra cells are dropped.
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate() {
                *w = (*w).max(row.get(c).map_or(0, |s| width(s)));
            }
        }

        let mut out = String::new();
        out.push_str(&sep(&widths));
        out.push('\n');
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        out.push_str(&sep(&widths));
        out.push('\n');
        for row in rows {
            let cells: Vec<String> =
                (0..cols).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
            out.push_str(&line(&cells, &widths));
            out.push('\n');
        }
        out.push_str(&sep(&widths));
        out
    }
}

pub mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// `[analysis]`: overrides for `ScanRules`.
    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct AnalysisConfig {
        pub managed_root: Option<String>,
        pub always_included: Option<Vec<String>>, // regexes
        pub binary_modules: Option<String>,       // regex
        pub scene_suffix: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct QueryConfig {
        pub default_format: Option<String>, // "text" | "json"
        pub default_filter: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct Config {
        pub manifest: Option<String>,
        pub analysis: Option<AnalysisConfig>,
        pub query: Option<QueryConfig>,
    }

    pub const CONFIG_FILE: &str = "asset-relations-explorer.toml";

    fn default_config_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Load a config file. Unreadable or malformed files yield `None`.
    #[must_use]
    pub fn load_config_at(path: &Path) -> Option<Config> {
        let data = fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&data) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring malformed config: {e}");
                None
            }
        }
    }

    /// Load `asset-relations-explorer.toml` from `dir`, if present.
    #[must_use]
    pub fn load_config_near(dir: &Path) -> Option<Config> {
        let p = default_config_path(dir);
        if p.exists() {
            load_config_at(&p)
        } else {
            None
        }
    }
}

pub mod prefs {
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    use crate::density::DensityLevel;

    /// Which assets the usages view keeps, by build inclusion.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum InclusionFilter {
        #[default]
        All,
        IncludedOnly,
        ExcludedOnly,
    }

    /// View options that survive between runs.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct Preferences {
        pub inclusion: InclusionFilter,
        pub ignore_scripts: bool,
        pub density_level: DensityLevel,
    }

    pub const PREFS_FILE: &str = ".asset-explorer-prefs.json";

    fn prefs_path(dir: &Path) -> PathBuf {
        dir.join(PREFS_FILE)
    }

    /// Stored preferences, or defaults when missing or unreadable.
    #[must_use]
    pub fn load_prefs(dir: &Path) -> Preferences {
        let Ok(data) = std::fs::read_to_string(prefs_path(dir)) else {
            return Preferences::default();
        };
        let mut prefs: Preferences = serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable preferences: {e}");
            Preferences::default()
        });
        let level = prefs.density_level.get();
        if !(DensityLevel::MIN..=DensityLevel::MAX).contains(&level) {
            let clamped = level.clamp(DensityLevel::MIN, DensityLevel::MAX);
            tracing::warn!("density level {level} out of range; using {clamped}");
            prefs.density_level = DensityLevel::new(clamped);
        }
        prefs
    }

    /// Write preferences next to the manifest.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be written.
    pub fn save_prefs(dir: &Path, prefs: &Preferences) -> std::io::Result<()> {
        let data = serde_json::to_string_pretty(prefs).map_err(std::io::Error::other)?;
        std::fs::write(prefs_path(dir), data)
    }

    pub fn clear_prefs(dir: &Path) {
        let _ = std::fs::remove_file(prefs_path(dir));
    }
}
