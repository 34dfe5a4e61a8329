//! Acquisition manifests for `sarflood detect --manifest`
//!
//! ```toml
//! flood_date = "2023-05-17"   # optional when exactly one acquisition is not baseline
//! incidence = "incidence.tif"
//!
//! [[acquisition]]
//! date = "2023-04-01"
//! path = "s1_20230401.tif"
//! baseline = true
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub flood_date: Option<String>,
    pub incidence: Option<PathBuf>,
    pub slope: Option<PathBuf>,
    #[serde(rename = "acquisition", default)]
    pub acquisitions: Vec<Acquisition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Acquisition {
    pub date: String,
    pub path: PathBuf,
    #[serde(default)]
    pub baseline: bool,
}

/// Input files of one detection run
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    /// Baseline files in date order, labelled by date
    pub baseline: Vec<(String, PathBuf)>,
    pub flood_date: String,
    pub flood: PathBuf,
    pub incidence: Option<PathBuf>,
    pub slope: Option<PathBuf>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Partition the acquisitions into baseline and flood and resolve paths
    /// relative to `base_dir`
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedInputs> {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        let mut baseline: Vec<&Acquisition> = self.acquisitions.iter().filter(|a| a.baseline).collect();
        baseline.sort_by(|a, b| a.date.cmp(&b.date));

        let flood = match &self.flood_date {
            Some(date) => {
                let matching: Vec<_> = self.acquisitions.iter().filter(|a| &a.date == date).collect();
                match matching.as_slice() {
                    [one] if one.baseline => bail!("Flood date {} is marked as baseline", date),
                    [one] => *one,
                    [] => bail!("No acquisition for flood date {}", date),
                    _ => bail!("Several acquisitions share the flood date {}", date),
                }
            }
            None => {
                let candidates: Vec<_> = self.acquisitions.iter().filter(|a| !a.baseline).collect();
                match candidates.as_slice() {
                    [one] => *one,
                    [] => bail!("Manifest has no flood acquisition"),
                    _ => bail!(
                        "Manifest has {} non-baseline acquisitions; set flood_date",
                        candidates.len()
                    ),
                }
            }
        };

        Ok(ResolvedInputs {
            baseline: baseline
                .into_iter()
                .map(|a| (a.date.clone(), resolve(&a.path)))
                .collect(),
            flood_date: flood.date.clone(),
            flood: resolve(&flood.path),
            incidence: self.incidence.as_deref().map(resolve),
            slope: self.slope.as_deref().map(resolve),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        incidence = "lia.tif"

        [[acquisition]]
        date = "2023-04-13"
        path = "b2.tif"
        baseline = true

        [[acquisition]]
        date = "2023-04-01"
        path = "b1.tif"
        baseline = true

        [[acquisition]]
        date = "2023-05-17"
        path = "/data/flood.tif"
    "#;

    #[test]
    fn test_single_flood_acquisition() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        let inputs = manifest.resolve(Path::new("/scenes")).unwrap();
        assert_eq!(inputs.flood_date, "2023-05-17");
        assert_eq!(inputs.flood, PathBuf::from("/data/flood.tif"));
        assert_eq!(
            inputs.baseline,
            vec![
                ("2023-04-01".to_string(), PathBuf::from("/scenes/b1.tif")),
                ("2023-04-13".to_string(), PathBuf::from("/scenes/b2.tif")),
            ]
        );
        assert_eq!(inputs.incidence, Some(PathBuf::from("/scenes/lia.tif")));
        assert!(inputs.slope.is_none());
    }

    #[test]
    fn test_flood_date_selects_among_candidates() {
        let text = format!(
            "flood_date = \"2023-05-29\"\n{}\n[[acquisition]]\ndate = \"2023-05-29\"\npath = \"later.tif\"\n",
            MANIFEST
        );
        let manifest: Manifest = toml::from_str(&text).unwrap();
        let inputs = manifest.resolve(Path::new("dir")).unwrap();
        assert_eq!(inputs.flood, Path::new("dir").join("later.tif"));
    }

    #[test]
    fn test_ambiguous_flood_rejected() {
        let text = format!("{}\n[[acquisition]]\ndate = \"2023-05-29\"\npath = \"later.tif\"\n", MANIFEST);
        let manifest: Manifest = toml::from_str(&text).unwrap();
        assert!(manifest.resolve(Path::new(".")).is_err());
    }

    #[test]
    fn test_flood_date_on_baseline_rejected() {
        let text = format!("flood_date = \"2023-04-01\"\n{}", MANIFEST);
        let manifest: Manifest = toml::from_str(&text).unwrap();
        assert!(manifest.resolve(Path::new(".")).is_err());
    }
}
