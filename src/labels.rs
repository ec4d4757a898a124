use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Class names of the leaf disease models, in training order.
pub const LEAF_DISEASE_LABELS: [&str; 5] = [
    "Chinche salivosa",
    "Clororis",
    "Hoja sana",
    "Roya naranja",
    "Roya purpura",
];

/// Label emitted for a leaf without visible disease.
pub const HEALTHY_LABEL: &str = "Hoja sana";

/// Ordered class names, positionally aligned with the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads one label per line. Blank lines are skipped, the remaining
    /// lines are numbered from zero in file order.
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let file = File::open(file_path)
            .with_context(|| format!("Opening label file {}", file_path.display()))?;
        let reader = BufReader::new(file);

        let mut labels = Vec::new();
        for line in reader.lines() {
            let line = line.with_context(|| format!("Reading {}", file_path.display()))?;
            let name = line.trim();
            if !name.is_empty() {
                labels.push(name.to_string());
            }
        }

        if labels.is_empty() {
            bail!("Label file {} contains no labels", file_path.display());
        }
        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new(LEAF_DISEASE_LABELS)
    }
}
