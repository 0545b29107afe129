use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

/// Instrument ids to analyse, in file order.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    ids: Vec<String>,
    set: HashSet<String>,
}

impl Watchlist {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self::default();
        for id in ids {
            let id: String = id.into();
            let id = id.trim();
            if id.is_empty() || out.set.contains(id) {
                continue;
            }
            out.set.insert(id.to_string());
            out.ids.push(id.to_string());
        }
        out
    }

    /// Comma and/or newline separated ids.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start_matches('\u{feff}');
        Self::from_ids(text.split([',', '\n', '\r']))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read watchlist {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
