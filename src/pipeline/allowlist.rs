use std::{collections::HashSet, fs, path::Path};

use strsim::levenshtein;
use tracing::{debug, info};

use crate::core::error::VerifyError;
use crate::pipeline::normalizer::brand_label;

/// Popular registrable domains (Tranco-style). Loaded once, then read-only.
/// Brand lookups rank every candidate, so file order is not kept.
#[derive(Debug, Default)]
pub struct AllowList {
    domains: HashSet<String>,
}

impl AllowList {
    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        let data = fs::read_to_string(path)
            .map_err(|e| VerifyError::Config(format!("allow-list {}: {}", path.display(), e)))?;
        let list = Self::parse(&data);
        info!("Loaded {} domains from {}", list.len(), path.display());
        Ok(list)
    }

    /// Accepts `rank,domain` rows or bare one-domain-per-line files.
    pub fn parse(data: &str) -> Self {
        let mut domains = HashSet::new();
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split(',').collect();
            let domain = match parts.as_slice() {
                [_, domain] => domain,
                [domain] => domain,
                _ => continue,
            };
            let domain = domain.trim().to_lowercase();
            if !domain.is_empty() {
                domains.insert(domain);
            }
        }
        Self { domains }
    }

    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn lookup_by_brand(&self, brand: &str) -> Option<String> {
        lookup_by_brand(brand, &self.domains)
    }
}

/// Lower-case, trim and drop inner whitespace ("Bank of America" -> "bankofamerica").
pub fn fold_brand(brand: &str) -> String {
    brand
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substring match of the folded brand against the table. Among candidates the
/// closest first label wins, then the shortest domain, then lexicographic order.
pub fn lookup_by_brand<'a, I>(brand: &str, table: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let key = fold_brand(brand);
    if key.is_empty() {
        return None;
    }
    let best = table
        .into_iter()
        .filter(|d| d.contains(key.as_str()))
        .min_by(|a, b| rank_key(&key, a).cmp(&rank_key(&key, b)))
        .cloned();
    match &best {
        Some(domain) => debug!("allow-list hit for '{}': {}", brand, domain),
        None => debug!("no allow-list match for '{}'", brand),
    }
    best
}

fn rank_key<'a>(key: &str, domain: &'a str) -> (usize, usize, &'a str) {
    (levenshtein(key, &brand_label(domain)), domain.len(), domain)
}
