use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chime_mrp::{fetch_text, sha256_hex};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ModelDefaults;
use crate::disposition::Disposition;
use crate::error::{ChimeError, ConfigurationError};
use crate::parameters::ParameterInputs;

/// One row of the regional spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub city: String,
    pub population: u64,
    pub current_hospitalized: u64,
    pub doubling_time: f64,
    pub relative_contact_rate: f64,
    pub hospitalized_rate: f64,
    pub hospitalized_length_of_stay: u32,
    pub icu_rate: f64,
    pub icu_length_of_stay: u32,
    pub ventilated_rate: f64,
    pub ventilated_length_of_stay: u32,
}

impl RegionRecord {
    pub fn to_inputs(&self, defaults: &ModelDefaults, current_date: NaiveDate) -> ParameterInputs {
        ParameterInputs {
            population: self.population,
            current_hospitalized: self.current_hospitalized,
            doubling_time: Some(self.doubling_time),
            relative_contact_rate: self.relative_contact_rate,
            infectious_days: defaults.infectious_days,
            market_share: defaults.market_share,
            hospitalized: Disposition::new(self.hospitalized_rate, self.hospitalized_length_of_stay),
            icu: Disposition::new(self.icu_rate, self.icu_length_of_stay),
            ventilated: Disposition::new(self.ventilated_rate, self.ventilated_length_of_stay),
            current_date,
            date_first_hospitalized: defaults.date_first_hospitalized,
            mitigation_date: defaults.mitigation_date,
            n_days: defaults.n_days,
            max_y_axis: defaults.max_y_axis,
        }
    }
}

/// Region rows in sheet order, with a digest of the CSV they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTable {
    records: Vec<RegionRecord>,
    digest: String,
}

impl RegionTable {
    pub fn from_csv_str(text: &str) -> Result<Self, ChimeError> {
        Self::parse(text, sha256_hex(text.as_bytes()))
    }

    /// Parses `text` whose SHA-256 is already known.
    fn parse(text: &str, digest: String) -> Result<Self, ChimeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let records = reader
            .deserialize()
            .collect::<Result<Vec<RegionRecord>, _>>()?;
        debug!("parsed {} regions, sha256 {digest}", records.len());
        Ok(RegionTable { records, digest })
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self, ChimeError> {
        info!("reading regions from {}", path.display());
        Self::from_csv_str(&fs::read_to_string(path)?)
    }

    pub fn fetch(url: &str) -> Result<Self, ChimeError> {
        let fetched = fetch_text(url)?;
        Self::parse(&fetched.body, fetched.digest)
    }

    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.city.as_str())
    }

    pub fn find(&self, city: &str) -> Result<&RegionRecord, ConfigurationError> {
        self.records
            .iter()
            .find(|record| record.city == city)
            .ok_or_else(|| ConfigurationError::RegionNotFound(city.to_string()))
    }

    /// Like `find`, but an absent or blank selection is an error rather than
    /// a default region.
    pub fn select(&self, city: Option<&str>) -> Result<&RegionRecord, ConfigurationError> {
        match city.map(str::trim) {
            Some(city) if !city.is_empty() => self.find(city),
            _ => Err(ConfigurationError::NoRegionSelected),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    Path(PathBuf),
    Url(String),
}

impl RegionSource {
    pub fn load(&self) -> Result<RegionTable, ChimeError> {
        match self {
            RegionSource::Path(path) => RegionTable::from_path(path),
            RegionSource::Url(url) => RegionTable::fetch(url),
        }
    }
}

struct CachedTable {
    loaded_at: Instant,
    table: RegionTable,
}

/// Holds the last loaded region table for at most `ttl`.
pub struct RegionCache {
    ttl: Duration,
    entry: Option<CachedTable>,
}

impl RegionCache {
    pub fn new(ttl: Duration) -> Self {
        RegionCache { ttl, entry: None }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|cached| now.saturating_duration_since(cached.loaded_at) < self.ttl)
    }

    /// Returns the cached table while it is fresh, otherwise calls `load`. A
    /// failed reload keeps the previous table cached.
    pub fn get_or_load<F>(&mut self, now: Instant, load: F) -> Result<&RegionTable, ChimeError>
    where
        F: FnOnce() -> Result<RegionTable, ChimeError>,
    {
        let fresh = self.is_fresh(now);
        let cached = match self.entry.take() {
            Some(cached) if fresh => cached,
            previous => {
                let table = match load() {
                    Ok(table) => table,
                    Err(error) => {
                        self.entry = previous;
                        return Err(error);
                    }
                };
                match &previous {
                    Some(previous) if previous.table.digest == table.digest => {
                        info!("region table unchanged ({} regions)", table.len())
                    }
                    _ => info!("loaded {} regions, sha256 {}", table.len(), table.digest),
                }
                CachedTable {
                    loaded_at: now,
                    table,
                }
            }
        };
        Ok(&self.entry.insert(cached).table)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
