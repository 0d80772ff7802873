use chime_mrp::Environment;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ModelDefaults;
use crate::error::{ChimeError, ConfigurationError};
use crate::model::{ModelSummary, Reconciliation, SimSirModel};
use crate::parameters::{ParameterInputs, Parameters};
use crate::presentation::{Unit, category_table, peak_descriptions, sir_table};
use crate::regions::RegionTable;

const DEFAULT_TABLE_MODULO: u32 = 7;

/// User adjustments applied on top of a region's row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub population: Option<u64>,
    pub current_hospitalized: Option<u64>,
    pub doubling_time: Option<f64>,
    pub relative_contact_rate: Option<f64>,
    pub infectious_days: Option<u32>,
    pub market_share: Option<f64>,
    pub n_days: Option<u32>,
    pub date_first_hospitalized: Option<NaiveDate>,
    pub mitigation_date: Option<NaiveDate>,
    pub max_y_axis: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, inputs: ParameterInputs) -> ParameterInputs {
        ParameterInputs {
            population: self.population.unwrap_or(inputs.population),
            current_hospitalized: self
                .current_hospitalized
                .unwrap_or(inputs.current_hospitalized),
            doubling_time: self.doubling_time.or(inputs.doubling_time),
            relative_contact_rate: self
                .relative_contact_rate
                .unwrap_or(inputs.relative_contact_rate),
            infectious_days: self.infectious_days.unwrap_or(inputs.infectious_days),
            market_share: self.market_share.unwrap_or(inputs.market_share),
            n_days: self.n_days.unwrap_or(inputs.n_days),
            date_first_hospitalized: self
                .date_first_hospitalized
                .or(inputs.date_first_hospitalized),
            mitigation_date: self.mitigation_date.or(inputs.mitigation_date),
            max_y_axis: self.max_y_axis.or(inputs.max_y_axis),
            ..inputs
        }
    }
}

/// The `input` section of a run request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunInput {
    pub city: Option<String>,
    /// Several regions, each projected independently. Takes precedence over
    /// `city`.
    pub cities: Vec<String>,
    pub current_date: Option<NaiveDate>,
    pub overrides: Overrides,
    pub reconciliation: Reconciliation,
    pub table_modulo: Option<u32>,
}

impl RunInput {
    /// Selected regions; a single `None` when nothing was selected, so the
    /// selection error surfaces for it.
    pub fn selections(&self) -> Vec<Option<&str>> {
        if self.cities.is_empty() {
            vec![self.city.as_deref()]
        } else {
            self.cities.iter().map(|city| Some(city.as_str())).collect()
        }
    }
}

/// Resolves one region's parameters and runs the model.
pub fn project(
    input: &RunInput,
    city: Option<&str>,
    table: &RegionTable,
    defaults: &ModelDefaults,
    today: NaiveDate,
) -> Result<SimSirModel, ConfigurationError> {
    let record = table.select(city)?;
    let current_date = input.current_date.unwrap_or(today);
    let inputs = input.overrides.apply(record.to_inputs(defaults, current_date));
    let parameters = Parameters::new(inputs)?;
    info!(
        "{}: population {}, {} hospitalized on {current_date}",
        record.city,
        parameters.population(),
        parameters.current_hospitalized()
    );
    Ok(SimSirModel::with_reconciliation(parameters, input.reconciliation))
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    city: &'a str,
    current_date: NaiveDate,
    max_y_axis: Option<u64>,
    summary: &'a ModelSummary,
    admissions_peaks: String,
    census_peaks: String,
}

fn file_stem(city: &str) -> String {
    city.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes the projection's records, display tables and summary under a
/// directory named after the region.
pub fn write_outputs<I>(
    env: &Environment<I>,
    city: &str,
    model: &SimSirModel,
    table_modulo: Option<u32>,
) -> Result<(), ChimeError> {
    let prefix = format!("{}/{}", file_stem(city), model.current_date());
    let labels = model.labels();
    let modulo = table_modulo.unwrap_or(DEFAULT_TABLE_MODULO);

    env.write_records(&format!("{prefix}_projected_admits.csv"), model.admits())?;
    env.write_records(&format!("{prefix}_projected_census.csv"), model.census())?;
    env.write_records(&format!("{prefix}_sim_sir_w_date.csv"), model.sim_sir_w_date())?;

    let tables = [
        (
            "admits_table",
            category_table(model.admits(), &labels, Unit::Admissions, modulo),
        ),
        (
            "census_table",
            category_table(model.census(), &labels, Unit::Census, modulo),
        ),
        ("sim_sir_table", sir_table(model.sim_sir_w_date(), &labels, modulo)),
    ];
    for (name, table) in &tables {
        env.write_csv(
            &format!("{prefix}_{name}.csv"),
            &table.header_refs(),
            &table.rows,
        )?;
    }

    let report = RunReport {
        city,
        current_date: model.current_date(),
        max_y_axis: model.max_y_axis(),
        summary: model.summary(),
        admissions_peaks: peak_descriptions(model.admits(), &labels, Unit::Admissions),
        census_peaks: peak_descriptions(model.census(), &labels, Unit::Census),
    };
    env.write_json(&format!("{prefix}_summary.json"), &report)?;
    Ok(())
}
