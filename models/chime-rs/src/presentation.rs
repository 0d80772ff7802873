//! Display-side transforms of a finished projection: labels, down-sampled
//! tables and peak descriptions. Nothing here feeds back into the model.

use std::collections::BTreeMap;

use crate::disposition::Category;
use crate::model::{CategoryCounts, SirRow};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const PEAK_DATE_FORMAT: &str = "%b %d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Day,
    Date,
    Susceptible,
    Infected,
    Recovered,
    Hospitalized,
    Icu,
    Ventilated,
    Total,
}

impl Label {
    pub const ALL: [Label; 9] = [
        Label::Day,
        Label::Date,
        Label::Susceptible,
        Label::Infected,
        Label::Recovered,
        Label::Hospitalized,
        Label::Icu,
        Label::Ventilated,
        Label::Total,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Label::Day => "Day",
            Label::Date => "Date",
            Label::Susceptible => "Susceptible",
            Label::Infected => "Infected",
            Label::Recovered => "Recovered",
            Label::Hospitalized => "Hospitalized",
            Label::Icu => "ICU",
            Label::Ventilated => "Ventilated",
            Label::Total => "Total",
        }
    }
}

impl From<Category> for Label {
    fn from(category: Category) -> Label {
        match category {
            Category::Hospitalized => Label::Hospitalized,
            Category::Icu => Label::Icu,
            Category::Ventilated => Label::Ventilated,
        }
    }
}

/// What a count column measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    None,
    Admissions,
    Census,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Admissions => " Admissions",
            Unit::Census => " Census",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    names: BTreeMap<Label, String>,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            names: Label::ALL
                .into_iter()
                .map(|label| (label, label.display_name().to_string()))
                .collect(),
        }
    }
}

impl Labels {
    pub fn with_name(mut self, label: Label, name: impl Into<String>) -> Self {
        self.names.insert(label, name.into());
        self
    }

    pub fn get(&self, label: Label) -> &str {
        self.names
            .get(&label)
            .map(String::as_str)
            .unwrap_or_else(|| label.display_name())
    }

    pub fn with_unit(&self, label: Label, unit: Unit) -> String {
        format!("{}{}", self.get(label), unit.suffix())
    }
}

/// Rows rendered as text cells under display headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn header_refs(&self) -> Vec<&str> {
        self.headers.iter().map(String::as_str).collect()
    }
}

fn keep_day(day: i64, modulo: u32) -> bool {
    modulo <= 1 || day.rem_euclid(modulo as i64) == 0
}

/// Table of admissions or census rows, keeping only days divisible by
/// `modulo` (7 gives a weekly table).
pub fn category_table<R: CategoryCounts>(
    rows: &[R],
    labels: &Labels,
    unit: Unit,
    modulo: u32,
) -> Table {
    let mut headers = vec![
        labels.get(Label::Day).to_string(),
        labels.get(Label::Date).to_string(),
    ];
    headers.extend(
        Category::ALL
            .into_iter()
            .map(|category| labels.with_unit(category.into(), unit)),
    );
    headers.push(labels.with_unit(Label::Total, unit));

    let rows = rows
        .iter()
        .filter(|row| keep_day(row.day(), modulo))
        .map(|row| {
            let mut cells = vec![
                row.day().to_string(),
                row.date().format(DATE_FORMAT).to_string(),
            ];
            cells.extend(
                Category::ALL
                    .into_iter()
                    .map(|category| row.count(category).to_string()),
            );
            cells.push(row.total().to_string());
            cells
        })
        .collect();

    Table { headers, rows }
}

/// SIR table with compartment sizes floored to whole people.
pub fn sir_table(rows: &[SirRow], labels: &Labels, modulo: u32) -> Table {
    let headers = [
        Label::Day,
        Label::Date,
        Label::Susceptible,
        Label::Infected,
        Label::Recovered,
    ]
    .into_iter()
    .map(|label| labels.get(label).to_string())
    .collect();

    let rows = rows
        .iter()
        .filter(|row| keep_day(row.day, modulo))
        .map(|row| {
            vec![
                row.day.to_string(),
                row.date.format(DATE_FORMAT).to_string(),
                format!("{}", row.susceptible.floor()),
                format!("{}", row.infected.floor()),
                format!("{}", row.recovered.floor()),
            ]
        })
        .collect();

    Table { headers, rows }
}

fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// One line per category naming its peak value and date. A peak on the last
/// row is starred, since the true maximum may lie past the horizon.
pub fn peak_descriptions<R: CategoryCounts>(rows: &[R], labels: &Labels, unit: Unit) -> String {
    let mut messages = Vec::new();
    let mut starred = false;
    for category in Category::ALL {
        // First row holding the maximum.
        let Some((index, peak)) = rows.iter().enumerate().fold(None, |best, (index, row)| {
            let count = row.count(category);
            match best {
                Some((_, max)) if max >= count => best,
                _ => Some((index, count)),
            }
        }) else {
            continue;
        };
        let at_end = index + 1 == rows.len();
        starred |= at_end;
        messages.push(format!(
            "{} peaks at {} on {}{}",
            labels.with_unit(category.into(), unit),
            with_thousands(peak),
            rows[index].date().format(PEAK_DATE_FORMAT),
            if at_end { "*" } else { "" }
        ));
    }
    if starred {
        messages.push(
            "_* The max is at the upper bound of the data, and therefore may not be the actual max_"
                .to_string(),
        );
    }
    messages.join("\n\n")
}
