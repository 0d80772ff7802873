use serde::{Deserialize, Serialize};

/// A clinical outcome: the fraction of infections that reach it and how many
/// days a patient occupies the resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disposition {
    pub rate: f64,
    pub length_of_stay: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hospitalized,
    Icu,
    Ventilated,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Hospitalized, Category::Icu, Category::Ventilated];
}

/// The named set of dispositions a projection is run for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dispositions {
    pub hospitalized: Disposition,
    pub icu: Disposition,
    pub ventilated: Disposition,
}

impl Dispositions {
    pub fn get(&self, category: Category) -> &Disposition {
        match category {
            Category::Hospitalized => &self.hospitalized,
            Category::Icu => &self.icu,
            Category::Ventilated => &self.ventilated,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &Disposition)> {
        Category::ALL.into_iter().map(|category| (category, self.get(category)))
    }
}

impl Disposition {
    pub fn new(rate: f64, length_of_stay: u32) -> Self {
        Disposition {
            rate,
            length_of_stay,
        }
    }

    /// Expected admissions per day in whole patients, from the number of
    /// people newly infected on each day.
    pub fn admissions(&self, new_infections: &[f64], market_share: f64) -> Vec<u64> {
        new_infections
            .iter()
            .map(|infections| patients(infections * self.rate * market_share))
            .collect()
    }

    pub fn census(&self, admissions: &[u64]) -> Vec<u64> {
        census(admissions, self.length_of_stay)
    }

    pub fn project(&self, new_infections: &[f64], market_share: f64) -> (Vec<u64>, Vec<u64>) {
        let admissions = self.admissions(new_infections, market_share);
        let census = self.census(&admissions);
        (admissions, census)
    }
}

/// Rounds an expected patient count to whole patients.
pub(crate) fn patients(expected: f64) -> u64 {
    if expected.is_finite() && expected > 0.0 {
        expected.round() as u64
    } else {
        0
    }
}

/// Patients in beds on each day: every admission stays exactly
/// `length_of_stay` days, so the census is a sliding-window sum.
pub fn census(admissions: &[u64], length_of_stay: u32) -> Vec<u64> {
    let window = length_of_stay as usize;
    let mut occupied = 0;
    let mut census = Vec::with_capacity(admissions.len());
    for (day, admitted) in admissions.iter().enumerate() {
        occupied += admitted;
        if window > 0 && day >= window {
            occupied -= admissions[day - window];
        }
        census.push(occupied);
    }
    census
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed_sum(admissions: &[u64], length_of_stay: usize, day: usize) -> u64 {
        let start = (day + 1).saturating_sub(length_of_stay);
        admissions[start..=day].iter().sum()
    }

    #[test]
    fn test_census_matches_window_sum() {
        let admissions = vec![0, 3, 5, 2, 8, 0, 0, 13, 1, 4, 4, 9];
        for length_of_stay in 1..=14 {
            let census = census(&admissions, length_of_stay);
            assert_eq!(census.len(), admissions.len());
            for day in 0..admissions.len() {
                assert_eq!(
                    census[day],
                    windowed_sum(&admissions, length_of_stay as usize, day),
                    "length_of_stay {length_of_stay}, day {day}"
                );
            }
        }
    }

    #[test]
    fn test_census_ramps_from_zero() {
        let census = census(&[1; 10], 4);
        assert_eq!(census, vec![1, 2, 3, 4, 4, 4, 4, 4, 4, 4]);
    }

    #[test]
    fn test_admissions_round_to_patients() {
        let disposition = Disposition::new(0.025, 7);
        let admissions = disposition.admissions(&[0.0, 100.0, 300.0, 1000.0], 0.15);
        // 0.375, 1.125, 3.75
        assert_eq!(admissions, vec![0, 0, 1, 4]);
    }

    #[test]
    fn test_zero_rate_is_all_zero() {
        let disposition = Disposition::new(0.0, 9);
        let new_infections: Vec<f64> = (0..50).map(|day| 1.0e5 * day as f64).collect();
        let (admissions, census) = disposition.project(&new_infections, 1.0);
        assert!(admissions.iter().all(|&a| a == 0));
        assert!(census.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_project_uses_length_of_stay() {
        let disposition = Disposition::new(1.0, 2);
        let (admissions, census) = disposition.project(&[1.0, 2.0, 3.0, 0.0, 0.0], 1.0);
        assert_eq!(admissions, vec![1, 2, 3, 0, 0]);
        assert_eq!(census, vec![1, 3, 5, 3, 0]);
    }

    #[test]
    fn test_dispositions_iterate_in_category_order() {
        let dispositions = Dispositions {
            hospitalized: Disposition::new(0.025, 7),
            icu: Disposition::new(0.0075, 9),
            ventilated: Disposition::new(0.005, 10),
        };
        let stays: Vec<(Category, u32)> = dispositions
            .iter()
            .map(|(category, d)| (category, d.length_of_stay))
            .collect();
        assert_eq!(
            stays,
            vec![
                (Category::Hospitalized, 7),
                (Category::Icu, 9),
                (Category::Ventilated, 10)
            ]
        );
    }
}
