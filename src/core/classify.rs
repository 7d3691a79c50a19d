use serde::{Deserialize, Serialize};

use crate::utils::error::{FetcherError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub bound: f64,
    pub label: String,
}

/// Ordered threshold table turning a moisture value into a class label.
///
/// Each entry's label applies from its bound up to the next entry's bound.
/// Values below the first bound take the first (lowest) label, values above
/// the last bound take the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Threshold>", into = "Vec<Threshold>")]
pub struct ClassificationTable {
    thresholds: Vec<Threshold>,
}

impl ClassificationTable {
    pub fn new(thresholds: Vec<Threshold>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(FetcherError::ConfigError {
                message: "classification table needs at least one threshold".to_string(),
            });
        }
        if let Some(t) = thresholds.iter().find(|t| !t.bound.is_finite()) {
            return Err(FetcherError::InvalidConfigValueError {
                field: "classification.bound".to_string(),
                value: t.bound.to_string(),
                reason: "bound must be a finite number".to_string(),
            });
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0].bound >= w[1].bound) {
            return Err(FetcherError::InvalidConfigValueError {
                field: "classification.bound".to_string(),
                value: pair[1].bound.to_string(),
                reason: format!("bounds must be strictly ascending (after {})", pair[0].bound),
            });
        }
        Ok(Self { thresholds })
    }

    pub fn from_pairs(pairs: &[(f64, &str)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|(bound, label)| Threshold {
                    bound: *bound,
                    label: label.to_string(),
                })
                .collect(),
        )
    }

    /// SMAP L4 surface soil moisture, m³/m³.
    pub fn smap() -> Self {
        Self {
            thresholds: preset(&[
                (0.0, "1 – Very Dry"),
                (0.05, "2 – Dry"),
                (0.1, "3 – Slightly Moist"),
                (0.2, "4 – Moderately Moist"),
                (0.3, "5 – Moist: Recently irrigated or after light rain"),
            ]),
        }
    }

    /// Sentinel-1 VV backscatter, dB.
    pub fn sentinel1() -> Self {
        Self {
            thresholds: preset(&[
                (-25.0, "1 – Extremely Dry: Hard, cracked soil; drought or bare land"),
                (-22.0, "2 – Very Dry: Dry fields; low water retention"),
                (-20.0, "3 – Dry: Lightly moist topsoil; early stress"),
                (-18.0, "4 – Slightly Moist: Normal soil conditions; vegetated"),
                (-16.0, "5 – Moist: Recently irrigated or after light rain"),
                (-14.0, "6 – Very Moist: Wet surface; saturated or ponding starts"),
                (-12.0, "7 – Saturated / Waterlogged: Standing water, flooded fields, or dense canopy"),
            ]),
        }
    }

    pub fn classify(&self, value: f64) -> &str {
        self.thresholds
            .iter()
            .take_while(|t| t.bound <= value)
            .last()
            .unwrap_or(&self.thresholds[0])
            .label
            .as_str()
    }
}

fn preset(pairs: &[(f64, &str)]) -> Vec<Threshold> {
    pairs
        .iter()
        .map(|(bound, label)| Threshold {
            bound: *bound,
            label: label.to_string(),
        })
        .collect()
}

impl TryFrom<Vec<Threshold>> for ClassificationTable {
    type Error = FetcherError;

    fn try_from(thresholds: Vec<Threshold>) -> Result<Self> {
        Self::new(thresholds)
    }
}

impl From<ClassificationTable> for Vec<Threshold> {
    fn from(table: ClassificationTable) -> Self {
        table.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_table() -> ClassificationTable {
        ClassificationTable::from_pairs(&[(-20.0, "dry"), (-15.0, "moderate"), (-10.0, "humid")])
            .unwrap()
    }

    #[test]
    fn test_below_all_bounds_maps_to_lowest_label() {
        assert_eq!(db_table().classify(-25.0), "dry");
    }

    #[test]
    fn test_value_between_bounds() {
        let table = db_table();
        assert_eq!(table.classify(-12.0), "moderate");
        assert_eq!(table.classify(-18.3), "dry");
        assert_eq!(table.classify(-15.0), "moderate");
        assert_eq!(table.classify(-3.0), "humid");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let table = db_table();
        let first: Vec<String> = [-30.0, -20.0, -12.5, 0.0]
            .iter()
            .map(|v| table.classify(*v).to_string())
            .collect();
        let second: Vec<String> = [-30.0, -20.0, -12.5, 0.0]
            .iter()
            .map(|v| table.classify(*v).to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_presets() {
        assert_eq!(ClassificationTable::smap().classify(0.02), "1 – Very Dry");
        assert_eq!(
            ClassificationTable::smap().classify(0.45),
            "5 – Moist: Recently irrigated or after light rain"
        );
        assert!(ClassificationTable::sentinel1()
            .classify(-17.0)
            .starts_with("4 – Slightly Moist"));
    }

    #[test]
    fn test_rejects_unsorted_or_empty_tables() {
        assert!(ClassificationTable::new(vec![]).is_err());
        assert!(ClassificationTable::from_pairs(&[(-10.0, "a"), (-20.0, "b")]).is_err());
        assert!(ClassificationTable::from_pairs(&[(-10.0, "a"), (-10.0, "b")]).is_err());
        assert!(ClassificationTable::from_pairs(&[(f64::NAN, "a")]).is_err());
    }
}
