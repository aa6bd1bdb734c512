use std::fmt;

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::validation::validate_prize;

/// A labeled outcome of a spin. `tickets` is the credit the widget applies
/// to the ticket ledger when this prize is won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_prize"))]
pub struct Prize {
    #[validate(length(min = 1))]
    pub label: String,
    #[validate(length(min = 1))]
    pub rarity: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tickets: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Prize {
    pub fn new(label: &str, rarity: &str, weight: f64, tickets: u32) -> Self {
        Self {
            label: label.to_string(),
            rarity: rarity.to_string(),
            weight,
            tickets,
        }
    }
}

#[derive(Debug)]
pub enum PrizeConfigError {
    Parse(serde_json::Error),
    Empty,
    InvalidPrize { index: usize, errors: ValidationErrors },
    TotalWeightOverflow,
}

impl fmt::Display for PrizeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Invalid prize configuration: {}", e),
            Self::Empty => write!(f, "Prize configuration must contain at least one prize"),
            Self::InvalidPrize { index, errors } => write!(f, "Invalid prize at index {}: {}", index, errors),
            Self::TotalWeightOverflow => write!(f, "Total prize weight is not a finite number"),
        }
    }
}

impl std::error::Error for PrizeConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::InvalidPrize { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PrizeConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPrizeTable {
    prizes: Vec<Prize>,
}

/// Validated, non-empty prize list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPrizeTable")]
pub struct PrizeTable {
    prizes: Vec<Prize>,
    #[serde(skip)]
    total_weight: f64,
}

impl TryFrom<RawPrizeTable> for PrizeTable {
    type Error = PrizeConfigError;

    fn try_from(raw: RawPrizeTable) -> Result<Self, Self::Error> {
        PrizeTable::new(raw.prizes)
    }
}

static DEFAULT_PRIZES: Lazy<PrizeTable> = Lazy::new(|| {
    PrizeTable::from_trusted(vec![
        Prize::new("Ticket Drip", "common", 40.0, 1),
        Prize::new("Double Ticket", "uncommon", 25.0, 2),
        Prize::new("Mall Discount", "rare", 15.0, 0),
        Prize::new("Triple Stack", "rare", 10.0, 3),
        Prize::new("Mystery Domain", "epic", 7.0, 0),
        Prize::new("Jackpot", "legendary", 3.0, 5),
    ])
});

impl Default for PrizeTable {
    fn default() -> Self {
        DEFAULT_PRIZES.clone()
    }
}

impl PrizeTable {
    pub fn new(prizes: Vec<Prize>) -> Result<Self, PrizeConfigError> {
        if prizes.is_empty() {
            return Err(PrizeConfigError::Empty);
        }
        for (index, prize) in prizes.iter().enumerate() {
            prize
                .validate()
                .map_err(|errors| PrizeConfigError::InvalidPrize { index, errors })?;
        }
        let table = Self::from_trusted(prizes);
        if !table.total_weight.is_finite() {
            return Err(PrizeConfigError::TotalWeightOverflow);
        }
        Ok(table)
    }

    /// Parses `{ "prizes": [...] }`, rejecting unknown fields.
    pub fn from_json(json: &str) -> Result<Self, PrizeConfigError> {
        let raw: RawPrizeTable = serde_json::from_str(json)?;
        Self::new(raw.prizes)
    }

    fn from_trusted(prizes: Vec<Prize>) -> Self {
        let total_weight = prizes.iter().map(|p| p.weight).sum();
        Self { prizes, total_weight }
    }

    pub fn prizes(&self) -> &[Prize] {
        &self.prizes
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &Prize {
        let draw = rng.gen_range(0.0..self.total_weight);
        &self.prizes[pick_index(&self.prizes, draw)]
    }
}

/// Index of the first prize whose cumulative weight exceeds `draw`.
///
/// Falls back to 0 when nothing matches: a draw at or past the total, a NaN
/// draw, or rounding in the running sum.
pub fn pick_index(prizes: &[Prize], draw: f64) -> usize {
    let mut cumulative = 0.0;
    for (index, prize) in prizes.iter().enumerate() {
        cumulative += prize.weight;
        if draw < cumulative {
            return index;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prize(label: &str, weight: f64) -> Prize {
        Prize::new(label, "common", weight, 0)
    }

    #[test]
    fn test_pick_index_walks_cumulative_weights() {
        let prizes = vec![prize("A", 1.0), prize("B", 2.0), prize("C", 1.0)];
        assert_eq!(pick_index(&prizes, 0.0), 0);
        assert_eq!(pick_index(&prizes, 0.999), 0);
        assert_eq!(pick_index(&prizes, 1.0), 1);
        assert_eq!(pick_index(&prizes, 2.5), 1);
        assert_eq!(pick_index(&prizes, 3.0), 2);
    }

    #[test]
    fn test_boundary_draw_falls_back_to_first() {
        let prizes = vec![prize("A", 1.0), prize("B", 0.0)];
        assert_eq!(pick_index(&prizes, 1.0), 0);
        assert_eq!(prizes[pick_index(&prizes, 1.0)].label, "A");
        assert_eq!(pick_index(&prizes, f64::NAN), 0);
    }

    #[test]
    fn test_draw_is_pick_index_over_total_weight() {
        let table = PrizeTable::new(vec![prize("A", 2.0), prize("B", 5.0), prize("C", 3.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut replay = rng.clone();
        for _ in 0..1_000 {
            let expected = pick_index(table.prizes(), replay.gen_range(0.0..table.total_weight()));
            assert_eq!(table.draw(&mut rng), &table.prizes()[expected]);
        }
    }

    #[test]
    fn test_empirical_frequencies_follow_weights() {
        let table = PrizeTable::new(vec![prize("A", 1.0), prize("B", 3.0), prize("C", 6.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let samples = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..samples {
            let won = table.draw(&mut rng);
            let index = table.prizes().iter().position(|p| p.label == won.label).unwrap();
            counts[index] += 1;
        }
        let expected = [0.1, 0.3, 0.6];
        for (count, expected) in counts.iter().zip(expected) {
            let observed = *count as f64 / samples as f64;
            assert!((observed - expected).abs() < 0.01, "observed {} expected {}", observed, expected);
        }
    }

    #[test]
    fn test_table_rejects_empty_and_non_positive_weights() {
        assert!(matches!(PrizeTable::new(vec![]), Err(PrizeConfigError::Empty)));
        assert!(matches!(
            PrizeTable::new(vec![prize("A", 1.0), prize("B", 0.0)]),
            Err(PrizeConfigError::InvalidPrize { index: 1, .. })
        ));
        assert!(matches!(
            PrizeTable::new(vec![prize("A", -2.0)]),
            Err(PrizeConfigError::InvalidPrize { index: 0, .. })
        ));
        assert!(matches!(
            PrizeTable::new(vec![prize("", 1.0)]),
            Err(PrizeConfigError::InvalidPrize { index: 0, .. })
        ));
        assert!(matches!(
            PrizeTable::new(vec![Prize::new("A", "rare", 1.0, 9)]),
            Err(PrizeConfigError::InvalidPrize { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_json_recognizes_only_prizes_field() {
        let table = PrizeTable::from_json(
            r#"{"prizes":[{"label":"Jackpot","rarity":"legendary","weight":2,"tickets":5},{"label":"Sticker","rarity":"common","weight":8}]}"#,
        )
        .unwrap();
        assert_eq!(table.prizes().len(), 2);
        assert_eq!(table.prizes()[1].tickets, 0);
        assert_eq!(table.total_weight(), 10.0);

        let unknown = PrizeTable::from_json(r#"{"prizes":[{"label":"A","rarity":"common","weight":1}],"extra":true}"#);
        assert!(matches!(unknown, Err(PrizeConfigError::Parse(_))));

        let empty = PrizeTable::from_json(r#"{"prizes":[]}"#);
        assert!(matches!(empty, Err(PrizeConfigError::Empty)));
    }

    #[test]
    fn test_deserialize_validates() {
        let invalid: Result<PrizeTable, _> =
            serde_json::from_str(r#"{"prizes":[{"label":"A","rarity":"common","weight":0}]}"#);
        assert!(invalid.is_err());

        let table: PrizeTable =
            serde_json::from_str(r#"{"prizes":[{"label":"A","rarity":"common","weight":4}]}"#).unwrap();
        assert_eq!(table.total_weight(), 4.0);
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = PrizeTable::default();
        assert!(PrizeTable::new(table.prizes().to_vec()).is_ok());
        assert!(table.prizes().iter().any(|p| p.tickets > 0));
    }

    #[test]
    fn test_zero_ticket_credit_is_omitted_from_json() {
        let json = serde_json::to_value(prize("A", 1.0)).unwrap();
        assert_eq!(json, serde_json::json!({"label": "A", "rarity": "common", "weight": 1.0}));
    }
}
