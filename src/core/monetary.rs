/// Monetary units of the network
///
/// Every amount is kept as an integer count of thousandths of a coin ("millis"), so
/// value-conservation checks are exact. On the wire amounts travel as JSON numbers with at
/// most three decimals, e.g. `0.005`.
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Number of millis in one coin
pub const MILLIS_PER_COIN: u64 = 1_000;

/// Reward minted by the coinbase of every mined block (0.005 coins)
pub const BLOCK_REWARD: Amount = Amount::from_millis(5);

/// Fee attached to generated transactions (0.002 coins)
pub const DEFAULT_TRANSACTION_FEE: Amount = Amount::from_millis(2);

/// Largest representable amount. Amounts travel as JSON floats, which hold integers
/// exactly only up to 2^53.
pub const MAX_MILLIS: u64 = 1 << 53;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_millis(millis: u64) -> Amount {
        Amount(millis)
    }

    pub const fn from_coins(coins: u64) -> Amount {
        Amount(coins * MILLIS_PER_COIN)
    }

    /// Convert a decimal coin value, rounding to the nearest milli
    pub fn from_f64(coins: f64) -> Option<Amount> {
        if !coins.is_finite() || coins < 0.0 {
            return None;
        }
        let millis = (coins * MILLIS_PER_COIN as f64).round();
        if millis > MAX_MILLIS as f64 {
            return None;
        }
        Some(Amount(millis as u64))
    }

    pub fn millis(&self) -> u64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MILLIS_PER_COIN as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0
            .checked_add(other.0)
            .filter(|millis| *millis <= MAX_MILLIS)
            .map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0).min(MAX_MILLIS))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:03}",
            self.0 / MILLIS_PER_COIN,
            self.0 % MILLIS_PER_COIN
        )
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coins: f64 = s
            .trim()
            .parse()
            .map_err(|e| format!("Invalid amount {s}: {e}"))?;
        Amount::from_f64(coins).ok_or_else(|| format!("Invalid amount {s}: must be non-negative and representable"))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coins = f64::deserialize(deserializer)?;
        Amount::from_f64(coins)
            .ok_or_else(|| de::Error::custom(format!("invalid amount {coins}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_rounding() {
        assert_eq!(Amount::from_f64(0.005), Some(Amount::from_millis(5)));
        assert_eq!(Amount::from_f64(99.9995), Some(Amount::from_millis(100_000)));
        assert_eq!(Amount::from_f64(-1.0), None);
        assert_eq!(Amount::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_amounts_beyond_float_precision_are_refused() {
        assert_eq!(
            Amount::from_f64(9_000_000_000_000.0),
            Some(Amount::from_millis(9_000_000_000_000_000))
        );
        assert_eq!(Amount::from_f64(18_000_000_000_000.0), None);
        assert!(serde_json::from_str::<Amount>("1e300").is_err());
        assert!(serde_json::from_str::<Amount>("1e13").is_err());

        let top = Amount::from_millis(MAX_MILLIS);
        assert_eq!(top.checked_add(Amount::from_millis(1)), None);
        assert_eq!(top.saturating_add(Amount::from_millis(1)), top);
    }

    #[test]
    fn test_three_decimal_sums_are_exact() {
        // 0.1 + 0.2 is not 0.3 in binary floating point, but it is in millis
        let sum = Amount::from_f64(0.1)
            .unwrap()
            .checked_add(Amount::from_f64(0.2).unwrap())
            .unwrap();
        assert_eq!(sum, Amount::from_f64(0.3).unwrap());
    }

    #[test]
    fn test_json_representation() {
        let json = serde_json::to_string(&Amount::from_millis(100_000)).unwrap();
        assert_eq!(json, "100.0");
        let parsed: Amount = serde_json::from_str("0.002").unwrap();
        assert_eq!(parsed, DEFAULT_TRANSACTION_FEE);
        assert!(serde_json::from_str::<Amount>("-3").is_err());
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(BLOCK_REWARD.to_string(), "0.005");
        assert_eq!(Amount::from_coins(60).to_string(), "60.000");
        assert_eq!("40".parse::<Amount>().unwrap(), Amount::from_coins(40));
    }
}
