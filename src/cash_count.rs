//! Cash counts ("arqueo") taken at shift start and end.
//!
//! The total is always derived from the per-denomination counts. Callers can
//! never set it directly.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::denominations::{self, DENOMINATIONS};
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashCountKind {
    Initial,
    Final,
}

impl CashCountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashCountKind::Initial => "initial",
            CashCountKind::Final => "final",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "initial" => Some(CashCountKind::Initial),
            "final" => Some(CashCountKind::Final),
            _ => None,
        }
    }
}

/// Denomination code to number of pieces. Only known codes are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DenominationCounts(BTreeMap<String, u32>);

impl DenominationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count for `code`. Unknown codes are ignored and a zero count
    /// removes the entry.
    pub fn set(&mut self, code: &str, count: u32) -> &mut Self {
        if denominations::find(code).is_none() {
            return self;
        }
        if count == 0 {
            self.0.remove(code);
        } else {
            self.0.insert(code.to_string(), count);
        }
        self
    }

    pub fn with(mut self, code: &str, count: u32) -> Self {
        self.set(code, count);
        self
    }

    pub fn get(&self, code: &str) -> u32 {
        self.0.get(code).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lenient parse of a raw form payload such as `{"b_50": 2, "m_1": "3"}`.
    ///
    /// Negative, fractional and non-numeric counts become 0, the same as an
    /// empty input box.
    pub fn from_value(raw: &Value) -> Self {
        let mut counts = Self::new();
        let Some(obj) = raw.as_object() else {
            return counts;
        };
        for (code, value) in obj {
            counts.set(code, count_from_value(value));
        }
        counts
    }
}

fn count_from_value(value: &Value) -> u32 {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
            None => 0,
        },
        Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

/// Sum of `count × face value` over the denomination table, exact to the cent.
pub fn aggregate_cash_count(counts: &DenominationCounts) -> Decimal {
    let cents: i64 = DENOMINATIONS
        .iter()
        .map(|d| i64::from(counts.get(d.code)) * d.cents)
        .sum();
    money::from_cents(cents)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashCount {
    pub shift_id: String,
    pub kind: CashCountKind,
    pub counts: DenominationCounts,
    total: Decimal,
}

impl CashCount {
    pub fn new(shift_id: impl Into<String>, kind: CashCountKind, counts: DenominationCounts) -> Self {
        let total = aggregate_cash_count(&counts);
        Self {
            shift_id: shift_id.into(),
            kind,
            counts,
            total,
        }
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Non-zero lines in table order, for detail screens.
    pub fn breakdown(&self) -> Vec<CashCountLine> {
        DENOMINATIONS
            .iter()
            .filter_map(|d| {
                let count = self.counts.get(d.code);
                (count > 0).then(|| CashCountLine {
                    code: d.code,
                    label: d.label,
                    count,
                    subtotal: money::from_cents(i64::from(count) * d.cents),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashCountLine {
    pub code: &'static str,
    pub label: &'static str,
    pub count: u32,
    pub subtotal: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_has_no_float_drift() {
        let counts = DenominationCounts::new()
            .with("b_5", 1)
            .with("m_020", 1)
            .with("m_005", 1);
        assert_eq!(aggregate_cash_count(&counts), dec!(5.25));

        let coins = DenominationCounts::new().with("m_010", 3).with("m_020", 7);
        assert_eq!(aggregate_cash_count(&coins), dec!(1.70));
    }

    #[test]
    fn test_empty_count_is_zero() {
        assert_eq!(aggregate_cash_count(&DenominationCounts::new()), Decimal::ZERO);
    }

    #[test]
    fn test_every_denomination_once() {
        let mut counts = DenominationCounts::new();
        for d in DENOMINATIONS.iter() {
            counts.set(d.code, 1);
        }
        assert_eq!(aggregate_cash_count(&counts), dec!(888.88));
    }

    #[test]
    fn test_from_value_clamps_bad_input() {
        let raw = serde_json::json!({
            "b_50": 2,
            "b_20": -3,
            "b_10": 1.5,
            "m_1": "4",
            "m_2": "two",
            "b_1000": 9,
            "m_050": null
        });
        let counts = DenominationCounts::from_value(&raw);
        assert_eq!(counts.get("b_50"), 2);
        assert_eq!(counts.get("b_20"), 0);
        assert_eq!(counts.get("b_10"), 0);
        assert_eq!(counts.get("m_1"), 4);
        assert_eq!(counts.get("m_2"), 0);
        assert_eq!(counts.get("b_1000"), 0);
        assert_eq!(aggregate_cash_count(&counts), dec!(104));
    }

    #[test]
    fn test_from_value_non_object_is_empty() {
        assert!(DenominationCounts::from_value(&serde_json::json!([1, 2])).is_empty());
    }

    #[test]
    fn test_cash_count_derives_total_and_breakdown() {
        let count = CashCount::new(
            "shift-1",
            CashCountKind::Initial,
            DenominationCounts::new().with("b_50", 2).with("m_001", 3),
        );
        assert_eq!(count.total(), dec!(100.03));
        let lines = count.breakdown();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].code, "b_50");
        assert_eq!(lines[0].subtotal, dec!(100));
        assert_eq!(lines[1].label, "0.01€");
        assert_eq!(lines[1].subtotal, dec!(0.03));
    }
}
