//! Euro bills and coins accepted in a cash count, largest first.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Denomination {
    /// Face value in cents.
    pub cents: i64,
    pub code: &'static str,
    pub label: &'static str,
}

impl Denomination {
    pub fn face_value(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    pub fn is_bill(&self) -> bool {
        self.code.starts_with("b_")
    }
}

const fn denom(cents: i64, code: &'static str, label: &'static str) -> Denomination {
    Denomination { cents, code, label }
}

pub const DENOMINATIONS: [Denomination; 15] = [
    denom(50_000, "b_500", "500€"),
    denom(20_000, "b_200", "200€"),
    denom(10_000, "b_100", "100€"),
    denom(5_000, "b_50", "50€"),
    denom(2_000, "b_20", "20€"),
    denom(1_000, "b_10", "10€"),
    denom(500, "b_5", "5€"),
    denom(200, "m_2", "2€"),
    denom(100, "m_1", "1€"),
    denom(50, "m_050", "0.50€"),
    denom(20, "m_020", "0.20€"),
    denom(10, "m_010", "0.10€"),
    denom(5, "m_005", "0.05€"),
    denom(2, "m_002", "0.02€"),
    denom(1, "m_001", "0.01€"),
];

pub fn find(code: &str) -> Option<&'static Denomination> {
    DENOMINATIONS.iter().find(|d| d.code == code)
}
