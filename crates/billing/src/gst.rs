//! GST (Indian goods and services tax) arithmetic.
//!
//! Amounts are integer paise and rates are basis points (`1800` = 18%).
//! Intra-state supplies split the rate evenly into CGST and SGST; inter-state
//! supplies carry the whole rate as IGST. Each component is rounded half-up to
//! the paisa.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount in paise (1 rupee = 100 paise).
pub type Paise = i64;

/// 100% in basis points.
pub const MAX_RATE_BP: u32 = 10_000;

const GSTIN_LEN: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GstError {
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Paise),
    #[error("rate of {0} basis points exceeds 100%")]
    RateTooHigh(u32),
    #[error("line {line}: discount {discount} exceeds gross amount {gross}")]
    DiscountExceedsGross { line: usize, gross: Paise, discount: Paise },
    #[error("amount overflow")]
    Overflow,
    #[error("invalid GSTIN: {0}")]
    InvalidGstin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyKind {
    IntraState,
    InterState,
}

/// Intra-state when supplier state and place of supply match.
pub fn supply_kind(supplier_state: &str, place_of_supply: &str) -> SupplyKind {
    if supplier_state.trim().eq_ignore_ascii_case(place_of_supply.trim()) {
        SupplyKind::IntraState
    } else {
        SupplyKind::InterState
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstBreakdown {
    pub taxable: Paise,
    pub cgst: Paise,
    pub sgst: Paise,
    pub igst: Paise,
    pub total_tax: Paise,
    pub grand_total: Paise,
}

/// Tax on `taxable` at `rate_bp` for the given kind of supply.
pub fn compute(taxable: Paise, rate_bp: u32, kind: SupplyKind) -> Result<GstBreakdown, GstError> {
    if taxable < 0 {
        return Err(GstError::NegativeAmount(taxable));
    }
    if rate_bp > MAX_RATE_BP {
        return Err(GstError::RateTooHigh(rate_bp));
    }

    let (cgst, sgst, igst) = match kind {
        SupplyKind::IntraState => {
            let half = percent_of(taxable, rate_bp, 2 * MAX_RATE_BP);
            (half, half, 0)
        }
        SupplyKind::InterState => (0, 0, percent_of(taxable, rate_bp, MAX_RATE_BP)),
    };
    let total_tax = checked_sum(&[cgst, sgst, igst])?;
    Ok(GstBreakdown {
        taxable,
        cgst,
        sgst,
        igst,
        total_tax,
        grand_total: checked_sum(&[taxable, total_tax])?,
    })
}

/// `round_half_up(amount * rate / denominator)` for non-negative inputs.
/// Never exceeds `amount` because the rate is capped at 100%.
fn percent_of(amount: Paise, rate_bp: u32, denominator: u32) -> Paise {
    let numerator = amount as i128 * rate_bp as i128;
    let denominator = denominator as i128;
    ((numerator + denominator / 2) / denominator) as Paise
}

fn checked_sum(amounts: &[Paise]) -> Result<Paise, GstError> {
    amounts
        .iter()
        .try_fold(0 as Paise, |acc, &a| acc.checked_add(a))
        .ok_or(GstError::Overflow)
}

/// Two-digit state code from a GSTIN such as `29ABCDE1234F1Z5`.
pub fn state_code_from_gstin(gstin: &str) -> Result<String, GstError> {
    let gstin = gstin.trim();
    let valid = gstin.len() == GSTIN_LEN
        && gstin.chars().all(|c| c.is_ascii_alphanumeric())
        && gstin[..2].chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(GstError::InvalidGstin(gstin.to_string()));
    }
    Ok(gstin[..2].to_string())
}

/// One priced invoice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub quantity: u32,
    pub unit_price: Paise,
    pub discount: Paise,
    pub rate_bp: u32,
}

impl LineItem {
    pub fn gross(&self) -> Option<Paise> {
        self.unit_price.checked_mul(self.quantity as Paise)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub lines: Vec<GstBreakdown>,
    pub taxable: Paise,
    pub cgst: Paise,
    pub sgst: Paise,
    pub igst: Paise,
    pub total_tax: Paise,
    pub grand_total: Paise,
}

impl InvoiceTotals {
    fn push(&mut self, tax: GstBreakdown) -> Result<(), GstError> {
        self.taxable = checked_sum(&[self.taxable, tax.taxable])?;
        self.cgst = checked_sum(&[self.cgst, tax.cgst])?;
        self.sgst = checked_sum(&[self.sgst, tax.sgst])?;
        self.igst = checked_sum(&[self.igst, tax.igst])?;
        self.total_tax = checked_sum(&[self.total_tax, tax.total_tax])?;
        self.grand_total = checked_sum(&[self.grand_total, tax.grand_total])?;
        self.lines.push(tax);
        Ok(())
    }
}

/// Tax every line separately and sum the results.
pub fn compute_invoice(lines: &[LineItem], kind: SupplyKind) -> Result<InvoiceTotals, GstError> {
    let mut totals = InvoiceTotals::default();
    for (idx, line) in lines.iter().enumerate() {
        if line.unit_price < 0 {
            return Err(GstError::NegativeAmount(line.unit_price));
        }
        if line.discount < 0 {
            return Err(GstError::NegativeAmount(line.discount));
        }
        let gross = line.gross().ok_or(GstError::Overflow)?;
        if line.discount > gross {
            return Err(GstError::DiscountExceedsGross {
                line: idx,
                gross,
                discount: line.discount,
            });
        }

        totals.push(compute(gross - line.discount, line.rate_bp, kind)?)?;
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intra_state_splits_rate() -> Result<(), GstError> {
        // Rs 1000 at 18%
        let b = compute(100_000, 1800, SupplyKind::IntraState)?;
        assert_eq!((b.cgst, b.sgst, b.igst), (9_000, 9_000, 0));
        assert_eq!(b.total_tax, 18_000);
        assert_eq!(b.grand_total, 118_000);
        Ok(())
    }

    #[test]
    fn inter_state_uses_igst() -> Result<(), GstError> {
        let b = compute(100_000, 1800, SupplyKind::InterState)?;
        assert_eq!((b.cgst, b.sgst, b.igst), (0, 0, 18_000));
        Ok(())
    }

    #[test]
    fn components_round_half_up() -> Result<(), GstError> {
        // 2.5% of 101 paise = 2.525 -> 3
        let b = compute(101, 500, SupplyKind::IntraState)?;
        assert_eq!((b.cgst, b.sgst), (3, 3));
        // 5% of 10 paise = 0.5 -> 1
        assert_eq!(compute(10, 500, SupplyKind::InterState)?.igst, 1);
        // 5% of 9 paise = 0.45 -> 0
        assert_eq!(compute(9, 500, SupplyKind::InterState)?.igst, 0);
        Ok(())
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            compute(-1, 1800, SupplyKind::InterState),
            Err(GstError::NegativeAmount(-1))
        );
        assert_eq!(
            compute(100, 10_001, SupplyKind::InterState),
            Err(GstError::RateTooHigh(10_001))
        );
        assert!(compute(0, 0, SupplyKind::IntraState).is_ok());
    }

    #[test]
    fn supply_kind_compares_state_codes() {
        assert_eq!(supply_kind("29", " 29 "), SupplyKind::IntraState);
        assert_eq!(supply_kind("ka", "KA"), SupplyKind::IntraState);
        assert_eq!(supply_kind("29", "27"), SupplyKind::InterState);
    }

    #[test]
    fn gstin_state_prefix() {
        assert_eq!(state_code_from_gstin("29ABCDE1234F1Z5").as_deref(), Ok("29"));
        assert!(state_code_from_gstin("29ABCDE1234F1Z").is_err());
        assert!(state_code_from_gstin("XXABCDE1234F1Z5").is_err());
        assert!(state_code_from_gstin("29ABCDE1234F1Z-").is_err());
    }

    #[test]
    fn invoice_sums_per_line_tax() -> Result<(), GstError> {
        let lines = [
            LineItem {
                quantity: 3,
                unit_price: 33_333,
                discount: 0,
                rate_bp: 1800,
            },
            LineItem {
                quantity: 1,
                unit_price: 50_000,
                discount: 5_000,
                rate_bp: 500,
            },
        ];
        let totals = compute_invoice(&lines, SupplyKind::IntraState)?;
        assert_eq!(totals.lines.len(), 2);
        assert_eq!(totals.taxable, 99_999 + 45_000);
        // 9% of 99_999 = 8_999.91 -> 9_000; 2.5% of 45_000 = 1_125
        assert_eq!(totals.cgst, 9_000 + 1_125);
        assert_eq!(totals.cgst, totals.sgst);
        assert_eq!(totals.grand_total, totals.taxable + totals.total_tax);
        Ok(())
    }

    #[test]
    fn discount_cannot_exceed_gross() {
        let lines = [LineItem {
            quantity: 2,
            unit_price: 100,
            discount: 201,
            rate_bp: 1800,
        }];
        assert_eq!(
            compute_invoice(&lines, SupplyKind::InterState),
            Err(GstError::DiscountExceedsGross {
                line: 0,
                gross: 200,
                discount: 201
            })
        );
    }

    #[test]
    fn grand_total_overflow_is_an_error() {
        assert_eq!(
            compute(i64::MAX - 1, 1800, SupplyKind::InterState),
            Err(GstError::Overflow)
        );
        assert_eq!(
            compute(i64::MAX - 1, 1800, SupplyKind::IntraState),
            Err(GstError::Overflow)
        );
        // zero-rated still fits
        assert_eq!(
            compute(i64::MAX, 0, SupplyKind::InterState).map(|b| b.grand_total),
            Ok(i64::MAX)
        );
    }

    #[test]
    fn invoice_accumulator_overflow_is_an_error() {
        let line = |unit_price| LineItem {
            quantity: 1,
            unit_price,
            discount: 0,
            rate_bp: 0,
        };
        let lines = [line(i64::MAX / 2), line(i64::MAX / 2), line(10)];
        assert_eq!(
            compute_invoice(&lines, SupplyKind::IntraState),
            Err(GstError::Overflow)
        );
        assert!(compute_invoice(&lines[..2], SupplyKind::IntraState).is_ok());
    }
}
