use std::sync::Arc;

use rust_decimal::Decimal;

use crate::model::employee::Employee;
use crate::model::payroll::PayComponent;
use crate::utils::db_utils::round2;

/// What a policy withholds from one employee's taxable pay. The engine sums
/// these into the record's deduction/tax totals; it never computes tax on
/// its own.
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    pub taxes: Vec<PayComponent>,
    pub post_tax_deductions: Vec<PayComponent>,
    pub employer_contributions: Vec<PayComponent>,
}

pub trait DeductionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `taxable` is gross pay net of pre-tax deductions.
    fn assess(&self, taxable: Decimal, employee: &Employee) -> Assessment;
}

/// Withholds nothing. The default.
pub struct ZeroPolicy;

impl DeductionPolicy for ZeroPolicy {
    fn name(&self) -> &'static str {
        "zero"
    }

    fn assess(&self, _taxable: Decimal, _employee: &Employee) -> Assessment {
        Assessment::default()
    }
}

/// Single flat withholding percentage applied to taxable pay.
pub struct FlatRatePolicy {
    pub rate_percent: Decimal,
}

impl DeductionPolicy for FlatRatePolicy {
    fn name(&self) -> &'static str {
        "flat-rate"
    }

    fn assess(&self, taxable: Decimal, _employee: &Employee) -> Assessment {
        let hundred = Decimal::from(100);
        Assessment {
            taxes: vec![PayComponent {
                name: "withholding".into(),
                amount: round2(taxable * self.rate_percent / hundred),
            }],
            post_tax_deductions: Vec::new(),
            employer_contributions: Vec::new(),
        }
    }
}

/// App-data wrapper so handlers can pull the configured policy out of the
/// actix registry.
#[derive(Clone)]
pub struct PolicyHandle(pub Arc<dyn DeductionPolicy>);

pub fn policy_from_config(flat_rate_percent: Option<Decimal>) -> PolicyHandle {
    match flat_rate_percent {
        Some(rate) => PolicyHandle(Arc::new(FlatRatePolicy { rate_percent: rate })),
        None => PolicyHandle(Arc::new(ZeroPolicy)),
    }
}
