use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    // Payroll policy knobs
    pub working_days_per_week: Decimal,
    pub include_leave_in_timesheets: bool,
    /// Selects the flat-rate deduction policy when set; zero policy otherwise.
    pub tax_flat_rate_percent: Option<Decimal>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wfm.db".to_string()),
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            working_days_per_week: env::var("WORKING_DAYS_PER_WEEK")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok())
                .unwrap_or(dec!(5)),
            include_leave_in_timesheets: env::var("INCLUDE_LEAVE_IN_TIMESHEETS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            tax_flat_rate_percent: env::var("TAX_FLAT_RATE_PERCENT")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok()),
        }
    }
}
