//! Per-provider spend tracking against daily and monthly caps.
//!
//! Counters are approximate: attempts are charged at their pre-call
//! estimate, and enforcement is soft. A counter may overshoot a cap by at
//! most one in-flight request's estimate. Period rollover is lazy: there
//! is no background timer, every operation first reconciles the stored
//! period start with the wall clock.

use crate::config::BudgetConfig;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Outcome of a cap check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetVerdict {
    Allowed,
    DailyCapExceeded { spent_usd: f64, cap_usd: f64 },
    MonthlyCapExceeded { spent_usd: f64, cap_usd: f64 },
}

impl BudgetVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BudgetVerdict::Allowed)
    }

    pub fn describe(&self) -> String {
        match self {
            BudgetVerdict::Allowed => "allowed".to_string(),
            BudgetVerdict::DailyCapExceeded { spent_usd, cap_usd } => format!(
                "daily cap exceeded (${:.2}/${:.2})",
                spent_usd, cap_usd
            ),
            BudgetVerdict::MonthlyCapExceeded { spent_usd, cap_usd } => format!(
                "monthly cap exceeded (${:.2}/${:.2})",
                spent_usd, cap_usd
            ),
        }
    }
}

/// Running counters for one provider.
#[derive(Debug, Clone)]
struct ProviderSpend {
    daily_usd: f64,
    day: NaiveDate,
    monthly_usd: f64,
    month: (i32, u32),
}

impl ProviderSpend {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_usd: 0.0,
            day: now.date_naive(),
            monthly_usd: 0.0,
            month: (now.year(), now.month()),
        }
    }

    /// Effective totals treating stale periods as zero, without mutating.
    fn effective(&self, now: DateTime<Utc>) -> (f64, f64) {
        let daily = if self.day == now.date_naive() {
            self.daily_usd
        } else {
            0.0
        };
        let monthly = if self.month == (now.year(), now.month()) {
            self.monthly_usd
        } else {
            0.0
        };
        (daily, monthly)
    }

    /// Zero any counter whose period has ended.
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != today {
            self.daily_usd = 0.0;
            self.day = today;
        }
        let month = (now.year(), now.month());
        if self.month != month {
            self.monthly_usd = 0.0;
            self.month = month;
        }
    }
}

/// Per-provider snapshot exposed on the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct SpendSnapshot {
    pub provider: String,
    pub daily_usd: f64,
    pub daily_cap_usd: f64,
    pub monthly_usd: f64,
    pub monthly_cap_usd: f64,
}

/// Shared spend ledger. One instance per process, handed around in an `Arc`.
///
/// The inner map is guarded by a single mutex; `try_charge` performs its
/// check and commit inside one lock acquisition so two concurrent requests
/// cannot both slip past a near-exhausted cap.
pub struct BudgetLedger {
    caps: BudgetConfig,
    inner: Mutex<HashMap<String, ProviderSpend>>,
}

impl BudgetLedger {
    pub fn new(caps: BudgetConfig) -> Self {
        Self {
            caps,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Would charging `projected_usd` keep `provider` within caps?
    ///
    /// Pure read: stale periods are treated as already zeroed but nothing is
    /// written back.
    pub fn estimate_and_check(&self, provider: &str, projected_usd: f64) -> BudgetVerdict {
        self.check_at(provider, projected_usd, Utc::now())
    }

    /// Clock-injected variant of [`estimate_and_check`](Self::estimate_and_check).
    pub fn check_at(
        &self,
        provider: &str,
        projected_usd: f64,
        now: DateTime<Utc>,
    ) -> BudgetVerdict {
        let inner = self.inner.lock().unwrap();
        let (daily, monthly) = inner
            .get(provider)
            .map(|s| s.effective(now))
            .unwrap_or((0.0, 0.0));
        self.verdict(provider, daily, monthly, projected_usd)
    }

    /// Add an attempt's cost to both counters. Called exactly once per
    /// provider call attempt, success or failure.
    pub fn commit(&self, provider: &str, usd: f64) {
        self.commit_at(provider, usd, Utc::now());
    }

    /// Clock-injected variant of [`commit`](Self::commit).
    pub fn commit_at(&self, provider: &str, usd: f64, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        let spend = inner
            .entry(provider.to_string())
            .or_insert_with(|| ProviderSpend::new(now));
        spend.roll_over(now);
        spend.daily_usd += usd;
        spend.monthly_usd += usd;
    }

    /// Check and commit under one lock acquisition. This is the admission
    /// path used per call attempt; a refusal leaves the counters untouched.
    pub fn try_charge(&self, provider: &str, usd: f64) -> Result<(), BudgetVerdict> {
        self.try_charge_at(provider, usd, Utc::now())
    }

    /// Clock-injected variant of [`try_charge`](Self::try_charge).
    pub fn try_charge_at(
        &self,
        provider: &str,
        usd: f64,
        now: DateTime<Utc>,
    ) -> Result<(), BudgetVerdict> {
        let mut inner = self.inner.lock().unwrap();
        let spend = inner
            .entry(provider.to_string())
            .or_insert_with(|| ProviderSpend::new(now));
        spend.roll_over(now);

        let verdict = self.verdict(provider, spend.daily_usd, spend.monthly_usd, usd);
        if !verdict.is_allowed() {
            return Err(verdict);
        }
        spend.daily_usd += usd;
        spend.monthly_usd += usd;
        Ok(())
    }

    fn verdict(&self, provider: &str, daily: f64, monthly: f64, projected: f64) -> BudgetVerdict {
        let daily_cap = self.caps.daily_cap(provider);
        let monthly_cap = self.caps.monthly_cap(provider);
        if daily + projected > daily_cap {
            return BudgetVerdict::DailyCapExceeded {
                spent_usd: daily,
                cap_usd: daily_cap,
            };
        }
        if monthly + projected > monthly_cap {
            return BudgetVerdict::MonthlyCapExceeded {
                spent_usd: monthly,
                cap_usd: monthly_cap,
            };
        }
        BudgetVerdict::Allowed
    }

    /// Current spend per known provider, for the health surface.
    pub fn snapshot(&self) -> Vec<SpendSnapshot> {
        self.snapshot_at(Utc::now())
    }

    /// Clock-injected variant of [`snapshot`](Self::snapshot).
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<SpendSnapshot> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<SpendSnapshot> = inner
            .iter()
            .map(|(provider, spend)| {
                let (daily, monthly) = spend.effective(now);
                SpendSnapshot {
                    provider: provider.clone(),
                    daily_usd: daily,
                    daily_cap_usd: self.caps.daily_cap(provider),
                    monthly_usd: monthly,
                    monthly_cap_usd: self.caps.monthly_cap(provider),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.provider.cmp(&b.provider));
        rows
    }
}
