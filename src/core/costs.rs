//! Credit cost schedule.
//!
//! Static kind → cost table with optional per-provider overrides. The
//! orchestrator consults it once per provider before reserving credit.

use std::collections::BTreeMap;

use serde::Serialize;

use super::models::AnalysisKind;
use super::provider::Provider;

/// Default cost of a cognitive profile, in credit units.
pub const DEFAULT_COGNITIVE_COST: u64 = 100;
/// Default cost of a psychological profile, in credit units.
pub const DEFAULT_PSYCHOLOGICAL_COST: u64 = 100;
/// Default cost of a comprehensive report, in credit units.
pub const DEFAULT_COMPREHENSIVE_COST: u64 = 250;

/// Cost table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostSchedule {
    defaults: BTreeMap<AnalysisKind, u64>,
    overrides: BTreeMap<(Provider, AnalysisKind), u64>,
}

impl Default for CostSchedule {
    fn default() -> Self {
        let defaults = BTreeMap::from([
            (AnalysisKind::Cognitive, DEFAULT_COGNITIVE_COST),
            (AnalysisKind::Psychological, DEFAULT_PSYCHOLOGICAL_COST),
            (AnalysisKind::Comprehensive, DEFAULT_COMPREHENSIVE_COST),
        ]);
        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }
}

impl CostSchedule {
    /// Flat schedule: every kind and provider costs `cost`.
    #[must_use]
    pub fn flat(cost: u64) -> Self {
        Self {
            defaults: AnalysisKind::ALL.iter().map(|k| (*k, cost)).collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Set the default cost for a kind.
    #[must_use]
    pub fn with_default(mut self, kind: AnalysisKind, cost: u64) -> Self {
        self.defaults.insert(kind, cost);
        self
    }

    /// Override the cost of one kind for one provider.
    #[must_use]
    pub fn with_override(mut self, provider: Provider, kind: AnalysisKind, cost: u64) -> Self {
        self.overrides.insert((provider, kind), cost);
        self
    }

    /// Cost of running `kind` on `provider`.
    ///
    /// A kind missing from the table costs nothing.
    #[must_use]
    pub fn cost(&self, kind: AnalysisKind, provider: Provider) -> u64 {
        self.overrides
            .get(&(provider, kind))
            .or_else(|| self.defaults.get(&kind))
            .copied()
            .unwrap_or(0)
    }

    /// One row per provider and kind, for display.
    #[must_use]
    pub fn rows(&self, providers: &[Provider]) -> Vec<CostRow> {
        providers
            .iter()
            .flat_map(|provider| {
                AnalysisKind::ALL.iter().map(move |kind| CostRow {
                    provider: *provider,
                    kind: *kind,
                    cost: self.cost(*kind, *provider),
                    overridden: self.overrides.contains_key(&(*provider, *kind)),
                })
            })
            .collect()
    }
}

/// Flattened schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostRow {
    pub provider: Provider,
    pub kind: AnalysisKind,
    pub cost: u64,
    pub overridden: bool,
}
