//! Post-hoc KPI computation from an implemented schedule.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::engine::RunOutcome;
use super::types::{BatteryParams, Horizon, interval_energy_kwh};
use crate::strategy::StrategyKind;

/// Aggregate indicators of a complete run.
///
/// Computed after the fact from the implemented schedule so that reported
/// figures always agree with the exported series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleKpis {
    /// Largest charge action (kW, positive).
    pub max_charge_kw: f64,
    /// Largest discharge action (kW, positive magnitude).
    pub max_discharge_kw: f64,
    pub min_soc_kwh: f64,
    pub max_soc_kwh: f64,
    /// Charged energy of the whole schedule divided by capacity.
    pub equivalent_cycles: f64,
    pub strategies_accepted: usize,
    pub strategies_by_kind: BTreeMap<StrategyKind, usize>,
    pub profit_euro: f64,
    /// Charged energy of accepted strategies (kWh).
    pub strategy_charged_kwh: f64,
    pub cycle_budget_kwh: f64,
    /// Share of the cycle budget used by selection (%).
    pub budget_utilisation_pct: f64,
    pub baseline_corrections: usize,
    pub violations: usize,
    /// Grid consumption after the schedule, `max(0, load + action − pv)` (kWh).
    pub consumption_kwh: f64,
    /// Largest net load after the schedule (kW).
    pub peak_load_kw: f64,
    /// Day-ahead cost of the consumption (€).
    pub day_ahead_cost_euro: f64,
    /// Consumption-weighted average price (ct/kWh).
    pub avg_cost_ct_per_kwh: f64,
}

impl ScheduleKpis {
    /// Computes all KPIs for a finished run.
    ///
    /// # Arguments
    ///
    /// * `horizon` - Input the run was computed on
    /// * `battery` - Battery the run was computed for
    /// * `outcome` - Result of [`Engine::run`](super::engine::Engine::run)
    pub fn from_outcome(horizon: &Horizon, battery: &BatteryParams, outcome: &RunOutcome) -> Self {
        let schedule = &outcome.schedule;

        let mut max_charge = 0.0_f64;
        let mut max_discharge = 0.0_f64;
        let mut charged = 0.0;
        let mut consumption = 0.0;
        let mut cost_ct = 0.0;
        let mut peak = 0.0_f64;

        for (iv, &action) in horizon.intervals().iter().zip(&schedule.actions_kw) {
            max_charge = max_charge.max(action);
            max_discharge = max_discharge.max(-action);
            if action > 0.0 {
                charged += interval_energy_kwh(action);
            }
            let net_kw = (iv.load_kw + action - iv.pv_kw).max(0.0);
            peak = peak.max(net_kw);
            consumption += interval_energy_kwh(net_kw);
            cost_ct += interval_energy_kwh(net_kw) * iv.price_ct_per_kwh;
        }

        let (min_soc, max_soc) = schedule
            .soc_kwh
            .iter()
            .chain(std::iter::once(&schedule.final_soc_kwh))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });

        let mut strategies_by_kind = BTreeMap::new();
        for c in &outcome.accepted {
            *strategies_by_kind.entry(c.kind).or_insert(0) += 1;
        }

        let budget = outcome.budget;
        let budget_utilisation_pct = if budget.limit_kwh > 0.0 {
            100.0 * budget.used_kwh / budget.limit_kwh
        } else {
            0.0
        };

        Self {
            max_charge_kw: max_charge,
            max_discharge_kw: max_discharge,
            min_soc_kwh: min_soc,
            max_soc_kwh: max_soc,
            equivalent_cycles: charged / battery.capacity_kwh,
            strategies_accepted: outcome.accepted.len(),
            strategies_by_kind,
            profit_euro: outcome.total_profit_euro(),
            strategy_charged_kwh: outcome.accepted.iter().map(|c| c.charged_kwh).sum(),
            cycle_budget_kwh: budget.limit_kwh,
            budget_utilisation_pct,
            baseline_corrections: outcome.band_corrections.len()
                + outcome.schedule_corrections.len(),
            violations: schedule.violations.len(),
            consumption_kwh: consumption,
            peak_load_kw: peak,
            day_ahead_cost_euro: cost_ct / 100.0,
            avg_cost_ct_per_kwh: if consumption > 0.0 {
                cost_ct / consumption
            } else {
                0.0
            },
        }
    }
}

impl fmt::Display for ScheduleKpis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Schedule Report ---")?;
        writeln!(f, "Max charge:            {:.2} kW", self.max_charge_kw)?;
        writeln!(f, "Max discharge:         {:.2} kW", self.max_discharge_kw)?;
        writeln!(
            f,
            "SoC range:             {:.2} .. {:.2} kWh",
            self.min_soc_kwh, self.max_soc_kwh
        )?;
        writeln!(f, "Equivalent cycles:     {:.2}", self.equivalent_cycles)?;
        writeln!(f, "Strategies accepted:   {}", self.strategies_accepted)?;
        for (kind, count) in &self.strategies_by_kind {
            writeln!(f, "  {:<20} {count}", kind.to_string())?;
        }
        writeln!(f, "Arbitrage profit:      {:.2} EUR", self.profit_euro)?;
        writeln!(
            f,
            "Cycle budget:          {:.2} of {:.2} kWh ({:.2}%)",
            self.strategy_charged_kwh, self.cycle_budget_kwh, self.budget_utilisation_pct
        )?;
        writeln!(f, "Consumption:           {:.2} kWh", self.consumption_kwh)?;
        writeln!(f, "Peak net load:         {:.2} kW", self.peak_load_kw)?;
        writeln!(
            f,
            "Day-ahead cost:        {:.2} EUR ({:.4} ct/kWh)",
            self.day_ahead_cost_euro, self.avg_cost_ct_per_kwh
        )?;
        writeln!(f, "Baseline corrections:  {}", self.baseline_corrections)?;
        write!(f, "SoC violations:        {}", self.violations)
    }
}
