//! Invariant checks run after every state-changing operation (spec §4.5).
//! Any failure here is fatal: the coordinator treats [`EngineError::AuditFailure`]
//! as a kill-switch, not a rejectable error.

use tracing::{error, info};

use crate::economy::EconomyManager;
use crate::engine::MatchingEngine;
use crate::errors::{EngineError, EngineResult};
use crate::money::Money;

pub struct Auditor<'a> {
    engine: &'a MatchingEngine,
    economy: &'a EconomyManager,
}

impl<'a> Auditor<'a> {
    pub fn new(engine: &'a MatchingEngine, economy: &'a EconomyManager) -> Self {
        Self { engine, economy }
    }

    /// Runs the three checks in the same order as `audit.py::run_full_audit`:
    /// positions, then cash, then registry integrity. Stops at the first
    /// failure.
    pub fn run_full_audit(&self, total_deposited: Money) -> EngineResult<()> {
        self.audit_positions()?;
        self.audit_cash(total_deposited)?;
        self.audit_registry()?;
        info!("audit passed");
        Ok(())
    }

    /// I1 — every market's net position across all users sums to zero: for
    /// every long there is an equal short, since every trade matched one
    /// buyer to one seller inside the same market.
    fn audit_positions(&self) -> EngineResult<()> {
        for (market_id, book) in self.engine.markets() {
            let net: i64 = book.positions().map(|(_, p)| *p).sum();
            if net != 0 {
                let reason = format!("market {market_id} net position is {net}, expected 0");
                error!(%market_id, net, "position conservation violated");
                return Err(EngineError::AuditFailure { reason });
            }
        }
        Ok(())
    }

    /// Cash conservation: every dollar in the system is either still
    /// available, locked against a resting order, or moved to a
    /// counterparty by `confirm_trade` — so total available + locked across
    /// all accounts must equal what was ever deposited. Matches
    /// `audit.py::_audit_cash`'s note that, absent a ledger of external
    /// mints, this check logs a total; here `total_deposited` is tracked
    /// explicitly by the coordinator, so the check is a hard assertion.
    fn audit_cash(&self, total_deposited: Money) -> EngineResult<()> {
        let total: Money = self
            .economy
            .accounts()
            .map(|(_, a)| a.total_equity())
            .sum();
        if total != total_deposited {
            let reason = format!("total account equity {total} does not match deposited {total_deposited}");
            error!(%total, %total_deposited, "cash conservation violated");
            return Err(EngineError::AuditFailure { reason });
        }
        Ok(())
    }

    /// I2/I3 — every order the registry thinks is resting in a market must
    /// still be resting in that market's book, and vice versa: the total
    /// resting volume reported by the registry for a market must equal the
    /// volume the book itself reports.
    fn audit_registry(&self) -> EngineResult<()> {
        for (market_id, book) in self.engine.markets() {
            let book_volume: u64 = book.iter_resting().map(|(_, _, _, qty, _)| qty).sum();
            let registry_volume = self.engine.registry().volume_for_market(*market_id);
            if book_volume != registry_volume {
                let reason = format!(
                    "market {market_id} book volume {book_volume} != registry volume {registry_volume}"
                );
                error!(%market_id, book_volume, registry_volume, "registry integrity violated");
                return Err(EngineError::AuditFailure { reason });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MarketId, Side};

    #[test]
    fn passes_on_a_clean_matched_trade() {
        let mut engine = MatchingEngine::new();
        let mut economy = EconomyManager::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, None);

        economy.deposit(2, Money::from_cents(1000));
        economy.attempt_order_lock(2, Money::from_cents(60), 10);

        engine.process_order(market, Side::Sell, 60, 10, 1, 1).unwrap();
        let trades = engine.process_order(market, Side::Buy, 60, 10, 2, 2).unwrap();
        for t in &trades {
            economy.confirm_trade(2, 1, market, Money::from_cents(t.price as i64), t.qty as u64);
        }

        let auditor = Auditor::new(&engine, &economy);
        auditor.run_full_audit(Money::from_cents(1000)).unwrap();
    }

    #[test]
    fn registry_stays_consistent_through_cancel() {
        let mut engine = MatchingEngine::new();
        let economy = EconomyManager::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, None);
        engine.process_order(market, Side::Buy, 50, 5, 1, 1).unwrap();
        engine.cancel_order(1).unwrap();

        let auditor = Auditor::new(&engine, &economy);
        auditor.run_full_audit(Money::ZERO).unwrap();
    }

    #[test]
    fn catches_cash_conservation_violation() {
        let engine = MatchingEngine::new();
        let mut economy = EconomyManager::new();
        economy.deposit(1, Money::from_cents(500));

        let auditor = Auditor::new(&engine, &economy);
        let err = auditor.run_full_audit(Money::from_cents(1000)).unwrap_err();
        assert!(matches!(err, EngineError::AuditFailure { .. }));
    }
}
