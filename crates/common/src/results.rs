use crate::{Signal, SignalResult, SignalStatus};

/// Append-only log of every signal proposed during one run.
///
/// Insertion order is proposal order. The filtered views return copies, so
/// later transitions do not show up in a snapshot taken earlier.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    statuses: Vec<SignalStatus>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `signal` in a fresh `Proposed` status and append it.
    pub fn add(&mut self, signal: Signal) -> &mut SignalStatus {
        self.statuses.push(SignalStatus::new(signal));
        let last = self.statuses.len() - 1;
        &mut self.statuses[last]
    }

    pub fn statuses(&self) -> &[SignalStatus] {
        &self.statuses
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SignalStatus> {
        self.statuses.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn proposed_signals(&self) -> Vec<SignalStatus> {
        self.filtered(SignalResult::Proposed)
    }

    pub fn active_signals(&self) -> Vec<SignalStatus> {
        self.filtered(SignalResult::Active)
    }

    pub fn profit_signals(&self) -> Vec<SignalStatus> {
        self.filtered(SignalResult::Profit)
    }

    pub fn loss_signals(&self) -> Vec<SignalStatus> {
        self.filtered(SignalResult::Loss)
    }

    pub fn canceled_signals(&self) -> Vec<SignalStatus> {
        self.filtered(SignalResult::Canceled)
    }

    pub fn has_proposed(&self) -> bool {
        self.statuses.iter().any(SignalStatus::is_proposed)
    }

    /// The not-yet-resolved status for `instrument`, if any.
    pub fn open_for_mut(&mut self, instrument: &str) -> Option<&mut SignalStatus> {
        self.statuses
            .iter_mut()
            .find(|s| s.is_open() && s.signal().instrument() == instrument)
    }

    pub fn summary(&self) -> ResultSummary {
        let count = |r: SignalResult| self.statuses.iter().filter(|s| s.result() == r).count();
        ResultSummary {
            total: self.statuses.len(),
            proposed: count(SignalResult::Proposed),
            active: count(SignalResult::Active),
            profit: count(SignalResult::Profit),
            loss: count(SignalResult::Loss),
            canceled: count(SignalResult::Canceled),
        }
    }

    fn filtered(&self, result: SignalResult) -> Vec<SignalStatus> {
        self.statuses
            .iter()
            .filter(|s| s.result() == result)
            .cloned()
            .collect()
    }
}

/// Counts per lifecycle state, for logs and chat reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultSummary {
    pub total: usize,
    pub proposed: usize,
    pub active: usize,
    pub profit: usize,
    pub loss: usize,
    pub canceled: usize,
}

impl std::fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signals found: {}\n\
             Proposed: {}\n\
             Active: {}\n\
             Take profit: {}\n\
             Stop loss: {}\n\
             Canceled: {}",
            self.total, self.proposed, self.active, self.profit, self.loss, self.canceled
        )
    }
}
