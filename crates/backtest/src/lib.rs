pub mod evaluator;
pub mod tester;

pub use evaluator::BacktestEvaluator;
pub use tester::HistoryTester;
