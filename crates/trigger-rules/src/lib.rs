//! Trading rules and their evaluation.
//!
//! Rules live in a [`RuleStore`] partitioned by market: each market owns one
//! [`RuleBook`] behind its own lock, so evaluating one market can never touch
//! another market's rules.
//!
//! [`RuleEvaluator`] is a pure state machine over one book and one tick. It
//! updates every rule's proximity, re-arms fired sell rules, appends the
//! follow-up moon and hardsell rules, and returns the order actions to run.
//! Running them is the executor's job.

pub mod book;
pub mod error;
pub mod evaluator;
pub mod params;
pub mod store;

pub use book::{RuleBook, RuleIds};
pub use error::{RulesError, RulesResult};
pub use evaluator::{Evaluation, Firing, OrderAction, RuleEvaluator};
pub use params::{OneShotPolicy, TriggerParams, MAX_MULTIPLIER};
pub use store::{RuleStore, SharedBook};
