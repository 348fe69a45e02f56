//! Application layer: the balance updater that drives store transactions.

pub mod updater;
