mod rest;

pub use rest::{RestSignal, RestTimer, SIGNAL_THRESHOLDS};
