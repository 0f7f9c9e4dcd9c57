mod controller;
mod previous;
mod reconcile;

pub use controller::{SessionController, SetEntry};
pub use previous::{PreviousPerformanceIndex, PreviousPerformanceLookup};
pub use reconcile::{ReconcileSummary, ResumeReconciler, ResumedSession};
