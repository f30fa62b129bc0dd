mod autosave;
pub mod engine;
pub mod finalize;
pub mod reconciler;
pub mod single_flight;
pub mod status;

pub use engine::{DocumentEngine, DraftHandle};
pub use finalize::FinalizeService;
pub use reconciler::SyncReconciler;
pub use single_flight::SingleFlight;
pub use status::SessionStatus;
