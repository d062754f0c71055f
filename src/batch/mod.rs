//! # Batch Module
//!
//! Livello più alto del motore: percorre la lista dei file e coordina gli
//! altri componenti.
//!
//! - `orchestrator`: sequenza per-file (ammissione, probe, rilevamento,
//!   pianificazione, esecuzione, pulizia) e aggregazione dei risultati
//! - `scheduler`: decide quando ogni job viene eseguito (solo sequenziale)
//! - `events`: notifiche verso progress bar e output JSON

pub mod events;
pub mod orchestrator;
pub mod scheduler;

pub use events::{BatchEvents, NoEvents};
pub use orchestrator::{BatchOrchestrator, BatchSummary, FileReport};
pub use scheduler::{Scheduler, SequentialScheduler};
