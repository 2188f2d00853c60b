//! Worker lifecycle: state machine, event payloads, the per-version manager,
//! and the registration that swaps versions.

pub mod events;
pub mod manager;
pub mod registration;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{ClientAction, ControlMessage, MessageOutcome, Notification, NotificationData, SYNC_TAG, SyncOutcome};
pub use manager::{ActivateOutcome, CacheLifecycleManager, FetchOutcome, InstallOutcome, ResponseSource};
pub use registration::{RegisterOutcome, Registration, RegistrationStatus, WorkerSummary};
pub use state::{LifecycleEvent, WorkerState};
