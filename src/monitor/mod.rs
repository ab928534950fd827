mod backend;
mod handle;
mod manager;
mod worker;

pub use backend::{DisplayBackend, DisplayId};
pub use handle::DisplayHandle;
pub use manager::DisplayManager;
pub use worker::{Action, OsdEvent, WorkerHandle};
