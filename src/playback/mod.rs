mod controller;
mod intent;
mod reconcile;
mod snapshot;

pub use controller::{LoopState, PlaybackController, PlaybackSurfaces};
pub use intent::{plan_play, LocalIntent};
pub use reconcile::{Observation, Reconciler};
pub use snapshot::PlaybackSnapshot;
