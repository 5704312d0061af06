//! Client runtime: input sampling, local prediction and remote interpolation
//!
//! None of this runs in the server binary. It is the reference client-side counterpart of the
//! world loop and shares the movement core with it.

pub mod clock;
pub mod input;
pub mod interpolation;
pub mod prediction;
pub mod world;

pub use clock::ServerClock;
pub use input::{IntentSampler, RawInput, SampledIntent};
pub use interpolation::{InterpolationSettings, RemoteAvatar, ReplicatedSnapshot, SnapshotRingBuffer};
pub use prediction::{Correction, PredictionEngine, PredictionState, ReconcileSettings};
pub use world::{ClientWorld, LocalFrame};
