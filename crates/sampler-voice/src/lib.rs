//! Voice-level sampler logic: region data model, per-channel controller
//! state, the input event queue, per-voice DSP graph, and the voice pool /
//! event dispatcher that ties them together.
//!
//! [`Dispatcher`] is the crate's entry point: it owns a [`RegionSet`], a
//! [`VoicePool`], one [`ChannelState`] per MIDI channel, and an
//! [`EventBuffer`]. Callers feed it timestamped events and pull rendered
//! audio a block at a time via [`Dispatcher::render`]. Nothing in this
//! crate allocates or blocks once a [`Dispatcher`] has been constructed and
//! its regions loaded -- the only cross-thread handle it holds is a cloned
//! [`sampler_cache::SampleCache`].

pub mod channel;
pub mod event;
pub mod pool;
pub mod region;
pub mod rng;
pub mod voice;

pub use channel::ChannelState;
pub use event::{Event, EventBuffer, EventKind};
pub use pool::{Dispatcher, RegionSet, VoicePool};
pub use region::{
    CcMod, CcParam, CrossfadeCurve, CrossfadeRange, CurveLookup, EgSpec, EgStage, FilterSpec, KeySwitch, LfoModSpec,
    LfoSpec, LoopMode, Region, RegionState, TriggerKind, resolve_cc_mods,
};
pub use rng::Rng;
pub use voice::{StartArgs, Voice, VoiceState};
