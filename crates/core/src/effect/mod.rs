pub mod compiler;
pub mod description;
pub mod effect;
pub mod idle;

pub use description::{ComponentValue, EffectDescription, TransitionDescription};
pub use effect::{
    CompiledEffect, Component, EffectSpec, Formula, KeyframeSegment, QueuedEffect, TargetColor,
};
pub use idle::{idle_effect, IdleSettings};
