pub mod build_event;
pub mod env;

pub use build_event::{collect, BuildEvent, CiKind, TagPolicy, CONTINUOUS_TAG};
pub use env::{EnvSource, ProcessEnv};
