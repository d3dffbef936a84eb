//! Scripted device stand-ins for tests, demos, and headless development.

pub mod synthetic;

pub use synthetic::{
    checkerboard_luma, gradient_luma, ScriptedDecoderFactory, ScriptedReader, SyntheticOpener,
    SyntheticScript, SyntheticSource,
};
