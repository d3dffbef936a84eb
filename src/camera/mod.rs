//! Camera side of the pipeline: the shared worker thread, session
//! lifecycle, device control and the frame source seam.

pub mod ambient;
pub(crate) mod autofocus;
pub(crate) mod controller;
pub mod nokhwa_source;
pub mod session;
pub mod settings;
pub mod source;
pub mod surface;
pub mod worker;

pub use ambient::{LightSensor, SharedLightSensor};
pub use nokhwa_source::{NokhwaOpener, NokhwaSource};
pub use session::{CameraSession, FrameSink, SessionState};
pub use settings::{CameraSettings, FocusMode};
pub use source::{
    CameraFacing, CapturedFrame, DeviceMetadata, FrameSource, PreviewParameters, SourceOpener,
};
pub use surface::PreviewSurface;
pub use worker::CameraWorker;
