//! Offline harness measuring how much the two landmark backends disagree.

pub mod compare;
pub mod overlay;
pub mod validator;

pub use compare::{compare_landmarks, AxisDelta, LandmarkComparison, LandmarkName};
pub use overlay::{render_composite, render_overlay};
pub use validator::{
    ConsistencyReport, ConsistencyRun, ConsistencyValidator, ImageConsistency, ImageRole,
    UNRELIABLE_TEMPLATE_NOTE,
};
