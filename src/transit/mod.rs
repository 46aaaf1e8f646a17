//! Limb-darkened transit photometry

mod light_curve;
pub use light_curve::LightCurveSettings;

mod limb_dark;
pub use limb_dark::QuadraticLimbDarkening;

mod occultation;
pub use occultation::{occultation, overlap_area};
