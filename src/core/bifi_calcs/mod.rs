//! Bifacial shading geometry and rear-side irradiance estimates for an outboard sensor.

pub mod geometry;
pub mod irradiance;
