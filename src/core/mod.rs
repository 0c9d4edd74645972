pub mod bifi_calcs;
pub mod solar_modeling;
