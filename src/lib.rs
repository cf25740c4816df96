//! Health Fusion - wearable & public-health survey data fusion
//!
//! Imputes demographics for stratified survey rows, learns an obesity flag
//! from nutrition data and assigns a likely chronic disease to wearable
//! subjects who show both a heart-rate and a weight signal.

pub mod analysis;
pub mod charts;
pub mod config;
pub mod data;
pub mod fusion;
pub mod model;
pub mod pipeline;
pub mod stats;
