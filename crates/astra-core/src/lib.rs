//! # astra-core
//!
//! Shared vocabulary for the Astra sensory gym relay:
//!
//! - **Branded IDs**: [`UserId`], [`ConnectionId`] newtypes for type safety
//! - **Landmark model**: [`LandmarkFrame`] / [`LandmarkPoint`], the wire shape
//!   emitted by the hand-tracking service and relayed to clients
//!
//! [`UserId`]: ids::UserId
//! [`ConnectionId`]: ids::ConnectionId
//! [`LandmarkFrame`]: landmarks::LandmarkFrame
//! [`LandmarkPoint`]: landmarks::LandmarkPoint

#![deny(unsafe_code)]

pub mod ids;
pub mod landmarks;
