//! # Client Specifications
//!
//! Client logic behind popping and claiming.
//!
//! ## Overall Payloads
//!
//! Responses/requests between the client and backend are JSON, see
//! [`shared::payloads`].
//!
//! ### Popping
//! - No request at all, a pop only bumps the local accumulator and plays a sound
//! - The sound is cosmetic, if it fails the pop still counts
//!
//! ### Claiming
//! - `POST /pop/batch` with the handle, the local count and a claim id
//! - The claim id stays the same while retrying the same count, so a retry
//!   after a lost response is not counted twice
//!
//! If no handle yet
//! - Ask for one, check it locally, `POST /register` it, then claim
//!
//!
//!
//! ## Flow
//!
//! - Session starts with 0 local pops, even if the last session had some
//! - If a handle is known, fetch its total from `GET /me`
//! - Every pop adds 1 locally
//! - Claim sends the whole local count once
//! - On success, local pops go back to 0 and the server total is shown
//! - On failure, local pops stay so the user can retry
//!
//!
//!
//! ## States
//!
//! - `Idle`: 0 local pops
//! - `Accumulating`: some local pops, not claimed yet
//! - `Claiming`: claim request in flight
//!
//! `Idle -> Accumulating` on pop, `Accumulating -> Claiming` on claim,
//! `Claiming -> Idle` on success and `Claiming -> Accumulating` on failure.

pub mod accumulator;
pub mod api;
pub mod board;
pub mod claim;
pub mod sound;

pub use accumulator::LocalAccumulator;
pub use api::{ApiError, HttpApi, PopApi};
pub use claim::{ClaimError, ClaimOutcome, ClaimState, Session};
pub use sound::{Bell, Silent, Sound};
