//! # PRAMAN Rules
//!
//! The single source of truth for who may do what in the PRAMAN supply chain.
//! Both the Soroban contract and the off-chain registry service consult this
//! crate, so a role's permissions or a status transition is defined exactly
//! once.
//!
//! | Role          | Originate | Send | Receive | Hands off to            |
//! |---------------|-----------|------|---------|-------------------------|
//! | `farmer`      | yes       | yes  | no      | collector               |
//! | `collector`   | no        | yes  | yes     | lab, supplier           |
//! | `lab`         | no        | yes  | yes     | supplier, distributor   |
//! | `supplier`    | no        | yes  | yes     | distributor             |
//! | `distributor` | no        | yes  | yes     | retailer                |
//! | `retailer`    | no        | no   | yes     | (terminal)              |
//!
//! The crate is `no_std` and allocation-free so it links into the contract.

#![no_std]

mod registration;
mod role;
mod status;

pub use registration::RegistrationId;
pub use role::{Permissions, RoleKind, UnknownRole};
pub use status::BatchStatus;
