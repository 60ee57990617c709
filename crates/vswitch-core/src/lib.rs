//! VLAN-aware Ethernet switching engine.
//!
//! The engine is a pure state machine: the caller feeds it raw ingress
//! frames and it returns the list of emissions to perform. All IO, logging
//! and scheduling live in the binary that embeds it.
#![forbid(unsafe_code)]

pub mod config;
pub mod fdb;
pub mod port;
pub mod switch;

pub use config::{Membership, PortSpec, SpecError, VlanId, DEFAULT_VLAN, MAX_VLAN_ID};
pub use fdb::{Fdb, DEFAULT_FDB_CAPACITY};
pub use port::{Port, PortTable};
pub use switch::{Action, FrameDrop, Switch, SwitchConfig};
