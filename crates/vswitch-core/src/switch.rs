//! Frame classification and forwarding.

use core::fmt;

use vswitch_packet::ethernet::{EthernetFrame, EthernetFrameBuilder, Tci, VlanFrameBuilder};
use vswitch_packet::{MacAddr, PacketError};

use crate::fdb::{Fdb, DEFAULT_FDB_CAPACITY};
use crate::port::{Port, PortTable};

#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Number of slots in the MAC learning table.
    pub fdb_capacity: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            fdb_capacity: DEFAULT_FDB_CAPACITY,
        }
    }
}

/// One emission the caller must perform for a processed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Deliver `frame` on the given 1-based egress port.
    EmitFrame { port: u16, frame: Vec<u8> },
}

/// Why an ingress frame produced no emissions.
///
/// Drops are part of normal operation: the caller logs them at debug
/// verbosity at most and never reports anything to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDrop {
    /// No port with this 1-based index exists.
    UnknownIngressPort { port: u16 },
    /// Frame shorter than the (possibly tagged) Ethernet header.
    ShortFrame { needed: usize, actual: usize },
    /// Source MAC has the group bit set; such frames are never forwarded
    /// and never learned.
    MulticastSource { src: MacAddr },
    /// Tagged frame arrived on a port that is not a tagged member of its
    /// VID.
    VlanMismatch { port: u16, vid: u16 },
    /// Untagged frame arrived on a port with no untagged VLAN membership.
    NoVlanMembership { port: u16 },
    /// The destination was learned on a port outside the ingress VLAN's
    /// egress set; forwarding there would leak across VLANs, and falling
    /// back to flooding is forbidden.
    CrossVlanLearned { dst: MacAddr, port: u16, vid: u16 },
}

impl fmt::Display for FrameDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDrop::UnknownIngressPort { port } => {
                write!(f, "no such ingress port: {port}")
            }
            FrameDrop::ShortFrame { needed, actual } => {
                write!(f, "short frame ({actual} bytes, need {needed})")
            }
            FrameDrop::MulticastSource { src } => {
                write!(f, "multicast source address {src}")
            }
            FrameDrop::VlanMismatch { port, vid } => {
                write!(f, "port {port} is not a tagged member of VLAN {vid}")
            }
            FrameDrop::NoVlanMembership { port } => {
                write!(f, "port {port} has no untagged VLAN membership")
            }
            FrameDrop::CrossVlanLearned { dst, port, vid } => {
                write!(
                    f,
                    "destination {dst} learned on port {port} outside VLAN {vid}"
                )
            }
        }
    }
}

impl std::error::Error for FrameDrop {}

/// The switch aggregate: port table plus learning table.
///
/// `process_frame` is a pure function of the switch state and the ingress
/// frame; it buffers nothing and emissions are listed in egress-port order.
#[derive(Debug)]
pub struct Switch {
    ports: PortTable,
    fdb: Fdb,
}

impl Switch {
    pub fn new(ports: PortTable) -> Self {
        Self::with_config(ports, SwitchConfig::default())
    }

    pub fn with_config(ports: PortTable, cfg: SwitchConfig) -> Self {
        Self {
            ports,
            fdb: Fdb::new(cfg.fdb_capacity),
        }
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub fn fdb(&self) -> &Fdb {
        &self.fdb
    }

    /// Record a port's own MAC from the driver's startup control message.
    pub fn set_port_mac(&mut self, index: u16, mac: MacAddr) -> bool {
        self.ports.set_mac(index, mac)
    }

    /// Classify a frame received on the 1-based `ingress` port and compute
    /// its emissions.
    ///
    /// The source is learned before the destination is looked up, so a
    /// frame addressed to its own source resolves to the just-updated
    /// ingress port (and is then dropped, as the ingress port is never in
    /// its own egress set).
    pub fn process_frame(
        &mut self,
        ingress: u16,
        frame: &[u8],
    ) -> Result<Vec<Action>, FrameDrop> {
        let Some(ingress_port) = self.ports.get(ingress) else {
            return Err(FrameDrop::UnknownIngressPort { port: ingress });
        };

        let parsed = EthernetFrame::parse(frame).map_err(|err| match err {
            PacketError::Truncated { needed, actual }
            | PacketError::BufferTooSmall { needed, actual } => {
                FrameDrop::ShortFrame { needed, actual }
            }
        })?;

        let src = parsed.src_mac();
        let dst = parsed.dest_mac();
        if src.is_multicast() {
            return Err(FrameDrop::MulticastSource { src });
        }
        self.fdb.learn(src, ingress);

        let vid = match parsed.vlan_tag() {
            Some(tci) => {
                let vid = tci.vid();
                if !ingress_port.is_tagged_member(vid) {
                    return Err(FrameDrop::VlanMismatch { port: ingress, vid });
                }
                vid
            }
            None => match ingress_port.untagged_vlan() {
                Some(vlan) => vlan.as_u16(),
                None => return Err(FrameDrop::NoVlanMembership { port: ingress }),
            },
        };

        // Group destinations always flood; only unicast destinations may
        // take the learned fast path.
        let learned = if dst.is_unicast() {
            self.fdb.lookup(dst)
        } else {
            None
        };

        let mut actions = Vec::new();
        if let Some(target_index) = learned {
            match self.ports.get(target_index) {
                Some(target) if target_index != ingress && target.is_member(vid) => {
                    actions.push(Action::EmitFrame {
                        port: target_index,
                        frame: egress_frame(&parsed, target, vid),
                    });
                }
                _ => {
                    return Err(FrameDrop::CrossVlanLearned {
                        dst,
                        port: target_index,
                        vid,
                    })
                }
            }
        } else {
            for port in self.ports.iter() {
                if port.index() == ingress || !port.is_member(vid) {
                    continue;
                }
                actions.push(Action::EmitFrame {
                    port: port.index(),
                    frame: egress_frame(&parsed, port, vid),
                });
            }
        }

        Ok(actions)
    }
}

/// Shape `frame` for one egress port: tagged members carry the 802.1Q tag
/// (inserted with PCP = 0, DEI = 0 if the ingress was untagged, preserved
/// bit-for-bit otherwise), untagged members carry none. Payload bytes are
/// never touched.
fn egress_frame(frame: &EthernetFrame<'_>, egress: &Port, vid: u16) -> Vec<u8> {
    match (frame.vlan_tag(), egress.is_tagged_member(vid)) {
        (Some(_), true) | (None, false) => frame.as_bytes().to_vec(),
        (None, true) => VlanFrameBuilder {
            dest_mac: frame.dest_mac(),
            src_mac: frame.src_mac(),
            tci: Tci::from_vid(vid),
            ethertype: frame.ethertype(),
            payload: frame.payload(),
        }
        .build_vec(),
        (Some(_), false) => EthernetFrameBuilder {
            dest_mac: frame.dest_mac(),
            src_mac: frame.src_mac(),
            ethertype: frame.ethertype(),
            payload: frame.payload(),
        }
        .build_vec(),
    }
}
