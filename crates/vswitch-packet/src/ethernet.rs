use super::{ensure_len, ensure_out_buf_len, MacAddr, PacketError};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
/// 802.1Q Tag Protocol Identifier.
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// An 802.1Q Tag Control Information field.
///
/// Layout (big-endian on the wire): 3-bit PCP, 1-bit DEI, 12-bit VID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tci(pub u16);

impl Tci {
    /// A TCI carrying only a VLAN ID (PCP = 0, DEI = 0).
    pub fn from_vid(vid: u16) -> Self {
        Self(vid & 0x0fff)
    }

    pub fn vid(self) -> u16 {
        self.0 & 0x0fff
    }

    pub fn pcp(self) -> u8 {
        (self.0 >> 13) as u8
    }

    pub fn dei(self) -> bool {
        self.0 & 0x1000 != 0
    }
}

/// An Ethernet II frame, possibly carrying a single 802.1Q tag.
#[derive(Clone, Copy, Debug)]
pub struct EthernetFrame<'a> {
    data: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Untagged header: dst MAC, src MAC, EtherType.
    pub const HEADER_LEN: usize = 14;
    /// Header with an 802.1Q shim between source MAC and EtherType.
    pub const TAGGED_HEADER_LEN: usize = 18;

    /// Parse a frame. Requires 14 bytes, or 18 when the two bytes at offset
    /// 12 are the 802.1Q TPID (the tag must then be fully present).
    pub fn parse(data: &'a [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Self::HEADER_LEN)?;
        if u16::from_be_bytes([data[12], data[13]]) == ETHERTYPE_VLAN {
            ensure_len(data, Self::TAGGED_HEADER_LEN)?;
        }
        Ok(Self { data })
    }

    pub fn dest_mac(&self) -> MacAddr {
        let mut b = [0u8; 6];
        b.copy_from_slice(&self.data[0..6]);
        MacAddr(b)
    }

    pub fn src_mac(&self) -> MacAddr {
        let mut b = [0u8; 6];
        b.copy_from_slice(&self.data[6..12]);
        MacAddr(b)
    }

    /// The 16-bit field at offset 12: the TPID for tagged frames, the
    /// EtherType otherwise.
    pub fn tpid_or_ethertype(&self) -> u16 {
        u16::from_be_bytes([self.data[12], self.data[13]])
    }

    pub fn has_vlan_tag(&self) -> bool {
        self.tpid_or_ethertype() == ETHERTYPE_VLAN
    }

    pub fn vlan_tag(&self) -> Option<Tci> {
        self.has_vlan_tag()
            .then(|| Tci(u16::from_be_bytes([self.data[14], self.data[15]])))
    }

    /// The frame's EtherType: the inner EtherType for tagged frames.
    pub fn ethertype(&self) -> u16 {
        if self.has_vlan_tag() {
            u16::from_be_bytes([self.data[16], self.data[17]])
        } else {
            u16::from_be_bytes([self.data[12], self.data[13]])
        }
    }

    pub fn header_len(&self) -> usize {
        if self.has_vlan_tag() {
            Self::TAGGED_HEADER_LEN
        } else {
            Self::HEADER_LEN
        }
    }

    /// Bytes after the (possibly tagged) Ethernet header.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.header_len()..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// Serialize an untagged Ethernet II frame into an output buffer.
pub struct EthernetFrameBuilder<'a> {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: u16,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrameBuilder<'a> {
    pub fn len(&self) -> usize {
        EthernetFrame::HEADER_LEN + self.payload.len()
    }

    pub fn build_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.len()];
        let len = self.write(&mut buf).expect("sized buffer");
        debug_assert_eq!(len, buf.len());
        buf
    }

    pub fn write(&self, out: &mut [u8]) -> Result<usize, PacketError> {
        let needed = self.len();
        ensure_out_buf_len(out, needed)?;
        out[0..6].copy_from_slice(&self.dest_mac.0);
        out[6..12].copy_from_slice(&self.src_mac.0);
        out[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        out[14..needed].copy_from_slice(self.payload);
        Ok(needed)
    }
}

/// Serialize an 802.1Q-tagged Ethernet frame: the 4-byte `TPID ‖ TCI` shim
/// sits between the source MAC and the inner EtherType.
pub struct VlanFrameBuilder<'a> {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub tci: Tci,
    pub ethertype: u16,
    pub payload: &'a [u8],
}

impl<'a> VlanFrameBuilder<'a> {
    pub fn len(&self) -> usize {
        EthernetFrame::TAGGED_HEADER_LEN + self.payload.len()
    }

    pub fn build_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.len()];
        let len = self.write(&mut buf).expect("sized buffer");
        debug_assert_eq!(len, buf.len());
        buf
    }

    pub fn write(&self, out: &mut [u8]) -> Result<usize, PacketError> {
        let needed = self.len();
        ensure_out_buf_len(out, needed)?;
        out[0..6].copy_from_slice(&self.dest_mac.0);
        out[6..12].copy_from_slice(&self.src_mac.0);
        out[12..14].copy_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        out[14..16].copy_from_slice(&self.tci.0.to_be_bytes());
        out[16..18].copy_from_slice(&self.ethertype.to_be_bytes());
        out[18..needed].copy_from_slice(self.payload);
        Ok(needed)
    }
}
