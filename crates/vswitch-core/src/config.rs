//! Port specification grammar.
//!
//! Each port is configured by one command-line argument:
//!
//! ```text
//! NAME              untagged member of VLAN 0
//! NAME[U:VID]       untagged member of VID
//! NAME[T:VID,...]   tagged member of each listed VID
//! ```

use core::fmt;
use std::str::FromStr;

/// Largest VLAN ID accepted by the port-spec grammar.
pub const MAX_VLAN_ID: u16 = 4092;

/// Maximum number of tagged VLAN memberships per port.
pub const MAX_TAGGED_VLANS: usize = 4092;

/// VLAN assumed for a port spec that names no membership.
pub const DEFAULT_VLAN: VlanId = VlanId(0);

/// A validated VLAN identifier in `0..=4092`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VlanId(u16);

impl VlanId {
    pub fn new(raw: u16) -> Option<Self> {
        (raw <= MAX_VLAN_ID).then_some(Self(raw))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// VLAN membership named by one port spec.
///
/// The grammar produces exactly one of the two forms; a port is never both
/// tagged and untagged from a single spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Membership {
    Untagged(VlanId),
    /// Insertion-ordered, duplicates rejected by the parser.
    Tagged(Vec<VlanId>),
}

/// One parsed `PORTSPEC` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub membership: Membership,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecError {
    EmptyName,
    MissingCloseBracket,
    /// Bytes after the closing `]`.
    TrailingInput(String),
    EmptyMembership,
    UnknownMembership(char),
    /// The membership letter was not followed by `:`.
    MissingColon(char),
    EmptyVlanList,
    InvalidVlanId(String),
    VlanIdOutOfRange(u16),
    DuplicateVlanId(u16),
    TooManyVlans(usize),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::EmptyName => write!(f, "port name is empty"),
            SpecError::MissingCloseBracket => write!(f, "'[' without matching ']'"),
            SpecError::TrailingInput(rest) => {
                write!(f, "unexpected input after ']': {rest:?}")
            }
            SpecError::EmptyMembership => write!(f, "empty membership specification"),
            SpecError::UnknownMembership(c) => {
                write!(f, "unsupported membership kind {c:?} (expected 'T' or 'U')")
            }
            SpecError::MissingColon(c) => {
                write!(f, "membership kind {c:?} must be followed by ':'")
            }
            SpecError::EmptyVlanList => write!(f, "empty VLAN list"),
            SpecError::InvalidVlanId(tok) => write!(f, "expected a VLAN ID, got {tok:?}"),
            SpecError::VlanIdOutOfRange(vid) => {
                write!(f, "{vid} is too large for a 802.1Q VLAN ID (max {MAX_VLAN_ID})")
            }
            SpecError::DuplicateVlanId(vid) => write!(f, "VLAN {vid} listed twice"),
            SpecError::TooManyVlans(n) => {
                write!(f, "{n} tagged VLANs exceed the per-port limit of {MAX_TAGGED_VLANS}")
            }
        }
    }
}

impl std::error::Error for SpecError {}

fn parse_vid(token: &str) -> Result<VlanId, SpecError> {
    let raw: u16 = token
        .parse()
        .map_err(|_| SpecError::InvalidVlanId(token.to_string()))?;
    VlanId::new(raw).ok_or(SpecError::VlanIdOutOfRange(raw))
}

impl FromStr for PortSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(open) = s.find('[') else {
            if s.is_empty() {
                return Err(SpecError::EmptyName);
            }
            return Ok(Self {
                name: s.to_string(),
                membership: Membership::Untagged(DEFAULT_VLAN),
            });
        };

        let name = &s[..open];
        if name.is_empty() {
            return Err(SpecError::EmptyName);
        }

        let rest = &s[open + 1..];
        let close = rest.find(']').ok_or(SpecError::MissingCloseBracket)?;
        if close + 1 != rest.len() {
            return Err(SpecError::TrailingInput(rest[close + 1..].to_string()));
        }

        let body = &rest[..close];
        let kind = body.chars().next().ok_or(SpecError::EmptyMembership)?;
        let list = body[kind.len_utf8()..]
            .strip_prefix(':')
            .ok_or(SpecError::MissingColon(kind))?;

        let membership = match kind {
            'U' => Membership::Untagged(parse_vid(list)?),
            'T' => {
                if list.is_empty() {
                    return Err(SpecError::EmptyVlanList);
                }
                let mut vlans = Vec::new();
                for token in list.split(',') {
                    if vlans.len() == MAX_TAGGED_VLANS {
                        return Err(SpecError::TooManyVlans(vlans.len() + 1));
                    }
                    let vid = parse_vid(token)?;
                    if vlans.contains(&vid) {
                        return Err(SpecError::DuplicateVlanId(vid.as_u16()));
                    }
                    vlans.push(vid);
                }
                Membership::Tagged(vlans)
            }
            other => return Err(SpecError::UnknownMembership(other)),
        };

        Ok(Self {
            name: name.to_string(),
            membership,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_is_untagged_default_vlan() {
        let spec: PortSpec = "eth0".parse().unwrap();
        assert_eq!(spec.name, "eth0");
        assert_eq!(spec.membership, Membership::Untagged(DEFAULT_VLAN));
    }

    #[test]
    fn untagged_membership() {
        let spec: PortSpec = "lan[U:3]".parse().unwrap();
        assert_eq!(spec.name, "lan");
        assert_eq!(
            spec.membership,
            Membership::Untagged(VlanId::new(3).unwrap())
        );
    }

    #[test]
    fn tagged_membership_list() {
        let spec: PortSpec = "trunk[T:1,10,4092]".parse().unwrap();
        assert_eq!(spec.name, "trunk");
        let Membership::Tagged(vlans) = spec.membership else {
            panic!("expected tagged membership");
        };
        let vids: Vec<u16> = vlans.iter().map(|v| v.as_u16()).collect();
        assert_eq!(vids, vec![1, 10, 4092]);
    }

    #[test]
    fn rejects_malformed_specs() {
        assert_eq!("".parse::<PortSpec>(), Err(SpecError::EmptyName));
        assert_eq!("[U:1]".parse::<PortSpec>(), Err(SpecError::EmptyName));
        assert_eq!(
            "p1[U:1".parse::<PortSpec>(),
            Err(SpecError::MissingCloseBracket)
        );
        assert_eq!(
            "p1[U:1]x".parse::<PortSpec>(),
            Err(SpecError::TrailingInput("x".to_string()))
        );
        assert_eq!("p1[]".parse::<PortSpec>(), Err(SpecError::EmptyMembership));
        assert_eq!(
            "p1[X:1]".parse::<PortSpec>(),
            Err(SpecError::UnknownMembership('X'))
        );
        assert_eq!(
            "p1[T1]".parse::<PortSpec>(),
            Err(SpecError::MissingColon('T'))
        );
        assert_eq!("p1[T:]".parse::<PortSpec>(), Err(SpecError::EmptyVlanList));
        assert_eq!(
            "p1[T:1,,2]".parse::<PortSpec>(),
            Err(SpecError::InvalidVlanId(String::new()))
        );
        assert_eq!(
            "p1[U:abc]".parse::<PortSpec>(),
            Err(SpecError::InvalidVlanId("abc".to_string()))
        );
    }

    #[test]
    fn rejects_out_of_range_and_duplicate_vids() {
        assert_eq!(
            "p1[U:4093]".parse::<PortSpec>(),
            Err(SpecError::VlanIdOutOfRange(4093))
        );
        assert_eq!(
            "p1[T:1,2,1]".parse::<PortSpec>(),
            Err(SpecError::DuplicateVlanId(1))
        );
        // Too large even for u16.
        assert_eq!(
            "p1[U:70000]".parse::<PortSpec>(),
            Err(SpecError::InvalidVlanId("70000".to_string()))
        );
    }
}
