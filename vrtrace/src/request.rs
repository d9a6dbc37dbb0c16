//! Builders for the requests a control-plane client sends to the kernel.
//!
//! Each `*Config` carries the kernel's usual defaults in its `Default`
//! impl; set the mandatory fields and hand it to the matching constructor.

use std::net::IpAddr;

use serde::Serialize;
use thiserror::Error;

use crate::message::{
    FlowOp, Sandesh, SandeshMessage, SandeshOp, VrFlowReq, VrInterfaceReq, VrNexthopReq,
    VrResponse, VrRouteReq, VrVxlanReq,
};
use crate::protocol::{MemoryBuffer, Protocol, ProtocolConfig, ProtocolError, SandeshProtocol};

pub const AF_INET: i32 = 2;
pub const AF_BRIDGE: i32 = 7;
pub const AF_INET6: i32 = 10;

pub const ETH_ALEN: usize = 6;

pub const VIF_TYPE_HOST: i32 = 0;
pub const VIF_TYPE_AGENT: i32 = 1;
pub const VIF_TYPE_PHYSICAL: i32 = 2;
pub const VIF_TYPE_VIRTUAL: i32 = 3;

pub const VIF_TRANSPORT_VIRTUAL: i8 = 0;
pub const VIF_TRANSPORT_ETH: i8 = 1;
pub const VIF_TRANSPORT_PMD: i8 = 2;
pub const VIF_TRANSPORT_SOCKET: i8 = 3;

pub const VIF_FLAG_POLICY_ENABLED: i32 = 0x1;
pub const VIF_FLAG_L3_ENABLED: i32 = 0x40;
pub const VIF_FLAG_L2_ENABLED: i32 = 0x80;
pub const VIF_FLAG_DHCP_ENABLED: i32 = 0x100;

pub const NH_TYPE_RCV: i8 = 1;
pub const NH_TYPE_ENCAP: i8 = 2;
pub const NH_FLAG_VALID: u32 = 0x1;

pub const VR_FLOW_ACTION_DROP: i16 = 0;
pub const VR_FLOW_ACTION_HOLD: i16 = 1;
pub const VR_FLOW_ACTION_FORWARD: i16 = 2;
pub const VR_FLOW_ACTION_NAT: i16 = 3;

/// Generic netlink attribute header preceding the Sandesh payload of a reply.
pub const NL_ATTR_HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),

    #[error("invalid IP address: {0:?}")]
    InvalidIp(String),

    #[error("address {addr} does not belong to address family {family}")]
    FamilyMismatch { addr: IpAddr, family: i32 },

    #[error("prefix length {len} is out of range for address family {family}")]
    PrefixLen { len: i32, family: i32 },

    #[error("reply payload is {0} bytes, shorter than its attribute header")]
    ShortPayload(usize),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T, E = RequestError> = std::result::Result<T, E>;

/// Serialise one request with a fresh session.
pub fn encode<S: Sandesh>(msg: &S, cfg: &ProtocolConfig) -> Result<Vec<u8>, ProtocolError> {
    let mut p = SandeshProtocol::with_config(MemoryBuffer::new(), *cfg);
    msg.write(&mut p)?;
    p.flush()?;
    Ok(p.into_inner().take_bytes())
}

/// A decoded kernel reply: the response header plus any objects that
/// followed it (dump and get requests).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub header: VrResponse,
    pub objects: Vec<SandeshMessage>,
}

/// Decode the data of a reply netlink message, attribute header included.
pub fn decode_response(payload: &[u8], cfg: &ProtocolConfig) -> Result<Response> {
    let body = payload
        .get(NL_ATTR_HEADER_LEN..)
        .ok_or(RequestError::ShortPayload(payload.len()))?;
    let mut p = SandeshProtocol::with_config(MemoryBuffer::from_bytes(body), *cfg);

    let header = VrResponse::read(&mut p)?;
    let mut objects = Vec::new();
    while !p.transport().is_empty() {
        objects.push(SandeshMessage::read(&mut p)?);
    }
    if header.resp_code < 0 {
        tracing::debug!(resp_code = header.resp_code, "kernel rejected request");
    }
    Ok(Response { header, objects })
}

macro_rules! request_wrapper {
    ($(#[$meta:meta])* $name:ident => $req:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            req: $req,
        }

        impl $name {
            pub fn req(&self) -> &$req {
                &self.req
            }

            pub fn req_mut(&mut self) -> &mut $req {
                &mut self.req
            }

            pub fn into_req(self) -> $req {
                self.req
            }

            pub fn encode(&self, cfg: &ProtocolConfig) -> Result<Vec<u8>, ProtocolError> {
                encode(&self.req, cfg)
            }
        }

        impl From<$name> for $req {
            fn from(wrapper: $name) -> $req {
                wrapper.req
            }
        }
    };
}

// ── Parsing helpers ───────────────────────────────────────────────────────

pub fn parse_mac(s: &str) -> Result<[u8; ETH_ALEN]> {
    let mut mac = [0u8; ETH_ALEN];
    let mut parts = s.split(&[':', '-'][..]);
    for byte in mac.iter_mut() {
        let part = parts
            .next()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| RequestError::InvalidMac(s.to_string()))?;
        *byte = u8::from_str_radix(part, 16).map_err(|_| RequestError::InvalidMac(s.to_string()))?;
    }
    if parts.next().is_some() {
        return Err(RequestError::InvalidMac(s.to_string()));
    }
    Ok(mac)
}

pub fn parse_ip(s: &str) -> Result<IpAddr> {
    s.parse().map_err(|_| RequestError::InvalidIp(s.to_string()))
}

/// Split an address into the `(upper, lower)` halves the flow table keys on.
///
/// The halves are the address bytes read little-endian: an IPv4 address
/// occupies the low 32 bits of `lower`, an IPv6 address is bytes 0..8 and
/// 8..16. IPv4 addresses are mapped into IPv6 for `AF_INET6`.
pub fn ip_halves(family: i32, addr: IpAddr) -> Result<(u64, u64)> {
    match family {
        AF_INET => {
            let v4 = match addr {
                IpAddr::V4(v4) => v4,
                IpAddr::V6(v6) => v6
                    .to_ipv4_mapped()
                    .ok_or(RequestError::FamilyMismatch { addr, family })?,
            };
            Ok((0, u32::from_le_bytes(v4.octets()) as u64))
        }
        AF_INET6 => {
            let o = match addr {
                IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
                IpAddr::V6(v6) => v6.octets(),
            };
            let mut upper = [0u8; 8];
            let mut lower = [0u8; 8];
            upper.copy_from_slice(&o[..8]);
            lower.copy_from_slice(&o[8..]);
            Ok((u64::from_le_bytes(upper), u64::from_le_bytes(lower)))
        }
        _ => Ok((0, 0)),
    }
}

/// The kernel stores a vif's IPv4 address as the little-endian read of its
/// octets. For IPv6 input the last four bytes are used.
fn vif_ip(addr: IpAddr) -> u32 {
    let o = match addr {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(v6) => {
            let o = v6.octets();
            [o[12], o[13], o[14], o[15]]
        }
    };
    u32::from_le_bytes(o)
}

// ── Flows ─────────────────────────────────────────────────────────────────

request_wrapper! {
    /// A `vr_flow_req` installing one flow entry.
    Flow => VrFlowReq
}

/// Everything a flow entry can carry. The public configs fill a subset.
#[derive(Debug, Clone, Default)]
struct FlowParams {
    rid: i16,
    index: i32,
    action: i16,
    flags: i16,
    rindex: i32,
    family: i32,
    src_ip: Option<IpAddr>,
    dst_ip: Option<IpAddr>,
    src_port: u16,
    dst_port: u16,
    proto: i8,
    vrf: u16,
    dst_vrf: u16,
    mir_id: u16,
    sec_mir_id: u16,
    mir_src_ip: Option<IpAddr>,
    mir_src_port: u16,
    pcap_meta_data: Vec<u8>,
    mir_vrf: u16,
    ecmp_nh_index: u32,
    src_nh_index: u32,
    nh_id: u32,
    drop_reason: u16,
    gen_id: i8,
    reverse_src_ip: Option<IpAddr>,
    reverse_dst_ip: Option<IpAddr>,
    reverse_nh_id: u32,
    reverse_src_port: u16,
    reverse_dst_port: u16,
    qos_id: u16,
    ttl: i8,
    extflags: i16,
    flags1: i16,
    underlay_ecmp_idx: i8,
}

impl Flow {
    fn from_params(params: FlowParams) -> Result<Flow> {
        let halves = |addr: Option<IpAddr>| match addr {
            Some(addr) => ip_halves(params.family, addr),
            None => Ok((0, 0)),
        };
        let (sip_u, sip_l) = halves(params.src_ip)?;
        let (dip_u, dip_l) = halves(params.dst_ip)?;
        let (rsip_u, rsip_l) = halves(params.reverse_src_ip)?;
        let (rdip_u, rdip_l) = halves(params.reverse_dst_ip)?;
        let mir_sip = match params.mir_src_ip {
            Some(IpAddr::V4(v4)) => u32::from_le_bytes(v4.octets()),
            _ => 0,
        };

        Ok(Flow {
            req: VrFlowReq {
                fr_op: FlowOp::FLOW_SET,
                fr_rid: params.rid,
                fr_index: params.index,
                fr_action: params.action,
                fr_flags: params.flags,
                fr_rindex: params.rindex,
                fr_family: params.family,
                fr_flow_sip_u: sip_u,
                fr_flow_sip_l: sip_l,
                fr_flow_dip_u: dip_u,
                fr_flow_dip_l: dip_l,
                fr_flow_sport: params.src_port,
                fr_flow_dport: params.dst_port,
                fr_flow_proto: params.proto,
                fr_flow_vrf: params.vrf,
                fr_flow_dvrf: params.dst_vrf,
                fr_mir_id: params.mir_id,
                fr_sec_mir_id: params.sec_mir_id,
                fr_mir_sip: mir_sip,
                fr_mir_sport: params.mir_src_port,
                fr_pcap_meta_data: params.pcap_meta_data,
                fr_mir_vrf: params.mir_vrf,
                fr_ecmp_nh_index: params.ecmp_nh_index,
                fr_src_nh_index: params.src_nh_index,
                fr_flow_nh_id: params.nh_id,
                fr_drop_reason: params.drop_reason,
                fr_gen_id: params.gen_id,
                fr_rflow_sip_u: rsip_u,
                fr_rflow_sip_l: rsip_l,
                fr_rflow_dip_u: rdip_u,
                fr_rflow_dip_l: rdip_l,
                fr_rflow_nh_id: params.reverse_nh_id,
                fr_rflow_sport: params.reverse_src_port,
                fr_rflow_dport: params.reverse_dst_port,
                fr_qos_id: params.qos_id,
                fr_ttl: params.ttl,
                fr_extflags: params.extflags,
                fr_flags1: params.flags1,
                fr_underlay_ecmp_index: params.underlay_ecmp_idx,
            },
        })
    }

    /// IPv4 flow. The reverse flow is the forward one with source and
    /// destination swapped.
    pub fn inet(conf: &InetFlowConfig) -> Result<Flow> {
        let src = parse_ip(&conf.src_ip)?;
        let dst = parse_ip(&conf.dst_ip)?;
        Flow::from_params(FlowParams {
            index: conf.index,
            action: conf.action,
            flags: conf.flags,
            family: AF_INET,
            src_ip: Some(src),
            dst_ip: Some(dst),
            src_port: conf.src_port,
            dst_port: conf.dst_port,
            proto: conf.protocol,
            nh_id: conf.nexthop as u32,
            vrf: conf.vrf as u16,
            reverse_nh_id: conf.reverse_nexthop as u32,
            reverse_src_ip: Some(dst),
            reverse_dst_ip: Some(src),
            reverse_src_port: conf.dst_port,
            reverse_dst_port: conf.src_port,
            ..Default::default()
        })
    }

    pub fn inet6(conf: &Inet6FlowConfig) -> Result<Flow> {
        let src = parse_ip(&conf.src_ip)?;
        let dst = parse_ip(&conf.dst_ip)?;
        Flow::from_params(FlowParams {
            flags: conf.flags,
            family: AF_INET6,
            src_ip: Some(src),
            dst_ip: Some(dst),
            src_port: conf.src_port,
            dst_port: conf.dst_port,
            proto: conf.protocol,
            nh_id: conf.nexthop as u32,
            vrf: conf.vrf as u16,
            reverse_nh_id: conf.reverse_nexthop as u32,
            reverse_src_ip: Some(dst),
            reverse_dst_ip: Some(src),
            reverse_src_port: conf.dst_port,
            reverse_dst_port: conf.src_port,
            ..Default::default()
        })
    }

    /// IPv4 flow with NAT. The reverse tuple is given explicitly and is
    /// installed swapped, like the forward tuple of the reverse direction.
    pub fn nat(conf: &NatFlowConfig) -> Result<Flow> {
        Flow::from_params(FlowParams {
            family: AF_INET,
            action: VR_FLOW_ACTION_NAT,
            src_ip: Some(parse_ip(&conf.src_ip)?),
            dst_ip: Some(parse_ip(&conf.dst_ip)?),
            src_port: conf.src_port,
            dst_port: conf.dst_port,
            proto: conf.protocol,
            nh_id: conf.nexthop as u32,
            src_nh_index: conf.src_nexthop as u32,
            vrf: conf.vrf as u16,
            dst_vrf: conf.dvrf as u16,
            reverse_nh_id: conf.reverse_nexthop as u32,
            flags: conf.flags as i16,
            reverse_src_ip: Some(parse_ip(&conf.reverse_dst_ip)?),
            reverse_dst_ip: Some(parse_ip(&conf.reverse_src_ip)?),
            reverse_src_port: conf.dst_port,
            reverse_dst_port: conf.reverse_src_port,
            qos_id: conf.qos_id as u16,
            ecmp_nh_index: conf.ecmp_nexthop as u32,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InetFlowConfig {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: i8,
    pub action: i16,
    pub index: i32,
    pub flags: i16,
    pub nexthop: i32,
    pub reverse_nexthop: i32,
    pub vrf: i16,
}

impl Default for InetFlowConfig {
    fn default() -> Self {
        Self {
            src_ip: "0.0.0.0".into(),
            dst_ip: "0.0.0.0".into(),
            src_port: 0,
            dst_port: 0,
            protocol: 0,
            action: VR_FLOW_ACTION_FORWARD,
            index: -1,
            flags: 1,
            nexthop: 0,
            reverse_nexthop: 0,
            vrf: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inet6FlowConfig {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: i8,
    pub flags: i16,
    pub nexthop: i32,
    pub reverse_nexthop: i32,
    pub vrf: i16,
}

impl Default for Inet6FlowConfig {
    fn default() -> Self {
        Self {
            src_ip: "::".into(),
            dst_ip: "::".into(),
            src_port: 0,
            dst_port: 0,
            protocol: 0,
            flags: 1,
            nexthop: 0,
            reverse_nexthop: 0,
            vrf: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NatFlowConfig {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: i8,
    pub dvrf: i16,
    pub reverse_src_ip: String,
    pub reverse_dst_ip: String,
    pub flags: u16,
    pub nexthop: i32,
    pub src_nexthop: i32,
    pub qos_id: i16,
    pub ecmp_nexthop: i32,
    pub vrf: i16,
    pub reverse_nexthop: i32,
    pub reverse_src_port: u16,
}

impl Default for NatFlowConfig {
    fn default() -> Self {
        Self {
            src_ip: "0.0.0.0".into(),
            dst_ip: "0.0.0.0".into(),
            src_port: 0,
            dst_port: 0,
            protocol: 0,
            dvrf: 0,
            reverse_src_ip: "0.0.0.0".into(),
            reverse_dst_ip: "0.0.0.0".into(),
            flags: 1,
            nexthop: 0,
            src_nexthop: 0,
            qos_id: 0,
            ecmp_nexthop: 0,
            vrf: 0,
            reverse_nexthop: 0,
            reverse_src_port: 0,
        }
    }
}

// ── Nexthops ──────────────────────────────────────────────────────────────

request_wrapper! {
    /// A `vr_nexthop_req` adding one nexthop.
    Nexthop => VrNexthopReq
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncapNexthopConfig {
    pub idx: i32,
    pub encap_outer_vif_id: Vec<i32>,
    /// Link-layer header to prepend, usually dst MAC, src MAC, ethertype.
    pub encap: Vec<u8>,
    pub flags: u32,
    pub family: i8,
    pub encap_family: i32,
    pub vrf: i32,
}

impl Default for EncapNexthopConfig {
    fn default() -> Self {
        Self {
            idx: 0,
            encap_outer_vif_id: Vec::new(),
            encap: Vec::new(),
            flags: NH_FLAG_VALID,
            family: AF_INET as i8,
            encap_family: 0,
            vrf: 0,
        }
    }
}

pub type ReceiveNexthopConfig = EncapNexthopConfig;

impl Nexthop {
    fn build(nh_type: i8, conf: &EncapNexthopConfig) -> Nexthop {
        Nexthop {
            req: VrNexthopReq {
                h_op: SandeshOp::ADD,
                nhr_type: nh_type,
                nhr_family: conf.family,
                nhr_id: conf.idx,
                nhr_vrf: conf.vrf,
                nhr_flags: conf.flags | NH_FLAG_VALID,
                nhr_encap_oif_id: conf.encap_outer_vif_id.clone(),
                nhr_encap_len: conf.encap.len() as i32,
                nhr_encap: conf.encap.clone(),
                nhr_encap_family: conf.encap_family,
                ..Default::default()
            },
        }
    }

    pub fn encap(conf: &EncapNexthopConfig) -> Nexthop {
        Nexthop::build(NH_TYPE_ENCAP, conf)
    }

    pub fn receive(conf: &ReceiveNexthopConfig) -> Nexthop {
        Nexthop::build(NH_TYPE_RCV, conf)
    }
}

// ── Interfaces ────────────────────────────────────────────────────────────

request_wrapper! {
    /// A `vr_interface_req` adding one vif.
    Vif => VrInterfaceReq
}

/// Identity shared by every vif kind.
struct VifBase<'a> {
    idx: i32,
    vif_type: i32,
    name: &'a str,
    os_idx: i32,
    ip: &'a str,
    mac: &'a str,
    transport: i8,
}

impl Vif {
    fn base(b: VifBase<'_>) -> Result<Vif> {
        let mac = parse_mac(b.mac)?;
        let ip = parse_ip(b.ip)?;
        Ok(Vif {
            req: VrInterfaceReq {
                h_op: SandeshOp::ADD,
                vifr_idx: b.idx,
                vifr_type: b.vif_type,
                vifr_name: b.name.to_string(),
                vifr_os_idx: b.os_idx,
                vifr_transport: b.transport,
                vifr_ip: vif_ip(ip),
                vifr_mac: mac.to_vec(),
                ..Default::default()
            },
        })
    }

    /// The agent's packet interface (`pkt0`).
    pub fn agent(conf: &AgentVifConfig) -> Result<Vif> {
        let mut vif = Vif::base(VifBase {
            idx: conf.idx,
            vif_type: VIF_TYPE_AGENT,
            name: &conf.name,
            os_idx: conf.os_idx,
            ip: "0.0.0.0",
            mac: "00:00:5e:00:01:00",
            transport: VIF_TRANSPORT_SOCKET,
        })?;
        vif.req.vifr_vrf = conf.vrf;
        vif.req.vifr_mcast_vrf = conf.mcast_vrf;
        vif.req.vifr_mtu = conf.mtu;
        vif.req.vifr_flags = conf.flags;
        Ok(vif)
    }

    pub fn vhost(conf: &VhostVifConfig) -> Result<Vif> {
        let mut vif = Vif::base(VifBase {
            idx: conf.idx,
            vif_type: VIF_TYPE_HOST,
            name: &conf.name,
            os_idx: conf.os_idx,
            ip: &conf.ip_addr,
            mac: &conf.mac_addr,
            transport: conf.transport,
        })?;
        vif.req.vifr_nh_id = conf.nexthop;
        vif.req.vifr_vrf = conf.vrf;
        vif.req.vifr_cross_connect_idx = conf
            .cross_connect
            .iter()
            .copied()
            .filter(|&idx| idx > 0)
            .collect();
        vif.req.vifr_mcast_vrf = conf.mcast_vrf as i32;
        vif.req.vifr_mtu = conf.mtu;
        vif.req.vifr_flags = conf.flags;
        Ok(vif)
    }

    pub fn fabric(conf: &FabricVifConfig) -> Result<Vif> {
        let mut vif = Vif::base(VifBase {
            idx: conf.idx,
            vif_type: VIF_TYPE_PHYSICAL,
            name: &conf.name,
            os_idx: conf.os_idx,
            ip: &conf.ip_addr,
            mac: &conf.mac_addr,
            transport: conf.transport,
        })?;
        vif.req.vifr_vrf = conf.vrf;
        vif.req.vifr_mcast_vrf = conf.mcast_vrf as i32;
        vif.req.vifr_mtu = conf.mtu;
        vif.req.vifr_flags = conf.flags;
        Ok(vif)
    }

    /// A VM-facing tap interface.
    pub fn virtual_vif(conf: &VirtualVifConfig) -> Result<Vif> {
        let mut vif = Vif::base(VifBase {
            idx: conf.idx,
            vif_type: VIF_TYPE_VIRTUAL,
            name: &conf.name,
            os_idx: conf.os_idx,
            ip: &conf.ip_addr,
            mac: &conf.mac_addr,
            transport: conf.transport,
        })?;
        vif.req.vifr_nh_id = conf.nexthop;
        vif.req.vifr_mtu = conf.mtu;
        vif.req.vifr_flags = conf.flags;
        vif.req.vifr_vrf = conf.vrf;
        vif.req.vifr_mcast_vrf = conf.mcast_vrf as i32;
        Ok(vif)
    }
}

// `os_idx` is the host ifindex of `name`; resolving it is left to the caller.

#[derive(Debug, Clone, PartialEq)]
pub struct AgentVifConfig {
    pub name: String,
    pub idx: i32,
    pub os_idx: i32,
    pub vrf: i32,
    pub mcast_vrf: i32,
    pub mtu: i32,
    pub flags: i32,
}

impl Default for AgentVifConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            idx: 0,
            os_idx: 0,
            vrf: 65535,
            mcast_vrf: 65535,
            mtu: 1514,
            flags: VIF_FLAG_L3_ENABLED | VIF_FLAG_DHCP_ENABLED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VhostVifConfig {
    pub idx: i32,
    pub name: String,
    pub os_idx: i32,
    pub ip_addr: String,
    pub mac_addr: String,
    pub nexthop: i32,
    pub mcast_vrf: u32,
    pub mtu: i32,
    pub flags: i32,
    pub transport: i8,
    pub vrf: i32,
    /// Host ifindexes of the cross-connected interfaces. Non-positive
    /// entries are dropped.
    pub cross_connect: Vec<i32>,
}

impl Default for VhostVifConfig {
    fn default() -> Self {
        Self {
            idx: 0,
            name: String::new(),
            os_idx: 0,
            ip_addr: "0.0.0.0".into(),
            mac_addr: String::new(),
            nexthop: 0,
            mcast_vrf: 65535,
            mtu: 1514,
            flags: VIF_FLAG_L2_ENABLED | VIF_FLAG_DHCP_ENABLED,
            transport: VIF_TRANSPORT_ETH,
            vrf: 0,
            cross_connect: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FabricVifConfig {
    pub idx: i32,
    pub name: String,
    pub os_idx: i32,
    pub mac_addr: String,
    pub ip_addr: String,
    pub mcast_vrf: u32,
    pub mtu: i32,
    pub flags: i32,
    pub transport: i8,
    pub vrf: i32,
}

impl Default for FabricVifConfig {
    fn default() -> Self {
        Self {
            idx: 0,
            name: String::new(),
            os_idx: 0,
            mac_addr: String::new(),
            ip_addr: "0.0.0.0".into(),
            mcast_vrf: 65535,
            mtu: 1514,
            flags: 322,
            transport: VIF_TRANSPORT_ETH,
            vrf: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualVifConfig {
    pub idx: i32,
    pub name: String,
    pub os_idx: i32,
    pub mac_addr: String,
    pub ip_addr: String,
    pub nexthop: i32,
    pub mtu: i32,
    pub flags: i32,
    pub transport: i8,
    pub vrf: i32,
    pub mcast_vrf: u32,
}

impl Default for VirtualVifConfig {
    fn default() -> Self {
        Self {
            idx: 0,
            name: String::new(),
            os_idx: 0,
            mac_addr: "00:00:00:00:00:00".into(),
            ip_addr: "0.0.0.0".into(),
            nexthop: 0,
            mtu: 1514,
            flags: VIF_FLAG_POLICY_ENABLED,
            transport: VIF_TRANSPORT_ETH,
            vrf: 0,
            mcast_vrf: 65535,
        }
    }
}

// ── Routes ────────────────────────────────────────────────────────────────

request_wrapper! {
    /// A `vr_route_req` adding one route.
    Route => VrRouteReq
}

struct RouteBase<'a> {
    family: i32,
    vrf: i32,
    prefix: &'a [u8],
    prefix_len: i32,
    mac: &'a str,
    nh_idx: i32,
    label_flags: i16,
    label: i32,
}

impl Route {
    fn base(b: RouteBase<'_>) -> Result<Route> {
        let max = b.prefix.len() as i32 * 8;
        if b.prefix_len < 0 || b.prefix_len > max {
            return Err(RequestError::PrefixLen {
                len: b.prefix_len,
                family: b.family,
            });
        }
        let mac = if b.mac.is_empty() {
            [0; ETH_ALEN]
        } else {
            parse_mac(b.mac)?
        };
        Ok(Route {
            req: VrRouteReq {
                h_op: SandeshOp::ADD,
                rtr_family: b.family,
                rtr_vrf_id: b.vrf,
                rtr_mac: mac.to_vec(),
                rtr_prefix: b.prefix[..(b.prefix_len / 8) as usize].to_vec(),
                rtr_prefix_len: b.prefix_len,
                rtr_nh_id: b.nh_idx,
                rtr_label_flags: b.label_flags,
                rtr_label: b.label,
                ..Default::default()
            },
        })
    }

    /// Layer 2 route keyed on a MAC address.
    pub fn bridge(conf: &BridgeRouteConfig) -> Result<Route> {
        Route::base(RouteBase {
            family: AF_BRIDGE,
            vrf: conf.vrf,
            prefix: &[],
            prefix_len: 0,
            mac: &conf.mac_address,
            nh_idx: conf.nh_idx,
            label_flags: 0,
            label: 0,
        })
    }

    pub fn inet(conf: &InetRouteConfig) -> Result<Route> {
        let prefix = match parse_ip(&conf.ip_address)? {
            IpAddr::V4(v4) => v4.octets(),
            addr => {
                return Err(RequestError::FamilyMismatch {
                    addr,
                    family: AF_INET,
                })
            }
        };
        Route::base(RouteBase {
            family: AF_INET,
            vrf: conf.vrf,
            prefix: &prefix,
            prefix_len: conf.prefix_len,
            mac: &conf.mac_address,
            nh_idx: conf.nh_idx,
            label_flags: conf.label_flag,
            label: conf.label,
        })
    }

    pub fn inet6(conf: &Inet6RouteConfig) -> Result<Route> {
        let prefix = match parse_ip(&conf.ip_address)? {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        };
        Route::base(RouteBase {
            family: AF_INET6,
            vrf: conf.vrf,
            prefix: &prefix,
            prefix_len: conf.prefix_len,
            mac: &conf.mac_address,
            nh_idx: conf.nh_idx,
            label_flags: conf.label_flag,
            label: conf.label,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeRouteConfig {
    pub vrf: i32,
    pub nh_idx: i32,
    pub mac_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InetRouteConfig {
    pub vrf: i32,
    pub nh_idx: i32,
    pub ip_address: String,
    pub prefix_len: i32,
    pub mac_address: String,
    pub label_flag: i16,
    pub label: i32,
}

impl Default for InetRouteConfig {
    fn default() -> Self {
        Self {
            vrf: 0,
            nh_idx: 0,
            ip_address: "0.0.0.0".into(),
            prefix_len: 32,
            mac_address: "00:00:00:00:00:00".into(),
            label_flag: 0,
            label: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inet6RouteConfig {
    pub vrf: i32,
    pub nh_idx: i32,
    pub ip_address: String,
    pub prefix_len: i32,
    pub mac_address: String,
    pub label_flag: i16,
    pub label: i32,
}

impl Default for Inet6RouteConfig {
    fn default() -> Self {
        Self {
            vrf: 0,
            nh_idx: 0,
            ip_address: "::".into(),
            prefix_len: 128,
            mac_address: String::new(),
            label_flag: 0,
            label: 0,
        }
    }
}

// ── VXLAN ─────────────────────────────────────────────────────────────────

request_wrapper! {
    /// A `vr_vxlan_req` mapping a VNI to a nexthop.
    Vxlan => VrVxlanReq
}

impl Vxlan {
    pub fn new(rid: i16, vnid: i32, nhid: i32) -> Vxlan {
        Vxlan {
            req: VrVxlanReq {
                h_op: SandeshOp::ADD,
                vxlanr_rid: rid,
                vxlanr_vnid: vnid,
                vxlanr_nhid: nhid,
            },
        }
    }
}
