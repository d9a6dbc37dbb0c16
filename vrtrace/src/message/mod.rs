//! Messages exchanged with the vRouter kernel module.

pub mod dynamic;
pub mod records;
pub mod wire;

use serde::Serialize;

use crate::catalog::StructKind;
use crate::protocol::{Protocol, ProtocolError, Result};

pub use dynamic::{FieldBag, Value};
pub use records::{
    VrFlowReq, VrInterfaceReq, VrMplsReq, VrNexthopReq, VrResponse, VrRouteReq, VrVrfAssignReq,
    VrVrfStatsReq, VrVxlanReq,
};
pub use wire::{FlowOp, SandeshOp, WireValue};

/// A struct with a fixed Sandesh encoding.
pub trait Sandesh: Sized {
    const KIND: StructKind;

    /// Write the whole struct, name header through STOP.
    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()>;

    /// Read the fields of a struct whose name has already been consumed.
    fn read_body<P: Protocol + ?Sized>(p: &mut P) -> Result<Self>;

    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        let name = p.read_struct_begin()?;
        if name != Self::KIND.name() {
            return Err(ProtocolError::invalid_data(format!(
                "expected {}, found {name}",
                Self::KIND
            )));
        }
        Self::read_body(p)
    }
}

/// Any struct that can arrive from the kernel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandeshMessage {
    Interface(VrInterfaceReq),
    Route(VrRouteReq),
    Nexthop(VrNexthopReq),
    VrfAssign(VrVrfAssignReq),
    Mpls(VrMplsReq),
    VrfStats(VrVrfStatsReq),
    Response(VrResponse),
    Vxlan(VrVxlanReq),
    Flow(VrFlowReq),
    /// Kinds without a typed record, and names the catalog does not know.
    Other(FieldBag),
}

impl SandeshMessage {
    /// Read one struct and dispatch on its name.
    pub fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        let name = p.read_struct_begin()?;
        let msg = match StructKind::from_name(&name) {
            Some(StructKind::VrInterfaceReq) => Self::Interface(VrInterfaceReq::read_body(p)?),
            Some(StructKind::VrRouteReq) => Self::Route(VrRouteReq::read_body(p)?),
            Some(StructKind::VrNexthopReq) => Self::Nexthop(VrNexthopReq::read_body(p)?),
            Some(StructKind::VrVrfAssignReq) => Self::VrfAssign(VrVrfAssignReq::read_body(p)?),
            Some(StructKind::VrMplsReq) => Self::Mpls(VrMplsReq::read_body(p)?),
            Some(StructKind::VrVrfStatsReq) => Self::VrfStats(VrVrfStatsReq::read_body(p)?),
            Some(StructKind::VrResponse) => Self::Response(VrResponse::read_body(p)?),
            Some(StructKind::VrVxlanReq) => Self::Vxlan(VrVxlanReq::read_body(p)?),
            Some(StructKind::VrFlowReq) => Self::Flow(VrFlowReq::read_body(p)?),
            Some(_) => Self::Other(FieldBag::read_body(name, p)?),
            None => {
                tracing::warn!(struct_name = %name, "unrecognised struct, decoding generically");
                Self::Other(FieldBag::read_body(name, p)?)
            }
        };
        Ok(msg)
    }

    /// Wire name of the struct this message was decoded from.
    pub fn name(&self) -> &str {
        match self {
            Self::Interface(_) => VrInterfaceReq::KIND.name(),
            Self::Route(_) => VrRouteReq::KIND.name(),
            Self::Nexthop(_) => VrNexthopReq::KIND.name(),
            Self::VrfAssign(_) => VrVrfAssignReq::KIND.name(),
            Self::Mpls(_) => VrMplsReq::KIND.name(),
            Self::VrfStats(_) => VrVrfStatsReq::KIND.name(),
            Self::Response(_) => VrResponse::KIND.name(),
            Self::Vxlan(_) => VrVxlanReq::KIND.name(),
            Self::Flow(_) => VrFlowReq::KIND.name(),
            Self::Other(bag) => &bag.name,
        }
    }
}
