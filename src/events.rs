//! Inbound radio notifications.
//!
//! The Link-Controller delivers raw HCI event packets. They are decoded
//! exactly once, here, into the closed [`InboundEvent`] variant; nothing
//! past this module ever looks at packet offsets.
//!
//! ```text
//! ┌──────┬──────┬──────────────────────────────┐
//! │ Code │ Plen │ Parameters (Plen bytes, LE)   │
//! │ (1B) │ (1B) │                              │
//! └──────┴──────┴──────────────────────────────┘
//!
//!  0x05  Disconnection Complete
//!  0x3E  LE Meta        → subevent (1B) + fields
//!  0xFF  Vendor (ACI)   → ecode (2B LE) + fields
//! ```

use crate::app::ports::{ConnectionHandle, ConnectionParams};
use crate::error::DecodeError;

/// HCI event codes.
pub mod code {
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const LE_META: u8 = 0x3E;
    pub const VENDOR_SPECIFIC: u8 = 0xFF;
}

/// LE meta subevent codes.
pub mod le {
    pub const CONNECTION_COMPLETE: u8 = 0x01;
    pub const CONNECTION_UPDATE_COMPLETE: u8 = 0x03;
    pub const PHY_UPDATE_COMPLETE: u8 = 0x0C;
}

/// Vendor (ACI) event codes.
pub mod vendor {
    pub const GAP_LIMITED_DISCOVERABLE: u16 = 0x0400;
    pub const GAP_PAIRING_COMPLETE: u16 = 0x0401;
    pub const GAP_PASS_KEY_REQ: u16 = 0x0402;
    pub const GAP_AUTHORIZATION_REQ: u16 = 0x0403;
    pub const GAP_PERIPHERAL_SECURITY_INITIATED: u16 = 0x0404;
    pub const GAP_BOND_LOST: u16 = 0x0405;
    pub const GAP_PROC_COMPLETE: u16 = 0x0407;
    pub const GAP_ADDR_NOT_RESOLVED: u16 = 0x0408;
    pub const GAP_NUMERIC_COMPARISON_VALUE: u16 = 0x0409;
    pub const GAP_KEYPRESS_NOTIFICATION: u16 = 0x040A;
    pub const L2CAP_CONNECTION_UPDATE_RESP: u16 = 0x0800;
    pub const ATT_EXCHANGE_MTU_RESP: u16 = 0x0C02;
}

/// Result code of an L2CAP connection-parameter-update response.
pub const L2CAP_PARAMS_ACCEPTED: u16 = 0x0000;

/// Every notification the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEvent {
    // ── Link lifecycle ────────────────────────────────────
    Disconnected {
        status: u8,
        handle: ConnectionHandle,
        reason: u8,
    },
    ConnectionComplete {
        status: u8,
        handle: ConnectionHandle,
        role: u8,
        peer_address: [u8; 6],
        params: ConnectionParams,
    },
    ConnectionUpdateComplete {
        status: u8,
        handle: ConnectionHandle,
        params: ConnectionParams,
    },
    PhyUpdateComplete {
        status: u8,
        handle: ConnectionHandle,
        tx_phy: u8,
        rx_phy: u8,
    },

    // ── Security ──────────────────────────────────────────
    PinRequest {
        handle: ConnectionHandle,
    },
    NumericCompare {
        handle: ConnectionHandle,
        value: u32,
    },
    /// `status == 0` means success.
    PairingComplete {
        handle: ConnectionHandle,
        status: u8,
        reason: u8,
    },
    BondLost,
    AddressUnresolved {
        handle: ConnectionHandle,
    },
    KeypressNotice {
        handle: ConnectionHandle,
        kind: u8,
    },
    AuthorizationRequest {
        handle: ConnectionHandle,
    },
    SecurityInitiated,

    // ── Informational ─────────────────────────────────────
    MtuNegotiated {
        handle: ConnectionHandle,
        server_rx_mtu: u16,
    },
    ParamUpdateAccepted {
        handle: ConnectionHandle,
    },
    ParamUpdateRejected {
        handle: ConnectionHandle,
        result: u16,
    },
    LimitedDiscoverable,
    ProcedureComplete {
        procedure: u8,
        status: u8,
    },

    /// Well-formed packet with a code nobody routes.
    Unhandled {
        code: u8,
        subcode: u16,
    },
}

impl InboundEvent {
    /// Decode one HCI event packet.
    ///
    /// Never panics; trailing bytes after the fields of a known event are
    /// ignored, as newer radios append fields.
    pub fn decode(packet: &[u8]) -> Result<Self, DecodeError> {
        let [evt_code, plen, params @ ..] = packet else {
            return Err(DecodeError::Empty);
        };
        if params.len() != usize::from(*plen) {
            return Err(DecodeError::LengthMismatch);
        }
        let mut r = ReadCursor::new(params);

        match *evt_code {
            code::DISCONNECTION_COMPLETE => Ok(Self::Disconnected {
                status: r.u8()?,
                handle: r.handle()?,
                reason: r.u8()?,
            }),
            code::LE_META => Self::decode_le_meta(&mut r),
            code::VENDOR_SPECIFIC => Self::decode_vendor(&mut r),
            other => Ok(Self::Unhandled {
                code: other,
                subcode: 0,
            }),
        }
    }

    fn decode_le_meta(r: &mut ReadCursor<'_>) -> Result<Self, DecodeError> {
        let subevent = r.u8()?;
        match subevent {
            le::CONNECTION_COMPLETE => {
                let status = r.u8()?;
                let handle = r.handle()?;
                let role = r.u8()?;
                let _peer_address_type = r.u8()?;
                let peer_address = r.array::<6>()?;
                let params = r.conn_params()?;
                Ok(Self::ConnectionComplete {
                    status,
                    handle,
                    role,
                    peer_address,
                    params,
                })
            }
            le::CONNECTION_UPDATE_COMPLETE => Ok(Self::ConnectionUpdateComplete {
                status: r.u8()?,
                handle: r.handle()?,
                params: r.conn_params()?,
            }),
            le::PHY_UPDATE_COMPLETE => Ok(Self::PhyUpdateComplete {
                status: r.u8()?,
                handle: r.handle()?,
                tx_phy: r.u8()?,
                rx_phy: r.u8()?,
            }),
            other => Ok(Self::Unhandled {
                code: code::LE_META,
                subcode: u16::from(other),
            }),
        }
    }

    fn decode_vendor(r: &mut ReadCursor<'_>) -> Result<Self, DecodeError> {
        let ecode = r.u16()?;
        let event = match ecode {
            vendor::GAP_LIMITED_DISCOVERABLE => Self::LimitedDiscoverable,
            vendor::GAP_PAIRING_COMPLETE => Self::PairingComplete {
                handle: r.handle()?,
                status: r.u8()?,
                reason: r.u8()?,
            },
            vendor::GAP_PASS_KEY_REQ => Self::PinRequest { handle: r.handle()? },
            vendor::GAP_AUTHORIZATION_REQ => Self::AuthorizationRequest { handle: r.handle()? },
            vendor::GAP_PERIPHERAL_SECURITY_INITIATED => Self::SecurityInitiated,
            vendor::GAP_BOND_LOST => Self::BondLost,
            vendor::GAP_PROC_COMPLETE => Self::ProcedureComplete {
                procedure: r.u8()?,
                status: r.u8()?,
            },
            vendor::GAP_ADDR_NOT_RESOLVED => Self::AddressUnresolved { handle: r.handle()? },
            vendor::GAP_NUMERIC_COMPARISON_VALUE => Self::NumericCompare {
                handle: r.handle()?,
                value: r.u32()?,
            },
            vendor::GAP_KEYPRESS_NOTIFICATION => Self::KeypressNotice {
                handle: r.handle()?,
                kind: r.u8()?,
            },
            vendor::L2CAP_CONNECTION_UPDATE_RESP => {
                let handle = r.handle()?;
                match r.u16()? {
                    L2CAP_PARAMS_ACCEPTED => Self::ParamUpdateAccepted { handle },
                    result => Self::ParamUpdateRejected { handle, result },
                }
            }
            vendor::ATT_EXCHANGE_MTU_RESP => Self::MtuNegotiated {
                handle: r.handle()?,
                server_rx_mtu: r.u16()?,
            },
            other => Self::Unhandled {
                code: code::VENDOR_SPECIFIC,
                subcode: other,
            },
        };
        Ok(event)
    }
}

// ── Internal ──────────────────────────────────────────────────

/// Little-endian field reader over a parameter block.
struct ReadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let bytes = self.data.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Connection handles are 12 bits; the top nibble carries flags.
    fn handle(&mut self) -> Result<ConnectionHandle, DecodeError> {
        Ok(ConnectionHandle(self.u16()? & 0x0FFF))
    }

    fn conn_params(&mut self) -> Result<ConnectionParams, DecodeError> {
        Ok(ConnectionParams {
            interval: self.u16()?,
            latency: self.u16()?,
            supervision_timeout: self.u16()?,
        })
    }
}
