use crate::error::DdcError;
use crate::protocols::direct::DirectTransport;
use crate::protocols::framed::FramedTransport;
use crate::protocols::{Transport, VcpReading};

pub type DisplayId = String;

/// Transport a display is driven through, fixed at registration
pub enum DisplayBackend {
    /// Raw checksum-framed DDC/CI over I2C
    Framed(FramedTransport),
    /// DDC/CI through a platform library
    Direct(DirectTransport),
}

impl std::fmt::Debug for DisplayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayBackend::Framed(transport) => write!(f, "{:?}", transport),
            DisplayBackend::Direct(transport) => write!(f, "{:?}", transport),
        }
    }
}

impl DisplayBackend {
    /// Pick the transport for a display
    ///
    /// The framed path is used when a bus is available and the display
    /// answers a VCP version probe on it; otherwise the direct path is used.
    pub fn select(framed: Option<FramedTransport>, direct: DirectTransport) -> Self {
        if let Some(mut framed) = framed {
            if framed.probe() {
                info!("display answers on the raw bus, using framed transport");
                return DisplayBackend::Framed(framed);
            }
            info!("no answer on the raw bus, falling back to direct transport");
        }
        DisplayBackend::Direct(direct)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DisplayBackend::Framed(_) => "framed",
            DisplayBackend::Direct(_) => "direct",
        }
    }
}

impl Transport for DisplayBackend {
    fn write(&mut self, opcode: u8, value: u16) -> Result<(), DdcError> {
        match self {
            DisplayBackend::Framed(transport) => transport.write(opcode, value),
            DisplayBackend::Direct(transport) => transport.write(opcode, value),
        }
    }

    fn read(&mut self, opcode: u8, tries: u16) -> Result<VcpReading, DdcError> {
        match self {
            DisplayBackend::Framed(transport) => transport.read(opcode, tries),
            DisplayBackend::Direct(transport) => transport.read(opcode, tries),
        }
    }
}
