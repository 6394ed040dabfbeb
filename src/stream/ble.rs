use std::str::FromStr;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use uuid::Uuid;

use super::transport::{release_on_error, Transport};
use crate::config::DeviceConfig;
use crate::error::TransportError;

const SCAN_POLL: Duration = Duration::from_millis(250);

/// Characteristic-write channel to the wearable.
pub struct BleTransport {
    peripheral: Peripheral,
    outbound: Characteristic,
    write_type: WriteType,
}

impl BleTransport {
    /// One connection attempt: scan for the configured address, connect,
    /// resolve both characteristics and read the device's greeting once.
    pub async fn connect(device: &DeviceConfig) -> Result<Self, TransportError> {
        let address = BDAddr::from_str(&device.address)
            .map_err(|_| TransportError::InvalidAddress(device.address.clone()))?;

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        let peripheral = find_peripheral(&adapter, address, device).await?;
        peripheral.connect().await?;
        let setup = handshake(&peripheral, device).await;
        let outbound = release_on_error(setup, || async {
            peripheral.disconnect().await?;
            Ok(())
        })
        .await?;

        let write_type = if outbound
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        Ok(Self {
            peripheral,
            outbound,
            write_type,
        })
    }

    pub async fn disconnect(self) -> Result<(), TransportError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Transport for BleTransport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self
            .peripheral
            .write(&self.outbound, frame, self.write_type)
            .await
        {
            Ok(()) => Ok(()),
            Err(btleplug::Error::NotConnected) => Err(TransportError::Disconnected),
            Err(err) => {
                if !self.peripheral.is_connected().await.unwrap_or(false) {
                    return Err(TransportError::Disconnected);
                }
                Err(err.into())
            }
        }
    }
}

// Resolves both characteristics and reads the greeting; returns the outbound one.
async fn handshake(
    peripheral: &Peripheral,
    device: &DeviceConfig,
) -> Result<Characteristic, TransportError> {
    peripheral.discover_services().await?;

    let outbound = characteristic(peripheral, device, device.write_characteristic)?;
    let inbound = characteristic(peripheral, device, device.read_characteristic)?;

    let greeting = peripheral.read(&inbound).await?;
    log::info!(
        "Connected to {} ({}): {}",
        device.name,
        device.address,
        String::from_utf8_lossy(&greeting).trim()
    );
    Ok(outbound)
}

async fn find_peripheral(
    adapter: &Adapter,
    address: BDAddr,
    device: &DeviceConfig,
) -> Result<Peripheral, TransportError> {
    adapter.start_scan(ScanFilter::default()).await?;
    let timeout = Duration::from_secs_f64(device.scan_timeout.max(0.0));
    let deadline = tokio::time::Instant::now() + timeout;

    let found = loop {
        let peripherals = adapter.peripherals().await?;
        if let Some(p) = peripherals.into_iter().find(|p| p.address() == address) {
            break Some(p);
        }
        if tokio::time::Instant::now() >= deadline {
            break None;
        }
        tokio::time::sleep(SCAN_POLL).await;
    };

    if let Err(err) = adapter.stop_scan().await {
        log::debug!("Stopping scan failed: {}", err);
    }

    found.ok_or_else(|| TransportError::DeviceNotFound {
        address: device.address.clone(),
        seconds: timeout.as_secs_f64(),
    })
}

fn characteristic(
    peripheral: &Peripheral,
    device: &DeviceConfig,
    uuid: Uuid,
) -> Result<Characteristic, TransportError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| TransportError::CharacteristicMissing {
            address: device.address.clone(),
            uuid,
        })
}
