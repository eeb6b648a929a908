//! Module configuration operations
//!
//! Every operation is one request/response exchange: a request command with
//! its payload, the reply command the module answers with (request + 1), and
//! a decoder over the reply data. Offsets below index the frame data, so
//! `data[i]` is wire byte `5 + i`.

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tracing::{debug, info, warn};

use cm710_core::constants::{flags, offsets};
use cm710_core::{Command, Session};
use cm710_types::{
    AntennaMask, FastIdStatus, Firmware, Frequency, ModuleConfig, ModuleSettings, Region, Setting,
    TxPower,
};

use crate::channel::CommandChannel;
use crate::error::{Error, Result};

/// Acknowledgement of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    /// The module accepted the write
    pub success: bool,

    /// Raw acknowledgement data
    pub ack: Bytes,
}

impl SetOutcome {
    /// Interpret acknowledgement data; an empty ack or a leading `0x01` means accepted
    pub fn from_ack(ack: Bytes) -> Self {
        let success = ack.first().is_none_or(|status| *status == flags::STATUS_OK);
        Self { success, ack }
    }
}

/// Result of reading every setting
///
/// Settings that could not be read are `None` in `config` and carry their
/// error in `failures`.
#[derive(Debug, Default)]
pub struct ConfigSnapshot {
    pub config: ModuleConfig,
    pub failures: Vec<Error>,
}

impl ConfigSnapshot {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Configuration access to an open, idle module
///
/// Holds the command channel for its lifetime; the session returns to `Open`
/// when the manager is dropped.
pub struct ConfigurationManager<'a> {
    channel: &'a mut CommandChannel,
    session: Session,
}

impl<'a> ConfigurationManager<'a> {
    /// Enter configuration on `session`
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSessionState` unless the session is `Open`.
    pub fn new(channel: &'a mut CommandChannel, session: Session) -> Result<Self> {
        session.begin_configure()?;
        Ok(Self { channel, session })
    }

    pub async fn get_firmware(&mut self) -> Result<Firmware> {
        self.query(Setting::Firmware, Command::GetFirmware, &[], Command::FirmwareReply, decode_firmware)
            .await
    }

    /// Module temperature in degrees Celsius
    pub async fn get_temperature(&mut self) -> Result<f64> {
        self.query(
            Setting::Temperature,
            Command::GetTemperature,
            &[],
            Command::TemperatureReply,
            decode_temperature,
        )
        .await
    }

    /// Write power in dBm
    pub async fn get_power(&mut self) -> Result<f64> {
        self.query(Setting::Power, Command::GetPower, &[], Command::PowerReply, decode_power)
            .await
    }

    /// Set read and write power
    ///
    /// # Errors
    ///
    /// Values outside 5..=30 dBm fail with `UnsupportedValue` before anything
    /// is sent.
    pub async fn set_power(&mut self, dbm: u8) -> Result<SetOutcome> {
        let power = TxPower::new(dbm).map_err(|e| Error::setting(Setting::Power, e))?;
        self.write_power(power).await
    }

    pub async fn write_power(&mut self, power: TxPower) -> Result<SetOutcome> {
        info!("Setting power to {}", power);
        self.update(Setting::Power, Command::SetPower, &power_payload(power), Command::SetPowerAck)
            .await
    }

    pub async fn get_region(&mut self) -> Result<Region> {
        self.query(Setting::Region, Command::GetRegion, &[], Command::RegionReply, decode_region)
            .await
    }

    pub async fn set_region(&mut self, region: Region) -> Result<SetOutcome> {
        info!("Setting region to {}", region);
        self.update(
            Setting::Region,
            Command::SetRegion,
            &[flags::SAVE, region.code()],
            Command::SetRegionAck,
        )
        .await
    }

    pub async fn get_antennas(&mut self) -> Result<AntennaMask> {
        self.query(
            Setting::Antennas,
            Command::GetAntennas,
            &[],
            Command::AntennasReply,
            decode_antennas,
        )
        .await
    }

    pub async fn set_antennas(&mut self, mask: AntennaMask) -> Result<SetOutcome> {
        info!("Setting antennas to {}", mask.description());
        self.update(
            Setting::Antennas,
            Command::SetAntennas,
            &[flags::SAVE, flags::RESERVED, mask.bits()],
            Command::SetAntennasAck,
        )
        .await
    }

    /// Fix the carrier frequency
    ///
    /// # Errors
    ///
    /// Values outside 840000..=928000 kHz fail with `UnsupportedValue`
    /// before anything is sent.
    pub async fn set_frequency(&mut self, khz: u32) -> Result<SetOutcome> {
        let frequency = Frequency::new(khz).map_err(|e| Error::setting(Setting::Frequency, e))?;
        self.write_frequency(frequency).await
    }

    pub async fn write_frequency(&mut self, frequency: Frequency) -> Result<SetOutcome> {
        info!("Setting fixed frequency to {}", frequency);
        self.update(
            Setting::Frequency,
            Command::SetFrequency,
            &frequency_payload(frequency),
            Command::SetFrequencyAck,
        )
        .await
    }

    pub async fn set_fastid(&mut self, enabled: bool) -> Result<SetOutcome> {
        info!("Setting FastID {}", if enabled { "on" } else { "off" });
        let flag = if enabled { flags::ON } else { flags::OFF };
        self.update(
            Setting::FastId,
            Command::SetFastId,
            &[flag, flags::RESERVED],
            Command::SetFastIdAck,
        )
        .await
    }

    pub async fn get_fastid(&mut self) -> Result<FastIdStatus> {
        self.query(
            Setting::FastId,
            Command::GetFastId,
            &[flags::RESERVED, flags::RESERVED],
            Command::FastIdReply,
            decode_fastid,
        )
        .await
    }

    /// Read every setting, keeping going past individual failures
    pub async fn read_config(&mut self) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();

        fn keep<T>(result: Result<T>, failures: &mut Vec<Error>) -> Option<T> {
            result
                .map_err(|e| {
                    warn!("{}", e);
                    failures.push(e);
                })
                .ok()
        }

        let failures = &mut snapshot.failures;
        snapshot.config.firmware = keep(self.get_firmware().await, failures);
        snapshot.config.temperature_c = keep(self.get_temperature().await, failures);
        snapshot.config.power_dbm = keep(self.get_power().await, failures);
        snapshot.config.region = keep(self.get_region().await, failures);
        snapshot.config.antennas = keep(self.get_antennas().await, failures);
        snapshot.config.fastid = keep(self.get_fastid().await, failures);

        debug!("Read {}", snapshot.config);
        snapshot
    }

    /// Write each setting present in `settings`, in order
    ///
    /// One failed write does not prevent the others.
    pub async fn apply_settings(
        &mut self,
        settings: &ModuleSettings,
    ) -> Vec<(Setting, Result<SetOutcome>)> {
        let mut results = Vec::new();

        if let Some(power) = settings.power {
            results.push((Setting::Power, self.write_power(power).await));
        }
        if let Some(region) = settings.region {
            results.push((Setting::Region, self.set_region(region).await));
        }
        if let Some(mask) = settings.antennas {
            results.push((Setting::Antennas, self.set_antennas(mask).await));
        }
        if let Some(frequency) = settings.frequency {
            results.push((Setting::Frequency, self.write_frequency(frequency).await));
        }
        if let Some(enabled) = settings.fastid {
            results.push((Setting::FastId, self.set_fastid(enabled).await));
        }

        results
    }

    async fn query<T>(
        &mut self,
        setting: Setting,
        command: Command,
        data: &[u8],
        reply: Command,
        decode: fn(&[u8]) -> cm710_core::Result<T>,
    ) -> Result<T> {
        let result = match self.channel.call(command, data, reply).await {
            Ok(frame) => decode(&frame.data).map_err(Error::from),
            Err(e) => Err(e),
        };
        result.map_err(|e| Error::setting(setting, e))
    }

    async fn update(
        &mut self,
        setting: Setting,
        command: Command,
        data: &[u8],
        reply: Command,
    ) -> Result<SetOutcome> {
        let frame = self
            .channel
            .call(command, data, reply)
            .await
            .map_err(|e| Error::setting(setting, e))?;

        let outcome = SetOutcome::from_ack(frame.data);
        if !outcome.success {
            warn!("Module rejected {} write: {:02X?}", setting, &outcome.ack[..]);
        }
        Ok(outcome)
    }
}

impl Drop for ConfigurationManager<'_> {
    fn drop(&mut self) {
        self.session.end_configure();
    }
}

/// Set-power payload: save flag, antenna, read power, write power
pub fn power_payload(power: TxPower) -> [u8; 6] {
    let [hi, lo] = power.centi_dbm().to_be_bytes();
    [flags::POWER_SAVE, flags::POWER_ANTENNA, hi, lo, hi, lo]
}

/// Set-frequency payload: single-channel flag and the 24-bit kHz value
pub fn frequency_payload(frequency: Frequency) -> [u8; 4] {
    let [hi, mid, lo] = frequency.to_wire();
    [flags::SINGLE_CHANNEL, hi, mid, lo]
}

fn require_len(command: Command, data: &[u8], expected: usize) -> cm710_core::Result<()> {
    if data.len() < expected {
        return Err(cm710_core::Error::MalformedPayload {
            command: command.into(),
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

pub fn decode_firmware(data: &[u8]) -> cm710_core::Result<Firmware> {
    let at = offsets::FIRMWARE;
    require_len(Command::FirmwareReply, data, at + 3)?;
    Ok(Firmware::new(data[at], data[at + 1], data[at + 2]))
}

pub fn decode_temperature(data: &[u8]) -> cm710_core::Result<f64> {
    let at = offsets::TEMPERATURE;
    require_len(Command::TemperatureReply, data, at + 2)?;
    Ok(BigEndian::read_i16(&data[at..at + 2]) as f64 / 100.0)
}

pub fn decode_power(data: &[u8]) -> cm710_core::Result<f64> {
    let at = offsets::WRITE_POWER;
    require_len(Command::PowerReply, data, at + 2)?;
    Ok(BigEndian::read_u16(&data[at..at + 2]) as f64 / 100.0)
}

pub fn decode_region(data: &[u8]) -> cm710_core::Result<Region> {
    let at = offsets::REGION;
    require_len(Command::RegionReply, data, at + 1)?;
    Ok(Region::from_code(data[at]))
}

pub fn decode_antennas(data: &[u8]) -> cm710_core::Result<AntennaMask> {
    let at = offsets::ANTENNAS;
    require_len(Command::AntennasReply, data, at + 1)?;
    Ok(AntennaMask::from_raw(data[at]))
}

/// Status byte then value byte
///
/// Only `0x01` reads as enabled. A failed status leaves the value unknown.
pub fn decode_fastid(data: &[u8]) -> cm710_core::Result<FastIdStatus> {
    let at = offsets::FASTID;
    require_len(Command::FastIdReply, data, at + 2)?;

    Ok(match (data[at], data[at + 1]) {
        (flags::STATUS_OK, flags::ON) => FastIdStatus::Enabled,
        (flags::STATUS_OK, _) => FastIdStatus::Disabled,
        _ => FastIdStatus::Unknown,
    })
}
