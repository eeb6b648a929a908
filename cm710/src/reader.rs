//! Reader session lifecycle and the inventory stream loop

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use cm710_core::constants::flags;
use cm710_core::{Command, InventoryParser, InventoryStats, Session, SessionState};
use cm710_transport::{ModulePower, NoPowerControl, SerialTransport, Transport};
use cm710_types::{ModuleSettings, ReadContext, TagReading};

use crate::channel::CommandChannel;
use crate::config::ConfigurationManager;
use crate::error::Result;
use crate::reader_config::ReaderConfig;

/// Consumer of decoded readings
///
/// Returning `false` ends the stream, e.g. when the receiving side has gone
/// away.
pub trait ReadingSink {
    fn accept(&mut self, reading: TagReading) -> bool;
}

impl<F: FnMut(TagReading)> ReadingSink for F {
    fn accept(&mut self, reading: TagReading) -> bool {
        self(reading);
        true
    }
}

/// Sink forwarding readings to a channel; the stream ends once the receiver is dropped
#[derive(Debug, Clone)]
pub struct ChannelSink(pub mpsc::UnboundedSender<TagReading>);

impl ReadingSink for ChannelSink {
    fn accept(&mut self, reading: TagReading) -> bool {
        self.0.send(reading).is_ok()
    }
}

impl From<mpsc::UnboundedSender<TagReading>> for ChannelSink {
    fn from(sender: mpsc::UnboundedSender<TagReading>) -> Self {
        Self(sender)
    }
}

/// CM710-4 reader
///
/// # Examples
///
/// ```no_run
/// use cm710::{ReaderConfig, ReaderSession};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> cm710::Result<()> {
///     let mut reader = ReaderSession::new(ReaderConfig::new("/dev/ttyUSB0"));
///     reader.open().await?;
///
///     let firmware = reader.configure()?.get_firmware().await?;
///     println!("Firmware {}", firmware);
///
///     reader.start_inventory().await?;
///     let cancel = CancellationToken::new();
///     reader.stream(|tag| println!("{}", tag), &cancel).await?;
///
///     reader.close().await?;
///     Ok(())
/// }
/// ```
pub struct ReaderSession {
    config: ReaderConfig,
    channel: CommandChannel,
    power: Box<dyn ModulePower>,
    session: Session,
    parser: InventoryParser,
}

impl ReaderSession {
    /// Reader on the serial port named in `config`, with no power switching
    pub fn new(config: ReaderConfig) -> Self {
        let transport = SerialTransport::new(config.port.clone()).with_baud_rate(config.baud_rate);
        Self::with_transport(config, Box::new(transport))
    }

    /// Reader over any transport
    pub fn with_transport(config: ReaderConfig, transport: Box<dyn Transport>) -> Self {
        let channel = CommandChannel::new(transport).with_call_timeout(config.call_timeout);

        let mut parser = InventoryParser::new();
        if let Some(len) = config.epc_len {
            parser = parser.with_epc_len(len);
        }

        Self {
            config,
            channel,
            power: Box::new(NoPowerControl),
            session: Session::new(),
            parser,
        }
    }

    /// Switch module power through `power`
    pub fn with_power(mut self, power: impl ModulePower + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open() && self.channel.is_open()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming()
    }

    /// Counters for the current (or last) inventory run
    pub fn stats(&self) -> InventoryStats {
        self.parser.stats()
    }

    /// Power the module and open the port
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session is already open
    /// - Power control fails
    /// - The serial device is missing or cannot be opened
    pub async fn open(&mut self) -> Result<()> {
        self.session.require(SessionState::Closed)?;

        info!("Opening reader on {}...", self.channel.name());

        self.power.enable().await?;
        if !self.config.power_up_delay.is_zero() {
            debug!("Waiting {:?} for module power-up", self.config.power_up_delay);
            tokio::time::sleep(self.config.power_up_delay).await;
        }

        if let Err(e) = self.channel.open().await {
            if let Err(power_err) = self.power.disable().await {
                warn!("Failed to power down module: {}", power_err);
            }
            return Err(e);
        }

        if let Err(e) = self.channel.purge().await {
            if let Err(close_err) = self.channel.close().await {
                warn!("Failed to close {}: {}", self.channel.name(), close_err);
            }
            if let Err(power_err) = self.power.disable().await {
                warn!("Failed to power down module: {}", power_err);
            }
            return Err(e);
        }
        self.session.open()?;

        info!("Reader open");
        Ok(())
    }

    /// Enter configuration
    ///
    /// The returned manager borrows the reader; the session is back to
    /// `Open` once it is dropped.
    pub fn configure(&mut self) -> Result<ConfigurationManager<'_>> {
        ConfigurationManager::new(&mut self.channel, self.session.clone())
    }

    /// Start continuous inventory
    ///
    /// Fire-and-forget: the module begins streaming right away and no
    /// acknowledgement is awaited.
    pub async fn start_inventory(&mut self) -> Result<()> {
        self.session.require(SessionState::Open)?;

        self.parser.reset();
        self.channel
            .send(Command::StartInventory, &[flags::RESERVED, flags::RESERVED])
            .await?;
        self.session.start_streaming()?;

        info!("Inventory started");
        Ok(())
    }

    /// Decode the inventory stream into `sink` until cancelled
    ///
    /// `cancel` is checked once per read, so the loop ends at most one read
    /// timeout after cancellation. The stream also ends when the sink refuses
    /// a reading. Inventory keeps running on the module either way; call
    /// [`stop_inventory`](Self::stop_inventory) afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not streaming or the transport fails.
    pub async fn stream<S: ReadingSink>(
        &mut self,
        mut sink: S,
        cancel: &CancellationToken,
    ) -> Result<InventoryStats> {
        self.session.require(SessionState::Streaming)?;

        while !cancel.is_cancelled() {
            let chunk = match self.channel.receive(self.config.read_timeout).await {
                Ok(chunk) => chunk,
                Err(e) if e.is_timeout() => {
                    trace!("No inventory data");
                    continue;
                }
                Err(e) => {
                    warn!("Inventory stream failed: {}", e);
                    return Err(e.into());
                }
            };

            let context = ReadContext::now(self.config.device_id.as_str());
            let sink_open = self
                .parser
                .feed(&chunk, &context)
                .all(|reading| sink.accept(reading));

            if !sink_open {
                info!("Reading sink closed, ending stream");
                return Ok(self.parser.stats());
            }
        }

        let stats = self.parser.stats();
        info!(
            "Inventory stream cancelled: {} readings from {} frames",
            stats.readings, stats.frames
        );
        Ok(stats)
    }

    /// Stop continuous inventory and discard what is still in flight
    pub async fn stop_inventory(&mut self) -> Result<()> {
        self.session.begin_stop()?;

        let result = self.send_stop().await;
        self.session.finish_stop()?;

        match &result {
            Ok(()) => info!("Inventory stopped"),
            Err(e) => warn!("Stopping inventory failed: {}", e),
        }
        result
    }

    async fn send_stop(&mut self) -> Result<()> {
        self.channel.send(Command::StopInventory, &[]).await?;

        if !self.config.stop_drain.is_zero() {
            tokio::time::sleep(self.config.stop_drain).await;
        }
        self.channel.purge().await
    }

    /// Stop inventory if running, close the port and power the module down
    ///
    /// Closing a closed reader does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if !self.session.is_open() {
            return Ok(());
        }

        info!("Closing reader...");

        if self.session.is_streaming() {
            if let Err(e) = self.stop_inventory().await {
                warn!("Closing without a clean stop: {}", e);
            }
        }

        let closed = self.channel.close().await;
        self.session.close();
        let powered_down = self.power.disable().await;

        closed?;
        powered_down?;

        info!("Reader closed");
        Ok(())
    }

    /// Open, configure, stream until cancelled, then close
    ///
    /// Failed settings are logged and do not prevent streaming. The reader is
    /// closed even when streaming fails.
    pub async fn run<S: ReadingSink>(
        &mut self,
        settings: &ModuleSettings,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<InventoryStats> {
        self.open().await?;

        let result = self.configure_and_stream(settings, sink, cancel).await;
        let closed = self.close().await;

        let stats = result?;
        closed?;
        Ok(stats)
    }

    async fn configure_and_stream<S: ReadingSink>(
        &mut self,
        settings: &ModuleSettings,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<InventoryStats> {
        if !settings.is_empty() {
            let mut config = self.configure()?;
            for (setting, result) in config.apply_settings(settings).await {
                match result {
                    Ok(outcome) if outcome.success => info!("Applied {}", setting),
                    Ok(outcome) => warn!("Module rejected {}: {:02X?}", setting, &outcome.ack[..]),
                    Err(e) => warn!("{}", e),
                }
            }
        }

        self.start_inventory().await?;
        self.stream(sink, cancel).await
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        if self.session.is_open() {
            warn!("Reader dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use cm710_core::frame;
    use cm710_transport::MemoryTransport;
    use cm710_types::{Setting, TxPower};
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    mock! {
        pub Power {}

        #[async_trait]
        impl ModulePower for Power {
            async fn enable(&mut self) -> cm710_transport::Result<()>;
            async fn disable(&mut self) -> cm710_transport::Result<()>;
        }
    }

    const EPC: [u8; 12] = [
        0xE2, 0x80, 0x11, 0x60, 0x60, 0x00, 0x02, 0x04, 0x5A, 0x3B, 0x7C, 0x01,
    ];

    fn test_config() -> ReaderConfig {
        ReaderConfig::new("/dev/ttyUSB0")
            .with_device_id("B8:27:EB:00:11:22")
            .with_call_timeout(Duration::from_millis(200))
            .with_read_timeout(Duration::from_millis(100))
    }

    fn reader() -> (ReaderSession, MemoryTransport) {
        let module = MemoryTransport::named("/dev/ttyUSB0");
        let reader = ReaderSession::with_transport(test_config(), Box::new(module.clone()));
        (reader, module)
    }

    fn inventory_frame(epc: &[u8], rssi: u16, antenna: u8) -> Vec<u8> {
        let pc = ((epc.len() / 2) as u16) << 11;
        let mut data = pc.to_be_bytes().to_vec();
        data.extend_from_slice(epc);
        data.extend_from_slice(&rssi.to_be_bytes());
        data.push(antenna);
        frame::encode(Command::InventoryData, &data).unwrap().to_vec()
    }

    fn reply(command: Command, data: &[u8]) -> Vec<u8> {
        frame::encode(command, data).unwrap().to_vec()
    }

    fn power_mock() -> MockPower {
        let mut power = MockPower::new();
        power.expect_enable().times(1).returning(|| Ok(()));
        power.expect_disable().times(1).returning(|| Ok(()));
        power
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_powers_module_and_waits() {
        let (reader, _module) = reader();
        let mut reader = reader.with_power(power_mock());

        let started = tokio::time::Instant::now();
        reader.open().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(reader.state(), SessionState::Open);
        assert!(reader.is_open());

        reader.close().await.unwrap();
        assert_eq!(reader.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_missing_device_powers_down() {
        let (reader, module) = reader();
        module.set_absent();
        let mut reader = reader.with_power(power_mock());

        let err = reader.open().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Transport(cm710_transport::Error::NoDeviceFound(path)) if path == "/dev/ttyUSB0"
        ));
        assert_eq!(reader.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failed_purge_closes_and_powers_down() {
        let (reader, module) = reader();
        module.fail_clear_input(std::io::ErrorKind::TimedOut);
        let mut reader = reader.with_power(power_mock());

        let err = reader.open().await.unwrap_err();

        assert!(matches!(err, Error::Transport(cm710_transport::Error::Io(_))));
        assert_eq!(reader.state(), SessionState::Closed);
        assert!(!module.is_open());
        assert!(!reader.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_purges_stale_input() {
        let (mut reader, module) = reader();
        module.push_incoming([0xC8, 0x8C, 0x00]);

        reader.open().await.unwrap();
        assert_eq!(module.pending(), 0);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_twice_fails() {
        let (mut reader, _module) = reader();
        reader.open().await.unwrap();

        let err = reader.open().await.unwrap_err();
        assert!(matches!(err, Error::Core(cm710_core::Error::InvalidSessionState(_))));

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_delivers_readings() {
        let (mut reader, module) = reader();
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();

        let frame = inventory_frame(&EPC, 0xFFCE, 0x02);
        module.push_incoming(&frame[..7]);
        module.push_incoming(&frame[7..]);
        module.push_incoming(inventory_frame(&EPC[..4], 0xFFF6, 0x05));
        module.close_remote();

        let mut readings = Vec::new();
        let cancel = CancellationToken::new();
        let err = reader
            .stream(|tag| readings.push(tag), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(cm710_transport::Error::ConnectionClosed)));

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].epc, "E2801160600002045A3B7C01");
        assert_eq!(readings[0].antenna, 2);
        assert_eq!(readings[0].rssi, -5.0);
        assert_eq!(readings[0].device_id, "B8:27:EB:00:11:22");
        assert_eq!(readings[1].epc, "E2801160");
        assert_eq!(readings[1].antenna, 1);
        assert_eq!(readings[1].rssi, -1.0);

        assert_eq!(reader.stats().readings, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_inventory_wire_bytes() {
        let (mut reader, module) = reader();
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();
        reader.stop_inventory().await.unwrap();

        let sent = module.sent();
        assert_eq!(
            &sent[0][..],
            &[0xC8, 0x8C, 0x00, 0x0A, 0x82, 0x00, 0x00, 0x88, 0x0D, 0x0A]
        );
        assert_eq!(&sent[1][..], &[0xC8, 0x8C, 0x00, 0x08, 0x8C, 0x84, 0x0D, 0x0A]);
        assert_eq!(reader.state(), SessionState::Open);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_stops_on_cancel() {
        let (mut reader, _module) = reader();
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            trigger.cancel();
        });

        let stats = reader.stream(|_| {}, &cancel).await.unwrap();
        assert_eq!(stats.readings, 0);
        assert!(reader.is_streaming());

        reader.close().await.unwrap();
        assert_eq!(reader.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_when_channel_receiver_dropped() {
        let (mut reader, module) = reader();
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();
        module.push_incoming(inventory_frame(&EPC, 0xFFCE, 0x01));

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let cancel = CancellationToken::new();
        let stats = reader.stream(ChannelSink(tx), &cancel).await.unwrap();
        assert_eq!(stats.readings, 1);

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_requires_streaming() {
        let (mut reader, _module) = reader();
        reader.open().await.unwrap();

        let cancel = CancellationToken::new();
        let err = reader.stream(|_| {}, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Core(cm710_core::Error::InvalidSessionState(_))));

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_refused_while_streaming() {
        let (mut reader, _module) = reader();
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();

        assert!(reader.configure().is_err());
        assert!(reader.is_streaming());

        reader.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent_and_stops_inventory() {
        let (reader, module) = reader();
        let mut reader = reader.with_power(power_mock());
        reader.open().await.unwrap();
        reader.start_inventory().await.unwrap();

        reader.close().await.unwrap();
        reader.close().await.unwrap();

        let sent = module.sent_frames();
        assert!(sent.last().unwrap().is(Command::StopInventory));
        assert!(!module.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_settings_then_streams() {
        let (mut reader, module) = reader();
        module.reply_to(Command::SetPower, reply(Command::SetPowerAck, &[0x01]));
        module.reply_to(Command::StartInventory, inventory_frame(&EPC, 0xFFCE, 0x03));

        let settings = ModuleSettings::new()
            .with_power(TxPower::new(20).unwrap())
            .with_fastid(false);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let stats = reader.run(&settings, ChannelSink::from(tx), &cancel).await.unwrap();
        assert_eq!(stats.readings, 1);
        assert_eq!(reader.state(), SessionState::Closed);

        let reading = rx.recv().await.unwrap();
        assert_eq!(reading.antenna, 3);

        let commands: Vec<u8> = module.sent_frames().iter().map(|f| f.command).collect();
        let expected: Vec<u8> = vec![
            Command::SetPower.into(),
            Command::SetFastId.into(),
            Command::StartInventory.into(),
            Command::StopInventory.into(),
        ];
        assert_eq!(commands, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_setting_is_attributed() {
        let (mut reader, _module) = reader();
        reader.open().await.unwrap();

        let err = reader.configure().unwrap().get_temperature().await.unwrap_err();
        assert_eq!(err.failed_setting(), Some(Setting::Temperature));
        assert_eq!(reader.state(), SessionState::Open);

        reader.close().await.unwrap();
    }
}
