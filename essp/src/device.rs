//! High-level device interface

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

use essp_core::Command;
use essp_transport::Transport;
use essp_types::{EventKind, PollEvent, PollReport, SetupInfo};

use crate::{
    args::CommandArgs,
    config::DeviceConfig,
    decoder::{CommandResult, ResponseInfo},
    dispatcher::Dispatcher,
    error::{Error, InitStep, Result},
    events::{self, EventStream},
};

/// Facts gathered by [`Device::initialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub serial_number: u32,
    pub setup: SetupInfo,
    pub encrypted: bool,
}

/// eSSP peripheral
///
/// Shares one [`Dispatcher`] between foreground calls and the background
/// poller. A call made while another command holds the line fails with
/// [`Error::Busy`] instead of queueing.
///
/// # Examples
///
/// ```no_run
/// use essp::{Device, DeviceConfig, EventKind};
/// use essp_transport::SerialTransport;
///
/// #[tokio::main]
/// async fn main() -> essp::Result<()> {
///     let mut port = SerialTransport::new("/dev/ttyUSB0");
///     port.open()?;
///
///     let mut device = Device::new(port, DeviceConfig::default());
///     let report = device.initialize().await?;
///     println!("Serial {}: {}", report.serial_number, report.setup);
///
///     let mut credits = device.on_event(EventKind::CreditNote);
///     device.start_polling();
///     while let Some(event) = credits.recv().await {
///         println!("{}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct Device<T: Transport + 'static> {
    dispatcher: Arc<Mutex<Dispatcher<T>>>,
    config: DeviceConfig,
    events: broadcast::Sender<PollEvent>,
    enabled: AtomicBool,
    poller: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> Device<T> {
    pub fn new(transport: T, config: DeviceConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            dispatcher: Arc::new(Mutex::new(Dispatcher::new(transport, &config))),
            config,
            events,
            enabled: AtomicBool::new(false),
            poller: None,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Shared dispatcher handle
    pub fn dispatcher(&self) -> Arc<Mutex<Dispatcher<T>>> {
        Arc::clone(&self.dispatcher)
    }

    /// Check if ENABLE succeeded and DISABLE has not been sent since
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Execute a command by name with the configured timeout
    pub async fn execute(&self, name: &str, args: CommandArgs) -> Result<CommandResult> {
        self.execute_with_timeout(name, args, self.config.timeout).await
    }

    /// Execute a command by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] without touching the line if another command
    /// is in flight.
    pub async fn execute_with_timeout(
        &self,
        name: &str,
        args: CommandArgs,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let mut dispatcher = self.lock()?;
        let result = dispatcher.execute(name, args, timeout).await?;
        if result.command == Command::Poll {
            events::publish(&self.events, &result);
        }
        Ok(result)
    }

    /// Run the initialization sequence
    ///
    /// SYNC, HOST_PROTOCOL_VERSION, key exchange (if enabled),
    /// GET_SERIAL_NUMBER, RESET_COUNTERS, ENABLE, SETUP_REQUEST,
    /// SET_CHANNEL_INHIBITS. The first failing step aborts the sequence.
    pub async fn initialize(&self) -> Result<InitReport> {
        let mut dispatcher = self.lock()?;
        let timeout = self.config.timeout;

        info!(line = %dispatcher.transport().description(), "Initializing peripheral");

        step(&mut dispatcher, InitStep::Sync, Command::Sync, CommandArgs::None, timeout).await?;
        step(
            &mut dispatcher,
            InitStep::HostProtocolVersion,
            Command::HostProtocolVersion,
            CommandArgs::Version(self.config.protocol_version),
            timeout,
        )
        .await?;

        if self.config.encryption {
            dispatcher
                .handshake(timeout)
                .await
                .map_err(|e| init_error(InitStep::KeyExchange, e))?;
        }

        let serial = step(
            &mut dispatcher,
            InitStep::GetSerialNumber,
            Command::GetSerialNumber,
            CommandArgs::None,
            timeout,
        )
        .await?;
        let ResponseInfo::SerialNumber(serial_number) = serial.info else {
            return Err(unexpected(InitStep::GetSerialNumber));
        };

        step(
            &mut dispatcher,
            InitStep::ResetCounters,
            Command::ResetCounters,
            CommandArgs::None,
            timeout,
        )
        .await?;
        step(&mut dispatcher, InitStep::Enable, Command::Enable, CommandArgs::None, timeout)
            .await?;
        self.enabled.store(true, Ordering::Release);

        let setup = step(
            &mut dispatcher,
            InitStep::SetupRequest,
            Command::SetupRequest,
            CommandArgs::None,
            timeout,
        )
        .await?;
        let ResponseInfo::Setup(setup) = setup.info else {
            return Err(unexpected(InitStep::SetupRequest));
        };

        step(
            &mut dispatcher,
            InitStep::SetChannelInhibits,
            Command::SetChannelInhibits,
            CommandArgs::Channels(self.config.channels),
            timeout,
        )
        .await?;

        let report = InitReport {
            serial_number,
            setup,
            encrypted: dispatcher.crypto().is_established(),
        };
        info!(
            serial = report.serial_number,
            encrypted = report.encrypted,
            "Peripheral ready: {}",
            report.setup
        );
        Ok(report)
    }

    /// Enable acceptance
    pub async fn enable(&self) -> Result<()> {
        self.execute("ENABLE", CommandArgs::None).await?.into_result()?;
        self.enabled.store(true, Ordering::Release);
        debug!("Peripheral enabled");
        Ok(())
    }

    /// Disable acceptance
    pub async fn disable(&self) -> Result<()> {
        self.execute("DISABLE", CommandArgs::None).await?.into_result()?;
        self.enabled.store(false, Ordering::Release);
        debug!("Peripheral disabled");
        Ok(())
    }

    /// Issue one POLL, publishing its events
    pub async fn poll(&self) -> Result<PollReport> {
        let result = self.execute("POLL", CommandArgs::None).await?.into_result()?;
        match result.info {
            ResponseInfo::Poll(report) => Ok(report),
            _ => Ok(PollReport::new(Vec::new())),
        }
    }

    /// Every decoded poll event
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    /// Poll events of one kind
    pub fn on_event(&self, kind: EventKind) -> EventStream {
        EventStream::new(kind, self.events.subscribe())
    }

    /// Start the background poller
    ///
    /// Issues POLL every `poll_period`, skipping a tick while another command
    /// holds the line.
    pub fn start_polling(&mut self) {
        if self.is_polling() {
            return;
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let events = self.events.clone();
        let period = self.config.poll_period.max(Duration::from_millis(1));
        let timeout = self.config.timeout;

        debug!(?period, "Starting background poller");
        self.poller = Some(tokio::spawn(run_poller(dispatcher, events, period, timeout)));
    }

    /// Stop the background poller
    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
            debug!("Stopped background poller");
        }
    }

    /// Stop polling and disable the peripheral
    pub async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.poller.take() {
            handle.abort();
            let _ = handle.await;
        }

        if self.is_enabled() {
            if let Err(e) = self.disable().await {
                warn!("Failed to disable peripheral on close: {}", e);
            }
        }

        info!("Closed");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Dispatcher<T>>> {
        self.dispatcher.try_lock().map_err(|_| Error::Busy)
    }
}

impl<T: Transport + 'static> Drop for Device<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
    }
}

async fn step<T: Transport>(
    dispatcher: &mut Dispatcher<T>,
    step: InitStep,
    command: Command,
    args: CommandArgs,
    timeout: Duration,
) -> Result<CommandResult> {
    debug!(%step, "Init step");
    dispatcher
        .execute_command(command, args, timeout)
        .await
        .and_then(CommandResult::into_result)
        .map_err(|e| init_error(step, e))
}

fn init_error(step: InitStep, source: Error) -> Error {
    warn!(%step, "Initialization failed: {}", source);
    Error::Init {
        step,
        source: Box::new(source),
    }
}

fn unexpected(step: InitStep) -> Error {
    init_error(
        step,
        essp_core::Error::MalformedResponse(format!("{} returned no data", step)).into(),
    )
}

async fn run_poller<T: Transport + 'static>(
    dispatcher: Arc<Mutex<Dispatcher<T>>>,
    events: broadcast::Sender<PollEvent>,
    period: Duration,
    timeout: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Ok(mut dispatcher) = dispatcher.try_lock() else {
            trace!("Line busy, skipping poll");
            continue;
        };

        match dispatcher
            .execute_command(Command::Poll, CommandArgs::None, timeout)
            .await
        {
            Ok(result) if result.is_ok() => events::publish(&events, &result),
            Ok(result) => debug!(status = %result.status, "Poll returned failure status"),
            Err(e) => warn!("Background poll failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedValidator;
    use essp_transport::MemoryTransport;
    use pretty_assertions::assert_eq;

    fn config() -> DeviceConfig {
        DeviceConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_poll_period(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_initialize() {
        let (transport, peer) = SimulatedValidator::new().attach();
        let device = Device::new(transport, config());

        let report = device.initialize().await.unwrap();
        assert_eq!(report.serial_number, 0x0012_D687);
        assert_eq!(report.setup.country_code, "EUR");
        assert_eq!(report.setup.firmware_version, "0410");
        assert!(report.encrypted);
        assert!(device.is_enabled());

        assert_eq!(
            peer.lock().received,
            vec![
                Command::Sync,
                Command::HostProtocolVersion,
                Command::SetGenerator,
                Command::SetModulus,
                Command::RequestKeyExchange,
                Command::GetSerialNumber,
                Command::ResetCounters,
                Command::Enable,
                Command::SetupRequest,
                Command::SetChannelInhibits,
            ]
        );
    }

    #[tokio::test]
    async fn test_initialize_without_encryption() {
        let (transport, peer) = SimulatedValidator::new().attach();
        let device = Device::new(transport, config().with_encryption(false));

        let report = device.initialize().await.unwrap();
        assert!(!report.encrypted);
        assert!(!peer.lock().received.contains(&Command::SetGenerator));
    }

    #[tokio::test]
    async fn test_initialize_aborts_on_failure() {
        let mut sim = SimulatedValidator::new();
        sim.fail = Some((Command::GetSerialNumber, 0xF5));
        let (transport, peer) = sim.attach();
        let device = Device::new(transport, config());

        let err = device.initialize().await.unwrap_err();
        assert_eq!(err.init_step(), Some(InitStep::GetSerialNumber));
        let Error::Init { source, .. } = err else {
            panic!("expected init error");
        };
        assert!(matches!(*source, Error::CommandFailed { status: 0xF5, .. }));

        assert_eq!(peer.lock().received.last(), Some(&Command::GetSerialNumber));
        assert!(!device.is_enabled());
    }

    #[tokio::test]
    async fn test_initialize_timeout_step() {
        let mut sim = SimulatedValidator::new();
        sim.silent = true;
        let (transport, _peer) = sim.attach();
        let device = Device::new(transport, config().with_timeout(Duration::from_millis(30)));

        let err = device.initialize().await.unwrap_err();
        assert_eq!(err.init_step(), Some(InitStep::Sync));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_zero_event_capacity() {
        let (transport, _peer) = SimulatedValidator::new().attach();
        let mut config = config();
        config.event_capacity = 0;
        let device = Device::new(transport, config);
        let mut disabled = device.on_event(EventKind::Disabled);

        device.disable().await.unwrap();
        assert!(!device.is_enabled());
        drop(device);
        assert!(disabled.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_busy_rejection() {
        let mut sim = SimulatedValidator::new();
        sim.silent = true;
        let (transport, _peer) = sim.attach();
        let device = Arc::new(Device::new(transport.clone(), config()));

        let background = Arc::clone(&device);
        let first = tokio::spawn(async move {
            background
                .execute_with_timeout("SYNC", CommandArgs::None, Duration::from_millis(200))
                .await
        });
        while transport.write_count() == 0 {
            tokio::task::yield_now().await;
        }

        let err = device.execute("POLL", CommandArgs::None).await.unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert_eq!(transport.write_count(), 1);

        let first = first.await.unwrap();
        assert!(matches!(first, Err(Error::Timeout { command: "SYNC", .. })));
    }

    #[tokio::test]
    async fn test_enable_disable() {
        let (transport, peer) = SimulatedValidator::new().attach();
        let mut device = Device::new(transport, config());

        device.enable().await.unwrap();
        assert!(device.is_enabled());
        device.disable().await.unwrap();
        assert!(!device.is_enabled());

        device.enable().await.unwrap();
        device.close().await.unwrap();
        assert!(!device.is_enabled());
        assert_eq!(
            peer.lock().received,
            vec![Command::Enable, Command::Disable, Command::Enable, Command::Disable]
        );
    }

    #[tokio::test]
    async fn test_enable_failure_keeps_flag() {
        let mut sim = SimulatedValidator::new();
        sim.fail = Some((Command::Enable, 0xF5));
        let (transport, _peer) = sim.attach();
        let device = Device::new(transport, config());

        assert!(matches!(device.enable().await, Err(Error::CommandFailed { .. })));
        assert!(!device.is_enabled());
    }

    #[tokio::test]
    async fn test_poll_publishes_events() {
        let mut sim = SimulatedValidator::new();
        sim.poll_events = vec![0xEF, 0x01, 0xEE, 0x01];
        let (transport, _peer) = sim.attach();
        let device = Device::new(transport, config());
        let mut all = device.subscribe();
        let mut credits = device.on_event(EventKind::CreditNote);

        let report = device.poll().await.unwrap();
        assert_eq!(report.events.len(), 2);

        assert_eq!(all.recv().await.unwrap().kind, Some(EventKind::ReadNote));
        let credit = credits.recv().await.unwrap();
        assert_eq!(credit.channel(), Some(1));
    }

    #[tokio::test]
    async fn test_background_poller() {
        let mut sim = SimulatedValidator::new();
        sim.poll_events = vec![0xEE, 0x02];
        let (transport, _peer) = sim.attach();
        let mut device = Device::new(transport, config());
        let mut credits = device.on_event(EventKind::CreditNote);

        device.start_polling();
        assert!(device.is_polling());

        let event = tokio::time::timeout(Duration::from_secs(1), credits.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.channel(), Some(2));

        device.stop_polling();
        assert!(!device.is_polling());
    }

    #[tokio::test]
    async fn test_poller_skips_while_busy() {
        let mut sim = SimulatedValidator::new();
        sim.poll_events = vec![0xE8];
        let (transport, peer) = sim.attach();
        let mut device = Device::new(transport.clone(), config());
        let mut disabled = device.on_event(EventKind::Disabled);

        let line = device.dispatcher();
        let guard = line.lock().await;
        device.start_polling();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.write_count(), 0);

        drop(guard);
        let event = tokio::time::timeout(Duration::from_secs(1), disabled.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, Some(EventKind::Disabled));
        assert!(peer.lock().received.iter().all(|c| *c == Command::Poll));

        device.close().await.unwrap();
    }
}
