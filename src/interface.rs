use embedded_hal::serial;
use heapless::Deque;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::functions::{FunctionsError, FunctionsPart, HeatpumpFunctions};
use crate::liveness::{ConnectionState, Liveness, Transition};
use crate::protocol::*;
use crate::reconcile::Reconciler;
use crate::settings::{Action, HeatpumpSettings, HeatpumpStatus, SettingsChange, StatusUpdate, WantedSettings};

/// Room for a few queued frames; each request is 22 bytes on the wire.
const TX_BUFFER_LEN: usize = 64;
const INFO_QUEUE_LEN: usize = 8;
/// Bytes drained from the UART per [`MitsubishiDevice::poll`].
const MAX_READS_PER_POLL: usize = 128;

/// Receives everything the session learns about the heat pump.
pub trait HeatpumpListener {
    fn on_settings_changed(&mut self, settings: &HeatpumpSettings);
    fn on_status_changed(&mut self, status: &HeatpumpStatus);
    fn on_connection_changed(&mut self, connected: bool);

    fn on_action_changed(&mut self, _action: Action) {}
    fn on_functions_changed(&mut self, _functions: &HeatpumpFunctions) {}
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("heat pump is not connected")]
    NotConnected,
    #[error("transmit buffer is full")]
    BufferFull,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Functions(#[from] FunctionsError),
}

/// One heat pump on one serial line.
///
/// The session never blocks: call [`poll`](Self::poll) often with a
/// monotonic millisecond clock, and it reads what the UART has, reacts to
/// complete frames, runs the scheduler and writes what the UART accepts.
pub struct MitsubishiDevice<S, L>
where
    S: serial::Read<u8> + serial::Write<u8>,
    L: HeatpumpListener,
{
    serial: S,
    listener: L,
    config: Config,
    decoder: FrameDecoder,
    tx_buffer: Deque<u8, TX_BUFFER_LEN>,
    info_queue: Deque<u8, INFO_QUEUE_LEN>,
    reconciler: Reconciler,
    liveness: Liveness,
    last_tick_ms: Option<u64>,
    last_request_ms: Option<u64>,
}

impl<S, L> MitsubishiDevice<S, L>
where
    S: serial::Read<u8> + serial::Write<u8>,
    L: HeatpumpListener,
{
    pub fn new(serial: S, listener: L, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(MitsubishiDevice {
            serial,
            listener,
            reconciler: Reconciler::new(&config),
            liveness: Liveness::new(config.max_non_response),
            config,
            decoder: FrameDecoder::new(),
            tx_buffer: Deque::new(),
            info_queue: Deque::new(),
            last_tick_ms: None,
            last_request_ms: None,
        })
    }

    /// The serial line is open: start the handshake.
    pub fn connect(&mut self, now_ms: u64) {
        self.liveness.transport_opened();
        self.decoder.reset();
        self.last_tick_ms = Some(now_ms);
        self.send_connect(now_ms);
        self.flush();
    }

    /// The serial line was closed.
    pub fn disconnect(&mut self) {
        if self.liveness.transport_closed().is_some() {
            self.listener.on_connection_changed(false);
        }
        self.drop_session_traffic();
    }

    pub fn poll(&mut self, now_ms: u64) {
        if !self.liveness.state().transport_connected {
            return;
        }
        self.receive(now_ms);
        let due = self
            .last_tick_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= u64::from(self.config.update_interval_ms));
        if due {
            self.tick(now_ms);
        }
        self.send_next(now_ms);
        self.flush();
    }

    /// One scheduler round. [`poll`](Self::poll) calls this every
    /// `update_interval_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        self.last_tick_ms = Some(now_ms);
        if !self.liveness.state().transport_connected {
            return;
        }
        if self.liveness.state().device_connected {
            self.schedule_round();
        } else {
            self.send_connect(now_ms);
        }
        self.flush();
    }

    pub fn submit_desired_change(&mut self, change: SettingsChange) {
        self.reconciler.request_change(change);
    }

    /// Reports a room temperature from an external sensor, or `None` to go
    /// back to the unit's own sensor.
    pub fn set_remote_temperature(&mut self, celsius: Option<f32>) -> Result<(), SendError> {
        if !self.liveness.can_send() {
            return Err(SendError::NotConnected);
        }
        self.write_request(&RemoteTemperatureRequest(celsius))?;
        self.reconciler.remote_temperature_sent(celsius);
        Ok(())
    }

    /// Reads both function blocks again.
    pub fn request_functions(&mut self) {
        for part in FunctionsPart::ALL {
            self.queue_info(InfoType::from(part.info_type()));
        }
    }

    pub fn set_functions(&mut self, functions: &HeatpumpFunctions) -> Result<(), SendError> {
        if !self.liveness.can_send() {
            return Err(SendError::NotConnected);
        }
        functions.check_writable()?;

        let first = FunctionsSetRequest { part: FunctionsPart::First, data: *functions.part(FunctionsPart::First) };
        let second = FunctionsSetRequest { part: FunctionsPart::Second, data: *functions.part(FunctionsPart::Second) };
        let (first, second) = (first.to_frame()?, second.to_frame()?);
        if self.tx_free() < first.len() + second.len() {
            return Err(SendError::BufferFull);
        }
        self.enqueue(&first)?;
        self.enqueue(&second)?;
        self.reconciler.functions_sent();
        Ok(())
    }

    pub fn settings(&self) -> &HeatpumpSettings {
        self.reconciler.current()
    }

    pub fn wanted_settings(&self) -> &WantedSettings {
        self.reconciler.wanted()
    }

    pub fn status(&self) -> &HeatpumpStatus {
        self.reconciler.status()
    }

    pub fn functions(&self) -> &HeatpumpFunctions {
        self.reconciler.functions()
    }

    pub fn action(&self) -> Action {
        self.reconciler.action()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        self.liveness.state()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn release(self) -> (S, L) {
        (self.serial, self.listener)
    }

    fn receive(&mut self, now_ms: u64) {
        for _ in 0..MAX_READS_PER_POLL {
            match self.serial.read() {
                Ok(byte) => {
                    if let Some(frame) = self.decoder.feed(byte) {
                        self.handle_frame(&frame, now_ms);
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => log::warn!("serial read error"),
            }
        }
    }

    fn handle_frame(&mut self, frame: &Frame, now_ms: u64) {
        log::trace!("received {:?} with {} data bytes", frame.command(), frame.data_len());
        self.liveness.frame_received(now_ms);
        match FrameData::parse(frame) {
            FrameData::SetResponse => self.reconciler.on_ack(&mut self.listener),
            FrameData::ConnectResponse => {
                if let Some(Transition::Connected) = self.liveness.handshake_acknowledged() {
                    self.listener.on_connection_changed(true);
                    self.last_tick_ms = Some(now_ms);
                    self.queue_info_rotation();
                    self.request_functions();
                }
            }
            FrameData::Settings(info) => self.reconciler.on_settings_received(info, &mut self.listener),
            FrameData::Status(update) => {
                if let StatusUpdate::Operating { .. } = update {
                    self.liveness.status_received();
                }
                self.reconciler.on_status_received(update, &mut self.listener);
            }
            FrameData::Functions(info) => self.reconciler.on_functions_received(info, &mut self.listener),
            FrameData::Unknown { .. } => {}
        }
    }

    /// Writes at most one queued request, keeping `request_spacing_ms`
    /// between requests. Pending settings go before info requests.
    fn send_next(&mut self, now_ms: u64) {
        if !self.liveness.can_send() {
            return;
        }
        if let Some(last) = self.last_request_ms {
            if now_ms.saturating_sub(last) < u64::from(self.config.request_spacing_ms) {
                return;
            }
        }

        if let Some(request) = self.reconciler.set_request() {
            match self.write_request(&request) {
                Ok(()) => {
                    log::debug!("sent settings {:?}", request);
                    self.reconciler.set_request_sent();
                    self.last_request_ms = Some(now_ms);
                }
                Err(err) => log::warn!("could not send settings: {}", err),
            }
            return;
        }

        if let Some(code) = self.info_queue.front().copied() {
            match self.write_request(&GetInfoRequest(InfoType::from(code))) {
                Ok(()) => {
                    self.info_queue.pop_front();
                    self.last_request_ms = Some(now_ms);
                }
                Err(SendError::BufferFull) => {}
                Err(err) => {
                    log::warn!("dropping info request {:#04x}: {}", code, err);
                    self.info_queue.pop_front();
                }
            }
        }
    }

    fn schedule_round(&mut self) {
        self.reconciler.account_deferred(self.config.max_deferred_requests);
        if let Some(Transition::Lost) = self.liveness.request_scheduled() {
            self.connection_lost();
            return;
        }
        self.queue_info_rotation();
    }

    fn send_connect(&mut self, now_ms: u64) {
        match self.write_request(&ConnectRequest) {
            Ok(()) => self.last_request_ms = Some(now_ms),
            Err(err) => log::warn!("could not send connect request: {}", err),
        }
    }

    fn queue_info_rotation(&mut self) {
        for info in [InfoType::Settings, InfoType::RoomTemp, InfoType::Status] {
            self.queue_info(info);
        }
    }

    fn queue_info(&mut self, info: InfoType) {
        let code = info.repr();
        if self.info_queue.iter().any(|queued| *queued == code) {
            return;
        }
        if self.info_queue.push_back(code).is_err() {
            log::debug!("info queue full, skipping {:#04x}", code);
        }
    }

    fn write_request<R: Request>(&mut self, request: &R) -> Result<(), SendError> {
        let frame = request.to_frame()?;
        self.enqueue(&frame)
    }

    fn enqueue(&mut self, frame: &Frame) -> Result<(), SendError> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let bytes = frame.encode(&mut buf)?;
        if self.tx_free() < bytes.len() {
            return Err(SendError::BufferFull);
        }
        for byte in bytes {
            self.tx_buffer.push_back(*byte).map_err(|_| SendError::BufferFull)?;
        }
        log::trace!("queued {:?} frame", frame.command());
        Ok(())
    }

    fn tx_free(&self) -> usize {
        self.tx_buffer.capacity() - self.tx_buffer.len()
    }

    fn flush(&mut self) {
        while let Some(byte) = self.tx_buffer.front().copied() {
            match self.serial.write(byte) {
                Ok(()) => {
                    self.tx_buffer.pop_front();
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    log::warn!("serial write failed, dropping {} queued bytes", self.tx_buffer.len());
                    self.tx_buffer.clear();
                    break;
                }
            }
        }
    }

    fn connection_lost(&mut self) {
        self.listener.on_connection_changed(false);
        self.drop_session_traffic();
    }

    fn drop_session_traffic(&mut self) {
        self.decoder.reset();
        self.tx_buffer.clear();
        self.info_queue.clear();
        self.reconciler.connection_lost();
    }
}
