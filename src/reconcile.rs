//! Keeps the settings the unit reports in line with the settings requested
//! locally.
//!
//! `current` only ever holds what the unit confirmed, either through an info
//! frame or by acknowledging a set request. `wanted` holds what should be
//! written next. A change made with the IR remote shows up as a settings frame
//! that matches neither, and replaces both.

use heapless::Deque;

use crate::config::Config;
use crate::functions::HeatpumpFunctions;
use crate::interface::HeatpumpListener;
use crate::protocol::types::nearest_half_degree;
use crate::protocol::{FunctionsInfo, SetRequest, SettingsInfo, TemperatureEncoding};
use crate::settings::{Action, HeatpumpSettings, HeatpumpStatus, SettingsChange, StatusUpdate, WantedSettings};

const MAX_PENDING: usize = 4;

/// A write frame waiting for its `0x61` acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum PendingKind {
    /// Carries the settings the frame was built from.
    SettingsChange(HeatpumpSettings),
    RemoteTemperature,
    Functions,
}

#[derive(Debug)]
pub struct Reconciler {
    current: HeatpumpSettings,
    wanted: WantedSettings,
    status: HeatpumpStatus,
    functions: HeatpumpFunctions,
    action: Action,
    temperature_encoding: TemperatureEncoding,
    seeded: bool,
    early_change: Option<SettingsChange>,
    pending: Deque<PendingKind, MAX_PENDING>,
    /// Ticks the written change has gone without an acknowledgement.
    unacked_ticks: u8,
    config: Config,
}

impl Reconciler {
    pub fn new(config: &Config) -> Self {
        Reconciler {
            current: HeatpumpSettings::default(),
            wanted: WantedSettings::default(),
            status: HeatpumpStatus::default(),
            functions: HeatpumpFunctions::new(),
            action: Action::default(),
            temperature_encoding: TemperatureEncoding::default(),
            seeded: false,
            early_change: None,
            pending: Deque::new(),
            unacked_ticks: 0,
            config: *config,
        }
    }

    pub fn current(&self) -> &HeatpumpSettings {
        &self.current
    }

    pub fn wanted(&self) -> &WantedSettings {
        &self.wanted
    }

    pub fn status(&self) -> &HeatpumpStatus {
        &self.status
    }

    pub fn functions(&self) -> &HeatpumpFunctions {
        &self.functions
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn temperature_encoding(&self) -> TemperatureEncoding {
        self.temperature_encoding
    }

    /// A settings frame has been received since the session started.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn pending_acks(&self) -> usize {
        self.pending.len()
    }

    pub fn request_change(&mut self, change: SettingsChange) {
        if !self.seeded {
            match self.early_change.as_mut() {
                Some(early) => early.merge(&change),
                None => self.early_change = Some(change),
            }
        }
        let change = self.normalize(change);
        self.wanted.settings.apply(&change);
        self.wanted.has_changed = true;
        self.wanted.has_been_sent = false;
        self.wanted.deferred_requests = 0;
        log::debug!("requested {:?}", change);
    }

    pub fn on_settings_received<L: HeatpumpListener>(&mut self, info: SettingsInfo, listener: &mut L) {
        self.temperature_encoding = info.temperature_encoding;
        let received = info.settings;

        if !self.seeded {
            self.seeded = true;
            self.current = received;
            self.wanted.settings = received;
            match self.early_change.take() {
                Some(change) => {
                    let change = self.normalize(change);
                    self.wanted.settings.apply(&change);
                    self.wanted.has_been_sent = false;
                }
                None => self.wanted.settle(),
            }
            self.commit(listener);
            return;
        }

        if received == self.wanted.settings {
            if self.wanted.has_changed {
                log::debug!("heat pump reports the requested settings");
            }
            self.wanted.settle();
            self.drop_settings_tags();
            if received != self.current || !self.current.connected {
                self.current = received;
                self.commit(listener);
            }
        } else if self.wanted.has_changed {
            log::debug!("settings differ from the pending change, waiting for the unit");
        } else {
            log::info!("settings changed on the unit: {:?}", received);
            self.current = received;
            self.wanted.settings = received;
            self.drop_settings_tags();
            self.commit(listener);
        }
    }

    pub fn on_ack<L: HeatpumpListener>(&mut self, listener: &mut L) {
        match self.pending.pop_front() {
            Some(PendingKind::SettingsChange(_)) if !self.wanted.has_changed => {
                log::debug!("ack for settings the unit already reported");
            }
            Some(PendingKind::SettingsChange(sent)) => {
                self.current = HeatpumpSettings { connected: true, ..sent };
                if sent == self.wanted.settings {
                    self.wanted.settle();
                } else {
                    log::debug!("acknowledged settings were superseded, keeping the newer change");
                }
                self.commit(listener);
            }
            Some(PendingKind::RemoteTemperature) => listener.on_status_changed(&self.status),
            Some(PendingKind::Functions) => log::debug!("function block written"),
            None if self.wanted.has_changed => {
                self.current = HeatpumpSettings { connected: true, ..self.wanted.settings };
                self.wanted.settle();
                self.commit(listener);
            }
            None => listener.on_status_changed(&self.status),
        }
    }

    pub fn on_status_received<L: HeatpumpListener>(&mut self, update: StatusUpdate, listener: &mut L) {
        self.status.apply(update);
        listener.on_status_changed(&self.status);
        self.update_action(listener);
    }

    pub fn on_functions_received<L: HeatpumpListener>(&mut self, info: FunctionsInfo, listener: &mut L) {
        self.functions.set_part(info.part, &info.data);
        listener.on_functions_changed(&self.functions);
    }

    /// The set request for the outstanding change, if one should be written now.
    ///
    /// Only fields that differ from what the unit reported are flagged.
    pub fn set_request(&self) -> Option<SetRequest> {
        if !self.seeded || !self.wanted.has_changed || self.wanted.has_been_sent {
            return None;
        }
        let wanted = &self.wanted.settings;
        let current = &self.current;
        let wide_vane_changed =
            wanted.wide_vane != current.wide_vane || wanted.wide_vane_adjust != current.wide_vane_adjust;
        Some(SetRequest {
            power: (wanted.power != current.power).then_some(wanted.power),
            mode: (wanted.mode != current.mode).then_some(wanted.mode),
            temperature: (wanted.temperature != current.temperature).then_some(wanted.temperature),
            fan: (wanted.fan != current.fan).then_some(wanted.fan),
            vane: (wanted.vane != current.vane).then_some(wanted.vane),
            wide_vane: wide_vane_changed.then_some(wanted.wide_vane),
            wide_vane_adjust: wanted.wide_vane_adjust,
            temperature_encoding: self.temperature_encoding,
        })
    }

    pub fn set_request_sent(&mut self) {
        self.wanted.has_been_sent = true;
        self.unacked_ticks = 0;
        self.push_pending(PendingKind::SettingsChange(self.wanted.settings));
    }

    pub fn remote_temperature_sent(&mut self, celsius: Option<f32>) {
        if let Some(celsius) = celsius {
            self.status.room_temperature = nearest_half_degree(celsius);
        }
        self.push_pending(PendingKind::RemoteTemperature);
    }

    /// Both function blocks went out as separate set requests.
    pub fn functions_sent(&mut self) {
        self.push_pending(PendingKind::Functions);
        self.push_pending(PendingKind::Functions);
    }

    /// Scheduler bookkeeping for the outstanding change.
    ///
    /// A change still unsent at a tick counts as deferred. A change written
    /// but not acknowledged for `max_ticks` ticks is written again.
    pub fn account_deferred(&mut self, max_ticks: u8) {
        if !self.wanted.has_changed {
            return;
        }
        if !self.wanted.has_been_sent {
            self.wanted.deferred_requests = self.wanted.deferred_requests.saturating_add(1);
            if self.wanted.deferred_requests % max_ticks.max(1) == 0 {
                log::warn!("change still unsent after {} ticks", self.wanted.deferred_requests);
            }
            return;
        }
        self.unacked_ticks = self.unacked_ticks.saturating_add(1);
        if self.unacked_ticks >= max_ticks {
            log::warn!("change not acknowledged after {} ticks, sending it again", self.unacked_ticks);
            self.wanted.has_been_sent = false;
            self.unacked_ticks = 0;
            self.drop_settings_tags();
        }
    }

    pub fn connection_lost(&mut self) {
        self.pending.clear();
        self.wanted.has_been_sent = false;
        self.current.connected = false;
    }

    /// Clamps a requested setpoint and rounds it to what the unit accepts.
    fn normalize(&self, mut change: SettingsChange) -> SettingsChange {
        if let Some(celsius) = change.temperature {
            let celsius = self.temperature_encoding.round(self.config.clamp_temperature(celsius));
            change.temperature = Some(celsius);
        }
        change
    }

    fn commit<L: HeatpumpListener>(&mut self, listener: &mut L) {
        listener.on_settings_changed(&self.current);
        self.update_action(listener);
    }

    fn update_action<L: HeatpumpListener>(&mut self, listener: &mut L) {
        let action = Action::derive(&self.current, &self.status);
        if action != self.action {
            self.action = action;
            listener.on_action_changed(action);
        }
    }

    fn push_pending(&mut self, kind: PendingKind) {
        if self.pending.is_full() {
            log::warn!("too many unacknowledged writes, forgetting the oldest");
            self.pending.pop_front();
        }
        let _ = self.pending.push_back(kind);
    }

    fn drop_settings_tags(&mut self) {
        let mut kept = Deque::new();
        while let Some(kind) = self.pending.pop_front() {
            if !matches!(kind, PendingKind::SettingsChange(_)) {
                let _ = kept.push_back(kind);
            }
        }
        self.pending = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionsPart;
    use crate::protocol::{Fan, Mode, Power};
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        settings: Vec<HeatpumpSettings>,
        statuses: Vec<HeatpumpStatus>,
        actions: Vec<Action>,
        functions: usize,
    }

    impl HeatpumpListener for Recorder {
        fn on_settings_changed(&mut self, settings: &HeatpumpSettings) {
            self.settings.push(*settings);
        }

        fn on_status_changed(&mut self, status: &HeatpumpStatus) {
            self.statuses.push(*status);
        }

        fn on_connection_changed(&mut self, _connected: bool) {}

        fn on_action_changed(&mut self, action: Action) {
            self.actions.push(action);
        }

        fn on_functions_changed(&mut self, _functions: &HeatpumpFunctions) {
            self.functions += 1;
        }
    }

    fn unit_settings() -> HeatpumpSettings {
        HeatpumpSettings {
            power: Power::On,
            mode: Mode::Heat,
            temperature: 21.0,
            fan: Fan::F2,
            connected: true,
            ..Default::default()
        }
    }

    fn info(settings: HeatpumpSettings) -> SettingsInfo {
        SettingsInfo { settings, temperature_encoding: TemperatureEncoding::HalfDegrees }
    }

    fn seeded() -> (Reconciler, Recorder) {
        let mut reconciler = Reconciler::new(&Config::default());
        let mut listener = Recorder::default();
        reconciler.on_settings_received(info(unit_settings()), &mut listener);
        (reconciler, listener)
    }

    #[test]
    fn first_settings_frame_seeds_both_sides() {
        let (reconciler, listener) = seeded();
        assert!(reconciler.is_seeded());
        assert_eq!(reconciler.current(), &unit_settings());
        assert_eq!(reconciler.wanted().settings, unit_settings());
        assert!(!reconciler.wanted().has_changed);
        assert_eq!(listener.settings.len(), 1);
        assert_eq!(reconciler.temperature_encoding(), TemperatureEncoding::HalfDegrees);
    }

    #[test]
    fn change_before_first_frame_survives_seeding() {
        let mut reconciler = Reconciler::new(&Config::default());
        let mut listener = Recorder::default();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        assert_eq!(reconciler.set_request(), None);

        reconciler.on_settings_received(info(unit_settings()), &mut listener);
        assert_eq!(reconciler.current().mode, Mode::Heat);
        assert_eq!(reconciler.wanted().settings.mode, Mode::Cool);
        assert_eq!(reconciler.wanted().settings.temperature, 21.0);
        assert!(reconciler.wanted().has_changed);

        let request = reconciler.set_request().unwrap();
        assert_eq!(request.mode, Some(Mode::Cool));
        assert_eq!(request.power, None);
    }

    #[test]
    fn acknowledged_change_is_committed_once() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        assert!(reconciler.set_request().is_some());
        reconciler.set_request_sent();
        assert_eq!(reconciler.set_request(), None);

        reconciler.on_ack(&mut listener);
        assert_eq!(reconciler.current().mode, Mode::Cool);
        assert!(!reconciler.wanted().has_changed);
        assert!(!reconciler.wanted().has_been_sent);
        assert_eq!(listener.settings.len(), 2);

        let current = *reconciler.current();
        reconciler.on_ack(&mut listener);
        assert_eq!(reconciler.current(), &current);
        assert_eq!(listener.settings.len(), 2);
    }

    #[test]
    fn pending_change_ignores_conflicting_frames() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_temperature(24.0));
        reconciler.set_request_sent();

        let other = HeatpumpSettings { fan: Fan::F4, ..unit_settings() };
        reconciler.on_settings_received(info(other), &mut listener);
        assert_eq!(reconciler.current(), &unit_settings());
        assert_eq!(listener.settings.len(), 1);
        assert!(reconciler.wanted().has_changed);
    }

    #[test]
    fn info_frame_confirms_pending_change() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_fan(Fan::Quiet));
        reconciler.set_request_sent();

        let confirmed = HeatpumpSettings { fan: Fan::Quiet, ..unit_settings() };
        reconciler.on_settings_received(info(confirmed), &mut listener);
        assert_eq!(reconciler.current().fan, Fan::Quiet);
        assert!(!reconciler.wanted().has_changed);
        assert_eq!(listener.settings.len(), 2);
    }

    #[test]
    fn external_change_replaces_both_sides() {
        let (mut reconciler, mut listener) = seeded();
        let remote = HeatpumpSettings { power: Power::Off, ..unit_settings() };
        reconciler.on_settings_received(info(remote), &mut listener);
        assert_eq!(reconciler.current().power, Power::Off);
        assert_eq!(reconciler.wanted().settings.power, Power::Off);
        assert_eq!(listener.settings.len(), 2);
        assert_eq!(listener.actions.last(), Some(&Action::Off));

        // an unchanged frame is not reported again
        reconciler.on_settings_received(info(remote), &mut listener);
        assert_eq!(listener.settings.len(), 2);
    }

    #[test]
    fn superseded_ack_keeps_newer_change() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        reconciler.set_request_sent();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Dry));

        reconciler.on_ack(&mut listener);
        assert_eq!(reconciler.current().mode, Mode::Cool);
        assert!(reconciler.wanted().has_changed);
        assert_eq!(reconciler.set_request().and_then(|r| r.mode), Some(Mode::Dry));
    }

    #[test]
    fn remote_temperature_ack_reports_status() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.remote_temperature_sent(Some(19.3));
        reconciler.on_ack(&mut listener);
        assert_eq!(listener.settings.len(), 1);
        assert_eq!(listener.statuses.last().map(|s| s.room_temperature), Some(19.5));
    }

    #[test]
    fn acks_match_writes_in_order() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.remote_temperature_sent(None);
        reconciler.request_change(SettingsChange::default().with_power(Power::Off));
        reconciler.set_request_sent();
        assert_eq!(reconciler.pending_acks(), 2);

        reconciler.on_ack(&mut listener);
        assert!(reconciler.wanted().has_changed);
        reconciler.on_ack(&mut listener);
        assert!(!reconciler.wanted().has_changed);
        assert_eq!(reconciler.current().power, Power::Off);
    }

    #[test]
    fn unacknowledged_change_is_resent() {
        let (mut reconciler, _) = seeded();
        reconciler.request_change(SettingsChange::default().with_vane(crate::protocol::Vane::V2));
        reconciler.set_request_sent();
        for _ in 0..2 {
            reconciler.account_deferred(3);
            assert_eq!(reconciler.set_request(), None);
        }
        reconciler.account_deferred(3);
        assert_eq!(reconciler.wanted().deferred_requests, 0);
        assert_eq!(reconciler.pending_acks(), 0);
        assert!(reconciler.set_request().is_some());
    }

    #[test]
    fn only_unsent_changes_count_as_deferred() {
        let (mut reconciler, _) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        reconciler.account_deferred(10);
        reconciler.account_deferred(10);
        assert_eq!(reconciler.wanted().deferred_requests, 2);

        reconciler.request_change(SettingsChange::default().with_mode(Mode::Dry));
        assert_eq!(reconciler.wanted().deferred_requests, 0);
        reconciler.set_request_sent();
        reconciler.account_deferred(10);
        assert_eq!(reconciler.wanted().deferred_requests, 0);
    }

    #[test]
    fn late_ack_after_confirmation_keeps_newer_settings() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        reconciler.set_request_sent();

        // the unit applies the change but its ack never arrives
        let cool = HeatpumpSettings { mode: Mode::Cool, ..unit_settings() };
        reconciler.on_settings_received(info(cool), &mut listener);
        // then someone switches back with the IR remote
        reconciler.on_settings_received(info(unit_settings()), &mut listener);
        assert_eq!(reconciler.pending_acks(), 0);

        reconciler.remote_temperature_sent(Some(20.0));
        reconciler.on_ack(&mut listener);
        assert_eq!(reconciler.current().mode, Mode::Heat);
        assert_eq!(listener.settings.last().map(|s| s.mode), Some(Mode::Heat));
    }

    #[test]
    fn ack_for_already_reported_settings_is_ignored() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        reconciler.set_request_sent();
        reconciler.wanted.settle();

        reconciler.on_ack(&mut listener);
        assert_eq!(reconciler.current().mode, Mode::Heat);
        assert_eq!(listener.settings.len(), 1);
    }

    #[test]
    fn temperatures_are_clamped_and_rounded() {
        let (mut reconciler, _) = seeded();
        reconciler.request_change(SettingsChange::default().with_temperature(40.0));
        assert_eq!(reconciler.wanted().settings.temperature, 31.0);
        reconciler.request_change(SettingsChange::default().with_temperature(22.3));
        assert_eq!(reconciler.wanted().settings.temperature, 22.5);
    }

    #[test]
    fn mapped_units_get_whole_degrees() {
        let mut reconciler = Reconciler::new(&Config::default());
        let mut listener = Recorder::default();
        reconciler.request_change(SettingsChange::default().with_temperature(22.5));
        let mapped = SettingsInfo { settings: unit_settings(), temperature_encoding: TemperatureEncoding::Mapped };
        reconciler.on_settings_received(mapped, &mut listener);
        assert_eq!(reconciler.wanted().settings.temperature, 23.0);

        reconciler.request_change(SettingsChange::default().with_temperature(19.4));
        assert_eq!(reconciler.wanted().settings.temperature, 19.0);
    }

    #[test]
    fn early_setpoint_uses_the_reported_encoding() {
        let mut reconciler = Reconciler::new(&Config::default());
        let mut listener = Recorder::default();
        reconciler.request_change(SettingsChange::default().with_temperature(22.5));
        reconciler.on_settings_received(info(unit_settings()), &mut listener);
        assert_eq!(reconciler.wanted().settings.temperature, 22.5);
    }

    #[test]
    fn status_and_functions() {
        let (mut reconciler, mut listener) = seeded();
        reconciler.on_status_received(
            StatusUpdate::Operating { operating: true, compressor_frequency: 30 },
            &mut listener,
        );
        assert_eq!(reconciler.action(), Action::Heating);
        assert_eq!(listener.actions.last(), Some(&Action::Heating));

        reconciler.on_functions_received(
            FunctionsInfo { part: FunctionsPart::First, data: [0x05; 15] },
            &mut listener,
        );
        assert!(reconciler.functions().is_part_valid(FunctionsPart::First));
        assert_eq!(listener.functions, 1);
    }

    #[test]
    fn connection_loss_forgets_pending_writes() {
        let (mut reconciler, _) = seeded();
        reconciler.request_change(SettingsChange::default().with_mode(Mode::Cool));
        reconciler.set_request_sent();
        reconciler.connection_lost();
        assert_eq!(reconciler.pending_acks(), 0);
        assert!(!reconciler.current().connected);
        assert!(reconciler.set_request().is_some());
    }
}
