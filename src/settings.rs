use crate::protocol::{Fan, Mode, Power, Vane, WideVane};

/// Operating settings of the heat pump.
///
/// Two settings compare equal when every field but `connected` matches.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeatpumpSettings {
    pub power: Power,
    pub mode: Mode,
    /// Setpoint in °C.
    pub temperature: f32,
    pub fan: Fan,
    pub vane: Vane,
    pub wide_vane: WideVane,
    pub wide_vane_adjust: bool,
    pub i_see: bool,
    /// Set once the values come from the unit itself.
    pub connected: bool,
}

impl PartialEq for HeatpumpSettings {
    fn eq(&self, other: &Self) -> bool {
        self.power == other.power
            && self.mode == other.mode
            && self.temperature == other.temperature
            && self.fan == other.fan
            && self.vane == other.vane
            && self.wide_vane == other.wide_vane
            && self.wide_vane_adjust == other.wide_vane_adjust
            && self.i_see == other.i_see
    }
}

impl HeatpumpSettings {
    pub fn apply(&mut self, change: &SettingsChange) {
        if let Some(power) = change.power {
            self.power = power;
        }
        if let Some(mode) = change.mode {
            self.mode = mode;
        }
        if let Some(temperature) = change.temperature {
            self.temperature = temperature;
        }
        if let Some(fan) = change.fan {
            self.fan = fan;
        }
        if let Some(vane) = change.vane {
            self.vane = vane;
        }
        if let Some(wide_vane) = change.wide_vane {
            self.wide_vane = wide_vane;
        }
    }
}

/// The user-settable subset of [`HeatpumpSettings`]; `None` leaves a field alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettingsChange {
    pub power: Option<Power>,
    pub mode: Option<Mode>,
    pub temperature: Option<f32>,
    pub fan: Option<Fan>,
    pub vane: Option<Vane>,
    pub wide_vane: Option<WideVane>,
}

impl SettingsChange {
    pub fn with_power(mut self, power: Power) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_temperature(mut self, celsius: f32) -> Self {
        self.temperature = Some(celsius);
        self
    }

    pub fn with_fan(mut self, fan: Fan) -> Self {
        self.fan = Some(fan);
        self
    }

    pub fn with_vane(mut self, vane: Vane) -> Self {
        self.vane = Some(vane);
        self
    }

    pub fn with_wide_vane(mut self, wide_vane: WideVane) -> Self {
        self.wide_vane = Some(wide_vane);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Takes every field `later` sets.
    pub fn merge(&mut self, later: &SettingsChange) {
        self.power = later.power.or(self.power);
        self.mode = later.mode.or(self.mode);
        self.temperature = later.temperature.or(self.temperature);
        self.fan = later.fan.or(self.fan);
        self.vane = later.vane.or(self.vane);
        self.wide_vane = later.wide_vane.or(self.wide_vane);
    }
}

/// Locally requested settings and how far the unit got in accepting them.
#[derive(Clone, Copy, Debug, Default)]
pub struct WantedSettings {
    pub settings: HeatpumpSettings,
    /// A local change is waiting for the unit to acknowledge it.
    pub has_changed: bool,
    pub has_been_sent: bool,
    /// Scheduler ticks the pending change went unacknowledged.
    pub deferred_requests: u8,
}

impl WantedSettings {
    pub(crate) fn settle(&mut self) {
        self.has_changed = false;
        self.has_been_sent = false;
        self.deferred_requests = 0;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeatpumpStatus {
    pub operating: bool,
    /// Compressor frequency in Hz.
    pub compressor_frequency: u8,
    /// Room temperature in °C.
    pub room_temperature: f32,
}

/// The part of [`HeatpumpStatus`] a single status frame reports.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatusUpdate {
    RoomTemperature(f32),
    Operating { operating: bool, compressor_frequency: u8 },
}

impl HeatpumpStatus {
    pub fn apply(&mut self, update: StatusUpdate) {
        match update {
            StatusUpdate::RoomTemperature(celsius) => self.room_temperature = celsius,
            StatusUpdate::Operating { operating, compressor_frequency } => {
                self.operating = operating;
                self.compressor_frequency = compressor_frequency;
            }
        }
    }
}

/// What the unit is doing right now, as a thermostat would show it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

impl Action {
    pub fn derive(settings: &HeatpumpSettings, status: &HeatpumpStatus) -> Self {
        if settings.power == Power::Off {
            return Action::Off;
        }
        let active = |action| if status.operating { action } else { Action::Idle };
        match settings.mode {
            Mode::Heat => active(Action::Heating),
            Mode::Cool => active(Action::Cooling),
            Mode::Dry => active(Action::Drying),
            Mode::Fan => Action::Fan,
            Mode::Auto if status.room_temperature > settings.temperature => active(Action::Cooling),
            Mode::Auto => active(Action::Heating),
        }
    }
}
