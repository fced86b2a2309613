use super::encoding::*;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Power {
    #[default]
    Off,
    On,
}

pub const POWER_MAP: ValueMap<Power, 2> = ValueMap::new([(Power::Off, 0x00), (Power::On, 0x01)]);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Heat,
    Dry,
    Cool,
    Fan,
    Auto,
}

pub const MODE_MAP: ValueMap<Mode, 5> = ValueMap::new([
    (Mode::Heat, 0x01),
    (Mode::Dry, 0x02),
    (Mode::Cool, 0x03),
    (Mode::Fan, 0x07),
    (Mode::Auto, 0x08),
]);

/// Mode bytes above this value carry the iSee flag.
pub const ISEE_MODE_OFFSET: u8 = 0x08;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Fan {
    #[default]
    Auto,
    Quiet,
    F1,
    F2,
    F3,
    F4,
}

pub const FAN_MAP: ValueMap<Fan, 6> = ValueMap::new([
    (Fan::Auto, 0x00),
    (Fan::Quiet, 0x01),
    (Fan::F1, 0x02),
    (Fan::F2, 0x03),
    (Fan::F3, 0x05),
    (Fan::F4, 0x06),
]);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Vane {
    #[default]
    Auto,
    V1,
    V2,
    V3,
    V4,
    V5,
    Swing,
}

pub const VANE_MAP: ValueMap<Vane, 7> = ValueMap::new([
    (Vane::Auto, 0x00),
    (Vane::V1, 0x01),
    (Vane::V2, 0x02),
    (Vane::V3, 0x03),
    (Vane::V4, 0x04),
    (Vane::V5, 0x05),
    (Vane::Swing, 0x07),
]);

/// Horizontal vane position, as seen facing the indoor unit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WideVane {
    /// `<<`
    #[default]
    LL,
    /// `<`
    L,
    /// `|`
    Center,
    /// `>`
    R,
    /// `>>`
    RR,
    /// `<>`
    LR,
    Swing,
}

pub const WIDE_VANE_MAP: ValueMap<WideVane, 7> = ValueMap::new([
    (WideVane::LL, 0x01),
    (WideVane::L, 0x02),
    (WideVane::Center, 0x03),
    (WideVane::R, 0x04),
    (WideVane::RR, 0x05),
    (WideVane::LR, 0x08),
    (WideVane::Swing, 0x0c),
]);

/// High nibble of the wide vane byte when the wide vane position was adjusted.
pub const WIDE_VANE_ADJUST: u8 = 0x80;

one_byte_encodable_enum!(
    Power => POWER_MAP,
    Mode => MODE_MAP,
    Fan => FAN_MAP,
    Vane => VANE_MAP,
    WideVane => WIDE_VANE_MAP,
);

/// Setpoint table: `0x00` is 31°C down to `0x0f` at 16°C.
pub const SETPOINT_MAP: ValueMap<u8, 16> = ValueMap::new(descending_celsius::<16>(31));

/// Room temperature table: `0x00` is 10°C up to `0x1f` at 41°C.
pub const ROOM_TEMP_MAP: ValueMap<u8, 32> = ValueMap::new(ascending_celsius::<32>(10));

const fn descending_celsius<const N: usize>(highest: u8) -> [(u8, u8); N] {
    let mut entries = [(0, 0); N];
    let mut i = 0;
    while i < N {
        entries[i] = (highest - i as u8, i as u8);
        i += 1;
    }
    entries
}

const fn ascending_celsius<const N: usize>(lowest: u8) -> [(u8, u8); N] {
    let mut entries = [(0, 0); N];
    let mut i = 0;
    while i < N {
        entries[i] = (lowest + i as u8, i as u8);
        i += 1;
    }
    entries
}

/// How the unit reports and accepts setpoints. Newer units use half degrees
/// with an offset, older ones only know the whole-degree table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TemperatureEncoding {
    #[default]
    Mapped,
    HalfDegrees,
}

impl TemperatureEncoding {
    /// Rounds a setpoint to the nearest value this encoding can carry.
    pub fn round(self, celsius: f32) -> f32 {
        match self {
            TemperatureEncoding::Mapped => whole_degrees(celsius) as f32,
            TemperatureEncoding::HalfDegrees => nearest_half_degree(celsius),
        }
    }
}

/// A temperature byte together with the encoding it was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Temperature {
    HalfDegreesCPlusOffset { value: u8 },
    SetpointMapped { value: u8 },
    RoomTempMapped { value: u8 },
}

impl Temperature {
    pub fn half_degrees(celsius: f32) -> Self {
        Temperature::HalfDegreesCPlusOffset { value: (celsius * 2.0 + 128.0 + 0.5) as u8 }
    }

    pub fn setpoint_mapped(celsius: f32) -> Self {
        Temperature::SetpointMapped { value: SETPOINT_MAP.byte_for(whole_degrees(celsius)) }
    }

    pub fn room_temp_mapped(celsius: f32) -> Self {
        Temperature::RoomTempMapped { value: ROOM_TEMP_MAP.byte_for(whole_degrees(celsius)) }
    }

    pub fn value(&self) -> u8 {
        match *self {
            Temperature::HalfDegreesCPlusOffset { value }
            | Temperature::SetpointMapped { value }
            | Temperature::RoomTempMapped { value } => value,
        }
    }

    pub fn celsius(&self) -> f32 {
        match *self {
            Temperature::HalfDegreesCPlusOffset { value } => (value as f32 - 128.0) / 2.0,
            Temperature::SetpointMapped { value } => SETPOINT_MAP.value_for(value) as f32,
            Temperature::RoomTempMapped { value } => ROOM_TEMP_MAP.value_for(value) as f32,
        }
    }
}

/// Rounds to the nearest whole degree; negative values saturate to zero.
fn whole_degrees(celsius: f32) -> u8 {
    (celsius + 0.5) as u8
}

/// Rounds to the nearest half degree.
pub(crate) fn nearest_half_degree(celsius: f32) -> f32 {
    let doubled = celsius * 2.0;
    let rounded = if doubled < 0.0 { (doubled - 0.5) as i32 } else { (doubled + 0.5) as i32 };
    rounded as f32 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_bytes() {
        assert_eq!(Mode::Fan.encoded_as_byte(), 0x07);
        assert_eq!(Fan::decoded_from_byte(0x05), Fan::F3);
        assert_eq!(WideVane::decoded_from_byte(0x0c), WideVane::Swing);
        assert_eq!(Vane::Swing.encoded_as_byte(), 0x07);
    }

    #[test]
    fn unknown_bytes_decode_to_first_entry() {
        assert_eq!(Mode::decoded_from_byte(0x42), Mode::Heat);
        assert_eq!(Vane::decoded_from_byte(0x06), Vane::Auto);
    }

    #[test]
    fn setpoints_round_to_encoding() {
        assert_eq!(TemperatureEncoding::Mapped.round(22.5), 23.0);
        assert_eq!(TemperatureEncoding::Mapped.round(22.4), 22.0);
        assert_eq!(TemperatureEncoding::HalfDegrees.round(22.4), 22.5);
        assert_eq!(TemperatureEncoding::HalfDegrees.round(22.2), 22.0);
    }

    #[test]
    fn setpoint_table() {
        assert_eq!(Temperature::SetpointMapped { value: 0x00 }.celsius(), 31.0);
        assert_eq!(Temperature::SetpointMapped { value: 0x0f }.celsius(), 16.0);
        assert_eq!(Temperature::setpoint_mapped(22.0).value(), 0x09);
        assert_eq!(Temperature::setpoint_mapped(21.6).value(), 0x09);
    }

    #[test]
    fn room_temperature_table() {
        assert_eq!(Temperature::RoomTempMapped { value: 0x00 }.celsius(), 10.0);
        assert_eq!(Temperature::RoomTempMapped { value: 0x0b }.celsius(), 21.0);
        assert_eq!(Temperature::room_temp_mapped(41.0).value(), 0x1f);
    }

    #[test]
    fn half_degrees_with_offset() {
        assert_eq!(Temperature::half_degrees(21.0).value(), 0xaa);
        assert_eq!(Temperature::half_degrees(21.5).value(), 0xab);
        assert_eq!(Temperature::HalfDegreesCPlusOffset { value: 0xab }.celsius(), 21.5);
    }

    #[test]
    fn half_degree_rounding() {
        assert_eq!(nearest_half_degree(21.3), 21.5);
        assert_eq!(nearest_half_degree(21.2), 21.0);
        assert_eq!(nearest_half_degree(-0.3), -0.5);
    }
}
