use enum_repr::EnumRepr;
use nom::bytes::complete::{tag, take};
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;
use thiserror::Error;

use super::encoding::*;
use super::frame::{Command, Frame};
use super::types::*;
use crate::functions::{FunctionsPart, FUNCTIONS_PART_LEN};
use crate::settings::HeatpumpSettings;

/// Data length of every info and set request.
pub const REQUEST_DATA_LEN: usize = 0x10;

#[EnumRepr(type = "u8")]
#[derive(Debug, Eq, PartialEq)]
pub enum InfoType {
    Settings = 0x02,
    RoomTemp = 0x03,
    Type4 = 0x04,
    Timers = 0x05,
    Status = 0x06,
    MaybeStandby = 0x09,
    FunctionsPart1 = 0x20,
    FunctionsPart2 = 0x22,
    Unknown = 0xff,
}

impl From<u8> for InfoType {
    fn from(byte: u8) -> Self {
        InfoType::from_repr(byte).unwrap_or(InfoType::Unknown)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected payload type {expected:#04x}, found {found:#04x}")]
    UnexpectedType { expected: u8, found: u8 },
    #[error("payload of {0} bytes is too short")]
    Truncated(usize),
}

fn expect_type(data: &[u8], expected: u8) -> Result<(), DecodeError> {
    match data.first() {
        Some(found) if *found == expected => Ok(()),
        Some(found) => Err(DecodeError::UnexpectedType { expected, found: *found }),
        None => Err(DecodeError::Truncated(0)),
    }
}

fn run<'a, O>(parser: fn(&'a [u8]) -> IResult<&'a [u8], O>, data: &'a [u8]) -> Result<O, DecodeError> {
    parser(data).map(|(_, out)| out).map_err(|_| DecodeError::Truncated(data.len()))
}

/// Outgoing packet with a fixed command byte.
pub trait Request {
    const COMMAND: Command;

    /// Fills the data block and returns how many bytes of it are sent.
    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize;

    fn to_frame(&self) -> Result<Frame, EncodingError> {
        let mut data = [0u8; REQUEST_DATA_LEN];
        let len = self.write_data(&mut data);
        Frame::new(Self::COMMAND.repr(), &data[..len])
    }
}

/// Opens the conversation with the unit; it answers with `0x7a`.
#[derive(Debug, Eq, PartialEq)]
pub struct ConnectRequest;

impl Request for ConnectRequest {
    const COMMAND: Command = Command::ConnectRequest;

    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize {
        data[0] = 0xca;
        data[1] = 0x01;
        2
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct GetInfoRequest(pub InfoType);

impl Request for GetInfoRequest {
    const COMMAND: Command = Command::GetInfoRequest;

    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize {
        data[0] = self.0.repr();
        REQUEST_DATA_LEN
    }
}

const SET_SETTINGS: u8 = 0x01;
const SET_REMOTE_TEMPERATURE: u8 = 0x07;

const FLAG_POWER: u8 = 0x01;
const FLAG_MODE: u8 = 0x02;
const FLAG_TEMPERATURE: u8 = 0x04;
const FLAG_FAN: u8 = 0x08;
const FLAG_VANE: u8 = 0x10;
const FLAG_WIDE_VANE: u8 = 0x01;

/// Changes the unit's settings. Only fields that are `Some` are applied.
///
/// 16 bytes:
///
/// ```text
///  0   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15
/// ID  F0  F1  PW  MO  TM  FA  VA  xx  xx  xx  xx  xx  WV  T2  xx
/// ```
///
/// * ID: `0x01`
/// * F0: flags for power/mode/temp/fan/vane, F1: flag for wide vane
/// * TM: temperature as a setpoint table byte, T2: as half degrees + 128
/// * WV: wide vane, high bit set when adjusted
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SetRequest {
    pub power: Option<Power>,
    pub mode: Option<Mode>,
    pub temperature: Option<f32>,
    pub fan: Option<Fan>,
    pub vane: Option<Vane>,
    pub wide_vane: Option<WideVane>,
    pub wide_vane_adjust: bool,
    pub temperature_encoding: TemperatureEncoding,
}

impl SetRequest {
    /// A request carrying every field of `settings`.
    pub fn from_settings(settings: &HeatpumpSettings, temperature_encoding: TemperatureEncoding) -> Self {
        SetRequest {
            power: Some(settings.power),
            mode: Some(settings.mode),
            temperature: Some(settings.temperature),
            fan: Some(settings.fan),
            vane: Some(settings.vane),
            wide_vane: Some(settings.wide_vane),
            wide_vane_adjust: settings.wide_vane_adjust,
            temperature_encoding,
        }
    }

    fn flags(&self) -> (u8, u8) {
        let mut f0 = 0;
        if self.power.is_some() {
            f0 |= FLAG_POWER;
        }
        if self.mode.is_some() {
            f0 |= FLAG_MODE;
        }
        if self.temperature.is_some() {
            f0 |= FLAG_TEMPERATURE;
        }
        if self.fan.is_some() {
            f0 |= FLAG_FAN;
        }
        if self.vane.is_some() {
            f0 |= FLAG_VANE;
        }
        let f1 = if self.wide_vane.is_some() { FLAG_WIDE_VANE } else { 0 };
        (f0, f1)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        expect_type(data, SET_SETTINGS)?;
        run(set_request, data)
    }
}

fn set_request(input: &[u8]) -> IResult<&[u8], SetRequest> {
    let (input, _) = tag(&[SET_SETTINGS][..])(input)?;
    let (input, (f0, f1, power, mode, setpoint, fan, vane)) =
        tuple((be_u8, be_u8, be_u8, be_u8, be_u8, be_u8, be_u8))(input)?;
    let (input, _) = take(5usize)(input)?;
    let (input, (wide_vane, half_degrees)) = tuple((be_u8, be_u8))(input)?;

    let flagged = |flags: u8, flag: u8| flags & flag != 0;
    let temperature_encoding =
        if half_degrees != 0 { TemperatureEncoding::HalfDegrees } else { TemperatureEncoding::Mapped };
    let temperature = match temperature_encoding {
        TemperatureEncoding::HalfDegrees => Temperature::HalfDegreesCPlusOffset { value: half_degrees },
        TemperatureEncoding::Mapped => Temperature::SetpointMapped { value: setpoint },
    };

    Ok((
        input,
        SetRequest {
            power: flagged(f0, FLAG_POWER).then(|| Power::decoded_from_byte(power)),
            mode: flagged(f0, FLAG_MODE).then(|| Mode::decoded_from_byte(mode)),
            temperature: flagged(f0, FLAG_TEMPERATURE).then(|| temperature.celsius()),
            fan: flagged(f0, FLAG_FAN).then(|| Fan::decoded_from_byte(fan)),
            vane: flagged(f0, FLAG_VANE).then(|| Vane::decoded_from_byte(vane)),
            wide_vane: flagged(f1, FLAG_WIDE_VANE).then(|| WideVane::decoded_from_byte(wide_vane & 0x0f)),
            wide_vane_adjust: wide_vane & 0xf0 == WIDE_VANE_ADJUST,
            temperature_encoding,
        },
    ))
}

impl Request for SetRequest {
    const COMMAND: Command = Command::SetRequest;

    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize {
        let (f0, f1) = self.flags();
        data[0] = SET_SETTINGS;
        data[1] = f0;
        data[2] = f1;
        if let Some(power) = self.power {
            data[3] = power.encoded_as_byte();
        }
        if let Some(mode) = self.mode {
            data[4] = mode.encoded_as_byte();
        }
        if let Some(celsius) = self.temperature {
            match self.temperature_encoding {
                TemperatureEncoding::Mapped => data[5] = Temperature::setpoint_mapped(celsius).value(),
                TemperatureEncoding::HalfDegrees => data[14] = Temperature::half_degrees(celsius).value(),
            }
        }
        if let Some(fan) = self.fan {
            data[6] = fan.encoded_as_byte();
        }
        if let Some(vane) = self.vane {
            data[7] = vane.encoded_as_byte();
        }
        if let Some(wide_vane) = self.wide_vane {
            let adjust = if self.wide_vane_adjust { WIDE_VANE_ADJUST } else { 0 };
            data[13] = wide_vane.encoded_as_byte() | adjust;
        }
        REQUEST_DATA_LEN
    }
}

/// Feeds the unit a room temperature from an external sensor, or hands
/// control back to its own sensor with `None`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RemoteTemperatureRequest(pub Option<f32>);

impl Request for RemoteTemperatureRequest {
    const COMMAND: Command = Command::SetRequest;

    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize {
        data[0] = SET_REMOTE_TEMPERATURE;
        match self.0 {
            Some(celsius) => {
                let celsius = nearest_half_degree(celsius);
                data[1] = 0x01;
                data[2] = (3.0 + (celsius - 10.0) * 2.0) as u8;
                data[3] = Temperature::half_degrees(celsius).value();
            }
            None => {
                data[1] = 0x00;
                data[3] = 0x80;
            }
        }
        REQUEST_DATA_LEN
    }
}

/// Writes one block of the function table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionsSetRequest {
    pub part: FunctionsPart,
    pub data: [u8; FUNCTIONS_PART_LEN],
}

impl Request for FunctionsSetRequest {
    const COMMAND: Command = Command::SetRequest;

    fn write_data(&self, data: &mut [u8; REQUEST_DATA_LEN]) -> usize {
        data[0] = self.part.set_type();
        data[1..].copy_from_slice(&self.data);
        REQUEST_DATA_LEN
    }
}

/// Payload of a `0x62`/`0x02` settings response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettingsInfo {
    pub settings: HeatpumpSettings,
    pub temperature_encoding: TemperatureEncoding,
}

impl SettingsInfo {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        expect_type(data, InfoType::Settings.repr())?;
        run(settings_info, data)
    }
}

fn settings_info(input: &[u8]) -> IResult<&[u8], SettingsInfo> {
    let (input, _) = take(3usize)(input)?;
    let (input, (power, mode, setpoint, fan, vane)) = tuple((be_u8, be_u8, be_u8, be_u8, be_u8))(input)?;
    let (input, _) = take(2usize)(input)?;
    let (input, (wide_vane, half_degrees)) = tuple((be_u8, be_u8))(input)?;

    let i_see = mode > ISEE_MODE_OFFSET;
    let mode = if i_see { mode - ISEE_MODE_OFFSET } else { mode };
    let (temperature, temperature_encoding) = if half_degrees != 0 {
        (Temperature::HalfDegreesCPlusOffset { value: half_degrees }, TemperatureEncoding::HalfDegrees)
    } else {
        (Temperature::SetpointMapped { value: setpoint }, TemperatureEncoding::Mapped)
    };

    let settings = HeatpumpSettings {
        power: Power::decoded_from_byte(power),
        mode: Mode::decoded_from_byte(mode),
        temperature: temperature.celsius(),
        fan: Fan::decoded_from_byte(fan),
        vane: Vane::decoded_from_byte(vane),
        wide_vane: WideVane::decoded_from_byte(wide_vane & 0x0f),
        wide_vane_adjust: wide_vane & 0xf0 == WIDE_VANE_ADJUST,
        i_see,
        connected: true,
    };
    Ok((input, SettingsInfo { settings, temperature_encoding }))
}

/// Payload of a `0x62`/`0x03` room temperature response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomTemperatureInfo {
    pub temperature: Temperature,
}

impl RoomTemperatureInfo {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        expect_type(data, InfoType::RoomTemp.repr())?;
        run(room_temperature_info, data)
    }
}

fn room_temperature_info(input: &[u8]) -> IResult<&[u8], RoomTemperatureInfo> {
    let (input, _) = take(3usize)(input)?;
    let (input, mapped) = be_u8(input)?;
    let (input, _) = take(2usize)(input)?;
    let (input, half_degrees) = be_u8(input)?;

    let temperature = if half_degrees != 0 {
        Temperature::HalfDegreesCPlusOffset { value: half_degrees }
    } else {
        Temperature::RoomTempMapped { value: mapped }
    };
    Ok((input, RoomTemperatureInfo { temperature }))
}

/// Payload of a `0x62`/`0x06` status response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusInfo {
    pub compressor_frequency: u8,
    pub operating: bool,
}

impl StatusInfo {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        expect_type(data, InfoType::Status.repr())?;
        run(status_info, data)
    }
}

fn status_info(input: &[u8]) -> IResult<&[u8], StatusInfo> {
    let (input, _) = take(3usize)(input)?;
    let (input, (compressor_frequency, operating)) = tuple((be_u8, be_u8))(input)?;
    Ok((input, StatusInfo { compressor_frequency, operating: operating != 0 }))
}

/// Payload of a `0x62`/`0x20` or `0x22` function table response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionsInfo {
    pub part: FunctionsPart,
    pub data: [u8; FUNCTIONS_PART_LEN],
}

impl FunctionsInfo {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let found = *data.first().ok_or(DecodeError::Truncated(0))?;
        let part = FunctionsPart::from_info_type(found).ok_or(DecodeError::UnexpectedType {
            expected: FunctionsPart::First.info_type(),
            found,
        })?;
        let block = run(functions_block, data)?;
        let mut info = FunctionsInfo { part, data: [0; FUNCTIONS_PART_LEN] };
        info.data.copy_from_slice(block);
        Ok(info)
    }
}

fn functions_block(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, _) = take(1usize)(input)?;
    take(FUNCTIONS_PART_LEN)(input)
}
