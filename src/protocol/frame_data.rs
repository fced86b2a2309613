use super::frame::{Command, Frame};
use super::packets::*;
use crate::settings::StatusUpdate;

/// Data length of the function table responses.
const FUNCTIONS_DATA_LEN: usize = 0x10;

/// What a validated frame from the unit means.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameData {
    /// `0x61`: the last set request was applied.
    SetResponse,
    /// `0x7a`: the unit answered the connect request.
    ConnectResponse,
    Settings(SettingsInfo),
    Status(StatusUpdate),
    Functions(FunctionsInfo),
    /// Anything this library does not act on.
    Unknown { command: u8, info_type: Option<u8> },
}

impl FrameData {
    pub fn parse(frame: &Frame) -> Self {
        match frame.command() {
            Command::SetResponse => FrameData::SetResponse,
            Command::ConnectResponse => FrameData::ConnectResponse,
            Command::GetInfoResponse => Self::parse_info(frame),
            _ => {
                log::debug!("ignoring frame with command {:#04x}", frame.command_byte());
                FrameData::Unknown { command: frame.command_byte(), info_type: None }
            }
        }
    }

    fn parse_info(frame: &Frame) -> Self {
        let data = frame.data();
        let info_type = match data.first() {
            Some(byte) => *byte,
            None => {
                log::warn!("info response without data");
                return FrameData::Unknown { command: frame.command_byte(), info_type: None };
            }
        };
        let unknown = FrameData::Unknown { command: frame.command_byte(), info_type: Some(info_type) };

        let parsed = match InfoType::from(info_type) {
            InfoType::Settings => SettingsInfo::decode(data).map(FrameData::Settings),
            InfoType::RoomTemp => RoomTemperatureInfo::decode(data)
                .map(|info| FrameData::Status(StatusUpdate::RoomTemperature(info.temperature.celsius()))),
            InfoType::Status => StatusInfo::decode(data).map(|info| {
                FrameData::Status(StatusUpdate::Operating {
                    operating: info.operating,
                    compressor_frequency: info.compressor_frequency,
                })
            }),
            InfoType::FunctionsPart1 | InfoType::FunctionsPart2 if frame.data_len() == FUNCTIONS_DATA_LEN => {
                FunctionsInfo::decode(data).map(FrameData::Functions)
            }
            InfoType::Timers => {
                log::info!("timer info is not supported");
                return unknown;
            }
            other => {
                log::info!("ignoring info response {:?} ({:#04x})", other, info_type);
                return unknown;
            }
        };

        parsed.unwrap_or_else(|err| {
            log::warn!("dropping info response {:#04x}: {}", info_type, err);
            unknown
        })
    }
}
