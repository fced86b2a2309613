use enum_repr::EnumRepr;
use heapless::Vec;

use super::encoding::{Encodable, EncodingError};

#[EnumRepr(type = "u8")]
#[derive(Debug, Eq, PartialEq)]
pub enum Command {
    SetRequest = 0x41,
    GetInfoRequest = 0x42,
    ConnectRequest = 0x5a,

    SetResponse = 0x61,
    GetInfoResponse = 0x62,
    ConnectResponse = 0x7a,

    Unknown = 0xff,
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        Command::from_repr(byte).unwrap_or(Command::Unknown)
    }
}

pub const FRAME_START: u8 = 0xfc;
pub const FRAME_B3: u8 = 0x01;
pub const FRAME_B4: u8 = 0x30;

pub const HEADER_LEN: usize = 5;
/// Largest data block the decoder buffers. Known frames carry 16 bytes.
pub const MAX_DATA_LEN: usize = 32;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_LEN + 1;

/// `0xfc - SUM(bytes) & 0xff`, taken over the header and data bytes.
pub fn checksum<'a>(bytes: impl IntoIterator<Item = &'a u8>) -> u8 {
    let sum = bytes.into_iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    FRAME_START.wrapping_sub(sum)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    command: u8,
    /// Header bytes 2 and 3, `01 30` unless the unit sent something else.
    protocol: [u8; 2],
    data: Vec<u8, MAX_DATA_LEN>,
    checksum: u8,
}

impl Frame {
    pub fn new(command: u8, data: &[u8]) -> Result<Self, EncodingError> {
        let data = Vec::from_slice(data).map_err(|_| EncodingError::DataTooLong(data.len()))?;
        let mut frame = Self { command, protocol: [FRAME_B3, FRAME_B4], data, checksum: 0 };
        frame.checksum = frame.computed_checksum();
        Ok(frame)
    }

    pub fn command(&self) -> Command {
        Command::from(self.command)
    }

    pub fn command_byte(&self) -> u8 {
        self.command
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Length of the encoded frame, header and checksum included.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.data.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn validate_checksum(&self) -> bool {
        self.computed_checksum() == self.checksum
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        [FRAME_START, self.command, self.protocol[0], self.protocol[1], self.data.len() as u8]
    }

    fn computed_checksum(&self) -> u8 {
        checksum(self.header().iter().chain(self.data.iter()))
    }
}

impl Encodable for Frame {
    fn encode<'a>(&self, into: &'a mut [u8]) -> Result<&'a [u8], EncodingError> {
        let len = self.len();
        if into.len() < len {
            return Err(EncodingError::BufferTooSmall { needed: len, available: into.len() });
        }
        into[..HEADER_LEN].copy_from_slice(&self.header());
        into[HEADER_LEN..len - 1].copy_from_slice(&self.data);
        into[len - 1] = self.checksum;
        Ok(&into[..len])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecoderState {
    /// Discarding bytes until a frame start.
    SeekingSync,
    /// Collecting the five header bytes.
    ReadingHeader,
    /// Collecting data bytes and the trailing checksum.
    ReadingBody,
}

/// Assembles frames from a serial byte stream, one byte at a time.
///
/// The decoder keeps its state between calls, so bytes can be fed as they
/// trickle in from the UART. A frame start byte appearing inside a frame body
/// is plain data: the decoder only looks for a new frame once the current one
/// is complete, aborted or [`reset`](FrameDecoder::reset).
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: Vec<u8, MAX_FRAME_LEN>,
    data_len: usize,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { state: DecoderState::SeekingSync, buffer: Vec::new(), data_len: 0 }
    }

    /// Drops any partially received frame.
    pub fn reset(&mut self) {
        self.state = DecoderState::SeekingSync;
        self.buffer.clear();
        self.data_len = 0;
    }

    pub fn is_receiving(&self) -> bool {
        self.state != DecoderState::SeekingSync
    }

    /// Feeds one byte, returning a frame when it completes one with a valid
    /// checksum.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            DecoderState::SeekingSync => {
                if byte == FRAME_START {
                    self.buffer.clear();
                    self.push(byte);
                    self.state = DecoderState::ReadingHeader;
                }
                None
            }
            DecoderState::ReadingHeader => {
                self.push(byte);
                if self.buffer.len() == HEADER_LEN {
                    self.check_header();
                }
                None
            }
            DecoderState::ReadingBody => {
                self.push(byte);
                if self.buffer.len() == HEADER_LEN + self.data_len + 1 {
                    self.complete()
                } else {
                    None
                }
            }
        }
    }

    fn push(&mut self, byte: u8) {
        if self.buffer.push(byte).is_err() {
            log::warn!("frame buffer overflow, dropping partial frame");
            self.reset();
        }
    }

    fn check_header(&mut self) {
        let header = &self.buffer[..HEADER_LEN];
        if header[2] != FRAME_B3 || header[3] != FRAME_B4 {
            log::debug!("unexpected header bytes {:02x} {:02x}", header[2], header[3]);
        }
        let data_len = header[4] as usize;
        log::trace!("header: command {:#04x}, {} data bytes", header[1], data_len);

        if data_len > MAX_DATA_LEN {
            log::warn!("frame announces {} data bytes, resynchronising", data_len);
            self.reset();
            return;
        }
        self.data_len = data_len;
        self.state = DecoderState::ReadingBody;
    }

    fn complete(&mut self) -> Option<Frame> {
        let body_end = HEADER_LEN + self.data_len;
        let received = self.buffer[body_end];
        let calculated = checksum(&self.buffer[..body_end]);

        let frame = if received == calculated {
            Vec::from_slice(&self.buffer[HEADER_LEN..body_end])
                .ok()
                .map(|data| Frame {
                    command: self.buffer[1],
                    protocol: [self.buffer[2], self.buffer[3]],
                    data,
                    checksum: received,
                })
        } else {
            log::warn!("checksum mismatch: received {:02x}, calculated {:02x}", received, calculated);
            None
        };

        self.reset();
        frame
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
