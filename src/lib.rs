#![cfg_attr(not(test), no_std)]

//! cn105
//!
//! Protocol implementation for Mitsubishi heat pumps (aka air conditioners)
//! with CN105 connectors, plus the bookkeeping needed to drive one: matching
//! locally requested settings against what the unit reports, noticing changes
//! made with the IR remote, and detecting when the unit stops answering.
//!
//! It is intended for use on embedded hardware, and as such is `no_std`.
//!
//! The CN105 serial connection operates at 2400 baud, 8 bits per byte, even
//! parity with 1 stop bit (2400 8E1). Configure the serial peripheral as such
//! and hand it to a [`MitsubishiDevice`], or use the [`protocol`] module on its
//! own to parse/encode data on that line.
//!
//! ## General Usage
//!
//! Read from the serial line:
//!
//! ```
//! use cn105::protocol::{FrameData, FrameDecoder};
//!
//! let buf: &[u8] = &[0x42, 0x00, 0xfc, 0x7a, 0x01, 0x30, 0x01, 0x00, 0x54];
//!
//! // Bytes before the start of a frame are discarded.
//! let mut decoder = FrameDecoder::new();
//! let frame = buf.iter().find_map(|b| decoder.feed(*b)).unwrap();
//!
//! // Do different things depending what we received
//! match FrameData::parse(&frame) {
//!     FrameData::SetResponse => println!("Acknowledged a SetRequest"),
//!     FrameData::ConnectResponse => println!("Connected!"),
//!     // ...
//!     _ => {}
//! }
//! ```
//!
//! Encode a packet for writing to the serial line:
//!
//! ```
//! use cn105::protocol::{Encodable, GetInfoRequest, InfoType, Request};
//!
//! let mut buf = [0u8; 22];
//!
//! let frame = GetInfoRequest(InfoType::Settings).to_frame().unwrap();
//! let encoded = frame.encode(&mut buf).unwrap();
//!
//! assert_eq!(
//!     // Frame Header
//!     //
//!     //       ---- Command::GetInfoRequest = 0x42
//!     //       ||||              ---- datalen = 0x10
//!     //       ||||              ||||
//!     &[ 0xfc, 0x42, 0x01, 0x30, 0x10,
//!
//!     // Frame Data (0x10 bytes  ^^^^)
//!     //
//!     // ---- InfoType::Settings = 0x02
//!     // ||||
//!        0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
//!        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
//!
//!     // Frame Footer (Checksum byte)
//!     //
//!     // ---- Checksum = 0xfc - SUM(frame_bytes) & 0xff
//!     // ||||
//!        0x7b ],
//!     encoded);
//! ```

pub mod config;
pub mod functions;
pub mod interface;
pub mod liveness;
pub mod protocol;
pub mod reconcile;
pub mod settings;

#[doc(inline)]
pub use protocol::*;

pub use config::{Config, ConfigError};
pub use functions::{FunctionCode, FunctionsError, FunctionsPart, HeatpumpFunctions};
pub use interface::{HeatpumpListener, MitsubishiDevice, SendError};
pub use liveness::{ConnectionState, Transition};
pub use settings::{Action, HeatpumpSettings, HeatpumpStatus, SettingsChange, StatusUpdate, WantedSettings};
