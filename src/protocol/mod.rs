mod frame;
mod frame_data;

#[macro_use]
pub mod encoding;
pub mod packets;
pub mod types;

pub use encoding::{Encodable, EncodingError, OneByteEncodable, ValueMap};
pub use frame::{checksum, Command, Frame, FrameDecoder, HEADER_LEN, MAX_DATA_LEN, MAX_FRAME_LEN};
pub use frame_data::FrameData;
pub use packets::*;
pub use types::*;
