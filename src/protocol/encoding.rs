use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    #[error("buffer of {available} bytes cannot hold {needed} bytes")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("{0} data bytes do not fit in a frame")]
    DataTooLong(usize),
}

pub trait Encodable {
    /// Writes `self` to the front of `into` and returns the written prefix.
    fn encode<'a>(&self, into: &'a mut [u8]) -> Result<&'a [u8], EncodingError>;
}

/// Fixed table pairing protocol values with the byte codes the heat pump uses
/// for them.
///
/// Lookups scan the table in order. A value or byte missing from the table
/// resolves to the first entry, so a table must never be empty.
#[derive(Debug)]
pub struct ValueMap<T: 'static, const N: usize> {
    entries: [(T, u8); N],
}

impl<T: Copy + PartialEq, const N: usize> ValueMap<T, N> {
    pub const fn new(entries: [(T, u8); N]) -> Self {
        Self { entries }
    }

    pub fn try_value_for(&self, byte: u8) -> Option<T> {
        self.entries.iter().find(|(_, b)| *b == byte).map(|(v, _)| *v)
    }

    pub fn try_byte_for(&self, value: T) -> Option<u8> {
        self.entries.iter().find(|(v, _)| *v == value).map(|(_, b)| *b)
    }

    pub fn value_for(&self, byte: u8) -> T {
        self.try_value_for(byte).unwrap_or_else(|| {
            log::debug!("byte {:#04x} not in value map, using default", byte);
            self.entries[0].0
        })
    }

    pub fn byte_for(&self, value: T) -> u8 {
        self.try_byte_for(value).unwrap_or(self.entries[0].1)
    }
}

pub trait OneByteEncodable: Sized {
    fn encoded_as_byte(&self) -> u8;
    fn decoded_from_byte(byte: u8) -> Self;
}

macro_rules! one_byte_encodable_enum {
    ( $( $enum:ty => $map:expr ),* $(,)? ) => {
        $(
            impl OneByteEncodable for $enum {
                fn encoded_as_byte(&self) -> u8 {
                    $map.byte_for(*self)
                }

                fn decoded_from_byte(byte: u8) -> Self {
                    $map.value_for(byte)
                }
            }
        )*
    }
}
