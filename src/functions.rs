//! Installer function settings.
//!
//! The unit exposes its function table in two blocks of 15 bytes, read with
//! info types `0x20` and `0x22` and written back with set types `0x1f` and
//! `0x21`. Each byte packs a function code (101 to 128) and its value (1 to 3)
//! as `((code - 100) << 2) | value`.

use thiserror::Error;

pub const FUNCTIONS_PART_LEN: usize = 15;

pub const MIN_FUNCTION_CODE: u8 = 101;
pub const MAX_FUNCTION_CODE: u8 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionsPart {
    First,
    Second,
}

impl FunctionsPart {
    pub const ALL: [FunctionsPart; 2] = [FunctionsPart::First, FunctionsPart::Second];

    /// Sub-type of the info request/response carrying this block.
    pub fn info_type(self) -> u8 {
        match self {
            FunctionsPart::First => 0x20,
            FunctionsPart::Second => 0x22,
        }
    }

    /// Sub-type of the set request writing this block.
    pub fn set_type(self) -> u8 {
        match self {
            FunctionsPart::First => 0x1f,
            FunctionsPart::Second => 0x21,
        }
    }

    pub fn from_info_type(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|part| part.info_type() == byte)
    }

    fn index(self) -> usize {
        match self {
            FunctionsPart::First => 0,
            FunctionsPart::Second => 1,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FunctionsError {
    #[error("function code {0} is outside 101..=128")]
    CodeOutOfRange(u8),
    #[error("function value {0} is outside 1..=3")]
    ValueOutOfRange(u8),
    #[error("function code {0} is not reported by the unit")]
    UnknownCode(u8),
    #[error("both function blocks must be read before writing")]
    Incomplete,
    #[error("function block {0:?} does not look like a complete table")]
    InvalidBlock(FunctionsPart),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionCode {
    pub code: u8,
    pub value: u8,
}

impl FunctionCode {
    fn unpack(byte: u8) -> Self {
        FunctionCode { code: (byte >> 2) + 100, value: byte & 0x03 }
    }

    fn pack(self) -> u8 {
        ((self.code - 100) << 2) | self.value
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeatpumpFunctions {
    raw: [[u8; FUNCTIONS_PART_LEN]; 2],
    valid: [bool; 2],
}

impl HeatpumpFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both blocks have been read from the unit.
    pub fn is_valid(&self) -> bool {
        self.valid.iter().all(|v| *v)
    }

    pub fn is_part_valid(&self, part: FunctionsPart) -> bool {
        self.valid[part.index()]
    }

    pub fn set_part(&mut self, part: FunctionsPart, data: &[u8; FUNCTIONS_PART_LEN]) {
        self.raw[part.index()] = *data;
        self.valid[part.index()] = true;
    }

    pub fn part(&self, part: FunctionsPart) -> &[u8; FUNCTIONS_PART_LEN] {
        &self.raw[part.index()]
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn codes(&self) -> impl Iterator<Item = FunctionCode> + '_ {
        self.raw
            .iter()
            .flatten()
            .map(|byte| FunctionCode::unpack(*byte))
            .filter(|f| (MIN_FUNCTION_CODE..=MAX_FUNCTION_CODE).contains(&f.code))
    }

    pub fn value(&self, code: u8) -> Option<u8> {
        self.codes().find(|f| f.code == code).map(|f| f.value)
    }

    pub fn set_value(&mut self, code: u8, value: u8) -> Result<(), FunctionsError> {
        if !(MIN_FUNCTION_CODE..=MAX_FUNCTION_CODE).contains(&code) {
            return Err(FunctionsError::CodeOutOfRange(code));
        }
        if !(1..=3).contains(&value) {
            return Err(FunctionsError::ValueOutOfRange(value));
        }
        let byte = self
            .raw
            .iter_mut()
            .flatten()
            .find(|byte| FunctionCode::unpack(**byte).code == code)
            .ok_or(FunctionsError::UnknownCode(code))?;
        *byte = FunctionCode { code, value }.pack();
        Ok(())
    }

    /// A block is only written back when it was read completely: the first 14
    /// bytes hold a function each and the last one is zero.
    pub(crate) fn check_writable(&self) -> Result<(), FunctionsError> {
        if !self.is_valid() {
            return Err(FunctionsError::Incomplete);
        }
        for part in FunctionsPart::ALL {
            let block = self.part(part);
            let (last, functions) = block.split_last().ok_or(FunctionsError::InvalidBlock(part))?;
            if *last != 0 || functions.iter().any(|b| *b == 0) {
                return Err(FunctionsError::InvalidBlock(part));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // codes 101..=114 in the first block, 115..=128 in the second
    fn sample_block(first_code: u8) -> [u8; FUNCTIONS_PART_LEN] {
        let mut block = [0u8; FUNCTIONS_PART_LEN];
        for (i, byte) in block.iter_mut().take(14).enumerate() {
            *byte = FunctionCode { code: first_code + i as u8, value: 1 + (i as u8 % 3) }.pack();
        }
        block
    }

    fn sample() -> HeatpumpFunctions {
        let mut functions = HeatpumpFunctions::new();
        functions.set_part(FunctionsPart::First, &sample_block(101));
        functions.set_part(FunctionsPart::Second, &sample_block(115));
        functions
    }

    #[test]
    fn code_packing() {
        assert_eq!(FunctionCode::unpack(0x06), FunctionCode { code: 101, value: 2 });
        assert_eq!(FunctionCode { code: 128, value: 3 }.pack(), 0x73);
    }

    #[test]
    fn parts_fill_independently() {
        let mut functions = HeatpumpFunctions::new();
        functions.set_part(FunctionsPart::Second, &sample_block(115));
        assert!(!functions.is_valid());
        assert!(functions.is_part_valid(FunctionsPart::Second));
        assert_eq!(functions.part(FunctionsPart::First), &[0u8; FUNCTIONS_PART_LEN]);
        assert_eq!(functions.value(115), Some(1));
        assert_eq!(functions.value(101), None);
    }

    #[test]
    fn read_and_write_values() {
        let mut functions = sample();
        assert!(functions.is_valid());
        assert_eq!(functions.codes().count(), 28);
        assert_eq!(functions.value(102), Some(2));

        functions.set_value(102, 3).unwrap();
        assert_eq!(functions.value(102), Some(3));
        assert_eq!(functions.set_value(100, 1), Err(FunctionsError::CodeOutOfRange(100)));
        assert_eq!(functions.set_value(102, 0), Err(FunctionsError::ValueOutOfRange(0)));
    }

    #[test]
    fn unknown_code_is_rejected() {
        let mut functions = HeatpumpFunctions::new();
        functions.set_part(FunctionsPart::First, &hex!("06 00 00 00 00 00 00 00 00 00 00 00 00 00 00"));
        assert_eq!(functions.set_value(110, 1), Err(FunctionsError::UnknownCode(110)));
    }

    #[test]
    fn writable_only_when_complete() {
        let mut functions = HeatpumpFunctions::new();
        assert_eq!(functions.check_writable(), Err(FunctionsError::Incomplete));

        functions = sample();
        assert_eq!(functions.check_writable(), Ok(()));

        let mut block = sample_block(101);
        block[3] = 0;
        functions.set_part(FunctionsPart::First, &block);
        assert_eq!(functions.check_writable(), Err(FunctionsError::InvalidBlock(FunctionsPart::First)));
    }

    #[test]
    fn info_types() {
        assert_eq!(FunctionsPart::from_info_type(0x22), Some(FunctionsPart::Second));
        assert_eq!(FunctionsPart::from_info_type(0x21), None);
        assert_eq!(FunctionsPart::First.set_type(), 0x1f);
    }
}
