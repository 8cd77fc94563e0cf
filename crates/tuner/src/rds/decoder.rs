//! RDS block synchronisation and error correction (EN 50067).
//!
//! Bits are shifted into a 26-bit register. Until sync is acquired the
//! syndrome is checked at every bit; a valid offset word (A, B, C, C' or D)
//! is recorded as a sync pulse, and three pulses in the right cyclic rhythm
//! lock the block clock. Once synced, blocks are only checked at 26-bit
//! boundaries, 1-2 bit burst errors are corrected from a syndrome table, and
//! sync is dropped when more than 42 of the last 50 blocks failed.
//!
//! A group is emitted whenever block D closes it with blocks A and B valid.

use std::sync::OnceLock;

use tracing::{debug, trace};

/// Block length in bits (16 data bits and a 10-bit checkword)
pub const BLOCK_LENGTH: u32 = 26;

/// Bit rate of the RDS data stream
pub const RDS_BIT_RATE: f64 = 1187.5;

const BLOCK_MASK: u32 = (1 << BLOCK_LENGTH) - 1;

/// Sync is dropped above this many failed blocks out of the last 50
const MAX_ERRORS_OVER_50: usize = 42;

/// Parity-check matrix, one 10-bit row per received bit (MSB first)
const PARITY_CHECK_MATRIX: [u16; 26] = [
    0b1000000000,
    0b0100000000,
    0b0010000000,
    0b0001000000,
    0b0000100000,
    0b0000010000,
    0b0000001000,
    0b0000000100,
    0b0000000010,
    0b0000000001,
    0b1011011100,
    0b0101101110,
    0b0010110111,
    0b1010000111,
    0b1110011111,
    0b1100010011,
    0b1101010101,
    0b1101110110,
    0b0110111011,
    0b1000000001,
    0b1111011100,
    0b0111101110,
    0b0011110111,
    0b1010100111,
    0b1110001111,
    0b1100011011,
];

/// Syndrome of a 26-bit word
pub(crate) fn syndrome(word: u32) -> u16 {
    (0..BLOCK_LENGTH)
        .filter(|k| (word >> k) & 1 == 1)
        .fold(0, |acc, k| acc ^ PARITY_CHECK_MATRIX[25 - k as usize])
}

/// Offset word position inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    A,
    B,
    C,
    CPrime,
    D,
}

impl Offset {
    const ALL: [Offset; 5] = [Offset::A, Offset::B, Offset::C, Offset::CPrime, Offset::D];

    /// 10-bit offset word added to the checkword
    pub fn word(self) -> u16 {
        match self {
            Offset::A => 0b0011111100,
            Offset::B => 0b0110011000,
            Offset::C => 0b0101101000,
            Offset::CPrime => 0b1101010000,
            Offset::D => 0b0110110100,
        }
    }

    /// Syndrome of a valid block carrying this offset
    fn syndrome(self) -> u16 {
        match self {
            Offset::A => 0b1111011000,
            Offset::B => 0b1111010100,
            Offset::C => 0b1001011100,
            Offset::CPrime => 0b1111001100,
            Offset::D => 0b1001011000,
        }
    }

    fn from_syndrome(s: u16) -> Option<Self> {
        Offset::ALL.into_iter().find(|o| o.syndrome() == s)
    }

    /// Block number inside the group (C and C' share slot 2)
    fn block_number(self) -> usize {
        match self {
            Offset::A => 0,
            Offset::B => 1,
            Offset::C | Offset::CPrime => 2,
            Offset::D => 3,
        }
    }

    fn next(self) -> Self {
        match self {
            Offset::A => Offset::B,
            Offset::B => Offset::C,
            Offset::C | Offset::CPrime => Offset::D,
            Offset::D => Offset::A,
        }
    }

    /// C' is accepted wherever C is expected (type B groups)
    fn matches(self, expected: Offset) -> bool {
        self == expected || (expected == Offset::C && self == Offset::CPrime)
    }
}

/// Running sum over a sliding window of N flags
struct RunningSum<const N: usize> {
    buffer: [bool; N],
    pos: usize,
    sum: usize,
}

impl<const N: usize> RunningSum<N> {
    fn new() -> Self {
        Self {
            buffer: [false; N],
            pos: 0,
            sum: 0,
        }
    }

    fn push(&mut self, value: bool) {
        if self.buffer[self.pos] {
            self.sum -= 1;
        }
        self.buffer[self.pos] = value;
        if value {
            self.sum += 1;
        }
        self.pos = (self.pos + 1) % N;
    }

    fn sum(&self) -> usize {
        self.sum
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Syndrome lookup for 1 and 2 bit burst errors, one table per offset
struct FecTable {
    tables: [Vec<(u16, u32)>; 5],
}

impl FecTable {
    fn new() -> Self {
        let tables = Offset::ALL.map(|offset| {
            let mut table = Vec::with_capacity(2 * BLOCK_LENGTH as usize);
            for pattern in [0b1u32, 0b11] {
                for shift in 0..BLOCK_LENGTH {
                    let error = (pattern << shift) & BLOCK_MASK;
                    table.push((syndrome(error ^ offset.word() as u32), error));
                }
            }
            table
        });
        Self { tables }
    }

    fn get() -> &'static FecTable {
        static TABLE: OnceLock<FecTable> = OnceLock::new();
        TABLE.get_or_init(FecTable::new)
    }

    /// Corrected word, if a burst error explains the syndrome
    fn try_correct(&self, word: u32, expected: Offset) -> Option<u32> {
        let s = syndrome(word);
        let index = Offset::ALL.iter().position(|&o| o == expected)?;
        self.tables[index]
            .iter()
            .filter(|&&(synd, _)| synd == s)
            .map(|&(_, error)| word ^ error)
            .find(|&corrected| {
                Offset::from_syndrome(syndrome(corrected)).is_some_and(|o| o.matches(expected))
            })
    }
}

/// A valid block seen at a given bit count while searching for sync
#[derive(Debug, Clone, Copy)]
struct SyncPulse {
    offset: Offset,
    bit_position: u32,
}

impl SyncPulse {
    fn could_follow(&self, other: &SyncPulse) -> bool {
        let distance = self.bit_position.wrapping_sub(other.bit_position);
        if distance % BLOCK_LENGTH != 0 {
            return false;
        }
        let blocks_apart = distance / BLOCK_LENGTH;
        if blocks_apart == 0 || blocks_apart > 6 {
            return false;
        }
        (other.offset.block_number() + blocks_apart as usize) % 4 == self.offset.block_number()
    }
}

/// The four most recent sync pulses, oldest first
#[derive(Default)]
struct SyncPulseBuffer {
    pulses: [Option<SyncPulse>; 4],
}

impl SyncPulseBuffer {
    fn push(&mut self, pulse: SyncPulse) {
        self.pulses.rotate_left(1);
        self.pulses[3] = Some(pulse);
    }

    /// Three pulses, not necessarily consecutive, in cyclic order
    fn is_sequence_found(&self) -> bool {
        let Some(third) = self.pulses[3] else {
            return false;
        };
        (0..2).any(|i_first| {
            (i_first + 1..3).any(|i_second| {
                match (self.pulses[i_first], self.pulses[i_second]) {
                    (Some(first), Some(second)) => {
                        third.could_follow(&second) && second.could_follow(&first)
                    }
                    _ => false,
                }
            })
        })
    }

    fn clear(&mut self) {
        self.pulses = [None; 4];
    }
}

/// Four data words of a group, with the blocks that passed the checkword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsGroup {
    pub blocks: [u16; 4],
    pub valid: [bool; 4],
}

impl RdsGroup {
    /// Group type code, 0 to 15
    pub fn group_type(&self) -> u8 {
        (self.blocks[1] >> 12) as u8
    }

    /// `false` for version A, `true` for version B
    pub fn is_version_b(&self) -> bool {
        self.blocks[1] & 0x0800 != 0
    }

    /// Group type as written in the standard, e.g. `"0A"` or `"2B"`
    pub fn type_name(&self) -> String {
        format!(
            "{}{}",
            self.group_type(),
            if self.is_version_b() { 'B' } else { 'A' }
        )
    }
}

/// Block decoder over a differentially decoded RDS bit stream.
pub struct RdsDecoder {
    shift: u32,
    shift_len: u32,
    bitcount: u32,
    bits_until_next_block: u32,
    synced: bool,
    expected: Offset,
    pulses: SyncPulseBuffer,
    errors: RunningSum<50>,
    current: [Option<u16>; 4],
    groups: u64,
}

impl Default for RdsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RdsDecoder {
    pub fn new() -> Self {
        Self {
            shift: 0,
            shift_len: 0,
            bitcount: 0,
            bits_until_next_block: BLOCK_LENGTH,
            synced: false,
            expected: Offset::A,
            pulses: SyncPulseBuffer::default(),
            errors: RunningSum::new(),
            current: [None; 4],
            groups: 0,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Number of groups emitted so far
    pub fn groups(&self) -> u64 {
        self.groups
    }

    /// Feed bits (only the lowest bit of each byte is used) and collect the
    /// groups they complete.
    pub fn process(&mut self, bits: &[u8]) -> Vec<RdsGroup> {
        let mut groups = Vec::new();
        for &bit in bits {
            self.shift = ((self.shift << 1) & BLOCK_MASK) | (bit as u32 & 1);
            self.bitcount = self.bitcount.wrapping_add(1);
            if self.shift_len < BLOCK_LENGTH {
                self.shift_len += 1;
                if self.shift_len < BLOCK_LENGTH {
                    continue;
                }
            }

            if self.synced {
                self.bits_until_next_block -= 1;
                if self.bits_until_next_block == 0 {
                    self.bits_until_next_block = BLOCK_LENGTH;
                    groups.extend(self.process_block());
                }
            } else {
                groups.extend(self.try_acquire_sync());
            }
        }
        groups
    }

    fn try_acquire_sync(&mut self) -> Option<RdsGroup> {
        let offset = Offset::from_syndrome(syndrome(self.shift))?;
        self.pulses.push(SyncPulse {
            offset,
            bit_position: self.bitcount,
        });
        if !self.pulses.is_sequence_found() {
            return None;
        }

        self.synced = true;
        self.bits_until_next_block = BLOCK_LENGTH;
        self.errors.clear();
        self.current = [None; 4];
        self.current[offset.block_number()] = Some(data_word(self.shift));
        self.expected = offset.next();
        debug!(offset = ?offset, "RDS sync acquired");

        if offset == Offset::D {
            self.complete_group()
        } else {
            None
        }
    }

    fn process_block(&mut self) -> Option<RdsGroup> {
        let s = syndrome(self.shift);
        let detected = Offset::from_syndrome(s);
        let valid = detected.is_some_and(|o| o.matches(self.expected));

        self.errors.push(!valid);
        if self.errors.sum() > MAX_ERRORS_OVER_50 {
            debug!(
                errors = self.errors.sum(),
                threshold = MAX_ERRORS_OVER_50,
                "RDS sync lost"
            );
            self.synced = false;
            self.errors.clear();
            self.pulses.clear();
            self.current = [None; 4];
            return None;
        }

        let data = if valid {
            Some(data_word(self.shift))
        } else if let Some(corrected) = FecTable::get().try_correct(self.shift, self.expected) {
            trace!(
                block = ?self.expected,
                original = format!("0x{:07X}", self.shift),
                corrected = format!("0x{:07X}", corrected),
                "RDS FEC corrected block"
            );
            Some(data_word(corrected))
        } else {
            trace!(
                expected = ?self.expected,
                syndrome = format!("0x{:03X}", s),
                detected = ?detected,
                "RDS bad block"
            );
            None
        };

        self.current[self.expected.block_number()] = data;
        let closes_group = self.expected == Offset::D;
        self.expected = self.expected.next();
        if closes_group {
            self.complete_group()
        } else {
            None
        }
    }

    fn complete_group(&mut self) -> Option<RdsGroup> {
        let current = std::mem::replace(&mut self.current, [None; 4]);
        let (Some(_), Some(_)) = (current[0], current[1]) else {
            return None;
        };
        let group = RdsGroup {
            blocks: current.map(|b| b.unwrap_or(0)),
            valid: current.map(|b| b.is_some()),
        };
        if group.valid.contains(&false) {
            trace!(valid = ?group.valid, "RDS partial group");
        }
        self.groups += 1;
        Some(group)
    }
}

fn data_word(word: u32) -> u16 {
    (word >> 10) as u16
}

/// Encode a 16-bit data word into a 26-bit block with the given offset.
#[cfg(test)]
pub(crate) fn encode_block(data: u16, offset: Offset) -> u32 {
    const POLY: u32 = 0b101_1011_1001;
    let mut reg = (data as u32) << 10;
    for bit in (10..BLOCK_LENGTH).rev() {
        if reg & (1 << bit) != 0 {
            reg ^= POLY << (bit - 10);
        }
    }
    (((data as u32) << 10) | reg) ^ offset.word() as u32
}

/// Bits (MSB first) of consecutive groups, as the differential decoder
/// would deliver them.
#[cfg(test)]
pub(crate) fn encode_groups(groups: &[[u16; 4]]) -> Vec<u8> {
    let offsets = [Offset::A, Offset::B, Offset::C, Offset::D];
    let mut bits = Vec::with_capacity(groups.len() * 104);
    for group in groups {
        for (data, offset) in group.iter().zip(offsets) {
            let block = encode_block(*data, offset);
            bits.extend((0..BLOCK_LENGTH).rev().map(|k| ((block >> k) & 1) as u8));
        }
    }
    bits
}
