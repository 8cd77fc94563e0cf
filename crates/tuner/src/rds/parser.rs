//! RDS group interpretation.
//!
//! Turns decoded groups into [`RdsFragment`]s:
//!
//! | group      | fragment                                   |
//! | ---------- | ------------------------------------------ |
//! | any        | PI code, program type                      |
//! | 0A, 0B     | flags, station name (once all 4 segments)  |
//! | 0A         | alternative frequencies                    |
//! | 2A, 2B     | radio text (up to `0x0D` or a full buffer) |
//! | 4A         | clock time                                 |
//!
//! Fragments repeat as long as the station keeps sending the same data;
//! suppressing repeats is the adapter's job.

use tracing::{debug, trace};

use super::decoder::{RDS_BIT_RATE, RdsGroup};
use super::{AF_SEPARATOR, RdsField, RdsFragment};

/// Program type names (EN 50067, Annex F)
const PTY_NAMES: [&str; 32] = [
    "None",
    "News",
    "Current Affairs",
    "Information",
    "Sport",
    "Education",
    "Drama",
    "Culture",
    "Science",
    "Varied",
    "Pop Music",
    "Rock Music",
    "Easy Listening",
    "Light Classical",
    "Serious Classical",
    "Other Music",
    "Weather",
    "Finance",
    "Children's Programmes",
    "Social Affairs",
    "Religion",
    "Phone-In",
    "Travel",
    "Leisure",
    "Jazz Music",
    "Country Music",
    "National Music",
    "Oldies Music",
    "Folk Music",
    "Documentary",
    "Alarm Test",
    "Alarm",
];

/// Nominal group rate of the RDS stream
pub const GROUP_RATE: f64 = RDS_BIT_RATE / 104.0;

/// Radio text end-of-message marker
const RT_END: u8 = 0x0D;

/// Program type name for a 5-bit PTY code
pub fn program_type_name(pty: u8) -> &'static str {
    PTY_NAMES[(pty & 0x1F) as usize]
}

/// Decoder identification bits, indexed by the 0A/0B segment address that
/// carries them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DecoderIdentification {
    dynamic_pty: bool,
    compressed: bool,
    artificial_head: bool,
    stereo: bool,
}

impl DecoderIdentification {
    fn set(&mut self, segment: u16, value: bool) {
        match segment {
            0 => self.dynamic_pty = value,
            1 => self.compressed = value,
            2 => self.artificial_head = value,
            _ => self.stereo = value,
        }
    }
}

/// Radio text assembly buffer for one A/B flag value
struct RadioText {
    chars: [u8; 64],
    received: u16,
    version_b: bool,
    ab_flag: Option<bool>,
    emitted: bool,
}

impl RadioText {
    fn new() -> Self {
        Self {
            chars: [b' '; 64],
            received: 0,
            version_b: false,
            ab_flag: None,
            emitted: false,
        }
    }

    fn segment_len(&self) -> usize {
        if self.version_b { 2 } else { 4 }
    }

    fn capacity(&self) -> usize {
        16 * self.segment_len()
    }

    fn reset(&mut self, version_b: bool) {
        self.chars = [b' '; 64];
        self.received = 0;
        self.version_b = version_b;
        self.emitted = false;
    }

    /// Segments received without a gap from the start
    fn contiguous_segments(&self) -> usize {
        self.received.trailing_ones() as usize
    }

    fn text(&self, len: usize) -> String {
        let end = self.chars[..len]
            .iter()
            .position(|&c| c == RT_END)
            .unwrap_or(len);
        decode_chars(&self.chars[..end])
    }

    /// Text up to the end marker, or the whole buffer, once every segment
    /// before it has arrived
    fn complete_text(&self) -> Option<String> {
        let segments = self.contiguous_segments();
        let covered = segments * self.segment_len();
        if segments == 16 {
            return Some(self.text(self.capacity()));
        }
        self.chars[..covered]
            .contains(&RT_END)
            .then(|| self.text(covered))
    }
}

/// Group parser keeping the partial station name and radio text between
/// groups.
pub struct RdsParser {
    ps: [u8; 8],
    ps_received: u8,
    di: DecoderIdentification,
    rt: RadioText,
    groups: u64,
}

impl Default for RdsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RdsParser {
    pub fn new() -> Self {
        Self {
            ps: [b' '; 8],
            ps_received: 0,
            di: DecoderIdentification::default(),
            rt: RadioText::new(),
            groups: 0,
        }
    }

    /// Number of groups parsed so far
    pub fn groups(&self) -> u64 {
        self.groups
    }

    pub fn process(&mut self, groups: &[RdsGroup]) -> Vec<RdsFragment> {
        groups.iter().flat_map(|g| self.parse_group(g)).collect()
    }

    pub fn parse_group(&mut self, group: &RdsGroup) -> Vec<RdsFragment> {
        self.groups += 1;
        let [pi, block2, block3, block4] = group.blocks;
        let pty = ((block2 >> 5) & 0x1F) as u8;

        debug!(
            group = %group.type_name(),
            pi = format!("0x{:04X}", pi),
            pty,
            "RDS group received"
        );

        let mut out = vec![
            RdsFragment::from_field(RdsField::ProgramInformation, format!("{pi:04X}")),
            RdsFragment::from_field(RdsField::ProgramType, program_type_name(pty)),
        ];

        match (group.group_type(), group.is_version_b()) {
            (0, version_b) => {
                let segment = block2 & 0x03;
                self.di.set(segment, block2 & 0x0004 != 0);
                out.push(RdsFragment::from_field(RdsField::Flags, self.flags(block2)));

                if !version_b && group.valid[2] {
                    out.extend(alternative_frequencies(block3));
                }
                if group.valid[3] {
                    out.extend(self.update_station_name(segment as usize, block4));
                }
            }
            (2, version_b) => out.extend(self.update_radio_text(group, version_b)),
            (4, false) if group.valid[2] && group.valid[3] => {
                if let Some(time) = clock_time(block2, block3, block4) {
                    out.push(RdsFragment::from_field(RdsField::ClockTime, time));
                }
            }
            _ => {}
        }
        out
    }

    /// TP, TA, music/speech, then the decoder identification bits
    fn flags(&self, block2: u16) -> String {
        [
            block2 & 0x0400 != 0,
            block2 & 0x0010 != 0,
            block2 & 0x0008 != 0,
            self.di.stereo,
            self.di.artificial_head,
            self.di.compressed,
            self.di.dynamic_pty,
        ]
        .iter()
        .map(|&f| if f { '1' } else { '0' })
        .collect()
    }

    fn update_station_name(&mut self, segment: usize, block4: u16) -> Option<RdsFragment> {
        if segment == 0 {
            self.ps_received = 0;
        }
        let [hi, lo] = block4.to_be_bytes();
        self.ps[2 * segment] = hi;
        self.ps[2 * segment + 1] = lo;
        self.ps_received |= 1 << segment;
        trace!(segment, mask = format!("{:04b}", self.ps_received), "RDS PS segment");

        if self.ps_received != 0x0F {
            return None;
        }
        self.ps_received = 0;
        let name = decode_chars(&self.ps);
        let name = name.trim();
        (!name.is_empty()).then(|| RdsFragment::from_field(RdsField::StationName, name))
    }

    fn update_radio_text(&mut self, group: &RdsGroup, version_b: bool) -> Option<RdsFragment> {
        let [_, block2, block3, block4] = group.blocks;
        let ab_flag = block2 & 0x0010 != 0;
        let segment = (block2 & 0x0F) as usize;

        let mut pending = None;
        if self.rt.ab_flag != Some(ab_flag) || self.rt.version_b != version_b {
            // A new message starts; a short text without end marker is
            // only known to be finished now
            if !self.rt.emitted && self.rt.contiguous_segments() > 0 {
                let covered = self.rt.contiguous_segments() * self.rt.segment_len();
                let text = self.rt.text(covered);
                let text = text.trim_end();
                if !text.is_empty() {
                    pending = Some(RdsFragment::from_field(RdsField::RadioText, text));
                }
            }
            self.rt.reset(version_b);
            self.rt.ab_flag = Some(ab_flag);
        }

        let chars: Option<[u8; 4]> = if version_b {
            group.valid[3].then(|| {
                let [c, d] = block4.to_be_bytes();
                [c, d, 0, 0]
            })
        } else if group.valid[2] && group.valid[3] {
            let [a, b] = block3.to_be_bytes();
            let [c, d] = block4.to_be_bytes();
            Some([a, b, c, d])
        } else {
            None
        };

        let Some(chars) = chars else {
            return pending;
        };
        let len = self.rt.segment_len();
        let pos = segment * len;
        self.rt.chars[pos..pos + len].copy_from_slice(&chars[..len]);
        self.rt.received |= 1 << segment;
        trace!(segment, ab = ab_flag, "RDS RT segment");

        if pending.is_some() {
            return pending;
        }
        let text = self.rt.complete_text()?;
        let text = text.trim_end();
        if text.is_empty() {
            return None;
        }
        self.rt.emitted = true;
        Some(RdsFragment::from_field(RdsField::RadioText, text))
    }
}

/// Latin-1 view of RDS characters, control codes shown as spaces
fn decode_chars(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b < 0x20 || b == 0x7F { ' ' } else { char::from(b) })
        .collect()
}

/// AF codes 1 to 204 of a 0A block 3, in MHz with one decimal
fn alternative_frequencies(block3: u16) -> Option<RdsFragment> {
    let list: Vec<String> = block3
        .to_be_bytes()
        .into_iter()
        .filter(|code| (1..=204).contains(code))
        .map(|code| {
            let khz = 87_500 + code as u32 * 100;
            format!("{}.{}", khz / 1000, (khz % 1000) / 100)
        })
        .collect();
    (!list.is_empty())
        .then(|| RdsFragment::from_field(RdsField::AlternativeFrequencies, list.join(AF_SEPARATOR)))
}

/// Calendar date of a Modified Julian Day (EN 50067, Annex G)
fn mjd_to_date(mjd: i64) -> (i64, i64, i64) {
    let mjd = mjd as f64;
    let y = ((mjd - 15078.2) / 365.25).floor();
    let m = ((mjd - 14956.1 - (y * 365.25).floor()) / 30.6001).floor();
    let day = mjd - 14956.0 - (y * 365.25).floor() - (m * 30.6001).floor();
    let k = if m == 14.0 || m == 15.0 { 1.0 } else { 0.0 };
    (
        (y + k) as i64 + 1900,
        (m - 1.0 - k * 12.0) as i64,
        day as i64,
    )
}

/// Local time of a 4A group as `YYYY-MM-DD HH:MM UTC+hh:mm`
fn clock_time(block2: u16, block3: u16, block4: u16) -> Option<String> {
    let mjd = (((block2 & 0x03) as i64) << 15) | (block3 >> 1) as i64;
    let hour = (((block3 & 0x01) << 4) | (block4 >> 12)) as i64;
    let minute = ((block4 >> 6) & 0x3F) as i64;
    let offset = (block4 & 0x1F) as i64 * 30;
    let offset = if block4 & 0x20 != 0 { -offset } else { offset };

    if mjd < 15079 || hour > 23 || minute > 59 {
        debug!(mjd, hour, minute, "RDS invalid clock time");
        return None;
    }

    let local = hour * 60 + minute + offset;
    let (year, month, day) = mjd_to_date(mjd + local.div_euclid(1440));
    let local = local.rem_euclid(1440);
    Some(format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02} UTC{}{:02}:{:02}",
        local / 60,
        local % 60,
        if offset < 0 { '-' } else { '+' },
        offset.abs() / 60,
        offset.abs() % 60
    ))
}
