//! Tag-length-value encoding of attribute values and the attribute registry.
//!
//! Only the short forms (1-byte lengths) are produced. Decoding is driven by
//! [`ATTRIBUTES`]: each known attribute id maps to the encodings it accepts and
//! a decode function yielding an [`AttributeReport`], which is then applied to a
//! [`DeviceStateSink`].

use crate::constants::MAX_SHORT_LENGTH;
use crate::error::NeoError;
use crate::packet::AttributeId;
use crate::sink::DeviceStateSink;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;
use thiserror::Error;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Element encodings (tags) of the Matter TLV subset used by the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum Encoding {
    SignedInt1 = 0,
    SignedInt2 = 1,
    SignedInt4 = 2,
    SignedInt8 = 3,
    UnsignedInt1 = 4,
    UnsignedInt2 = 5,
    UnsignedInt4 = 6,
    UnsignedInt8 = 7,
    BooleanFalse = 8,
    BooleanTrue = 9,
    Float4 = 10,
    Float8 = 11,
    Utf8OneLen = 12,
    Utf8TwoLen = 13,
    Utf8FourLen = 14,
    Utf8EightLen = 15,
    BytesOneLen = 16,
    BytesTwoLen = 17,
    BytesFourLen = 18,
    BytesEightLen = 19,
    Null = 20,
    Struct = 21,
    Array = 22,
    List = 23,
    EndOfContainer = 24,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Encoding {
    pub fn tag(self) -> u8 {
        self.into()
    }
}

/// Play state as reported by the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PlayState {
    #[default]
    #[strum(to_string = "undefined")]
    Undefined = 0,
    #[strum(to_string = "stopped")]
    Stopped = 1,
    #[strum(to_string = "paused")]
    Paused = 2,
    #[strum(to_string = "playing")]
    Playing = 3,
}

impl PlayState {
    /// Map a reported index; anything outside 0..=3 is `Undefined`.
    pub fn from_index(index: u8) -> Self {
        PlayState::try_from(index).unwrap_or(PlayState::Undefined)
    }
}

/// Play state change the host can request. Sent as a UTF-8 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PlayCommand {
    #[strum(to_string = "play")]
    Play,
    #[strum(to_string = "pause")]
    Pause,
    #[strum(to_string = "stop")]
    Stop,
}

impl PlayCommand {
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "play" => Some(PlayCommand::Play),
            "pause" => Some(PlayCommand::Pause),
            "stop" => Some(PlayCommand::Stop),
            _ => None,
        }
    }

    /// The state the box ends up in after executing this command.
    pub fn target_state(self) -> PlayState {
        match self {
            PlayCommand::Play => PlayState::Playing,
            PlayCommand::Pause => PlayState::Paused,
            PlayCommand::Stop => PlayState::Stopped,
        }
    }
}

/// Body of a `Voltages` report (after tag and length byte).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct VoltagesRaw {
    pub battery_mv: U16,
    pub capacitor_mv: U16,
    pub primary_ma: U16,
}

/// Power readings of the box in volts and amperes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoxPower {
    pub battery_v: f64,
    pub capacitor_v: f64,
    pub primary_current_a: f64,
}

impl From<VoltagesRaw> for BoxPower {
    fn from(raw: VoltagesRaw) -> Self {
        Self {
            battery_v: raw.battery_mv.get() as f64 / 1000.0,
            capacitor_v: raw.capacitor_mv.get() as f64 / 1000.0,
            primary_current_a: raw.primary_ma.get() as f64 / 1000.0,
        }
    }
}

impl fmt::Display for BoxPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vbat={:.0} mV, Vcap={:.0} mV, Ipri={:.0} mA",
            self.battery_v * 1000.0,
            self.capacitor_v * 1000.0,
            self.primary_current_a * 1000.0
        )
    }
}

fn short_length(len: usize) -> Result<u8, NeoError> {
    if len > MAX_SHORT_LENGTH {
        return Err(NeoError::StringTooLong(len));
    }
    Ok(len as u8)
}

/// Encode `value` as `UTF8_1Len`: tag, length byte, UTF-8 bytes.
pub fn encode_utf8(value: &str) -> Result<Bytes, NeoError> {
    let len = short_length(value.len())?;
    let mut out = BytesMut::with_capacity(2 + value.len());
    out.put_u8(Encoding::Utf8OneLen.tag());
    out.put_u8(len);
    out.extend_from_slice(value.as_bytes());
    Ok(out.freeze())
}

/// Encode `value` as `UnsignedInt1`.
///
/// Values above 255 are not rejected: only the low byte is sent.
pub fn encode_uint1(value: u32) -> Bytes {
    Bytes::from(vec![Encoding::UnsignedInt1.tag(), value as u8])
}

/// Encode `value` as `Bytes_1Len`.
pub fn encode_bytes(value: &[u8]) -> Result<Bytes, NeoError> {
    let len = short_length(value.len())?;
    let mut out = BytesMut::with_capacity(2 + value.len());
    out.put_u8(Encoding::BytesOneLen.tag());
    out.put_u8(len);
    out.extend_from_slice(value);
    Ok(out.freeze())
}

/// Encode a string array the way the firmware does: `Array`, one `UTF8_1Len`
/// element per string, `EndOfContainer`.
pub fn encode_string_array<S: AsRef<str>>(values: &[S]) -> Result<Bytes, NeoError> {
    let mut out = BytesMut::new();
    out.put_u8(Encoding::Array.tag());
    for value in values {
        out.extend_from_slice(&encode_utf8(value.as_ref())?);
    }
    out.put_u8(Encoding::EndOfContainer.tag());
    Ok(out.freeze())
}

/// Decode the value of a `UTF8_1Len` element starting at its tag.
///
/// The length byte is honoured but clamped to the bytes actually present.
/// Returns the string and the number of bytes consumed.
pub fn decode_utf8(bytes: &[u8]) -> Option<(String, usize)> {
    if bytes.len() < 2 || Encoding::from_primitive(bytes[0]) != Encoding::Utf8OneLen {
        return None;
    }
    let end = (2 + bytes[1] as usize).min(bytes.len());
    Some((String::from_utf8_lossy(&bytes[2..end]).into_owned(), end))
}

/// Decode the elements of an array, starting right after the `Array` tag.
///
/// Consumes `UTF8_1Len` elements until another tag or the end of the buffer
/// is reached. A trailing `EndOfContainer` tag is consumed too. An element whose
/// announced length runs past the buffer ends the loop without being consumed.
/// Returns the strings in order and the number of bytes consumed.
pub fn decode_array(bytes: &[u8]) -> (Vec<String>, usize) {
    let mut names = Vec::new();
    let mut pos = 0;
    while pos + 1 < bytes.len() && Encoding::from_primitive(bytes[pos]) == Encoding::Utf8OneLen {
        let len = bytes[pos + 1] as usize;
        let end = pos + 2 + len;
        if end > bytes.len() {
            break;
        }
        names.push(String::from_utf8_lossy(&bytes[pos + 2..end]).into_owned());
        pos = end;
    }
    if bytes.get(pos).map(|&tag| Encoding::from_primitive(tag)) == Some(Encoding::EndOfContainer) {
        pos += 1;
    }
    (names, pos)
}

/// A decoded attribute report, ready to be applied to a state sink.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeReport {
    Voltages(BoxPower),
    AllPatternNames(Vec<String>),
    CurrentPatternName(String),
    IntensityPercent(u8),
    PlayState(PlayState),
    BoxName(String),
}

impl AttributeReport {
    /// Push this value into the matching setter of `sink`.
    pub fn apply<S: DeviceStateSink + ?Sized>(self, sink: &mut S) {
        match self {
            AttributeReport::Voltages(power) => {
                sink.set_voltages(power.battery_v, power.capacitor_v, power.primary_current_a)
            }
            AttributeReport::AllPatternNames(names) => sink.set_available_patterns(names),
            AttributeReport::CurrentPatternName(name) => sink.set_current_pattern(name),
            AttributeReport::IntensityPercent(percent) => sink.set_intensity(percent),
            AttributeReport::PlayState(state) => sink.set_play_state(state),
            AttributeReport::BoxName(name) => sink.set_box_name(name),
        }
    }
}

impl fmt::Display for AttributeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeReport::Voltages(power) => write!(f, "{power}"),
            AttributeReport::AllPatternNames(names) => {
                write!(f, "Available patterns: {}", names.join(", "))
            }
            AttributeReport::CurrentPatternName(name) => write!(f, "Current pattern is {name}"),
            AttributeReport::IntensityPercent(percent) => write!(f, "Intensity is {percent}%"),
            AttributeReport::PlayState(state) => write!(f, "NeoDK is {state}"),
            AttributeReport::BoxName(name) => write!(f, "Box name is {name}"),
        }
    }
}

/// Why a reported value was not applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportSkip {
    #[error("Unexpected attribute id: {0}")]
    UnknownAttribute(u16),

    #[error("Empty report for attribute {0}")]
    Empty(AttributeId),

    #[error("Attribute {attribute} reported with encoding {actual}, expected one of {expected:?}")]
    UnexpectedEncoding {
        attribute: AttributeId,
        expected: &'static [Encoding],
        actual: Encoding,
    },

    #[error("Malformed value for attribute {0}")]
    Malformed(AttributeId),
}

/// Registry entry: which encodings an attribute may arrive in and how to decode it.
///
/// `decode` receives the report body starting at the tag byte.
pub struct AttributeDescriptor {
    pub id: AttributeId,
    pub accepts: &'static [Encoding],
    pub decode: fn(&[u8]) -> Option<AttributeReport>,
}

fn decode_voltages(body: &[u8]) -> Option<AttributeReport> {
    let raw = VoltagesRaw::read_from_bytes(body.get(2..8)?).ok()?;
    Some(AttributeReport::Voltages(BoxPower::from(raw)))
}

fn decode_all_pattern_names(body: &[u8]) -> Option<AttributeReport> {
    if body.len() < 2 {
        return None;
    }
    let (names, _) = decode_array(&body[1..]);
    Some(AttributeReport::AllPatternNames(names))
}

fn decode_current_pattern_name(body: &[u8]) -> Option<AttributeReport> {
    decode_utf8(body).map(|(name, _)| AttributeReport::CurrentPatternName(name))
}

fn decode_intensity_percent(body: &[u8]) -> Option<AttributeReport> {
    body.get(1).map(|&percent| AttributeReport::IntensityPercent(percent))
}

fn decode_play_pause_stop(body: &[u8]) -> Option<AttributeReport> {
    match Encoding::from_primitive(*body.first()?) {
        Encoding::UnsignedInt1 => {
            let state = PlayState::from_index(*body.get(1)?);
            Some(AttributeReport::PlayState(state))
        }
        Encoding::Utf8OneLen => {
            let (command, _) = decode_utf8(body)?;
            let state = PlayCommand::parse(&command)
                .map_or(PlayState::Undefined, PlayCommand::target_state);
            Some(AttributeReport::PlayState(state))
        }
        _ => None,
    }
}

fn decode_box_name(body: &[u8]) -> Option<AttributeReport> {
    decode_utf8(body).map(|(name, _)| AttributeReport::BoxName(name))
}

pub const ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor {
        id: AttributeId::Voltages,
        accepts: &[Encoding::BytesOneLen],
        decode: decode_voltages,
    },
    AttributeDescriptor {
        id: AttributeId::AllPatternNames,
        accepts: &[Encoding::Array],
        decode: decode_all_pattern_names,
    },
    AttributeDescriptor {
        id: AttributeId::CurrentPatternName,
        accepts: &[Encoding::Utf8OneLen],
        decode: decode_current_pattern_name,
    },
    AttributeDescriptor {
        id: AttributeId::IntensityPercent,
        accepts: &[Encoding::UnsignedInt1],
        decode: decode_intensity_percent,
    },
    AttributeDescriptor {
        id: AttributeId::PlayPauseStop,
        accepts: &[Encoding::UnsignedInt1, Encoding::Utf8OneLen],
        decode: decode_play_pause_stop,
    },
    AttributeDescriptor {
        id: AttributeId::BoxName,
        accepts: &[Encoding::Utf8OneLen],
        decode: decode_box_name,
    },
];

/// Look up the registry entry for `id`.
pub fn descriptor(id: AttributeId) -> Option<&'static AttributeDescriptor> {
    ATTRIBUTES.iter().find(|d| d.id == id)
}

/// Decode a report body (tag + value) for attribute `id`.
pub fn decode_report(id: AttributeId, body: &[u8]) -> Result<AttributeReport, ReportSkip> {
    let descriptor = descriptor(id).ok_or(ReportSkip::UnknownAttribute(id.into()))?;
    let tag = *body.first().ok_or(ReportSkip::Empty(id))?;
    let actual = Encoding::from_primitive(tag);
    if !descriptor.accepts.contains(&actual) {
        return Err(ReportSkip::UnexpectedEncoding {
            attribute: id,
            expected: descriptor.accepts,
            actual,
        });
    }
    (descriptor.decode)(body).ok_or(ReportSkip::Malformed(id))
}
