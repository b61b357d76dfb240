use crate::error::{Error, Result};
use crate::reader::Reader;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// One constant pool slot. Only `Utf8` and `Class` entries are resolved;
/// every other tag is parsed over with its correct width and retained as
/// `Skipped` so later indices still line up.
#[derive(Debug, Clone)]
enum Slot {
    Utf8(String),
    Class { name_index: u16 },
    Skipped,
    /// Second slot occupied by a `long` or `double` constant.
    Wide,
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::Utf8(_) => "Utf8",
            Slot::Class { .. } => "Class",
            Slot::Skipped => "unresolved constant",
            Slot::Wide => "second slot of a wide constant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    // Index 0 is reserved by the format and holds a placeholder.
    slots: Vec<Slot>,
}

impl ConstantPool {
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut slots = Vec::with_capacity(count.max(1));
        slots.push(Slot::Skipped);

        while slots.len() < count {
            let tag = reader.read_u1()?;
            match tag {
                TAG_UTF8 => {
                    let len = reader.read_u2()? as usize;
                    let raw = reader.read_bytes(len)?;
                    slots.push(Slot::Utf8(decode_modified_utf8(raw)?));
                }
                TAG_CLASS => {
                    let name_index = reader.read_u2()?;
                    slots.push(Slot::Class { name_index });
                }
                TAG_LONG | TAG_DOUBLE => {
                    reader.skip(8)?;
                    slots.push(Slot::Skipped);
                    slots.push(Slot::Wide);
                }
                TAG_METHOD_HANDLE => {
                    reader.skip(3)?;
                    slots.push(Slot::Skipped);
                }
                TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                    reader.skip(2)?;
                    slots.push(Slot::Skipped);
                }
                TAG_INTEGER | TAG_FLOAT | TAG_FIELDREF | TAG_METHODREF
                | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE | TAG_DYNAMIC
                | TAG_INVOKE_DYNAMIC => {
                    reader.skip(4)?;
                    slots.push(Slot::Skipped);
                }
                other => return Err(Error::InvalidConstantPoolTag(other)),
            }
        }

        Ok(Self { slots })
    }

    fn slot(&self, index: u16) -> Result<&Slot> {
        if index == 0 {
            return Err(Error::InvalidConstantPoolIndex(index));
        }
        self.slots
            .get(index as usize)
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.slot(index)? {
            Slot::Utf8(text) => Ok(text),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<String> {
        match self.slot(index)? {
            Slot::Class { name_index } => Ok(self.get_utf8(*name_index)?.to_string()),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }
}

/// Decodes the JVM's modified UTF-8: no embedded NUL bytes, `\u{0}` written
/// as `0xC0 0x80`, and supplementary characters written as CESU-8 style
/// surrogate pairs of three-byte sequences.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7F => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC0..=0xDF => {
                let b2 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)?;
                if b2 & 0xC0 != 0x80 {
                    return Err(Error::InvalidModifiedUtf8);
                }
                units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
                i += 2;
            }
            0xE0..=0xEF => {
                if i + 2 >= bytes.len() {
                    return Err(Error::InvalidModifiedUtf8);
                }
                let (b2, b3) = (bytes[i + 1], bytes[i + 2]);
                if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                    return Err(Error::InvalidModifiedUtf8);
                }
                units.push(
                    (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
                );
                i += 3;
            }
            _ => return Err(Error::InvalidModifiedUtf8),
        }
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}
