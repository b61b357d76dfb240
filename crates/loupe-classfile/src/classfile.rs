use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// Structural metadata for one class: its name, its superclass, and its
/// method list. This is the subset the cross-reference resolver consults;
/// fields, attributes, and method bodies are parsed over and dropped.
#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    /// `None` only for `java/lang/Object` (and module-info pseudo-classes).
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

impl ClassSummary {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        for _ in 0..fields_count {
            skip_member(&mut reader)?;
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_method(&mut reader, &cp)?);
        }

        skip_attributes(&mut reader)?;
        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            methods,
        })
    }

    /// Looks a method up by bare name. The resolver matches call sites by
    /// name alone, so the first declaration wins when overloads exist.
    pub fn method_named(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn parse_method(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<MethodInfo> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    skip_attributes(reader)?;
    Ok(MethodInfo {
        access_flags,
        name,
        descriptor,
    })
}

fn skip_member(reader: &mut Reader<'_>) -> Result<()> {
    reader.skip(6)?; // access_flags, name_index, descriptor_index
    skip_attributes(reader)
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let count = reader.read_u2()? as usize;
    for _ in 0..count {
        reader.skip(2)?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
