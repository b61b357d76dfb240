use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Internal class name for object types. Primitives and arrays have no
    /// class a cross-reference could target, so they yield `None`.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            FieldType::Object(name) => Some(name),
            FieldType::Base(_) | FieldType::Array(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

impl ReturnType {
    pub fn class_name(&self) -> Option<&str> {
        match self {
            ReturnType::Void => None,
            ReturnType::Type(ty) => ty.class_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let mut cursor = Cursor::new(desc);
    let ty = cursor.field_type()?;
    cursor.finish()?;
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let mut cursor = Cursor::new(desc);
    cursor.expect(b'(')?;
    let mut params = Vec::new();
    while !cursor.eat(b')') {
        params.push(cursor.field_type()?);
    }
    let return_type = if cursor.eat(b'V') {
        ReturnType::Void
    } else {
        ReturnType::Type(cursor.field_type()?)
    };
    cursor.finish()?;
    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

struct Cursor<'a> {
    desc: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(desc: &'a str) -> Self {
        Self { desc, pos: 0 }
    }

    fn invalid<T>(&self) -> Result<T> {
        Err(Error::InvalidDescriptor(self.desc.to_string()))
    }

    fn peek(&self) -> Option<u8> {
        self.desc.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            self.invalid()
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn field_type(&mut self) -> Result<FieldType> {
        let Some(tag) = self.peek() else {
            return self.invalid();
        };
        self.pos += 1;
        let ty = match tag {
            b'B' => FieldType::Base(BaseType::Byte),
            b'C' => FieldType::Base(BaseType::Char),
            b'D' => FieldType::Base(BaseType::Double),
            b'F' => FieldType::Base(BaseType::Float),
            b'I' => FieldType::Base(BaseType::Int),
            b'J' => FieldType::Base(BaseType::Long),
            b'S' => FieldType::Base(BaseType::Short),
            b'Z' => FieldType::Base(BaseType::Boolean),
            b'L' => {
                let Some(end) = self.desc[self.pos..].find(';') else {
                    return self.invalid();
                };
                let name = &self.desc[self.pos..self.pos + end];
                if name.is_empty() {
                    return self.invalid();
                }
                self.pos += end + 1;
                FieldType::Object(name.to_string())
            }
            b'[' => FieldType::Array(Box::new(self.field_type()?)),
            _ => return self.invalid(),
        };
        Ok(ty)
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.desc.len() {
            Ok(())
        } else {
            self.invalid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_descriptor_primitives_and_arrays() {
        assert_eq!(parse_field_descriptor("I").unwrap(), FieldType::Base(BaseType::Int));
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Object(
                "java/lang/String".to_string()
            )))))
        );
    }

    #[test]
    fn parse_method_descriptor_basic() {
        let desc = parse_method_descriptor("(ILjava/lang/String;)[I").unwrap();
        assert_eq!(
            desc.params,
            vec![
                FieldType::Base(BaseType::Int),
                FieldType::Object("java/lang/String".to_string())
            ]
        );
        assert_eq!(
            desc.return_type,
            ReturnType::Type(FieldType::Array(Box::new(FieldType::Base(BaseType::Int))))
        );
    }

    #[test]
    fn only_object_returns_expose_a_class_name() {
        let object = parse_method_descriptor("()Ljava/lang/StringBuilder;").unwrap();
        assert_eq!(object.return_type.class_name(), Some("java/lang/StringBuilder"));

        for desc in ["()V", "()I", "()[Ljava/lang/String;"] {
            let parsed = parse_method_descriptor(desc).unwrap();
            assert_eq!(parsed.return_type.class_name(), None, "descriptor {desc}");
        }
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("II").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("()").is_err());
        assert!(parse_method_descriptor("()VV").is_err());
    }
}
