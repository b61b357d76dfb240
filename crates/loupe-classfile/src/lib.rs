#![forbid(unsafe_code)]

mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod reader;

pub use crate::classfile::{ClassSummary, MethodInfo};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
