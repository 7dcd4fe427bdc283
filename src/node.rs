//! Type Node — the tagged record every handle-bearing stream entity is
//! represented as, plus the class/field descriptor metadata that hangs
//! off a `ClassDesc` node.

use bitflags::bitflags;

use crate::handle::Handle;
use crate::typecode::FieldTypecode;
use crate::value::Value;

bitflags! {
    /// Class descriptor flag bits (the single flags byte in `TC_CLASSDESC`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassDescFlags: u8 {
        /// `SC_WRITE_METHOD` — the class defines a custom `writeObject`.
        const SC_WRITE_METHOD = 0x01;
        /// `SC_SERIALIZABLE` — the class implements `Serializable`.
        const SC_SERIALIZABLE = 0x02;
        /// `SC_EXTERNALIZABLE` — the class implements `Externalizable`.
        const SC_EXTERNALIZABLE = 0x04;
        /// `SC_BLOCK_DATA` — externalizable data is written as block data.
        const SC_BLOCK_DATA = 0x08;
        /// `SC_ENUM` — the class is an enum type.
        const SC_ENUM = 0x10;
    }
}

/// A field of a class, as declared by its class descriptor.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The field's primitive or object/array kind.
    pub typecode: FieldTypecode,
    /// The field's name.
    pub name: String,
    /// For `L`/`[` fields, the wire-form class name of the field's type —
    /// kept exactly as it appeared on the wire (`L…;` wrapping for object
    /// types, `[`-prefixed descriptor form for arrays). Only stripped at
    /// the point of consumption (e.g. specialiser class-name dispatch).
    pub class_name: Option<String>,
}

/// Metadata describing a Java class's serial form, plus its resolved
/// super-class chain.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// The class's fully-qualified name, exactly as it appeared on the
    /// wire.
    pub name: String,
    /// The class's `serialVersionUID`.
    pub serial_version_uid: i64,
    /// Raw class descriptor flags.
    pub flags: ClassDescFlags,
    /// Declared fields, in wire order (also the order field values are
    /// read/emitted in).
    pub fields: Vec<FieldDescriptor>,
    /// Handle of this class's superclass descriptor, if any.
    pub super_class: Option<Handle>,
}

impl ClassDescriptor {
    /// Whether this class's `writeObject` override means an
    /// object-annotation region follows the declared fields.
    pub fn has_write_method(&self) -> bool {
        self.flags.contains(ClassDescFlags::SC_WRITE_METHOD)
    }

    /// Bare class name with generic/array wrapping stripped, used for
    /// specialiser dispatch and boxed-primitive detection.
    pub fn bare_name(&self) -> &str {
        self.name.as_str()
    }
}

/// A decoded stream string.
#[derive(Debug, Clone)]
pub struct StringEntry {
    /// The string's content, decoded as UTF-8.
    pub value: String,
}

/// A decoded object instance: its class plus its already-built output
/// value (a field mapping for a plain object, or a sequence/mapping/set
/// for a specialised container).
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Handle of this object's (most-derived) class descriptor.
    pub class_descriptor: Handle,
    /// The fully materialised value for this object.
    pub value: Value,
}

/// A decoded array instance.
#[derive(Debug, Clone)]
pub struct ArrayEntry {
    /// Handle of this array's class descriptor (whose name begins with
    /// `[`).
    pub class_descriptor: Handle,
    /// The fully materialised value for this array (`Value::Bytes` for
    /// `[B`, `Value::Sequence` otherwise).
    pub value: Value,
}

/// Everything the handle table can hold. A reference (`TC_REFERENCE`)
/// resolves to one of these and is turned into an output [`Value`] based
/// on which variant it is.
#[derive(Debug, Clone)]
pub enum TypeNode {
    /// A class descriptor.
    ClassDesc(ClassDescriptor),
    /// A string.
    Str(StringEntry),
    /// An object instance.
    Obj(ObjectEntry),
    /// An array instance.
    Arr(ArrayEntry),
}

impl TypeNode {
    /// Human-readable variant name, used in `TypeMismatch` errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ClassDesc(_) => "class descriptor",
            Self::Str(_) => "string",
            Self::Obj(_) => "object",
            Self::Arr(_) => "array",
        }
    }

    /// View this node as a class descriptor, or fail with `TypeMismatch`.
    pub fn as_class_desc(&self) -> crate::error::Result<&ClassDescriptor> {
        match self {
            Self::ClassDesc(cd) => Ok(cd),
            other => Err(crate::error::ErrorKind::TypeMismatch {
                expected: "class descriptor",
                found: other.kind_name(),
            }
            .into()),
        }
    }

    /// View this node as a string, or fail with `TypeMismatch`.
    pub fn as_string(&self) -> crate::error::Result<&str> {
        match self {
            Self::Str(s) => Ok(s.value.as_str()),
            other => Err(crate::error::ErrorKind::TypeMismatch {
                expected: "string",
                found: other.kind_name(),
            }
            .into()),
        }
    }

    /// The value this node should produce when cited by `TC_REFERENCE`.
    pub fn referenced_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.value.clone()),
            Self::Obj(o) => o.value.clone(),
            Self::Arr(a) => a.value.clone(),
            Self::ClassDesc(cd) => Value::String(cd.name.clone()),
        }
    }
}
