//! Grammar Walker — the recursive reducer over stream typecodes that
//! drives every other component.
//!
//! This is deliberately the largest module in the crate: every
//! `TC_*` production funnels through [`GrammarWalker::read_item`], and the
//! handle-assignment timing contract (register an entity before reading
//! its children) is enforced here and nowhere else.

use std::io::Read;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::collections;
use crate::error::{DecodeError, ErrorKind, Result};
use crate::handle::{Handle, HandleTable};
use crate::node::{ArrayEntry, ClassDescFlags, ClassDescriptor, FieldDescriptor, ObjectEntry, StringEntry, TypeNode};
use crate::reader::ByteReader;
use crate::typecode::{FieldTypecode, StreamTypecode};
use crate::value::Value;

/// The four Java boxed-primitive wrapper classes whose sole `value`
/// field is short-circuited to the bare primitive (§4.6).
const BOXED_PRIMITIVE_CLASSES: &[&str] = &[
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.Double",
];

/// Tunables for a single decode call. Defaults match the behaviour the
/// spec requires; no caller needs to touch these for ordinary use.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Maximum grammar recursion depth before aborting with
    /// `RecursionLimitExceeded`. Guards against a pathological or
    /// truncated stream overflowing the native call stack.
    pub max_depth: usize,
    /// When an object's write-method annotation region doesn't match a
    /// known collection specialiser, collect its raw bytes under a
    /// synthetic `__block_data__` field instead of only skipping them.
    pub collect_unknown_block_data: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_depth: 512,
            collect_unknown_block_data: true,
        }
    }
}

/// Drives a single decode over one byte source.
///
/// Owns the [`ByteReader`] and [`HandleTable`] for the duration of the
/// decode; nothing about this state is shared across calls, matching the
/// concurrency model in the spec (two concurrent decodes need two
/// independent walkers).
pub struct GrammarWalker<R: Read> {
    reader: ByteReader<R>,
    handles: HandleTable,
    options: DecoderOptions,
    depth: usize,
    context: Vec<String>,
}

impl<R: Read> GrammarWalker<R> {
    /// Wrap a byte source with default options. Does not read the
    /// 4-byte stream header — call [`GrammarWalker::read_header`] first.
    pub fn new(inner: R, options: DecoderOptions) -> Self {
        Self {
            reader: ByteReader::new(inner),
            handles: HandleTable::new(),
            options,
            depth: 0,
            context: Vec::new(),
        }
    }

    /// Validate the 4-byte stream magic/version prefix.
    pub fn read_header(&mut self) -> Result<()> {
        let magic = self.reader.read_u16()?;
        let version = self.reader.read_u16()?;
        if magic != 0xACED {
            return Err(self.err(ErrorKind::MalformedHeader(format!(
                "expected magic 0xACED, found {magic:#06X}"
            ))));
        }
        if version != 0x0005 {
            return Err(self.err(ErrorKind::MalformedHeader(format!(
                "expected version 0x0005, found {version:#06X}"
            ))));
        }
        debug!("stream header ok (magic {magic:#06X}, version {version:#06X})");
        Ok(())
    }

    /// Read and decode one top-level stream item.
    pub fn read_item(&mut self) -> Result<Value> {
        let tc = self.reader.read_typecode().map_err(|e| self.attach(e))?;
        self.dispatch(tc)
    }

    /// Read one top-level item, or `None` at a clean end of stream (used
    /// by callers that want every object a stream carries, not just the
    /// first).
    pub fn try_read_item(&mut self) -> Result<Option<Value>> {
        match self.reader.read_u8() {
            Ok(byte) => {
                let tc = StreamTypecode::try_from(byte).map_err(|e| self.attach(e))?;
                Ok(Some(self.dispatch(tc)?))
            }
            Err(e) if matches!(e.kind, ErrorKind::ShortRead { expected: 1 }) => Ok(None),
            Err(e) => Err(self.attach(e)),
        }
    }

    fn err(&self, kind: ErrorKind) -> DecodeError {
        DecodeError::new(kind).with_offset(self.reader.position())
    }

    fn attach(&self, mut e: DecodeError) -> DecodeError {
        if e.offset.is_none() {
            e.offset = Some(self.reader.position());
        }
        for frame in self.context.iter().rev() {
            e = e.with_context(frame.clone());
        }
        e
    }

    fn enter(&mut self, frame: impl Into<String>) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(self.err(ErrorKind::RecursionLimitExceeded(self.options.max_depth)));
        }
        self.context.push(frame.into());
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
        self.context.pop();
    }

    fn dispatch(&mut self, tc: StreamTypecode) -> Result<Value> {
        if !tc.is_supported() {
            return Err(self.err(ErrorKind::UnsupportedTypecode(tc.name())));
        }
        match tc {
            StreamTypecode::Null => Ok(Value::Null),
            StreamTypecode::Reference => self.read_reference(),
            StreamTypecode::String => self.read_short_string(),
            StreamTypecode::LongString => self.read_long_string(),
            StreamTypecode::ClassDesc => {
                let handle = self.read_class_desc_body()?;
                let name = self.handles.find(handle)?.as_class_desc()?.name.clone();
                Ok(Value::String(name))
            }
            StreamTypecode::Object => self.read_object(),
            StreamTypecode::Array => self.read_array(),
            StreamTypecode::BlockData | StreamTypecode::BlockDataLong | StreamTypecode::EndBlockData => {
                Err(self.err(ErrorKind::InvalidBlockData(format!(
                    "unexpected {} outside an annotation region",
                    tc.name()
                ))))
            }
            StreamTypecode::Class
            | StreamTypecode::Reset
            | StreamTypecode::Exception
            | StreamTypecode::ProxyClassDesc
            | StreamTypecode::Enum => unreachable!("filtered by is_supported above"),
        }
    }

    fn read_reference(&mut self) -> Result<Value> {
        let raw = self.reader.read_u32().map_err(|e| self.attach(e))?;
        let handle = Handle::new(raw);
        if handle.value() < Handle::BASE.value() || handle.value() >= self.handles.next_handle().value() {
            return Err(self.err(ErrorKind::HandleNotFound(handle.value())));
        }
        let node = self.handles.find(handle).map_err(|e| self.attach(e))?;
        Ok(node.referenced_value())
    }

    fn read_short_string(&mut self) -> Result<Value> {
        let len = self.reader.read_u16().map_err(|e| self.attach(e))? as usize;
        self.finish_string(len)
    }

    fn read_long_string(&mut self) -> Result<Value> {
        let len = self.reader.read_u64().map_err(|e| self.attach(e))? as usize;
        self.finish_string(len)
    }

    fn finish_string(&mut self, len: usize) -> Result<Value> {
        let s = self.reader.read_fixed_string(len).map_err(|e| self.attach(e))?;
        self.handles.append(TypeNode::Str(StringEntry { value: s.clone() }));
        Ok(Value::String(s))
    }

    /// Reads the string content (without registering in the handle
    /// table's value space as anything but a string), used for field
    /// class names where only the text is needed by the caller.
    fn read_string_raw(&mut self, long_form: bool) -> Result<String> {
        let len = if long_form {
            self.reader.read_u64().map_err(|e| self.attach(e))? as usize
        } else {
            self.reader.read_u16().map_err(|e| self.attach(e))? as usize
        };
        let s = self.reader.read_fixed_string(len).map_err(|e| self.attach(e))?;
        self.handles.append(TypeNode::Str(StringEntry { value: s.clone() }));
        Ok(s)
    }

    /// Reads a class name that is itself a handle-bearing stream-string:
    /// `TC_STRING`, `TC_LONGSTRING`, or `TC_REFERENCE` to a previously
    /// seen string.
    fn read_class_name_ref(&mut self) -> Result<String> {
        let tc = self.reader.read_typecode().map_err(|e| self.attach(e))?;
        match tc {
            StreamTypecode::String => self.read_string_raw(false),
            StreamTypecode::LongString => self.read_string_raw(true),
            StreamTypecode::Reference => {
                let raw = self.reader.read_u32().map_err(|e| self.attach(e))?;
                let handle = Handle::new(raw);
                let node = self.handles.find(handle).map_err(|e| self.attach(e))?;
                Ok(node.as_string().map_err(|e| self.attach(e))?.to_string())
            }
            other => Err(self.err(ErrorKind::TypeMismatch {
                expected: "string",
                found: other.name(),
            })),
        }
    }

    /// Entry shared by `TC_OBJECT`, `TC_ARRAY`, and a class descriptor's
    /// super-class slot: the next typecode must be `TC_CLASSDESC`,
    /// `TC_PROXYCLASSDESC`, `TC_REFERENCE`, or `TC_NULL`.
    fn read_class_desc_ref(&mut self) -> Result<Option<Handle>> {
        let tc = self.reader.read_typecode().map_err(|e| self.attach(e))?;
        match tc {
            StreamTypecode::Null => Ok(None),
            StreamTypecode::ClassDesc => Ok(Some(self.read_class_desc_body()?)),
            StreamTypecode::Reference => {
                let raw = self.reader.read_u32().map_err(|e| self.attach(e))?;
                let handle = Handle::new(raw);
                self.handles
                    .find(handle)
                    .map_err(|e| self.attach(e))?
                    .as_class_desc()
                    .map_err(|e| self.attach(e))?;
                Ok(Some(handle))
            }
            StreamTypecode::ProxyClassDesc => {
                Err(self.err(ErrorKind::UnsupportedTypecode(tc.name())))
            }
            other => Err(self.err(ErrorKind::TypeMismatch {
                expected: "class descriptor",
                found: other.name(),
            })),
        }
    }

    /// Reads a `TC_CLASSDESC` body (the typecode byte has already been
    /// consumed by the caller) and registers it in the handle table
    /// *before* its fields are parsed, so a self-referential field
    /// resolves correctly.
    fn read_class_desc_body(&mut self) -> Result<Handle> {
        self.enter("<classdesc>")?;
        let result = self.read_class_desc_body_inner();
        self.exit();
        result
    }

    fn read_class_desc_body_inner(&mut self) -> Result<Handle> {
        let name_len = self.reader.read_u16().map_err(|e| self.attach(e))? as usize;
        let name = self.reader.read_fixed_string(name_len).map_err(|e| self.attach(e))?;
        trace!("class descriptor: {name}");
        self.context.push(name.clone());
        let serial_version_uid = self.reader.read_i64().map_err(|e| self.attach(e))?;

        let handle = self.handles.reserve();

        let flags_byte = self.reader.read_u8().map_err(|e| self.attach(e))?;
        let flags = ClassDescFlags::from_bits_truncate(flags_byte);

        let field_count = self.reader.read_u16().map_err(|e| self.attach(e))?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(self.read_field_descriptor()?);
        }

        // Class annotations are required to be empty: exactly one
        // TC_ENDBLOCKDATA and nothing else.
        let tc = self.reader.read_typecode().map_err(|e| self.attach(e))?;
        if tc != StreamTypecode::EndBlockData {
            self.context.pop();
            return Err(self.err(ErrorKind::InvalidBlockData(format!(
                "non-empty class annotation for {name} (found {})",
                tc.name()
            ))));
        }

        let super_class = self.read_class_desc_ref()?;

        self.handles.fill(
            handle,
            TypeNode::ClassDesc(ClassDescriptor {
                name,
                serial_version_uid,
                flags,
                fields,
                super_class,
            }),
        );
        self.context.pop();
        Ok(handle)
    }

    fn read_field_descriptor(&mut self) -> Result<FieldDescriptor> {
        let tc_byte = self.reader.read_u8().map_err(|e| self.attach(e))?;
        let typecode = FieldTypecode::try_from(tc_byte).map_err(|e| self.attach(e))?;
        let name_len = self.reader.read_u16().map_err(|e| self.attach(e))? as usize;
        let name = self.reader.read_fixed_string(name_len).map_err(|e| self.attach(e))?;
        let class_name = if typecode.is_primitive() {
            None
        } else {
            Some(self.read_class_name_ref()?)
        };
        Ok(FieldDescriptor {
            typecode,
            name,
            class_name,
        })
    }

    fn read_object(&mut self) -> Result<Value> {
        self.enter("<object>")?;
        let result = self.read_object_inner();
        self.exit();
        result
    }

    fn read_object_inner(&mut self) -> Result<Value> {
        let class_handle = self.read_class_desc_ref()?.ok_or_else(|| {
            self.err(ErrorKind::TypeMismatch {
                expected: "class descriptor",
                found: "null",
            })
        })?;

        let object_handle = self.handles.reserve();

        let concrete_name = self.handles.find(class_handle)?.as_class_desc()?.name.clone();
        trace!("object: {concrete_name} (handle {object_handle})");
        let chain = self.resolve_chain(class_handle)?;

        let mut fields = IndexMap::new();
        let mut container_value: Option<Value> = None;

        for cd_handle in &chain {
            let cd = self.handles.find(*cd_handle)?.as_class_desc()?.clone();
            self.context.push(cd.name.clone());

            for fd in &cd.fields {
                let value = self.read_field_value(fd)?;
                fields.insert(fd.name.clone(), value);
            }

            if cd.has_write_method() {
                if cd.bare_name() == "java.util.BitSet" {
                    let set = collections::read_bitset(self, &fields)?;
                    container_value = Some(set);
                } else if let Some(v) = collections::try_read_annotation(self, cd.bare_name())? {
                    container_value = Some(v);
                } else {
                    self.skip_annotation(&mut fields)?;
                }
            }

            self.context.pop();
        }

        let value = match container_value {
            Some(v) => v,
            None => match boxed_primitive_value(&concrete_name, &fields) {
                Some(v) => v,
                None => Value::Object(fields),
            },
        };

        self.handles.fill(
            object_handle,
            TypeNode::Obj(ObjectEntry {
                class_descriptor: class_handle,
                value: value.clone(),
            }),
        );
        Ok(value)
    }

    /// Walks the super-class chain starting at `leaf`, returning handles
    /// ordered top-most superclass first, concrete class last — the
    /// order field values and annotation regions are read in.
    fn resolve_chain(&self, leaf: Handle) -> Result<Vec<Handle>> {
        let mut chain = vec![leaf];
        let mut current = leaf;
        loop {
            let cd = self.handles.find(current)?.as_class_desc()?;
            match cd.super_class {
                Some(parent) => {
                    chain.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    fn read_field_value(&mut self, fd: &FieldDescriptor) -> Result<Value> {
        self.context.push(fd.name.clone());
        let result = match fd.typecode {
            FieldTypecode::Object | FieldTypecode::Array => self.read_item(),
            primitive => read_primitive(&mut self.reader, primitive).map_err(|e| self.attach(e)),
        };
        self.context.pop();
        result
    }

    /// Reads an object-annotation region with no matching specialiser:
    /// any sequence of stream items, collecting raw `TC_BLOCKDATA`
    /// payloads if configured, terminated by `TC_ENDBLOCKDATA`.
    fn skip_annotation(&mut self, fields: &mut IndexMap<String, Value>) -> Result<()> {
        loop {
            let tc = self.reader.read_typecode().map_err(|e| self.attach(e))?;
            match tc {
                StreamTypecode::EndBlockData => return Ok(()),
                StreamTypecode::BlockData => {
                    let len = self.reader.read_u8().map_err(|e| self.attach(e))? as usize;
                    let bytes = self.reader.read_bytes(len).map_err(|e| self.attach(e))?;
                    if self.options.collect_unknown_block_data {
                        collect_block_data(fields, bytes);
                    }
                }
                StreamTypecode::BlockDataLong => {
                    let len = self.reader.read_u32().map_err(|e| self.attach(e))? as usize;
                    let bytes = self.reader.read_bytes(len).map_err(|e| self.attach(e))?;
                    if self.options.collect_unknown_block_data {
                        collect_block_data(fields, bytes);
                    }
                }
                other => {
                    self.dispatch(other)?;
                }
            }
        }
    }

    fn read_array(&mut self) -> Result<Value> {
        self.enter("<array>")?;
        let result = self.read_array_inner();
        self.exit();
        result
    }

    fn read_array_inner(&mut self) -> Result<Value> {
        let class_handle = self.read_class_desc_ref()?.ok_or_else(|| {
            self.err(ErrorKind::TypeMismatch {
                expected: "array class descriptor",
                found: "null",
            })
        })?;
        let array_handle = self.handles.reserve();

        let descriptor_name = self.handles.find(class_handle)?.as_class_desc()?.name.clone();
        let elem_type = array_element_typecode(&descriptor_name).map_err(|e| self.attach(e))?;

        let count = self.reader.read_u32().map_err(|e| self.attach(e))? as usize;

        let value = if elem_type == FieldTypecode::Byte {
            let bytes = self.reader.read_bytes(count).map_err(|e| self.attach(e))?;
            Value::Bytes(bytes)
        } else {
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                let v = if elem_type.is_primitive() {
                    read_primitive(&mut self.reader, elem_type).map_err(|e| self.attach(e))?
                } else {
                    self.read_item()?
                };
                elements.push(v);
            }
            Value::Sequence(elements)
        };

        self.handles.fill(
            array_handle,
            TypeNode::Arr(ArrayEntry {
                class_descriptor: class_handle,
                value: value.clone(),
            }),
        );
        Ok(value)
    }

    // --- accessors used by the `collections` module ---

    pub(crate) fn reader_mut(&mut self) -> &mut ByteReader<R> {
        &mut self.reader
    }

    pub(crate) fn read_item_pub(&mut self) -> Result<Value> {
        self.read_item()
    }

    pub(crate) fn wrap_err(&self, e: DecodeError) -> DecodeError {
        self.attach(e)
    }
}

fn collect_block_data(fields: &mut IndexMap<String, Value>, bytes: Vec<u8>) {
    match fields.get_mut("__block_data__") {
        Some(Value::Bytes(existing)) => existing.extend(bytes),
        _ => {
            fields.insert("__block_data__".to_string(), Value::Bytes(bytes));
        }
    }
}

fn boxed_primitive_value(class_name: &str, fields: &IndexMap<String, Value>) -> Option<Value> {
    if fields.len() != 1 {
        return None;
    }
    if !BOXED_PRIMITIVE_CLASSES.contains(&class_name) {
        return None;
    }
    fields.get("value").cloned()
}

/// Determines the element field-typecode encoded in an array class's
/// descriptor name (`[I`, `[Ljava.lang.String;`, `[[I`, ...).
fn array_element_typecode(descriptor_name: &str) -> Result<FieldTypecode> {
    let bytes = descriptor_name.as_bytes();
    if bytes.first() != Some(&b'[') {
        return Err(ErrorKind::InvalidBlockData(format!(
            "array class name does not start with '[': {descriptor_name}"
        ))
        .into());
    }
    match bytes.get(1) {
        Some(b'L') => Ok(FieldTypecode::Object),
        Some(b'[') => Ok(FieldTypecode::Array),
        Some(&c) => FieldTypecode::try_from(c),
        None => Err(ErrorKind::InvalidBlockData(format!(
            "truncated array class name: {descriptor_name}"
        ))
        .into()),
    }
}

/// Reads one scalar primitive field/element value per §4.3's primitive
/// readers table.
pub(crate) fn read_primitive<R: Read>(reader: &mut ByteReader<R>, typecode: FieldTypecode) -> Result<Value> {
    Ok(match typecode {
        FieldTypecode::Byte => Value::Int(reader.read_u8()? as i64),
        FieldTypecode::Char => Value::Int(reader.read_u16()? as i64),
        FieldTypecode::Double => Value::Double(reader.read_f64()?),
        FieldTypecode::Float => Value::Double(reader.read_f32()? as f64),
        FieldTypecode::Int => Value::Int(reader.read_i32()? as i64),
        FieldTypecode::Long => Value::Int(reader.read_i64()?),
        FieldTypecode::Short => Value::Int(reader.read_i16()? as i64),
        FieldTypecode::Boolean => {
            let b = reader.read_u8()?;
            match b {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(ErrorKind::InvalidBoolean(other).into()),
            }
        }
        FieldTypecode::Object | FieldTypecode::Array => {
            unreachable!("object/array fields are read via GrammarWalker::read_item")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn walker(bytes: &[u8]) -> GrammarWalker<Cursor<Vec<u8>>> {
        GrammarWalker::new(Cursor::new(bytes.to_vec()), DecoderOptions::default())
    }

    #[test]
    fn rejects_bad_magic() {
        let mut w = walker(&[0x00, 0x00, 0x00, 0x05]);
        let err = w.read_header().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedHeader(_)));
    }

    #[test]
    fn accepts_good_header() {
        let mut w = walker(&[0xAC, 0xED, 0x00, 0x05]);
        assert!(w.read_header().is_ok());
    }

    #[test]
    fn decodes_null() {
        let mut w = walker(&[0x70]);
        assert_eq!(w.read_item().unwrap(), Value::Null);
    }

    #[test]
    fn decodes_short_string() {
        // TC_STRING, len=10, "helloWorld"
        let mut bytes = vec![0x74, 0x00, 0x0A];
        bytes.extend_from_slice(b"helloWorld");
        let mut w = walker(&bytes);
        assert_eq!(
            w.read_item().unwrap(),
            Value::String("helloWorld".to_string())
        );
    }

    #[test]
    fn empty_short_string_consumes_three_bytes() {
        let mut w = walker(&[0x74, 0x00, 0x00]);
        assert_eq!(w.read_item().unwrap(), Value::String(String::new()));
    }

    #[test]
    fn unknown_typecode_is_rejected() {
        let mut w = walker(&[0x01]);
        let err = w.read_item().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownTypecode(0x01)));
    }

    #[test]
    fn unsupported_typecode_is_rejected_cleanly() {
        let mut w = walker(&[0x7E]); // TC_ENUM
        let err = w.read_item().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedTypecode(_)));
    }

    #[test]
    fn reference_below_base_is_handle_not_found() {
        let mut bytes = vec![0x71];
        bytes.extend_from_slice(&0x10u32.to_be_bytes());
        let mut w = walker(&bytes);
        let err = w.read_item().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::HandleNotFound(_)));
    }
}
