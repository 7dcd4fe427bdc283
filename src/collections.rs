//! Collection Specialisers — decoders for the handful of `java.util.*`
//! classes whose `writeObject` block-data layout is well-known.
//!
//! Each specialiser is invoked once a class's declared fields have been
//! consumed and its descriptor carries `SC_WRITE_METHOD`. Dispatch is by
//! exact (bare) class name; anything else falls back to the walker's
//! generic annotation skip/collect path.

use std::io::Read;

use indexmap::IndexMap;
use log::trace;

use crate::error::{ErrorKind, Result};
use crate::typecode::StreamTypecode;
use crate::value::Value;
use crate::walker::GrammarWalker;

/// Attempts to read and interpret the object-annotation region for
/// `class_name` as one of the known containers (every entry except
/// `BitSet`, which is handled separately in [`read_bitset`] since it has
/// no block-data region at all). Returns `Ok(None)` when `class_name`
/// isn't one of the known specialisers — the caller then falls back to
/// the generic skip/collect path.
pub(crate) fn try_read_annotation<R: Read>(
    walker: &mut GrammarWalker<R>,
    class_name: &str,
) -> Result<Option<Value>> {
    match class_name {
        "java.util.ArrayList" | "java.util.LinkedList" | "java.util.ArrayDeque" => {
            trace!("specialiser: {class_name} as sized sequence");
            Ok(Some(read_sized_sequence(walker, 4, false)?))
        }
        "java.util.PriorityQueue" => {
            trace!("specialiser: {class_name} as sized sequence (size + 1 on wire)");
            Ok(Some(read_sized_sequence(walker, 4, true)?))
        }
        "java.util.HashMap" | "java.util.LinkedHashMap" => {
            trace!("specialiser: {class_name} as hash map");
            Ok(Some(read_hash_map(walker)?))
        }
        "java.util.HashSet" | "java.util.LinkedHashSet" => {
            trace!("specialiser: {class_name} as hash set");
            Ok(Some(read_hash_set(walker)?))
        }
        _ => Ok(None),
    }
}

/// Opens the block-data region for a list-shaped container: a
/// `TC_BLOCKDATA`/`TC_BLOCKDATALONG` token whose payload is a single
/// 32-bit size, followed by `size` stream items, then
/// `TC_ENDBLOCKDATA`.
///
/// `decrement` handles `PriorityQueue`, which stores `max(2, size + 1)`
/// on the wire.
fn read_sized_sequence<R: Read>(
    walker: &mut GrammarWalker<R>,
    expected_len: u8,
    decrement: bool,
) -> Result<Value> {
    expect_block_data_len(walker, expected_len)?;
    let raw_size = walker
        .reader_mut()
        .read_u32()
        .map_err(|e| walker.wrap_err(e))? as i64;
    let size = if decrement { raw_size - 1 } else { raw_size };
    if size < 0 {
        return Err(walker.wrap_err(
            ErrorKind::InvalidBlockData(format!("negative sequence size ({size})")).into(),
        ));
    }
    let mut items = Vec::with_capacity(size as usize);
    for _ in 0..size {
        items.push(walker.read_item_pub()?);
    }
    expect_end_block_data(walker)?;
    Ok(Value::Sequence(items))
}

/// `java.util.HashMap`/`LinkedHashMap`: block-data payload is
/// `bucket_count: u32, entry_count: u32` (`entry_count < bucket_count`),
/// followed by `entry_count` `(key, value)` stream-item pairs.
fn read_hash_map<R: Read>(walker: &mut GrammarWalker<R>) -> Result<Value> {
    expect_block_data_len(walker, 8)?;
    let bucket_count = walker
        .reader_mut()
        .read_u32()
        .map_err(|e| walker.wrap_err(e))?;
    let entry_count = walker
        .reader_mut()
        .read_u32()
        .map_err(|e| walker.wrap_err(e))?;
    if entry_count >= bucket_count {
        return Err(walker.wrap_err(
            ErrorKind::InvalidBlockData(format!(
                "HashMap entry_count ({entry_count}) must be less than bucket_count ({bucket_count})"
            ))
            .into(),
        ));
    }
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let key = walker.read_item_pub()?;
        let value = walker.read_item_pub()?;
        entries.push((key, value));
    }
    expect_end_block_data(walker)?;
    Ok(Value::Map(entries))
}

/// `java.util.HashSet`/`LinkedHashSet`: block-data payload is
/// `capacity: u32, load_factor: f32, size: u32`, followed by `size`
/// stream items.
fn read_hash_set<R: Read>(walker: &mut GrammarWalker<R>) -> Result<Value> {
    expect_block_data_len(walker, 12)?;
    let _capacity = walker
        .reader_mut()
        .read_u32()
        .map_err(|e| walker.wrap_err(e))?;
    let _load_factor = walker
        .reader_mut()
        .read_f32()
        .map_err(|e| walker.wrap_err(e))?;
    let size = walker
        .reader_mut()
        .read_u32()
        .map_err(|e| walker.wrap_err(e))?;
    let mut items = Vec::with_capacity(size as usize);
    for _ in 0..size {
        items.push(walker.read_item_pub()?);
    }
    expect_end_block_data(walker)?;
    Ok(Value::Set(items))
}

/// `java.util.BitSet` writes no block data at all — its `writeObject`
/// override only calls `defaultWriteObject()` after recomputing its
/// private `bits` field, so the annotation region is immediately
/// `TC_ENDBLOCKDATA`. The already-decoded `bits` field (a sequence of
/// 64-bit longs) is reinterpreted here as a set of set-bit indices.
pub(crate) fn read_bitset<R: Read>(
    walker: &mut GrammarWalker<R>,
    fields: &IndexMap<String, Value>,
) -> Result<Value> {
    expect_end_block_data(walker)?;

    let bits = fields.get("bits").and_then(Value::as_sequence).ok_or_else(|| {
        walker.wrap_err(
            ErrorKind::InvalidBlockData("BitSet has no 'bits' field to reinterpret".to_string())
                .into(),
        )
    })?;

    let mut indices = Vec::new();
    for (word_index, word) in bits.iter().enumerate() {
        let word = word.as_int().ok_or_else(|| {
            walker.wrap_err(
                ErrorKind::InvalidBlockData("BitSet 'bits' entry was not an integer".to_string())
                    .into(),
            )
        })? as u64;
        for bit in 0..64u32 {
            if (word >> bit) & 1 == 1 {
                indices.push(Value::Int(word_index as i64 * 64 + bit as i64));
            }
        }
    }
    Ok(Value::Set(indices))
}

fn expect_block_data_len<R: Read>(walker: &mut GrammarWalker<R>, expected: u8) -> Result<()> {
    let tc = walker
        .reader_mut()
        .read_typecode()
        .map_err(|e| walker.wrap_err(e))?;
    let len = match tc {
        StreamTypecode::BlockData => walker.reader_mut().read_u8().map_err(|e| walker.wrap_err(e))? as u32,
        StreamTypecode::BlockDataLong => {
            walker.reader_mut().read_u32().map_err(|e| walker.wrap_err(e))?
        }
        other => {
            return Err(walker.wrap_err(
                ErrorKind::TypeMismatch {
                    expected: "block data",
                    found: other.name(),
                }
                .into(),
            ))
        }
    };
    if len != expected as u32 {
        return Err(walker.wrap_err(
            ErrorKind::InvalidBlockData(format!(
                "expected block data length {expected}, found {len}"
            ))
            .into(),
        ));
    }
    Ok(())
}

fn expect_end_block_data<R: Read>(walker: &mut GrammarWalker<R>) -> Result<()> {
    let tc = walker
        .reader_mut()
        .read_typecode()
        .map_err(|e| walker.wrap_err(e))?;
    if tc != StreamTypecode::EndBlockData {
        return Err(walker.wrap_err(ErrorKind::UnexpectedEndOfBlock.into()));
    }
    Ok(())
}
