//! `String`
//!
//! Strings are byte sequences indexed by byte. Iteration and subscripts
//! step over whole UTF-8 code points where the bytes decode as one.

use super::{
    calculate_range, ok, primitive, static_primitive, validate_index, validate_int, validate_string,
};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::ObjRef;
use crate::vm::value::Value;
use crate::vm::Vm;

pub(super) fn bind(vm: &mut Vm) {
    let string = vm.core.string;

    static_primitive(vm, string, "fromCodePoint(_)", string_from_code_point);
    static_primitive(vm, string, "fromByte(_)", string_from_byte);

    primitive(vm, string, "+(_)", string_plus);
    primitive(vm, string, "[_]", string_subscript);
    primitive(vm, string, "byteAt_(_)", string_byte_at);
    primitive(vm, string, "byteCount_", string_byte_count);
    primitive(vm, string, "byteCount", string_byte_count);
    primitive(vm, string, "codePointAt_(_)", string_code_point_at);
    primitive(vm, string, "contains(_)", string_contains);
    primitive(vm, string, "endsWith(_)", string_ends_with);
    primitive(vm, string, "indexOf(_)", string_index_of);
    primitive(vm, string, "indexOf(_,_)", string_index_of_from);
    primitive(vm, string, "iterate(_)", string_iterate);
    primitive(vm, string, "iterateByte_(_)", string_iterate_byte);
    primitive(vm, string, "iteratorValue(_)", string_iterator_value);
    primitive(vm, string, "startsWith(_)", string_starts_with);
    primitive(vm, string, "count", string_count);
    primitive(vm, string, "toString", |_, args| ok(args[0]));
}

// ============================================================================
// UTF-8
// ============================================================================

#[inline]
fn is_continuation(byte: u8) -> bool {
    byte & 0xc0 == 0x80
}

/// Bytes in the UTF-8 sequence a leading byte starts, if it starts one
fn sequence_len(byte: u8) -> Option<usize> {
    match byte {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

/// Decode the code point starting at `index`
fn decode_at(bytes: &[u8], index: usize) -> Option<(u32, usize)> {
    let len = sequence_len(bytes[index])?;
    let sequence = bytes.get(index..index + len)?;
    let c = std::str::from_utf8(sequence).ok()?.chars().next()?;
    Some((c as u32, len))
}

/// UTF-8 encoding of any code point, surrogates included
fn encode_utf8(code_point: u32) -> Vec<u8> {
    match code_point {
        0..=0x7f => vec![code_point as u8],
        0x80..=0x7ff => vec![0xc0 | (code_point >> 6) as u8, 0x80 | (code_point & 0x3f) as u8],
        0x800..=0xffff => vec![
            0xe0 | (code_point >> 12) as u8,
            0x80 | ((code_point >> 6) & 0x3f) as u8,
            0x80 | (code_point & 0x3f) as u8,
        ],
        _ => vec![
            0xf0 | (code_point >> 18) as u8,
            0x80 | ((code_point >> 12) & 0x3f) as u8,
            0x80 | ((code_point >> 6) & 0x3f) as u8,
            0x80 | (code_point & 0x3f) as u8,
        ],
    }
}

/// Byte offset of the first occurrence of `needle` at or after `start`
fn find_bytes(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return (start <= haystack.len()).then_some(start);
    }
    haystack
        .get(start..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| start + offset)
}

/// The code point at `index` as a new string, or the lone byte if it does
/// not start a valid sequence
fn code_point_string(vm: &mut Vm, string: ObjRef, index: usize) -> Value {
    let bytes = vm.heap.string(string).as_bytes();
    let end = match decode_at(bytes, index) {
        Some((_, len)) => index + len,
        None => index + 1,
    };
    let piece = bytes[index..end].to_vec();
    Value::from(vm.new_string_obj(&piece))
}

fn bytes_of(vm: &Vm, value: Value) -> &[u8] {
    vm.heap.string(value.as_obj()).as_bytes()
}

// ============================================================================
// Primitives
// ============================================================================

fn string_from_code_point(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let code_point = check!(validate_int(vm, args[1], "Code point"));
    if code_point < 0.0 {
        return vm.primitive_error("Code point cannot be negative.");
    }
    if code_point > 0x10ffff as f64 {
        return vm.primitive_error("Code point cannot be greater than 0x10ffff.");
    }
    let bytes = encode_utf8(code_point as u32);
    ok(vm.new_string_obj(&bytes))
}

fn string_from_byte(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let byte = check!(validate_int(vm, args[1], "Byte"));
    if byte < 0.0 {
        return vm.primitive_error("Byte cannot be negative.");
    }
    if byte > 0xff as f64 {
        return vm.primitive_error("Byte cannot be greater than 0xff.");
    }
    ok(vm.new_string_obj(&[byte as u8]))
}

fn string_plus(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Right operand"));
    let mut bytes = bytes_of(vm, args[0]).to_vec();
    bytes.extend_from_slice(bytes_of(vm, args[1]));
    ok(vm.new_string_obj(&bytes))
}

fn string_subscript(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let string = args[0].as_obj();
    let len = vm.heap.string(string).len();

    if args[1].is_num() {
        let index = check!(validate_index(vm, args[1], len, "Subscript"));
        return ok(code_point_string(vm, string, index));
    }

    let Some(range) = vm.heap.try_range(args[1]).copied() else {
        return vm.primitive_error("Subscript must be a number or a range.");
    };
    let slice = check!(calculate_range(vm, range, len));
    let bytes = vm.heap.string(string).as_bytes();
    let piece: Vec<u8> = slice.indices().map(|i| bytes[i]).collect();
    ok(vm.new_string_obj(&piece))
}

fn string_byte_at(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let len = bytes_of(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], len, "Index"));
    ok(bytes_of(vm, args[0])[index] as f64)
}

fn string_byte_count(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(bytes_of(vm, args[0]).len() as f64)
}

fn string_code_point_at(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let len = bytes_of(vm, args[0]).len();
    let index = check!(validate_index(vm, args[1], len, "Index"));
    let bytes = bytes_of(vm, args[0]);

    // Inside a sequence rather than at its start.
    if is_continuation(bytes[index]) {
        return ok(-1.0);
    }
    match decode_at(bytes, index) {
        Some((code_point, _)) => ok(code_point as f64),
        None => ok(-1.0),
    }
}

fn string_contains(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Argument"));
    ok(find_bytes(bytes_of(vm, args[0]), bytes_of(vm, args[1]), 0).is_some())
}

fn string_starts_with(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Argument"));
    ok(bytes_of(vm, args[0]).starts_with(bytes_of(vm, args[1])))
}

fn string_ends_with(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Argument"));
    ok(bytes_of(vm, args[0]).ends_with(bytes_of(vm, args[1])))
}

fn string_index_of(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Argument"));
    let found = find_bytes(bytes_of(vm, args[0]), bytes_of(vm, args[1]), 0);
    ok(found.map_or(-1.0, |index| index as f64))
}

fn string_index_of_from(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    check!(validate_string(vm, args[1], "Argument"));
    let len = bytes_of(vm, args[0]).len();
    let start = check!(validate_index(vm, args[2], len, "Start"));
    let found = find_bytes(bytes_of(vm, args[0]), bytes_of(vm, args[1]), start);
    ok(found.map_or(-1.0, |index| index as f64))
}

fn string_iterate(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let len = bytes_of(vm, args[0]).len();
    if args[1].is_null() {
        return if len == 0 { ok(false) } else { ok(0.0) };
    }

    let iterator = check!(validate_int(vm, args[1], "Iterator"));
    if iterator < 0.0 {
        return ok(false);
    }

    // Skip to the start of the next code point.
    let bytes = bytes_of(vm, args[0]);
    let mut index = iterator as usize;
    loop {
        index += 1;
        if index >= len {
            return ok(false);
        }
        if !is_continuation(bytes[index]) {
            return ok(index as f64);
        }
    }
}

fn string_iterate_byte(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let len = bytes_of(vm, args[0]).len();
    if args[1].is_null() {
        return if len == 0 { ok(false) } else { ok(0.0) };
    }

    let iterator = check!(validate_int(vm, args[1], "Iterator"));
    if iterator < 0.0 {
        return ok(false);
    }
    let index = iterator as usize + 1;
    if index >= len {
        return ok(false);
    }
    ok(index as f64)
}

fn string_iterator_value(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let string = args[0].as_obj();
    let len = vm.heap.string(string).len();
    let index = check!(validate_index(vm, args[1], len, "Iterator"));
    ok(code_point_string(vm, string, index))
}

fn string_count(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let count = bytes_of(vm, args[0]).iter().filter(|b| !is_continuation(**b)).count();
    ok(count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_std() {
        for c in ['a', 'é', '€', '😀'] {
            let mut buf = [0u8; 4];
            assert_eq!(encode_utf8(c as u32), c.encode_utf8(&mut buf).as_bytes());
        }
        // Lone surrogates still encode.
        assert_eq!(encode_utf8(0xd800), vec![0xed, 0xa0, 0x80]);
    }

    #[test]
    fn test_decode_at() {
        let bytes = "a€".as_bytes();
        assert_eq!(decode_at(bytes, 0), Some(('a' as u32, 1)));
        assert_eq!(decode_at(bytes, 1), Some(('€' as u32, 3)));
        assert_eq!(decode_at(bytes, 2), None);
        assert_eq!(decode_at(&[0xe2, 0x82], 0), None);
    }

    #[test]
    fn test_find_bytes() {
        assert_eq!(find_bytes(b"hello", b"l", 0), Some(2));
        assert_eq!(find_bytes(b"hello", b"l", 3), Some(3));
        assert_eq!(find_bytes(b"hello", b"z", 0), None);
        assert_eq!(find_bytes(b"hello", b"", 5), Some(5));
        assert_eq!(find_bytes(b"hi", b"hello", 0), None);
    }
}
