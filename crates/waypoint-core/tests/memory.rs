//! Tests for boundary-tolerant reads and string scanning

use waypoint_core::memory::{adaptive_read, scan_ascii, scan_utf16, MemoryImage, TargetMemory};
use waypoint_core::types::Address;
use waypoint_core::{Session, SessionConfig};

const BASE: Address = Address::new(0x1000);

fn image_with(bytes: &[u8]) -> MemoryImage
{
    let mut image = MemoryImage::new();
    image.map(BASE, bytes.to_vec());
    image
}

fn utf16(text: &str) -> Vec<u8>
{
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[test]
fn test_adaptive_read_full()
{
    let image = image_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let (bytes, count) = adaptive_read(&image, BASE, 4);
    assert_eq!(count, 4);
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[test]
fn test_adaptive_read_stops_at_mapping_end()
{
    let image = image_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let (bytes, count) = adaptive_read(&image, BASE + 5, 16);
    assert_eq!(count, 3);
    assert_eq!(bytes, vec![6, 7, 8]);
}

#[test]
fn test_adaptive_read_unmapped()
{
    let image = image_with(&[1, 2]);
    let (bytes, count) = adaptive_read(&image, Address::new(0x9000), 16);
    assert_eq!(count, 0);
    assert!(bytes.is_empty());

    let (bytes, count) = adaptive_read(&image, BASE, 0);
    assert_eq!(count, 0);
    assert!(bytes.is_empty());
}

#[test]
fn test_read_is_all_or_nothing()
{
    let image = image_with(&[1, 2, 3]);
    assert!(image.read(BASE + 1, 3).is_err());
    assert_eq!(image.read(BASE + 1, 2).unwrap(), vec![2, 3]);
}

#[test]
fn test_scan_ascii_escapes()
{
    let image = image_with(b"HELLO\nWORLD\0junk");
    let found = scan_ascii(&image, BASE, 3, 20).unwrap();
    assert_eq!(found.text, "HELLO\\nWORLD");
    assert_eq!(found.raw_length, 11);
}

#[test]
fn test_scan_ascii_too_short()
{
    let image = image_with(b"AB\0CDEF");
    assert!(scan_ascii(&image, BASE, 3, 10).is_none());
    assert_eq!(scan_ascii(&image, BASE + 3, 4, 64).unwrap().text, "CDEF");
}

#[test]
fn test_scan_ascii_respects_max_length()
{
    let image = image_with(b"ABCDEFGHIJ");
    let found = scan_ascii(&image, BASE, 2, 4).unwrap();
    assert_eq!(found.text, "ABCD");
    assert_eq!(found.raw_length, 4);
}

#[test]
fn test_scan_ascii_min_above_max()
{
    let image = image_with(b"ABCDEFGHIJ");
    assert!(scan_ascii(&image, BASE, 8, 4).is_none());
}

#[test]
fn test_scan_ascii_runs_to_mapping_end()
{
    let image = image_with(b"tail \"quoted\"");
    let found = scan_ascii(&image, BASE, 4, 64).unwrap();
    assert_eq!(found.text, "tail \\\"quoted\\\"");
    assert_eq!(found.raw_length, 13);
}

#[test]
fn test_scan_utf16()
{
    let mut bytes = utf16("Wide\tText");
    bytes.extend_from_slice(&[0, 0]);
    let image = image_with(&bytes);

    let found = scan_utf16(&image, BASE, 4, 64).unwrap();
    assert_eq!(found.text, "Wide\\tText");
    assert_eq!(found.raw_length, 9);
}

#[test]
fn test_scan_utf16_rejects_non_ascii_units()
{
    let image = image_with(&utf16("ab\u{00e9}cdef"));
    assert!(scan_utf16(&image, BASE, 3, 64).is_none());

    // single-byte text does not read as UTF-16
    let image = image_with(b"plain text");
    assert!(scan_utf16(&image, BASE, 2, 64).is_none());
}

#[test]
fn test_session_scans_through_its_memory()
{
    let session = Session::new(Box::new(image_with(b"session string\0")), &SessionConfig::default());
    assert_eq!(session.scan_ascii(BASE, 4, 64).unwrap().text, "session string");
    assert_eq!(session.adaptive_read(BASE + 8, 100).1, 7);
}
