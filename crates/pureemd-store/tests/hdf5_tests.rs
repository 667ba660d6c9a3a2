//! HDF5 interoperability: files laid out the way the HDF5 C library writes
//! them with `libver='earliest'` (v0 superblock, v1 object headers, symbol
//! table groups, chunked B-tree storage), user blocks, unsupported content,
//! and corrupt extents.

use pretty_assertions::assert_eq;
use pureemd_store::checksum::jenkins_lookup3;
use pureemd_store::signature::HDF5_SIGNATURE;
use pureemd_store::{AttrValue, Container, ContainerFile, DType, Mode, RawArray, StoreError};

const UNDEF: u64 = u64::MAX;

fn put(file: &mut Vec<u8>, at: usize, bytes: &[u8]) {
    if file.len() < at + bytes.len() {
        file.resize(at + bytes.len(), 0);
    }
    file[at..at + bytes.len()].copy_from_slice(bytes);
}

fn pad8(mut v: Vec<u8>) -> Vec<u8> {
    v.resize(v.len().div_ceil(8) * 8, 0);
    v
}

fn u64s(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Version 1 object header: 16-byte prefix, 8-byte message headers,
/// bodies padded to 8.
fn v1_header(messages: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (kind, data) in messages {
        let data = pad8(data.clone());
        body.extend_from_slice(&kind.to_le_bytes());
        body.extend_from_slice(&(data.len() as u16).to_le_bytes());
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&data);
    }
    let mut buf = vec![1, 0];
    buf.extend_from_slice(&(messages.len() as u16).to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&[0; 4]);
    buf.extend_from_slice(&body);
    buf
}

fn v1_attribute(name: &str, datatype: &[u8], dataspace: &[u8], data: &[u8]) -> Vec<u8> {
    let name = [name.as_bytes(), &[0]].concat();
    let mut buf = vec![1, 0];
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(datatype.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(dataspace.len() as u16).to_le_bytes());
    buf.extend_from_slice(&pad8(name));
    buf.extend_from_slice(&pad8(datatype.to_vec()));
    buf.extend_from_slice(&pad8(dataspace.to_vec()));
    buf.extend_from_slice(data);
    buf
}

const DATASPACE: u16 = 0x0001;
const DATATYPE: u16 = 0x0003;
const LAYOUT: u16 = 0x0008;
const ATTRIBUTE: u16 = 0x000C;
const SYMBOL_TABLE: u16 = 0x0011;

const SCALAR_V1: [u8; 8] = [1, 0, 0, 0, 0, 0, 0, 0];

fn dataspace_v1(dims: &[u64]) -> Vec<u8> {
    let mut buf = vec![1, dims.len() as u8, 0, 0, 0, 0, 0, 0];
    buf.extend_from_slice(&u64s(dims));
    buf
}

/// A file as the C library lays it out for old-format groups:
///
/// ```text
/// /               attrs version_major=0 (i32), title="scan" (fixed ASCII)
/// /frame          i32 big-endian [3], contiguous
/// /chunky         u8 [3, 2] in 2x2 chunks indexed by a v1 B-tree
/// ```
fn legacy_file() -> Vec<u8> {
    const ROOT: u64 = 128;
    const HEAP: u64 = 512;
    const HEAP_DATA: u64 = 560;
    const GROUP_TREE: u64 = 640;
    const SNOD: u64 = 768;
    const FRAME: u64 = 1024;
    const CHUNKY: u64 = 1280;
    const FRAME_DATA: u64 = 1536;
    const CHUNK_TREE: u64 = 1600;
    const CHUNK_A: u64 = 1800;
    const CHUNK_B: u64 = 1808;
    const EOF: u64 = 2048;

    let mut file = Vec::new();

    let mut sb = HDF5_SIGNATURE.to_vec();
    sb.extend_from_slice(&[0, 0, 0, 0, 0, 8, 8, 0]);
    sb.extend_from_slice(&4u16.to_le_bytes());
    sb.extend_from_slice(&16u16.to_le_bytes());
    sb.extend_from_slice(&0u32.to_le_bytes());
    sb.extend_from_slice(&u64s(&[0, UNDEF, EOF, UNDEF, 0, ROOT]));
    sb.extend_from_slice(&[0; 24]);
    put(&mut file, 0, &sb);

    let i32_le = [0x10, 0x08, 0, 0, 4, 0, 0, 0, 0, 0, 32, 0];
    let ascii5 = [0x13, 0x00, 0, 0, 5, 0, 0, 0];
    let root = v1_header(&[
        (SYMBOL_TABLE, u64s(&[GROUP_TREE, HEAP])),
        (
            ATTRIBUTE,
            v1_attribute("version_major", &i32_le, &SCALAR_V1, &0i32.to_le_bytes()),
        ),
        (ATTRIBUTE, v1_attribute("title", &ascii5, &SCALAR_V1, b"scan\0")),
    ]);
    put(&mut file, ROOT as usize, &root);

    let mut heap = b"HEAP\0\0\0\0".to_vec();
    heap.extend_from_slice(&u64s(&[24, UNDEF, HEAP_DATA]));
    put(&mut file, HEAP as usize, &heap);
    put(&mut file, HEAP_DATA as usize, b"\0\0\0\0\0\0\0\0frame\0\0\0chunky\0\0");

    let mut tree = b"TREE\x00\x00\x01\x00".to_vec();
    tree.extend_from_slice(&u64s(&[UNDEF, UNDEF, 0, SNOD, 16]));
    put(&mut file, GROUP_TREE as usize, &tree);

    let mut snod = b"SNOD\x01\x00\x02\x00".to_vec();
    for (name_offset, header) in [(8u64, FRAME), (16, CHUNKY)] {
        snod.extend_from_slice(&u64s(&[name_offset, header]));
        snod.extend_from_slice(&[0; 24]);
    }
    put(&mut file, SNOD as usize, &snod);

    let i32_be = [0x10, 0x09, 0, 0, 4, 0, 0, 0, 0, 0, 32, 0];
    let mut contiguous = vec![3, 1];
    contiguous.extend_from_slice(&u64s(&[FRAME_DATA, 12]));
    let frame = v1_header(&[
        (DATATYPE, i32_be.to_vec()),
        (DATASPACE, dataspace_v1(&[3])),
        (LAYOUT, contiguous),
    ]);
    put(&mut file, FRAME as usize, &frame);
    let values: Vec<u8> = [1i32, -2, 0x0102_0304]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect();
    put(&mut file, FRAME_DATA as usize, &values);

    let u8_type = [0x10, 0, 0, 0, 1, 0, 0, 0, 0, 0, 8, 0];
    let mut chunked = vec![3, 2, 3];
    chunked.extend_from_slice(&CHUNK_TREE.to_le_bytes());
    for d in [2u32, 2, 1] {
        chunked.extend_from_slice(&d.to_le_bytes());
    }
    let chunky = v1_header(&[
        (DATATYPE, u8_type.to_vec()),
        (DATASPACE, dataspace_v1(&[3, 2])),
        (LAYOUT, chunked),
    ]);
    put(&mut file, CHUNKY as usize, &chunky);

    let key = |offsets: [u64; 3]| {
        let mut k = 4u32.to_le_bytes().to_vec();
        k.extend_from_slice(&0u32.to_le_bytes());
        k.extend_from_slice(&u64s(&offsets));
        k
    };
    let mut ctree = b"TREE\x01\x00\x02\x00".to_vec();
    ctree.extend_from_slice(&u64s(&[UNDEF, UNDEF]));
    ctree.extend_from_slice(&key([0, 0, 0]));
    ctree.extend_from_slice(&CHUNK_A.to_le_bytes());
    ctree.extend_from_slice(&key([2, 0, 0]));
    ctree.extend_from_slice(&CHUNK_B.to_le_bytes());
    ctree.extend_from_slice(&key([4, 0, 0]));
    put(&mut file, CHUNK_TREE as usize, &ctree);
    put(&mut file, CHUNK_A as usize, &[1, 2, 3, 4]);
    // The second chunk hangs over the last row.
    put(&mut file, CHUNK_B as usize, &[5, 6, 99, 99]);

    file.resize(EOF as usize, 0);
    file
}

fn assert_legacy_content(c: &ContainerFile) {
    assert_eq!(c.children("/").unwrap(), vec!["chunky", "frame"]);
    assert_eq!(c.attr("/", "version_major").unwrap(), Some(AttrValue::I64(0)));
    assert_eq!(
        c.attr("/", "title").unwrap(),
        Some(AttrValue::Bytes(b"scan".to_vec()))
    );

    let frame = c.read_dataset("/frame").unwrap();
    assert_eq!(frame.dtype(), DType::I32);
    assert_eq!(frame.to_elements::<i32>().unwrap(), vec![1, -2, 0x0102_0304]);

    let chunky = c.read_dataset("/chunky").unwrap();
    assert_eq!(chunky.shape(), &[3, 2]);
    assert_eq!(chunky.to_elements::<u8>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn reads_old_format_file() {
    let c = ContainerFile::from_bytes(legacy_file(), Mode::ReadOnly).unwrap();
    assert_legacy_content(&c);
}

#[test]
fn reads_file_behind_user_block() {
    let mut data = vec![0u8; 512];
    data.extend_from_slice(&legacy_file());
    let c = ContainerFile::from_bytes(data, Mode::ReadOnly).unwrap();
    assert_legacy_content(&c);
}

#[test]
fn rewrites_old_format_file_in_current_format() {
    let c = ContainerFile::from_bytes(legacy_file(), Mode::ReadWrite).unwrap();
    let bytes = c.to_bytes().unwrap();
    assert_eq!(&bytes[..8], &HDF5_SIGNATURE);
    assert_eq!(bytes[8], 2, "superblock version");
    let rewritten = ContainerFile::from_bytes(bytes, Mode::ReadOnly).unwrap();
    assert_legacy_content(&rewritten);
}

fn written_file() -> Vec<u8> {
    let mut c = ContainerFile::in_memory();
    c.create_group("/data").unwrap();
    c.set_attr("/data", "emd_group_type", AttrValue::I64(1))
        .unwrap();
    c.create_dataset(
        "/data/frame",
        RawArray::from_elements(vec![2, 2], &[1i32, 2, 3, 4]).unwrap(),
    )
    .unwrap();
    c.create_dataset(
        "/data/dim1",
        RawArray::from_elements(vec![2], &[0.0f64, 1.0]).unwrap(),
    )
    .unwrap();
    c.to_bytes().unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

/// Recompute the checksum of the v2 object header that contains `pos`.
fn reseal_header(bytes: &mut [u8], pos: usize) {
    let start = bytes[..pos]
        .windows(4)
        .rposition(|w| w == b"OHDR")
        .unwrap();
    let flags = bytes[start + 5];
    assert_eq!(flags & 0x30, 0, "no times or phase change fields");
    let width = 1usize << (flags & 0x03);
    let mut size = [0u8; 8];
    size[..width].copy_from_slice(&bytes[start + 6..start + 6 + width]);
    let end = start + 6 + width + u64::from_le_bytes(size) as usize;
    let sum = jenkins_lookup3(&bytes[start..end]);
    bytes[end..end + 4].copy_from_slice(&sum.to_le_bytes());
}

#[test]
fn corrupt_extents_fail_cleanly() {
    let mut bytes = written_file();
    // Dataspace v2 of the [2, 2] dataset.
    let mut dataspace = vec![2, 2, 0, 1];
    dataspace.extend_from_slice(&u64s(&[2, 2]));
    let at = find(&bytes, &dataspace);
    let huge = 1u64 << 33;
    bytes[at + 4..at + 20].copy_from_slice(&u64s(&[huge, huge]));
    reseal_header(&mut bytes, at);

    for mode in [Mode::ReadOnly, Mode::ReadWrite] {
        let err = ContainerFile::from_bytes(bytes.clone(), mode).unwrap_err();
        assert!(
            matches!(err, StoreError::PayloadSize { expected: usize::MAX, .. }),
            "{err}"
        );
    }
}

#[test]
fn unsupported_content_blocks_writable_open() {
    let mut bytes = written_file();
    // Turn the i32 datatype into a compound of the same size.
    let at = find(&bytes, &[0x10, 0x08, 0, 0, 4, 0, 0, 0, 0, 0, 32, 0]);
    bytes[at] = 0x16;
    reseal_header(&mut bytes, at);

    let c = ContainerFile::from_bytes(bytes.clone(), Mode::ReadOnly).unwrap();
    assert_eq!(c.children("/data").unwrap(), vec!["dim1"]);
    assert_eq!(
        c.attr("/data", "emd_group_type").unwrap(),
        Some(AttrValue::I64(1))
    );

    let err = ContainerFile::from_bytes(bytes, Mode::ReadWrite).unwrap_err();
    match err {
        StoreError::Unsupported(what) => assert!(what.contains("/data/frame"), "{what}"),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn corrupted_header_checksum_is_detected() {
    let mut bytes = written_file();
    let at = find(&bytes, b"emd_group_type");
    bytes[at] = b'E';
    let err = ContainerFile::from_bytes(bytes, Mode::ReadOnly).unwrap_err();
    assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
}
