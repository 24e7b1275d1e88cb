#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use parzip::zip::{
    CDFH_SIGNATURE, CompressionMethod, DATA_DESCRIPTOR_SIGNATURE, EndOfCentralDirectory,
    FLAG_DATA_DESCRIPTOR, LocalFileHeader, VERSION_DEFLATE,
};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Write a ZIP with the `zip` crate; `true` deflates the entry.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8], bool)]) {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data, deflate) in entries {
        let method = if *deflate {
            zip::CompressionMethod::Deflated
        } else {
            zip::CompressionMethod::Stored
        };
        writer
            .start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(data).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();
    write_file(path, bytes);
}

/// Write a ZIP whose deflated entries defer crc and sizes to signed data descriptors,
/// the way streaming writers produce them.
pub fn write_streamed_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut out = Vec::new();
    for (name, data) in entries {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        LocalFileHeader {
            version_needed: VERSION_DEFLATE,
            flags: FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Deflate,
            last_mod_time: 0,
            last_mod_date: 0x21,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: name.as_bytes().to_vec(),
            extra_field: Vec::new(),
        }
        .write_to(&mut out)
        .unwrap();
        out.extend_from_slice(&compressed);
        out.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    }
    // The parser stops at the central directory; a stub record is enough
    out.extend_from_slice(CDFH_SIGNATURE);
    out.extend_from_slice(&[0u8; 42]);
    EndOfCentralDirectory::new(0, 0, 0).write_to(&mut out).unwrap();
    write_file(path, out);
}

pub fn open_zip(path: &Path) -> ZipArchive<File> {
    ZipArchive::new(File::open(path).unwrap()).unwrap()
}

pub fn names(path: &Path) -> Vec<String> {
    let archive = open_zip(path);
    archive.file_names().map(str::to_string).collect()
}

/// Names in the order their local headers appear.
pub fn names_in_order(path: &Path) -> Vec<String> {
    let mut archive = open_zip(path);
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn contents(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = open_zip(path);
    let mut file = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

pub fn method(path: &Path, name: &str) -> zip::CompressionMethod {
    let mut archive = open_zip(path);
    let file = archive.by_name(name).unwrap();
    file.compression()
}

/// The compressed bytes of `name` exactly as stored in the archive at `path`.
pub fn raw_payload(path: &Path, name: &str) -> Vec<u8> {
    let bytes = fs::read(path).unwrap();
    let mut archive = open_zip(path);
    let file = archive.by_name(name).unwrap();
    let start = file.data_start() as usize;
    let end = start + file.compressed_size() as usize;
    bytes[start..end].to_vec()
}
