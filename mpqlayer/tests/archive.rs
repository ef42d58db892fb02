//! Single-archive lookup and extraction

mod common;

use common::{sample, ArchiveWriter, FileSpec, USER_DATA_ARCHIVE_OFFSET};
use mpqlayer::compression::flags;
use mpqlayer::crypto::{decrypt_bytes, encrypt_bytes};
use mpqlayer::hash::{hash_string, hash_type};
use mpqlayer::error::{CodecError, FormatError};
use mpqlayer::{Archive, Error, FormatVersion, OpenOptions};
use pretty_assertions::assert_eq;
use std::io::{Read, Seek, SeekFrom, Write};

fn variants() -> Vec<FileSpec> {
    vec![
        FileSpec::new("data\\zlib.bin", sample(5000, 1)),
        FileSpec::new("data\\bzip2.bin", sample(3000, 2)).compression(flags::BZIP2),
        FileSpec::new("data\\lzma.bin", sample(3000, 3)).compression(flags::LZMA),
        FileSpec::new("data\\pkware.bin", sample(3000, 4)).compression(flags::PKWARE),
        FileSpec::new("data\\sparse.bin", sample(3000, 5)).compression(flags::SPARSE | flags::ZLIB),
        FileSpec::new("data\\implode.bin", sample(3000, 6)).imploded(),
        FileSpec::new("data\\stored.bin", sample(2500, 7)).stored(),
        FileSpec::new("data\\encrypted.bin", sample(4500, 8)).encrypted(),
        FileSpec::new("data\\fixkey.bin", sample(4500, 9)).fix_key().sector_crc(),
        FileSpec::new("data\\stored_encrypted.bin", sample(4500, 10)).stored().encrypted(),
        FileSpec::new("data\\single.bin", sample(3000, 11)).single_unit(),
        FileSpec::new("data\\single_encrypted.bin", sample(3000, 12)).single_unit().encrypted(),
        FileSpec::new("data\\crc.bin", sample(6000, 13)).sector_crc(),
        FileSpec::new("data\\empty.bin", Vec::new()),
        FileSpec::new("data\\tiny.txt", b"hi".to_vec()),
    ]
}

fn variant_archive() -> Vec<u8> {
    variants()
        .into_iter()
        .fold(ArchiveWriter::new().hash_table_size(32), |w, spec| w.file(spec))
        .build()
}

#[test]
fn test_every_storage_variant_extracts() {
    common::init_logging();
    let archive = Archive::from_bytes(variant_archive()).unwrap();

    for spec in variants() {
        assert!(archive.exists(&spec.name), "{} missing", spec.name);
        let entry = archive.block_entry(&spec.name).unwrap();
        assert_eq!(entry.file_size as usize, spec.data.len());

        let data = archive.read_file(&spec.name).unwrap();
        assert_eq!(data.len(), entry.file_size as usize, "{}", spec.name);
        assert_eq!(data, spec.data, "{}", spec.name);
    }
}

#[test]
fn test_lookup_ignores_case_and_separator() {
    let archive = Archive::from_bytes(variant_archive()).unwrap();
    assert!(archive.exists("DATA\\ZLIB.BIN"));
    assert!(archive.exists("data/zlib.bin"));
    assert!(!archive.exists("data\\zlib.bin2"));
    assert!(archive.block_entry("missing").is_none());

    let err = archive.read_file("missing").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_marker_is_an_entry_but_not_a_file() {
    let archive = Archive::from_bytes(
        ArchiveWriter::new()
            .add("Interface\\kept.lua", b"kept".to_vec())
            .file(FileSpec::delete_marker("Interface\\gone.lua"))
            .build(),
    )
    .unwrap();

    assert!(archive.exists("Interface\\kept.lua"));
    assert!(archive.has_entry("Interface\\kept.lua"));

    assert!(!archive.exists("Interface\\gone.lua"));
    assert!(archive.has_entry("Interface\\gone.lua"));
    assert!(archive.file_info("Interface\\gone.lua").unwrap().is_delete_marker());
    assert!(archive.read_file("Interface\\gone.lua").unwrap_err().is_not_found());
}

#[test]
fn test_lookup_is_deterministic() {
    let archive = Archive::from_bytes(variant_archive()).unwrap();
    let first: Vec<_> = variants()
        .iter()
        .map(|spec| archive.file_info(&spec.name).unwrap().block_index)
        .collect();
    for _ in 0..5 {
        let again: Vec<_> = variants()
            .iter()
            .map(|spec| archive.file_info(&spec.name).unwrap().block_index)
            .collect();
        assert_eq!(again, first);
    }
}

#[test]
fn test_read_range_covers_sector_boundaries() {
    let data = sample(10_000, 21);
    let archive = Archive::from_bytes(
        ArchiveWriter::new()
            .file(FileSpec::new("range.bin", data.clone()).encrypted())
            .build(),
    )
    .unwrap();

    assert_eq!(archive.read_range("range.bin", 0, 10).unwrap(), data[..10]);
    assert_eq!(
        archive.read_range("range.bin", 4000, 200).unwrap(),
        data[4000..4200]
    );
    assert_eq!(
        archive.read_range("range.bin", 4090, 5000).unwrap(),
        data[4090..9090]
    );
    // clamped at the end
    assert_eq!(archive.read_range("range.bin", 9990, 100).unwrap(), data[9990..]);
    assert!(archive.read_range("range.bin", 20_000, 5).unwrap().is_empty());
}

#[test]
fn test_streaming_reads_and_seeks() {
    let data = sample(9000, 31);
    let archive = Archive::from_bytes(
        ArchiveWriter::new()
            .file(FileSpec::new("stream.bin", data.clone()).sector_crc())
            .build(),
    )
    .unwrap();

    let mut file = archive.open_file("stream.bin").unwrap();
    assert_eq!(file.size(), 9000);

    let mut all = Vec::new();
    file.read_to_end(&mut all).unwrap();
    assert_eq!(all, data);
    assert_eq!(file.position(), 9000);

    file.seek(SeekFrom::Start(4094)).unwrap();
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf).unwrap();
    assert_eq!(buf, data[4094..4102]);
    assert_eq!(file.position(), 4102);

    file.seek(SeekFrom::End(-3)).unwrap();
    let mut tail = Vec::new();
    file.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, data[8997..]);

    file.seek(SeekFrom::Current(-10)).unwrap();
    assert_eq!(file.position(), 8990);
    assert!(file.seek(SeekFrom::Current(-10_000)).is_err());
}

#[test]
fn test_read_raw_returns_stored_bytes() {
    let data = sample(3000, 41);
    let bytes = ArchiveWriter::new()
        .file(FileSpec::new("raw.bin", data.clone()).stored())
        .file(FileSpec::new("packed.bin", data.clone()))
        .build();
    let archive = Archive::from_bytes(bytes).unwrap();

    assert_eq!(archive.read_raw("raw.bin").unwrap(), data);
    let packed = archive.read_raw("packed.bin").unwrap();
    assert_eq!(
        packed.len() as u64,
        archive.file_info("packed.bin").unwrap().compressed_size
    );
    assert!(packed.len() < data.len());
}

#[test]
fn test_archive_info() {
    let archive = OpenOptions::new()
        .name("info.mpq")
        .open_bytes(ArchiveWriter::new().add("a.txt", b"a".to_vec()).add("b.txt", b"b".to_vec()).build())
        .unwrap();

    let info = archive.archive_info();
    assert_eq!(info.name, "info.mpq");
    assert_eq!(info.header_offset, 0);
    assert_eq!(info.format_version, FormatVersion::V1);
    assert_eq!(info.sector_size, 4096);
    assert_eq!(info.hash_table_size, 16);
    assert_eq!(info.block_table_size, 3);
    // two files plus the listfile
    assert_eq!(info.file_count, 3);
}

#[test]
fn test_archive_behind_user_data() {
    let data = sample(5000, 51);
    let bytes = ArchiveWriter::new()
        .with_user_data()
        .file(FileSpec::new("inner.bin", data.clone()).fix_key())
        .build();
    let archive = Archive::from_bytes(bytes).unwrap();

    assert_eq!(archive.archive_offset(), USER_DATA_ARCHIVE_OFFSET as u64);
    assert_eq!(archive.user_data().unwrap().header_offset, 0x200);
    assert_eq!(archive.read_file("inner.bin").unwrap(), data);
}

#[test]
fn test_locale_tie_break() {
    let bytes = ArchiveWriter::new()
        .file(FileSpec::new("sound\\hello.wav", b"neutral".to_vec()))
        .file(FileSpec::new("sound\\hello.wav", b"german".to_vec()).locale(0x407))
        .build();

    let neutral = Archive::from_bytes(bytes.clone()).unwrap();
    assert_eq!(neutral.read_file("sound\\hello.wav").unwrap(), b"neutral");

    let german = OpenOptions::new().locale(0x407).open_bytes(bytes.clone()).unwrap();
    assert_eq!(german.read_file("sound\\hello.wav").unwrap(), b"german");
    assert_eq!(german.file_info("sound\\hello.wav").unwrap().locale, 0x407);

    let french = OpenOptions::new().locale(0x40C).open_bytes(bytes).unwrap();
    assert_eq!(french.read_file("sound\\hello.wav").unwrap(), b"neutral");
}

#[test]
fn test_checksum_mismatch_is_reported() {
    let data = sample(9000, 61);
    let mut bytes = ArchiveWriter::new()
        .file(FileSpec::new("crc.bin", data.clone()).sector_crc())
        .build();

    // flip the last checksum byte
    let (_, end) = common::block_of(&bytes, "crc.bin");
    bytes[end - 1] ^= 0xFF;

    let archive = Archive::from_bytes(bytes.clone()).unwrap();
    let err = archive.read_file("crc.bin").unwrap_err();
    assert!(matches!(
        err,
        Error::Codec(CodecError::ChecksumMismatch { sector: 2, .. })
    ));
    assert!(err.is_corruption());

    let unchecked = OpenOptions::new()
        .verify_checksums(false)
        .open_bytes(bytes)
        .unwrap();
    assert_eq!(unchecked.read_file("crc.bin").unwrap(), data);
}

#[test]
fn test_block_past_end_of_source() {
    let mut bytes = ArchiveWriter::new()
        .add("big.bin", sample(8000, 71))
        .without_listfile()
        .build();

    // grow the stored size of block 0 past the end of the archive
    let block_pos = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
    let key = hash_string("(block table)", hash_type::FILE_KEY);
    let table = &mut bytes[block_pos..block_pos + 16];
    decrypt_bytes(table, key);
    table[4..8].copy_from_slice(&0x0010_0000u32.to_le_bytes());
    encrypt_bytes(table, key);

    let archive = Archive::from_bytes(bytes).unwrap();
    assert!(archive.exists("big.bin"));
    assert!(matches!(
        archive.read_file("big.bin").unwrap_err(),
        Error::Format(FormatError::Truncated { what: "file data" })
    ));
}

#[test]
fn test_truncated_header() {
    assert!(matches!(
        Archive::from_bytes(b"MPQ\x1A".to_vec()).unwrap_err(),
        Error::Format(FormatError::Truncated { .. })
    ));
}

#[test]
fn test_listfile_enumeration() {
    let bytes = ArchiveWriter::new()
        .add("Interface\\FrameXML\\UIParent.lua", b"-- ui".to_vec())
        .add("Interface\\FrameXML\\UIParent.xml", b"<ui/>".to_vec())
        .add("Sound\\music.mp3", b"mp3".to_vec())
        .build();
    let archive = Archive::from_bytes(bytes).unwrap();

    let lua: Vec<_> = archive.enumerate("*.LUA").unwrap().collect();
    assert_eq!(lua, vec!["Interface\\FrameXML\\UIParent.lua"]);

    let ui: Vec<_> = archive.enumerate("interface/framexml/*").unwrap().collect();
    assert_eq!(ui.len(), 2);

    let all: Vec<_> = archive.enumerate("*").unwrap().collect();
    assert_eq!(all.len(), 3);

    let listed = archive.list().unwrap();
    assert_eq!(listed.len(), 3);
}

#[test]
fn test_enumeration_without_listfile_fails() {
    let archive = Archive::from_bytes(
        ArchiveWriter::new()
            .add("a.txt", b"a".to_vec())
            .without_listfile()
            .build(),
    )
    .unwrap();

    let err = archive.enumerate("*").unwrap_err();
    assert!(matches!(err, Error::FileNotFound(ref name) if name == "(listfile)"));
    // the file itself is still readable
    assert_eq!(archive.read_file("a.txt").unwrap(), b"a");
}

#[test]
fn test_open_from_disk() {
    let data = sample(7000, 81);
    let bytes = ArchiveWriter::new()
        .file(FileSpec::new("disk.bin", data.clone()).encrypted())
        .build();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&bytes).unwrap();
    tmp.flush().unwrap();

    let archive = Archive::open(tmp.path()).unwrap();
    assert_eq!(archive.name(), tmp.path().display().to_string());
    assert_eq!(archive.read_file("disk.bin").unwrap(), data);

    let source = mpqlayer::io::FileSource::open(tmp.path()).unwrap();
    let archive = OpenOptions::new()
        .name("file-source")
        .open_source(Box::new(source))
        .unwrap();
    assert_eq!(archive.read_file("disk.bin").unwrap(), data);
}

#[test]
fn test_concurrent_reads() {
    let data = sample(20_000, 91);
    let archive = Archive::from_bytes(
        ArchiveWriter::new()
            .file(FileSpec::new("shared.bin", data.clone()).encrypted().sector_crc())
            .build(),
    )
    .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10 {
                    assert_eq!(archive.read_file("shared.bin").unwrap(), data);
                }
            });
        }
    });
}
