use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mpqlayer::compression::{compress_sector, decompress_sector, flags};
use mpqlayer::sector::sector_checksum;

fn sector_data() -> Vec<u8> {
    // text-like content that every codec can shrink
    b"MPQ sector payload with some repetition 0123456789\n"
        .iter()
        .cycle()
        .take(4096)
        .copied()
        .collect()
}

fn bench_decompress(c: &mut Criterion) {
    let data = sector_data();
    let mut group = c.benchmark_group("decompress_sector");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (label, method) in [
        ("zlib", flags::ZLIB),
        ("bzip2", flags::BZIP2),
        ("lzma", flags::LZMA),
        ("pkware", flags::PKWARE),
        ("sparse_zlib", flags::SPARSE | flags::ZLIB),
    ] {
        let stored = compress_sector(&data, method).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(label), &stored, |b, stored| {
            b.iter(|| decompress_sector(black_box(stored), data.len(), false).unwrap())
        });
    }
    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let data = sector_data();
    let mut group = c.benchmark_group("sector_checksum");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("adler32", |b| b.iter(|| sector_checksum(black_box(&data))));
    group.finish();
}

criterion_group!(benches, bench_decompress, bench_checksum);
criterion_main!(benches);
