use std::io::{Cursor, Read, SeekFrom};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use seekzstd::{Decoder, DecoderOptions, Encoder, EncoderOptions, FrameSizePolicy};

const PAYLOAD_BYTES: usize = 8 * 1024 * 1024;
const FRAME_SIZE: u32 = 64 * 1024;
const READ_BYTES: usize = 4096;

fn build_archive() -> Vec<u8> {
    let mut data = Vec::with_capacity(PAYLOAD_BYTES);
    let mut seed = 0x9e3779b97f4a7c15u64;
    while data.len() < PAYLOAD_BYTES {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        data.extend_from_slice(&seed.to_le_bytes());
    }
    data.truncate(PAYLOAD_BYTES);

    let mut archive = Vec::new();
    let mut encoder = Encoder::new(
        &mut archive,
        EncoderOptions {
            frame_policy: FrameSizePolicy::Uncompressed { size: FRAME_SIZE },
            ..EncoderOptions::default()
        },
    )
    .expect("encoder");
    encoder.write_with_prefix(&data, None).expect("write");
    encoder.finish().expect("finish");
    drop(encoder);
    archive
}

fn bench_seek(c: &mut Criterion) {
    let archive = build_archive();
    let mut decoder =
        Decoder::new(Cursor::new(&archive), DecoderOptions::default()).expect("decoder");
    let total = decoder
        .seek_table()
        .frame_end_decomp(decoder.seek_table().num_frames() - 1)
        .expect("total size");

    let mut group = c.benchmark_group("seek");
    let mut buf = vec![0u8; READ_BYTES];
    // Keep every read fully inside the payload.
    let span = total - READ_BYTES as u64;

    group.bench_function("seek_frame_start_read_4k", |b| {
        let mut offset = 0u64;
        b.iter(|| {
            offset = (offset + 31 * FRAME_SIZE as u64) % span;
            let aligned = offset - offset % FRAME_SIZE as u64;
            decoder.seek(SeekFrom::Start(aligned)).expect("seek");
            decoder.read_exact(&mut buf).expect("read");
            black_box(buf[0]);
        });
    });

    group.bench_function("seek_mid_frame_read_4k", |b| {
        let mut offset = FRAME_SIZE as u64 / 2;
        b.iter(|| {
            offset = (offset + 37 * FRAME_SIZE as u64 + 1021) % span;
            decoder.seek(SeekFrom::Start(offset)).expect("seek");
            decoder.read_exact(&mut buf).expect("read");
            black_box(buf[0]);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_seek);
criterion_main!(benches);
