use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qrgif::base64;
use qrgif::gif::GifImage;
use qrgif::qrcode::{QrCode, QrCodeEcc, Version};
use qrgif::segment::QrSegment;

fn built(version: u8, payload: &[u8]) -> QrCode {
    let mut qr = QrCode::new();
    qr.set_version(Version::new(version));
    qr.set_error_correction_level(QrCodeEcc::Medium);
    qr.add_segment(QrSegment::bytes(payload));
    qr
}

fn bench_build_version_1(c: &mut Criterion) {
    let mut qr = built(1, b"TEST");
    c.bench_function("build_v1_m", |b| b.iter(|| black_box(&mut qr).build()));
}

fn bench_build_version_10(c: &mut Criterion) {
    let mut qr = built(10, &[b'x'; 200]);
    c.bench_function("build_v10_m", |b| b.iter(|| black_box(&mut qr).build()));
}

fn bench_build_version_40(c: &mut Criterion) {
    let mut qr = built(40, &[b'x'; 2000]);
    c.bench_function("build_v40_m", |b| b.iter(|| black_box(&mut qr).build()));
}

fn bench_data_url_version_10(c: &mut Criterion) {
    let mut qr = built(10, &[b'x'; 200]);
    qr.build().unwrap();
    c.bench_function("data_url_v10_cell4", |b| {
        b.iter(|| black_box(&qr).to_data_url(Some(4), None))
    });
}

fn bench_gif_encode(c: &mut Criterion) {
    let mut img = GifImage::new(512, 512).unwrap();
    for y in 0..512 {
        for x in 0..512 {
            img.set_pixel(x, y, (((x / 8) ^ (y / 8)) & 1) as u8).unwrap();
        }
    }
    c.bench_function("gif_512x512_checker", |b| b.iter(|| black_box(&img).to_bytes()));
}

fn bench_base64(c: &mut Criterion) {
    let data: Vec<u8> = (0..64 * 1024).map(|i| (i * 31) as u8).collect();
    let text = base64::encode(&data);
    c.bench_function("base64_encode_64k", |b| b.iter(|| base64::encode(black_box(&data))));
    c.bench_function("base64_decode_64k", |b| {
        b.iter(|| base64::decode(black_box(text.as_bytes())))
    });
}

criterion_group!(
    benches,
    bench_build_version_1,
    bench_build_version_10,
    bench_build_version_40,
    bench_data_url_version_10,
    bench_gif_encode,
    bench_base64
);
criterion_main!(benches);
