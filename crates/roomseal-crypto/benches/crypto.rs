use roomseal_crypto::kdf::derive_room_key_with;
use roomseal_crypto::{
    decrypt_message, decrypt_stream, encrypt_message, encrypt_stream, KdfParams, RoomKey,
};
use secrecy::SecretString;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn bench_key() -> RoomKey {
    RoomKey::from_bytes([0xABu8; 32])
}

#[divan::bench(args = [16, 256, 4096])]
fn bench_encrypt_message(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let text = "x".repeat(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt_message(divan::black_box(&key), divan::black_box(&text)).unwrap());
}

#[divan::bench(args = [16, 256, 4096])]
fn bench_decrypt_message(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let envelope = encrypt_message(&key, &"x".repeat(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt_message(divan::black_box(&key), divan::black_box(&envelope)).unwrap());
}

#[divan::bench(args = [65536, 2097152, 8388608])]
fn bench_encrypt_stream(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt_stream(divan::black_box(&data[..]), divan::black_box(&key)).unwrap());
}

#[divan::bench(args = [65536, 2097152, 8388608])]
fn bench_decrypt_stream(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let envelope = encrypt_stream(&make_data(size)[..], &key).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt_stream(divan::black_box(&envelope), divan::black_box(&key)).unwrap());
}

#[divan::bench(sample_count = 10)]
fn bench_derive_room_key(bencher: divan::Bencher) {
    let code = SecretString::from("correct-horse-battery");
    let salt = [7u8; 16];
    let params = KdfParams::default();
    bencher.bench(|| {
        derive_room_key_with(
            divan::black_box(&code),
            divan::black_box(&salt),
            divan::black_box(&params),
        )
        .unwrap()
    });
}

fn main() {
    divan::main();
}
