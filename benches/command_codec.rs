//! Benchmarks for the control channel codec
//!
//! Covers command building, payload reading, frame encoding and extraction
//! for both framing variants, and the login hash.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use visionary::UserLevel;
use visionary::cola::framing::{Cola2Header, ControlFrameBuffer, DEFAULT_MAX_CONTROL_FRAME, encode_frame};
use visionary::cola::{CommandBuilder, CommandReader, ProtocolVariant};
use visionary::control::{Challenge, password_hash};

fn bench_command_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_building");

    group.bench_function("read_request", |b| {
        b.iter(|| black_box(CommandBuilder::read_variable(black_box("framePeriodTime")).build().unwrap()))
    });

    group.bench_function("write_mixed_params", |b| {
        b.iter(|| {
            let command = CommandBuilder::write_variable("ambiguityFilter")
                .param_bool(black_box(true))
                .param_u16(black_box(500))
                .param_f32(black_box(0.25))
                .param_flex_string(black_box("enabled"))
                .build()
                .unwrap();
            black_box(command)
        })
    });

    let command = CommandBuilder::write_variable("ambiguityFilter")
        .param_bool(true)
        .param_u16(500)
        .param_f32(0.25)
        .param_flex_string("enabled")
        .build()
        .unwrap();
    group.bench_function("read_mixed_params", |b| {
        b.iter(|| {
            let mut reader = CommandReader::new(black_box(&command));
            let values = (
                reader.read_bool().unwrap(),
                reader.read_u16().unwrap(),
                reader.read_f32().unwrap(),
                reader.read_flex_string().unwrap(),
            );
            black_box(values)
        })
    });

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_framing");
    let body = b"sRA framePeriodTime \x00\x02\x49\xf0";

    for variant in [ProtocolVariant::ColaB, ProtocolVariant::Cola2] {
        let header = Cola2Header { session_id: 0x1234, request_id: 7 };

        group.bench_function(format!("encode_{variant}"), |b| {
            b.iter(|| black_box(encode_frame(variant, header, black_box(body))))
        });

        let wire = encode_frame(variant, header, body);
        group.bench_function(format!("extract_{variant}"), |b| {
            let mut buffer = ControlFrameBuffer::new(variant, DEFAULT_MAX_CONTROL_FRAME);
            b.iter(|| {
                buffer.extend(black_box(&wire));
                black_box(buffer.try_extract().unwrap().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_login_hash(c: &mut Criterion) {
    let challenge = Challenge { challenge: [0x3c; 16], salt: [0xa5; 16] };
    c.bench_function("password_hash", |b| {
        b.iter(|| {
            black_box(password_hash(
                black_box(UserLevel::AuthorizedClient),
                black_box("CLIENT"),
                black_box(&challenge),
            ))
        })
    });
}

criterion_group!(benches, bench_command_building, bench_framing, bench_login_hash);
criterion_main!(benches);
