//! PRI 결정 벤치마크
//!
//! 단일 PRI, 이중 PRI, PRI 없음 경로의 처리량을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kernlog_kernel_input::driver::KernelStamp;
use kernlog_kernel_input::{parse_pri, resolve_priority};

/// 일반 커널 메시지
const PRIMARY: &[u8] = b"<6>e1000e 0000:00:19.0 eth0: NIC Link is Up 1000 Mbps Full Duplex";

/// 이중 PRI (syslog가 커널 버퍼로 되돌려 보낸 메시지)
const DUAL: &[u8] = b"<4><30>systemd[1]: Started Journal Service.";

/// PRI 없음
const BARE: &[u8] = b"usb 1-1: new high-speed USB device number 2 using xhci_hcd";

/// 타임스탬프가 붙은 /proc/kmsg 줄
const STAMPED: &[u8] = b"<6>[   12.345678] EXT4-fs (sda1): mounted filesystem";

fn bench_parse_pri(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_pri");
    group.throughput(Throughput::Elements(1));
    group.bench_function("short", |b| {
        b.iter(|| {
            let mut cursor = black_box(PRIMARY);
            parse_pri(&mut cursor).unwrap()
        })
    });
    group.bench_function("invalid", |b| {
        b.iter(|| {
            let mut cursor = black_box(BARE);
            parse_pri(&mut cursor).is_err()
        })
    });
    group.finish();
}

fn bench_resolve_priority(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_priority");
    group.throughput(Throughput::Elements(1));
    group.bench_function("primary", |b| {
        b.iter(|| resolve_priority(black_box(PRIMARY), 6))
    });
    group.bench_function("dual", |b| b.iter(|| resolve_priority(black_box(DUAL), 6)));
    group.bench_function("default", |b| b.iter(|| resolve_priority(black_box(BARE), 6)));

    // 1000건 반복 처리량
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000_mixed", |b| {
        b.iter(|| {
            for line in [PRIMARY, DUAL, BARE, STAMPED].iter().cycle().take(1000) {
                black_box(resolve_priority(black_box(line), 6));
            }
        })
    });
    group.finish();
}

fn bench_kernel_stamp(c: &mut Criterion) {
    c.bench_function("kernel_stamp_parse", |b| {
        b.iter(|| KernelStamp::parse(black_box(&STAMPED[3..])))
    });
}

criterion_group!(
    benches,
    bench_parse_pri,
    bench_resolve_priority,
    bench_kernel_stamp
);
criterion_main!(benches);
