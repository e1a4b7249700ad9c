#[macro_use]
extern crate criterion;

use std::net::Ipv4Addr;

use criterion::{black_box, Criterion};

use lanwatch_protocols::dhcp::{self, OPTION_MESSAGE_TYPE, OPTION_SERVER_ID};
use lanwatch_protocols::frame::build;
use lanwatch_protocols::{Frame, MacAddr};

const ROUTER: MacAddr = MacAddr::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);

fn benchmark_arp_decoding(c: &mut Criterion) {
    let bytes = build::arp(
        2,
        ROUTER,
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(192, 168, 1, 20),
    );

    c.bench_function("arp_decoding", |b| {
        b.iter(|| {
            black_box(Frame::decode(black_box(&bytes))).unwrap();
        })
    });
}

fn benchmark_udp_decoding(c: &mut Criterion) {
    let bytes = build::ipv4_udp(
        ROUTER,
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(192, 168, 1, 20),
        64,
        (53, 40000),
        &[0u8; 64],
    );

    c.bench_function("ipv4_udp_decoding", |b| {
        b.iter(|| {
            black_box(Frame::decode(black_box(&bytes))).unwrap();
        })
    });
}

fn benchmark_dhcp_offer_decoding(c: &mut Criterion) {
    let offer = dhcp::build_message(
        2,
        MacAddr::new([0x02, 0, 0, 0, 0, 0x10]),
        &[(OPTION_MESSAGE_TYPE, &[2]), (OPTION_SERVER_ID, &[192, 168, 1, 1])],
    );
    let bytes = build::ipv4_udp(
        ROUTER,
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::BROADCAST,
        64,
        (67, 68),
        &offer,
    );

    c.bench_function("dhcp_offer_decoding", |b| {
        b.iter(|| {
            black_box(Frame::decode(black_box(&bytes))).unwrap();
        })
    });
}

criterion_group!(
    benches,
    benchmark_arp_decoding,
    benchmark_udp_decoding,
    benchmark_dhcp_offer_decoding
);
criterion_main!(benches);
