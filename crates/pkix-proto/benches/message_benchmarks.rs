use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pkix_proto::ocsp::{CertId, Request, Response};
use pkix_proto::transport::decode_get_path;
use pkix_proto::{oid, Node, PkiMessage};

fn cert_id(serial: &str) -> CertId {
    CertId {
        hash_algorithm: oid::SHA1.to_string(),
        issuer_name_hash: "5a".repeat(20),
        issuer_key_hash: "a5".repeat(20),
        serial_number: serial.to_string(),
    }
}

fn create_test_response(extra_certs: usize) -> Vec<u8> {
    let now = Utc::now();
    let single = Node::sequence(vec![
        Node::sequence(vec![
            Node::algorithm(oid::SHA1).expect("sha1 oid"),
            Node::octet_string(&[0x5a; 20]),
            Node::octet_string(&[0xa5; 20]),
            Node::small_integer(1),
        ]),
        Node::implicit_primitive(0, vec![]),
        Node::generalized_time(&now),
        Node::explicit(0, Node::generalized_time(&(now + Duration::hours(1)))),
    ]);
    let tbs = Node::sequence(vec![
        Node::explicit(2, Node::octet_string(&[0x11; 20])),
        Node::generalized_time(&now),
        Node::sequence(vec![single]),
    ]);

    let certs = (0..extra_certs)
        .map(|_| Node::sequence(vec![Node::octet_string(&[0u8; 512])]))
        .collect();
    let basic = Node::sequence(vec![
        tbs,
        Node::algorithm("1.2.840.113549.1.1.11").expect("sha256WithRSA oid"),
        Node::bit_string(&[0u8; 256]),
        Node::explicit(0, Node::sequence(certs)),
    ])
    .to_der();

    Node::sequence(vec![
        Node::enumerated(0),
        Node::explicit(
            0,
            Node::sequence(vec![
                Node::oid(oid::OCSP_BASIC).expect("basic oid"),
                Node::octet_string(&basic),
            ]),
        ),
    ])
    .to_der()
}

fn bench_request_parse(c: &mut Criterion) {
    let der = Request::create_from_params(&cert_id("1234567890abcdef"))
        .expect("Failed to build request")
        .der()
        .to_vec();

    c.bench_function("ocsp_request_parse", |b| {
        b.iter(|| Request::from_der(black_box(der.clone())).expect("Failed to parse request"))
    });
}

fn bench_response_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("ocsp_response_parse");

    for num_certs in [0, 1, 4].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_certs),
            num_certs,
            |b, &num_certs| {
                let der = create_test_response(num_certs);
                b.iter(|| Response::from_der(black_box(der.clone())).expect("Failed to parse response"));
            },
        );
    }

    group.finish();
}

fn bench_response_headers(c: &mut Criterion) {
    let mut response = Response::from_der(create_test_response(1)).expect("Failed to parse response");
    response.set_max_age(600);
    let now = Utc::now();

    c.bench_function("ocsp_response_headers", |b| {
        b.iter(|| response.headers_at(black_box(now)).expect("Failed to build headers"))
    });
}

fn bench_get_path_decode(c: &mut Criterion) {
    use base64::{engine::general_purpose::STANDARD, Engine};

    let der = Request::create_from_params(&cert_id("ff00ff00"))
        .expect("Failed to build request")
        .der()
        .to_vec();
    let path = format!("/{}", STANDARD.encode(der));

    c.bench_function("get_path_decode", |b| {
        b.iter(|| decode_get_path(black_box(&path)).expect("Failed to decode path"))
    });
}

criterion_group!(
    benches,
    bench_request_parse,
    bench_response_parse,
    bench_response_headers,
    bench_get_path_decode
);
criterion_main!(benches);
