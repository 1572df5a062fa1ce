use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use stream_iconv::{Options, Session};

fn sample_text() -> String {
    "The quick brown fox \u{3042}\u{3044}\u{3046}\u{3048}\u{304A} jumps over \u{65E5}\u{672C}\u{8A9E} "
        .repeat(512)
}

fn unicode_forms(c: &mut Criterion) {
    let text = sample_text();
    let mut group = c.benchmark_group("unicode");
    group.throughput(Throughput::Bytes(text.len() as u64));

    for to in ["UTF-16LE", "UTF-32BE"] {
        group.bench_with_input(BenchmarkId::new("utf8_to", to), &text, |b, text| {
            let mut session = Session::open_with(to, "UTF-8", &Options::builtin_only()).unwrap();
            b.iter(|| session.convert_to_vec(black_box(text.as_bytes())).unwrap())
        });
    }
    group.finish();
}

fn japanese(c: &mut Criterion) {
    let text = sample_text();
    let sjis = Session::open_with("CP932", "UTF-8", &Options::builtin_only())
        .unwrap()
        .convert_to_vec(text.as_bytes())
        .unwrap();

    let mut group = c.benchmark_group("japanese");
    group.throughput(Throughput::Bytes(sjis.len() as u64));

    group.bench_function("cp932_to_iso2022jp", |b| {
        let mut session = Session::open_with("ISO-2022-JP", "CP932", &Options::builtin_only()).unwrap();
        b.iter(|| session.convert_to_vec(black_box(&sjis)).unwrap())
    });
    group.bench_function("cp932_to_euc_jp", |b| {
        let mut session = Session::open_with("EUC-JP", "CP932", &Options::builtin_only()).unwrap();
        b.iter(|| session.convert_to_vec(black_box(&sjis)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, unicode_forms, japanese);
criterion_main!(benches);
