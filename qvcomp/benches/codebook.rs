use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qvcomp::_internal_test_data::random_walk_corpus;
use qvcomp::alphabet::Alphabet;
use qvcomp::codebook_generator::CodebookGenerator;
use qvcomp::distortion::{DistortionMetric, DistortionTable};
use qvcomp::encoder::LossyEncoder;
use qvcomp::stats::CondPmfStore;

fn bench_statistics(c: &mut Criterion) {
    let corpus = random_walk_corpus(1000, 100, 41, 17);
    let alphabet = Alphabet::trivial(41);

    c.bench_function("statistics 1000x100", |b| {
        b.iter(|| CondPmfStore::from_corpus(black_box(&corpus), &alphabet).unwrap())
    });
}

fn bench_generate(c: &mut Criterion) {
    let corpus = random_walk_corpus(1000, 100, 41, 17);
    let alphabet = Alphabet::trivial(41);
    let stats = CondPmfStore::from_corpus(&corpus, &alphabet).unwrap();
    let table = DistortionTable::new(DistortionMetric::Mse, 41);

    c.bench_function("generate 1000x100", |b| {
        b.iter(|| {
            CodebookGenerator::new(black_box(&stats), &table, 0.5)
                .generate()
                .unwrap()
        })
    });
}

fn bench_encode(c: &mut Criterion) {
    let corpus = random_walk_corpus(1000, 100, 41, 17);
    let alphabet = Alphabet::trivial(41);
    let stats = CondPmfStore::from_corpus(&corpus, &alphabet).unwrap();
    let table = DistortionTable::new(DistortionMetric::Mse, 41);
    let codebook = CodebookGenerator::new(&stats, &table, 0.5)
        .generate()
        .unwrap();

    c.bench_function("encode 1000x100", |b| {
        b.iter(|| {
            let mut encoder = LossyEncoder::new(codebook.quantizers().clone());
            encoder
                .encode_corpus(black_box(&corpus), &table)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_statistics, bench_generate, bench_encode);
criterion_main!(benches);
