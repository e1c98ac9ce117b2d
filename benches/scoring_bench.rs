use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tessera::NoopObserver;
use tessera::lexical::score::{self, DocumentScore};
use tessera::lexical::search::phrase::ProximityScorer;
use tessera::lexical::{DocumentPosting, SegmentVersion};

/// One posting list per token: every document holds every token `spread`
/// times, in phrase order, with the tokens of one repetition adjacent.
fn generate_postings(docs: u32, tokens: u32, spread: u32) -> Vec<Vec<DocumentPosting>> {
    let field: Arc<str> = Arc::from("body");
    (0..tokens)
        .map(|token| {
            (0..docs)
                .flat_map(|doc| {
                    let field = field.clone();
                    (0..spread).map(move |rep| {
                        DocumentPosting::new(doc, field.clone(), rep * (tokens + 3) + token)
                    })
                })
                .collect()
        })
        .collect()
}

fn generate_scores(docs: u32, step: u32) -> Vec<DocumentScore> {
    (0..docs)
        .step_by(step as usize)
        .map(|doc| DocumentScore::new(doc, doc as u64, 1.0, SegmentVersion(1)))
        .collect()
}

fn bench_proximity(c: &mut Criterion) {
    let mut group = c.benchmark_group("Proximity Scoring");
    let scorer = ProximityScorer::new(SegmentVersion(1), Arc::new(NoopObserver));
    let docs = 10_000;

    for tokens in [2u32, 4, 8] {
        let postings = generate_postings(docs, tokens, 4);
        let total: usize = postings.iter().map(Vec::len).sum();
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tokens), &postings, |b, postings| {
            b.iter(|| black_box(scorer.score(postings, tokens as usize)))
        });
    }
    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("Score Algebra");
    let docs = 100_000;
    let evens = generate_scores(docs, 2);
    let thirds = generate_scores(docs, 3);
    group.throughput(Throughput::Elements((evens.len() + thirds.len()) as u64));

    group.bench_function("combine_and", |b| {
        b.iter(|| black_box(score::combine_and(&evens, &thirds).unwrap()))
    });
    group.bench_function("combine_or", |b| {
        b.iter(|| black_box(score::combine_or(&evens, &thirds).unwrap()))
    });
    group.bench_function("not", |b| b.iter(|| black_box(score::not(&evens, &thirds))));
    group.finish();
}

criterion_group!(benches, bench_proximity, bench_combinators);
criterion_main!(benches);
