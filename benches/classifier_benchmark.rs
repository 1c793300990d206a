use std::sync::Arc;

use clarity_topics::{
    Corpus, Embedder, HashingEmbedder, TopicPredictor, TrainConfig, Trainer, TrainingExample,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const TOPICS: [&str; 6] = ["anxiety", "depression", "sleep", "relationships", "grief", "parenting"];

fn synthetic_corpus(topics: usize, per_topic: usize) -> Corpus {
    let mut examples = Vec::with_capacity(topics * per_topic);
    for t in 0..topics {
        let topic = format!("{}_{}", TOPICS[t % TOPICS.len()], t);
        for i in 0..per_topic {
            examples.push(TrainingExample::new(
                format!("question {} about {} and feeling {} today", i, topic, TOPICS[(t + i) % TOPICS.len()]),
                topic.clone(),
            ));
        }
    }
    Corpus::new(examples)
}

fn setup_predictor(topics: usize) -> TopicPredictor {
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let trained = Trainer::new(embedder.clone(), TrainConfig::default().with_test_size(0.0))
        .fit(&synthetic_corpus(topics, 10))
        .unwrap();
    TopicPredictor::new(embedder, trained.model, trained.encoder).unwrap()
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = HashingEmbedder::default();
    let mut group = c.benchmark_group("Embedding");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    group.bench_function("short_text", |b| b.iter(|| {
        embedder.embed(black_box("I can't sleep")).unwrap()
    }));

    group.bench_function("long_text", |b| b.iter(|| {
        embedder.embed(black_box(
            "Lately I have been feeling anxious most days. I wake up early, I can't get \
             back to sleep, and at work I keep worrying about whether I'm doing enough. \
             My partner says I seem distant and I don't know how to explain what's going on."
        )).unwrap()
    }));

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prediction");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for &count in &[2, 10, 30] {
        let predictor = setup_predictor(count);
        group.bench_function(format!("top5_classes_{}", count), |b| b.iter(|| {
            predictor.predict(black_box("I am worried about my job interview"), 5).unwrap()
        }));
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let corpus = synthetic_corpus(5, 20);
    let trainer = Trainer::new(embedder, TrainConfig::default());
    group.bench_function("fit_5x20", |b| b.iter(|| {
        trainer.fit(black_box(&corpus)).unwrap()
    }));

    group.finish();
}

criterion_group!(
    benches,
    bench_embedding,
    bench_prediction,
    bench_training
);
criterion_main!(benches);
