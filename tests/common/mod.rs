#![allow(dead_code)]

use std::sync::Arc;

use clarity_topics::{Corpus, Embedder, HashingEmbedder, TrainingExample};
use env_logger::{Builder, Env};

pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashingEmbedder::new(256).expect("valid dimension"))
}

/// Small three-topic corpus in the counsel-chat shape.
pub fn counseling_corpus() -> Corpus {
    let rows = [
        ("I feel anxious all the time and my chest gets tight", "anxiety"),
        ("I am worried about everything at work", "anxiety"),
        ("My job interview tomorrow has me worried and nervous", "anxiety"),
        ("I panic before every interview", "anxiety"),
        ("Constant worry about my job keeps me on edge", "anxiety"),
        ("I get anxious and worried when I think about the future", "anxiety"),
        ("I can't fall asleep at night", "sleep"),
        ("I wake up at 3am and never get back to sleep", "sleep"),
        ("Insomnia is ruining my life", "sleep"),
        ("I sleep twelve hours and still feel tired", "sleep"),
        ("Nightmares keep waking me up every night", "sleep"),
        ("I lie awake in bed for hours before I sleep", "sleep"),
        ("My partner and I fight every day", "relationships"),
        ("My boyfriend doesn't listen to me", "relationships"),
        ("My wife and I are thinking about divorce", "relationships"),
        ("I don't trust my girlfriend anymore", "relationships"),
        ("We argue about money and my partner yells", "relationships"),
        ("My marriage feels cold and distant", "relationships"),
    ];
    Corpus::new(rows.iter().map(|(text, topic)| TrainingExample::new(*text, *topic)))
}
