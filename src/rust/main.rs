use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};

use clarity_topics::classifier::ClassWeight;
use clarity_topics::{
    evaluate, server, ArtifactPaths, BuiltinModel, Corpus, CorpusFields, Embedder, EmbeddingConfig, HashingEmbedder,
    ModelManager, RuntimeConfig, ServeConfig, ServiceState, TopicPredictor, TrainConfig, Trainer, DEFAULT_TOP_K,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit the topic classifier on a labeled corpus and save the artifacts
    Train(TrainArgs),
    /// Score saved artifacts against a labeled corpus
    Evaluate(EvaluateArgs),
    /// Print the most likely topics for a piece of text
    Predict(PredictArgs),
    /// Run the HTTP predictor service
    Serve(ServeArgs),
    /// Download and verify a built-in embedding model
    Download(DownloadArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// Built-in model name, `hashing[:DIM]`, or an id for a custom model
    #[arg(long, env = "CLARITY_EMBEDDING_MODEL", default_value = "minilm")]
    embedding_model: String,

    /// ONNX file for a custom embedding model
    #[arg(long, env = "CLARITY_MODEL_PATH", requires = "tokenizer_path")]
    model_path: Option<PathBuf>,

    /// tokenizer.json for a custom embedding model
    #[arg(long, env = "CLARITY_TOKENIZER_PATH", requires = "model_path")]
    tokenizer_path: Option<PathBuf>,

    #[arg(long)]
    max_sequence_length: Option<usize>,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    #[arg(long, env = "CLARITY_ARTIFACT_DIR", default_value = "weights")]
    artifact_dir: PathBuf,
}

impl ModelArgs {
    fn embedding_config(&self) -> Result<EmbeddingConfig> {
        if let (Some(model_path), Some(tokenizer_path)) = (&self.model_path, &self.tokenizer_path) {
            return Ok(EmbeddingConfig::Custom {
                model_id: self.embedding_model.clone(),
                model_path: model_path.clone(),
                tokenizer_path: tokenizer_path.clone(),
                max_sequence_length: self.max_sequence_length,
            });
        }
        if let Some(rest) = self.embedding_model.strip_prefix("hashing") {
            let dimension = match rest.strip_prefix(':') {
                Some(dim) => dim.parse().with_context(|| format!("Invalid hashing dimension '{}'", dim))?,
                None if rest.is_empty() => HashingEmbedder::DEFAULT_DIMENSION,
                None => bail!("Unknown embedding model '{}'", self.embedding_model),
            };
            return Ok(EmbeddingConfig::Hashing { dimension });
        }
        let model: BuiltinModel = self.embedding_model.parse().map_err(anyhow::Error::msg)?;
        Ok(EmbeddingConfig::Builtin(model))
    }

    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let config = self.embedding_config()?;
        let runtime = RuntimeConfig::default().with_threads(0, self.threads);
        let manager = ModelManager::new_default().context("Failed to create model cache directory")?;
        let embedder = config
            .load(&runtime, &manager, true)
            .await
            .context("Failed to load embedding model")?;
        Ok(embedder)
    }
}

#[derive(Args)]
struct CorpusArgs {
    /// JSON Lines file, or a `.json` array of objects
    corpus: PathBuf,

    #[arg(long, default_value = "questionText")]
    text_field: String,

    #[arg(long, default_value = "topic")]
    label_field: String,

    /// Texts per embedding batch
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

impl CorpusArgs {
    fn fields(&self) -> CorpusFields {
        CorpusFields {
            text_field: self.text_field.clone(),
            label_field: self.label_field.clone(),
        }
    }

    fn load(&self) -> Result<Corpus> {
        Corpus::load(&self.corpus, &self.fields()).with_context(|| format!("Failed to load corpus {:?}", self.corpus))
    }
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    #[command(flatten)]
    model: ModelArgs,

    #[arg(long, default_value_t = 0.2)]
    test_size: f32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Inverse regularisation strength
    #[arg(long, default_value_t = 1.0)]
    c: f32,

    #[arg(long, default_value_t = 1000)]
    max_iter: usize,

    /// Weight every example equally instead of balancing classes
    #[arg(long)]
    no_class_weight: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct PredictArgs {
    text: String,

    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "CLARITY_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "CLARITY_PORT", default_value_t = 6000)]
    port: u16,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(default_value = "minilm")]
    model: String,

    /// Remove existing files and download again
    #[arg(short, long)]
    fresh: bool,
}

async fn train(args: TrainArgs) -> Result<()> {
    let embedder = args.model.load_embedder().await?;

    let mut logistic = TrainConfig::default().logistic.with_c(args.c).with_max_iter(args.max_iter);
    if args.no_class_weight {
        logistic = logistic.with_class_weight(ClassWeight::Uniform);
    }
    let config = TrainConfig::default()
        .with_test_size(args.test_size)
        .with_seed(args.seed)
        .with_batch_size(args.corpus.batch_size)
        .with_fields(args.corpus.fields())
        .with_logistic(logistic);

    let start = Instant::now();
    let paths = ArtifactPaths::new(&args.model.artifact_dir);
    let report = Trainer::new(embedder, config)
        .run_from_path(&args.corpus.corpus, &paths)
        .with_context(|| format!("Training on {:?} failed", args.corpus.corpus))?;
    info!(
        "Training finished in {:.2?}: {} topics, {} iterations (converged: {})",
        start.elapsed(),
        report.labels.len(),
        report.fit.iterations,
        report.fit.converged
    );
    if let Some(evaluation) = &report.evaluation {
        println!("Accuracy: {:.4}", evaluation.accuracy);
        println!("{}", evaluation);
    }
    Ok(())
}

async fn load_predictor(model: &ModelArgs, export_labels: bool) -> Result<TopicPredictor> {
    let embedder = model.load_embedder().await?;
    let mut paths = ArtifactPaths::new(&model.artifact_dir);
    if !export_labels {
        paths = paths.with_labels_export(None);
    }
    TopicPredictor::from_artifacts(embedder, &paths)
        .with_context(|| format!("Failed to load artifacts from {:?}", model.artifact_dir))
}

async fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let corpus = args.corpus.load()?;
    let predictor = load_predictor(&args.model, false).await?;
    let report = evaluate(&predictor, &corpus, args.corpus.batch_size)?;
    println!("Accuracy: {:.4}", report.accuracy);
    println!("{}", report);
    Ok(())
}

async fn predict(args: PredictArgs) -> Result<()> {
    let predictor = load_predictor(&args.model, false).await?;
    let predictions = predictor.predict(&args.text, args.top_k)?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "predictions": predictions }))?);
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let predictor = match load_predictor(&args.model, true).await {
        Ok(predictor) => predictor,
        Err(e) => {
            error!("Failed to load models, not starting the service: {:#}", e);
            return Err(e);
        }
    };
    let config = ServeConfig { host: args.host, port: args.port };
    let state = ServiceState::loaded(Arc::new(predictor));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
    };
    server::serve(&config, state, shutdown)
        .await
        .with_context(|| format!("Predictor service on {} failed", config.address()))
}

async fn download(args: DownloadArgs) -> Result<()> {
    let model: BuiltinModel = args.model.parse().map_err(anyhow::Error::msg)?;
    let manager = ModelManager::new_default()?;

    if args.fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(model)?;
    }
    manager.ensure_model_downloaded(model).await?;
    println!("{} is ready in {:?}", model, manager.models_dir());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => train(args).await,
        Command::Evaluate(args) => run_evaluate(args).await,
        Command::Predict(args) => predict(args).await,
        Command::Serve(args) => serve(args).await,
        Command::Download(args) => download(args).await,
    }
}
