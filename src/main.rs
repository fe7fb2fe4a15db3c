use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use songvec_api::RestApi;
use songvec_core::{
    fit_pipeline, HashingEmbedder, PipelineConfig, QueryEncoder, ReductionStrategy, ServingContract,
    TextEmbedder, TextField, WeightTable, DEFAULT_EMBEDDING_DIM, DEFAULT_FIELD_COMPONENTS,
    DEFAULT_TARGET_DIM,
};
use songvec_storage::{read_embedded, read_records, write_embedded, ArtifactStore, ModelRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Song feature fusion and query encoding
#[derive(Parser, Debug)]
#[command(name = "songvec")]
#[command(about = "Fuse song features into a shared vector space and serve query embeddings", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the pipeline over a corpus and write the model artifact
    Fit(FitArgs),
    /// Serve query embeddings over HTTP
    Serve(ServeArgs),
    /// Encode one query, optionally ranking an encoded corpus against it
    Encode(EncodeArgs),
}

#[derive(ClapArgs, Debug)]
struct FitArgs {
    /// Song records (JSON array or JSON lines, optionally .gz)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the model artifact
    #[arg(short, long, default_value = "./data/model.bin")]
    artifact: PathBuf,

    /// Where to write the encoded corpus (JSON lines, .gz to compress)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output vector dimension
    #[arg(long, default_value_t = DEFAULT_TARGET_DIM)]
    target_dim: usize,

    /// Components kept per text field
    #[arg(long, default_value_t = DEFAULT_FIELD_COMPONENTS)]
    field_components: usize,

    /// Serving contract: fused or text-only
    #[arg(long, default_value = "fused")]
    contract: String,

    /// Keep raw field embeddings instead of fitting a PCA per field
    #[arg(long)]
    no_field_pca: bool,

    /// JSON weight table overriding the defaults
    #[arg(long)]
    weights: Option<PathBuf>,

    #[command(flatten)]
    embedder: EmbedderArgs,
}

#[derive(ClapArgs, Debug)]
struct ServeArgs {
    /// Model artifact to load
    #[arg(short, long, default_value = "./data/model.bin")]
    artifact: PathBuf,

    /// HTTP API port
    #[arg(long, default_value_t = 8000)]
    http_port: u16,

    #[command(flatten)]
    embedder: EmbedderArgs,
}

#[derive(ClapArgs, Debug)]
struct EncodeArgs {
    /// Model artifact to load
    #[arg(short, long, default_value = "./data/model.bin")]
    artifact: PathBuf,

    /// Query text
    #[arg(short, long)]
    text: String,

    /// Encode within one field's space (artists, genre, album, track)
    #[arg(long)]
    field: Option<String>,

    /// Encoded corpus to rank against the query
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Number of ranked songs to print
    #[arg(long, default_value_t = 10)]
    top: usize,

    #[command(flatten)]
    embedder: EmbedderArgs,
}

#[derive(ClapArgs, Debug)]
struct EmbedderArgs {
    /// Dimension of the hashing text embedder
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    embedding_dim: usize,
}

impl EmbedderArgs {
    fn build(&self) -> Arc<dyn TextEmbedder> {
        Arc::new(HashingEmbedder::new(self.embedding_dim))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Fit(fit) => run_fit(fit),
        Command::Serve(serve) => run_serve(serve).await,
        Command::Encode(encode) => run_encode(encode),
    }
}

fn run_fit(args: FitArgs) -> anyhow::Result<()> {
    let contract = match ServingContract::parse(&args.contract) {
        Some(contract) => contract,
        None => bail!("unknown contract {:?}, expected fused or text-only", args.contract),
    };

    let weights = match &args.weights {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read weights {}", path.display()))?;
            serde_json::from_str::<WeightTable>(&text)
                .with_context(|| format!("invalid weight table {}", path.display()))?
        }
        None => WeightTable::default(),
    };

    let config = PipelineConfig {
        target_dim: args.target_dim,
        field_components: args.field_components,
        strategy: if args.no_field_pca {
            ReductionStrategy::Identity
        } else {
            ReductionStrategy::Pca
        },
        weights,
        contract,
    };

    let records = read_records(&args.input)?;
    let embedder = args.embedder.build();
    let fitted = fit_pipeline(&records, embedder.as_ref(), &config)?;

    let description = ArtifactStore::new(&args.artifact).save(&fitted.artifact)?;
    info!(
        path = ?description.path,
        checksum = %description.checksum,
        n_fitted = fitted.artifact.reduction.n_fitted(),
        "artifact written"
    );

    if let Some(output) = &args.output {
        write_embedded(output, &fitted.outputs)?;
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting SongVec v{}", env!("CARGO_PKG_VERSION"));
    info!("Artifact: {:?}", args.artifact);

    let store = ArtifactStore::new(&args.artifact);
    let registry = Arc::new(
        ModelRegistry::open(store, args.embedder.build())
            .with_context(|| format!("cannot serve without a valid artifact at {}", args.artifact.display()))?,
    );
    info!("Model loaded: {:?}", registry.current());

    let http_port = args.http_port;
    let registry_http = registry.clone();
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(registry_http, http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}

fn run_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let artifact = ArtifactStore::new(&args.artifact).load()?;
    let encoder = QueryEncoder::new(artifact, args.embedder.build())?;

    let query = match args.field.as_deref() {
        Some(name) => match TextField::parse(name) {
            Some(field) => encoder.encode_in_field(&args.text, field)?,
            None => bail!("unknown field {:?}", name),
        },
        None => encoder.encode(&args.text)?,
    };

    let Some(corpus) = &args.corpus else {
        println!("{}", serde_json::to_string(query.as_slice())?);
        return Ok(());
    };

    let songs = read_embedded(corpus)?;
    let mut ranked: Vec<(f64, usize)> = songs
        .iter()
        .enumerate()
        .filter_map(|(i, song)| {
            let vector = song.vector();
            if vector.dim() != query.dim() {
                warn!(id = %song.id, dim = vector.dim(), "skipping song with foreign dimension");
                return None;
            }
            Some((query.cosine_similarity(&vector), i))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (score, i) in ranked.into_iter().take(args.top) {
        let song = &songs[i];
        println!(
            "{:.4}\t{}\t{}\t{}",
            score,
            song.id,
            song.track_name.as_deref().unwrap_or("-"),
            song.artists.join(", ")
        );
    }
    Ok(())
}
