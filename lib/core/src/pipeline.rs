//! Offline fitting.
//!
//! [`fit_pipeline`] runs the whole batch fit over an in-memory corpus and
//! returns both the artifact and the encoded corpus. Encoding a record
//! after the fit goes through [`encode_record`], which replays exactly the
//! same transforms.

use crate::artifact::{ArtifactHeader, ModelArtifact, ServingContract, ARTIFACT_FORMAT_VERSION};
use crate::embedder::{embed_batch, embed_or_zero, FieldEmbedding, TextEmbedder};
use crate::error::{Error, Result};
use crate::field_reducer::{FieldReducer, FieldReducerModel, ReductionStrategy, DEFAULT_FIELD_COMPONENTS};
use crate::fusion::{FeatureFusion, FusionLayout, ReducedFields, FUSED_LAYOUT_VERSION};
use crate::global_reducer::{GlobalReducer, DEFAULT_TARGET_DIM};
use crate::normalizer::{NormalizationStats, NumericFeatureSet, NumericNormalizer};
use crate::record::{NumericAttribute, SongRecord, TextField};
use crate::vector::Vector;
use crate::weights::WeightTable;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_target_dim")]
    pub target_dim: usize,
    #[serde(default = "default_field_components")]
    pub field_components: usize,
    #[serde(default)]
    pub strategy: ReductionStrategy,
    #[serde(default)]
    pub weights: WeightTable,
    #[serde(default)]
    pub contract: ServingContract,
}

fn default_target_dim() -> usize {
    DEFAULT_TARGET_DIM
}

fn default_field_components() -> usize {
    DEFAULT_FIELD_COMPONENTS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_dim: DEFAULT_TARGET_DIM,
            field_components: DEFAULT_FIELD_COMPONENTS,
            strategy: ReductionStrategy::default(),
            weights: WeightTable::default(),
            contract: ServingContract::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_dim == 0 {
            return Err(Error::InvalidConfig("target_dim must be positive".to_string()));
        }
        if self.strategy == ReductionStrategy::Pca && self.field_components == 0 {
            return Err(Error::InvalidConfig("field_components must be positive".to_string()));
        }
        self.weights.validate()
    }
}

/// One encoded corpus row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedSong {
    pub id: String,
    pub album_name: Option<String>,
    pub track_name: Option<String>,
    pub artists: Vec<String>,
    pub track_genre: Option<String>,
    pub popularity: Option<f64>,
    pub duration_ms: Option<f64>,
    pub explicit: Option<bool>,
    pub features: Vec<f64>,
}

impl EmbeddedSong {
    pub fn new(record: &SongRecord, features: Vector) -> Self {
        Self {
            id: record.id.clone(),
            album_name: record.album_name.clone(),
            track_name: record.track_name.clone(),
            artists: record.artist_names(),
            track_genre: record.track_genre.clone(),
            popularity: record.numeric(NumericAttribute::Popularity),
            duration_ms: record.numeric(NumericAttribute::DurationMs),
            explicit: record.numeric(NumericAttribute::Explicit).map(|v| v != 0.0),
            features: features.into_inner(),
        }
    }

    pub fn vector(&self) -> Vector {
        Vector::from_slice(&self.features)
    }
}

#[derive(Debug, Clone)]
pub struct FittedPipeline {
    pub artifact: ModelArtifact,
    pub outputs: Vec<EmbeddedSong>,
}

/// Fit every stage over `records` and encode the corpus.
pub fn fit_pipeline(
    records: &[SongRecord],
    embedder: &dyn TextEmbedder,
    config: &PipelineConfig,
) -> Result<FittedPipeline> {
    config.validate()?;
    if records.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    info!(
        records = records.len(),
        model = embedder.model_id(),
        contract = %config.contract,
        "fitting pipeline"
    );

    match config.contract {
        ServingContract::Fused => fit_fused(records, embedder, config),
        ServingContract::TextOnly => {
            let texts: Vec<String> = records.iter().map(SongRecord::describe).collect();
            let (artifact, vectors) = fit_text_only(&texts, embedder, config)?;
            let outputs = records
                .iter()
                .zip(vectors)
                .map(|(record, v)| EmbeddedSong::new(record, v))
                .collect();
            Ok(FittedPipeline { artifact, outputs })
        }
    }
}

/// Fit the text-only variant: the global reduction is fitted directly over
/// the embeddings of `texts`. Returns the artifact and the encoded texts.
pub fn fit_text_only(
    texts: &[String],
    embedder: &dyn TextEmbedder,
    config: &PipelineConfig,
) -> Result<(ModelArtifact, Vec<Vector>)> {
    config.validate()?;
    if texts.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let inputs: Vec<Option<String>> = texts.iter().cloned().map(Some).collect();
    let rows: Vec<Vector> = embed_batch(embedder, &inputs)
        .into_iter()
        .map(|e| e.vector)
        .collect();

    let reduction = GlobalReducer::fit(&rows, config.target_dim)?;
    let outputs = rows
        .iter()
        .map(|row| reduction.encode(row))
        .collect::<Result<Vec<_>>>()?;

    let artifact = ModelArtifact {
        header: header(embedder, config, ServingContract::TextOnly, embedder.dim(), texts.len()),
        weights: config.weights.clone(),
        stats: NormalizationStats::default(),
        fields: Vec::new(),
        reduction,
    };
    artifact.validate()?;
    Ok((artifact, outputs))
}

fn fit_fused(
    records: &[SongRecord],
    embedder: &dyn TextEmbedder,
    config: &PipelineConfig,
) -> Result<FittedPipeline> {
    let dim = embedder.dim();
    let stats = NumericNormalizer::fit(records);

    let embeddings: Vec<Vec<FieldEmbedding>> = TextField::ALL
        .iter()
        .map(|&field| {
            let texts: Vec<Option<String>> = records.iter().map(|r| r.text(field)).collect();
            embed_batch(embedder, &texts)
        })
        .collect();

    let mut fields = Vec::with_capacity(TextField::ALL.len());
    for field in TextField::ALL {
        let present: Vec<Vector> = embeddings[field.index()]
            .iter()
            .filter(|e| e.present)
            .map(|e| e.vector.clone())
            .collect();
        if present.len() < records.len() {
            warn!(
                field = %field,
                missing = records.len() - present.len(),
                "field absent on some records, their slots fuse as zeros"
            );
        }
        fields.push(FieldReducer::fit(
            field,
            &present,
            dim,
            config.strategy,
            config.field_components,
        )?);
    }

    let mut dims = [0usize; 4];
    for model in &fields {
        dims[model.field.index()] = model.output_dim;
    }
    let layout = FusionLayout::new(dims);

    let fused = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let numeric = NumericNormalizer::transform(record, &stats);
            let mut reduced: ReducedFields = Default::default();
            for field in TextField::ALL {
                reduced[field.index()] =
                    reduce_field(&fields[field.index()], &embeddings[field.index()][i])?;
            }
            FeatureFusion::fuse(&numeric, &reduced, &config.weights, &layout)
        })
        .collect::<Result<Vec<_>>>()?;

    let reduction = GlobalReducer::fit(&fused, config.target_dim)?;
    let outputs = records
        .iter()
        .zip(&fused)
        .map(|(record, f)| Ok(EmbeddedSong::new(record, reduction.encode(f)?)))
        .collect::<Result<Vec<_>>>()?;

    let artifact = ModelArtifact {
        header: header(embedder, config, ServingContract::Fused, layout.fused_dim(), records.len()),
        weights: config.weights.clone(),
        stats,
        fields,
        reduction,
    };
    artifact.validate()?;

    Ok(FittedPipeline { artifact, outputs })
}

fn header(
    embedder: &dyn TextEmbedder,
    config: &PipelineConfig,
    contract: ServingContract,
    fused_dim: usize,
    n_records: usize,
) -> ArtifactHeader {
    ArtifactHeader {
        format_version: ARTIFACT_FORMAT_VERSION,
        embedding_model: embedder.model_id().to_string(),
        embedding_dim: embedder.dim(),
        layout_version: FUSED_LAYOUT_VERSION,
        fused_dim,
        target_dim: config.target_dim,
        contract,
        strategy: config.strategy,
        n_records,
    }
}

/// Reduce one field embedding; absent fields stay absent.
pub(crate) fn reduce_field(model: &FieldReducerModel, embedding: &FieldEmbedding) -> Result<Option<Vector>> {
    if embedding.present {
        Ok(Some(model.transform(&embedding.vector)?))
    } else {
        Ok(None)
    }
}

/// Encode a new record with an already fitted artifact.
pub fn encode_record(
    artifact: &ModelArtifact,
    embedder: &dyn TextEmbedder,
    record: &SongRecord,
) -> Result<Vector> {
    match artifact.contract() {
        ServingContract::TextOnly => {
            let embedding = embed_or_zero(embedder, Some(&record.describe()));
            artifact.reduction.encode(&embedding.vector)
        }
        ServingContract::Fused => {
            let layout = artifact.layout().ok_or_else(|| {
                Error::StaleArtifact("fused artifact without field reducers".to_string())
            })?;
            let numeric = NumericNormalizer::transform(record, &artifact.stats);
            let mut reduced: ReducedFields = Default::default();
            for model in &artifact.fields {
                let embedding = embed_or_zero(embedder, record.text(model.field).as_deref());
                reduced[model.field.index()] = reduce_field(model, &embedding)?;
            }
            let fused = FeatureFusion::fuse(&numeric, &reduced, &artifact.weights, &layout)?;
            artifact.reduction.encode(&fused)
        }
    }
}

/// Fused vector for a free-text query: numeric slots at the corpus mean,
/// text slots filled from the query embedding for `fields`.
pub(crate) fn fuse_query(
    artifact: &ModelArtifact,
    embedding: &FieldEmbedding,
    fields: &[TextField],
) -> Result<Vector> {
    let layout = artifact
        .layout()
        .ok_or_else(|| Error::StaleArtifact("fused artifact without field reducers".to_string()))?;
    let mut reduced: ReducedFields = Default::default();
    for &field in fields {
        let model = artifact.field_model(field).ok_or_else(|| {
            Error::StaleArtifact(format!("artifact has no reducer for '{}'", field))
        })?;
        reduced[field.index()] = reduce_field(model, embedding)?;
    }
    FeatureFusion::fuse(&NumericFeatureSet::neutral(), &reduced, &artifact.weights, &layout)
}
