use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use radiograph_centroid::{CentroidModel, SweepConfig, ZScore};
use radiograph_io::{Evaluation, ExperimentName, FeatureDataset, FeatureReader, ResultWriter};
use radiograph_tree::{BinaryConfusion, DecisionTreeClassifier, DecisionTreeConfig, SplitMethod};

#[derive(Parser)]
#[command(name = "radiograph")]
#[command(about = "Binary radiograph screening with decision trees and centroid scoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for batch prediction (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Train a decision tree on labelled features and save it
    Train {
        /// Path to the labelled feature CSV (sample_id,label,f0,...)
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Maximum tree depth (0 = a single leaf)
        #[arg(long, default_value_t = 5)]
        max_depth: usize,

        /// Nodes with this many samples or fewer become leaves
        #[arg(long, default_value_t = 2)]
        min_samples: usize,

        /// Split search: "presorted" or "exhaustive"
        #[arg(long, default_value = "presorted")]
        split_method: String,
    },

    /// Predict classes for a feature CSV with a saved tree
    Predict {
        /// Path to the feature CSV (label column optional)
        #[arg(long)]
        data: PathBuf,

        /// Path to a saved tree; defaults to {output_dir}/{experiment}_tree.txt
        #[arg(long)]
        model: Option<PathBuf>,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Evaluate a saved tree on labelled features
    Evaluate {
        /// Path to the labelled feature CSV
        #[arg(long)]
        data: PathBuf,

        /// Path to a saved tree; defaults to {output_dir}/{experiment}_tree.txt
        #[arg(long)]
        model: Option<PathBuf>,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Fit z-score normalization and class centroids, then save both
    CentroidTrain {
        /// Path to the labelled feature CSV
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Score labelled features with saved centroids and sweep the threshold
    CentroidEvaluate {
        /// Path to the labelled feature CSV
        #[arg(long)]
        data: PathBuf,

        /// Experiment name used at training time
        #[arg(long)]
        experiment: String,

        /// Directory holding the saved parameters and receiving results
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// First threshold of the sweep
        #[arg(long, default_value_t = -2.0, allow_hyphen_values = true)]
        start: f64,

        /// Last threshold of the sweep
        #[arg(long, default_value_t = 2.0, allow_hyphen_values = true)]
        end: f64,

        /// Increment between thresholds
        #[arg(long, default_value_t = 0.01)]
        step: f64,
    },
}

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    model_path: String,
    n_samples: usize,
    n_features: usize,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
    training_accuracy: f64,
    feature_importances: Vec<FeatureImportanceOutput>,
}

#[derive(Serialize)]
struct FeatureImportanceOutput {
    name: String,
    importance: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    n_samples: usize,
    n_positive: usize,
    output_path: String,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    model: &'static str,
    n_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
    accuracy: f64,
    precision: f64,
    recall: f64,
    specificity: f64,
    f1: f64,
    n_flagged: usize,
    output_path: String,
}

#[derive(Serialize)]
struct CentroidTrainOutput {
    experiment: String,
    n_samples: usize,
    n_features: usize,
    normalization_path: String,
    weights_path: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            experiment,
            output_dir,
            max_depth,
            min_samples,
            split_method,
        } => {
            let writer = ResultWriter::new(&output_dir, ExperimentName::new(experiment.clone())?)?;
            let dataset = read_dataset(&data)?;
            let labels = require_labels(&dataset)?;

            let config = DecisionTreeConfig::new()
                .with_max_depth(max_depth)
                .with_min_samples(min_samples)
                .with_split_method(parse_split_method(&split_method)?);
            let mut classifier = DecisionTreeClassifier::new(config);
            classifier
                .train(dataset.features(), labels)
                .context("training failed")?;

            let model_path = writer.model_path();
            classifier
                .save(&model_path)
                .context("failed to save model")?;

            let tree = classifier.tree().context("training produced no tree")?;
            let training = tree.evaluate(dataset.features(), labels)?;
            let output = TrainOutput {
                experiment,
                model_path: model_path.display().to_string(),
                n_samples: dataset.n_samples(),
                n_features: dataset.n_features(),
                n_nodes: tree.n_nodes(),
                n_leaves: tree.n_leaves(),
                depth: tree.depth(),
                training_accuracy: training.accuracy(),
                feature_importances: dataset
                    .feature_names()
                    .iter()
                    .zip(tree.feature_importances())
                    .map(|(name, importance)| FeatureImportanceOutput {
                        name: name.clone(),
                        importance,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            data,
            model,
            experiment,
            output_dir,
        } => {
            let writer = ResultWriter::new(&output_dir, ExperimentName::new(experiment.clone())?)?;
            let classifier = load_classifier(model.unwrap_or_else(|| writer.model_path()))?;
            let dataset = read_dataset(&data)?;

            let predictions = classifier
                .predict_batch(dataset.features())
                .context("prediction failed")?;
            let output_path = writer.write_predictions(dataset.sample_ids(), &predictions)?;

            let output = PredictOutput {
                experiment,
                n_samples: predictions.len(),
                n_positive: predictions.iter().filter(|&&p| p == 1).count(),
                output_path: output_path.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            data,
            model,
            experiment,
            output_dir,
        } => {
            let writer = ResultWriter::new(&output_dir, ExperimentName::new(experiment)?)?;
            let classifier = load_classifier(model.unwrap_or_else(|| writer.model_path()))?;
            let dataset = read_dataset(&data)?;
            let labels = require_labels(&dataset)?;

            let predictions = classifier
                .predict_batch(dataset.features())
                .context("prediction failed")?;
            let confusion = BinaryConfusion::from_labels(labels, &predictions)?;
            info!("confusion matrix:\n{confusion}");

            let flagged: Vec<&str> = dataset
                .sample_ids()
                .iter()
                .zip(&predictions)
                .filter(|&(_, &p)| p == 1)
                .map(|(id, _)| id.as_str())
                .collect();

            let output = report(&writer, "tree", None, &confusion, flagged)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::CentroidTrain {
            data,
            experiment,
            output_dir,
        } => {
            let writer = ResultWriter::new(&output_dir, ExperimentName::new(experiment.clone())?)?;
            let dataset = read_dataset(&data)?;
            let labels = require_labels(&dataset)?;

            let (zscore, normalized) =
                ZScore::fit_transform(dataset.features()).context("normalization failed")?;
            let model =
                CentroidModel::fit(&normalized, labels).context("centroid fitting failed")?;

            let normalization_path = writer.normalization_path();
            let weights_path = writer.weights_path();
            zscore
                .save(&normalization_path)
                .context("failed to save normalization parameters")?;
            model
                .save(&weights_path)
                .context("failed to save centroid weights")?;

            let output = CentroidTrainOutput {
                experiment,
                n_samples: dataset.n_samples(),
                n_features: dataset.n_features(),
                normalization_path: normalization_path.display().to_string(),
                weights_path: weights_path.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::CentroidEvaluate {
            data,
            experiment,
            output_dir,
            start,
            end,
            step,
        } => {
            let writer = ResultWriter::new(&output_dir, ExperimentName::new(experiment)?)?;
            let sweep = SweepConfig::new()
                .with_range(start, end)?
                .with_step(step)?;

            let zscore = ZScore::load(writer.normalization_path())
                .context("failed to load normalization parameters")?;
            let model = CentroidModel::load(writer.weights_path())
                .context("failed to load centroid weights")?;
            let dataset = read_dataset(&data)?;
            let labels = require_labels(&dataset)?;

            let normalized = zscore
                .transform(dataset.features())
                .context("feature count does not match the saved normalization")?;
            let scores = model
                .scores(&normalized)
                .context("feature count does not match the saved centroids")?;
            let best = sweep.sweep(&scores, labels)?;
            info!(
                threshold = best.threshold,
                accuracy = best.accuracy(),
                "best threshold"
            );
            info!("confusion matrix:\n{}", best.confusion);

            let mut flagged = Vec::new();
            for (id, &score) in dataset.sample_ids().iter().zip(&scores) {
                if score > best.threshold {
                    info!(sample = %id, score, "predicted positive");
                    flagged.push(id.as_str());
                }
            }

            let output = report(
                &writer,
                "centroid",
                Some(best.threshold),
                &best.confusion,
                flagged,
            )?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn read_dataset(path: &std::path::Path) -> Result<FeatureDataset> {
    FeatureReader::new(path)
        .read()
        .with_context(|| format!("failed to read feature CSV {}", path.display()))
}

fn require_labels(dataset: &FeatureDataset) -> Result<&[usize]> {
    dataset
        .labels()
        .context("feature CSV has no label column (second header must be \"label\")")
}

fn load_classifier(path: PathBuf) -> Result<DecisionTreeClassifier> {
    let mut classifier = DecisionTreeClassifier::default();
    classifier
        .load(&path)
        .with_context(|| format!("failed to load model {}", path.display()))?;
    if !classifier.is_trained() {
        bail!("model file {} holds an empty tree", path.display());
    }
    Ok(classifier)
}

fn parse_split_method(s: &str) -> Result<SplitMethod> {
    match s {
        "presorted" => Ok(SplitMethod::Presorted),
        "exhaustive" => Ok(SplitMethod::Exhaustive),
        other => bail!("unknown split method \"{other}\": expected \"presorted\" or \"exhaustive\""),
    }
}

fn report(
    writer: &ResultWriter,
    model: &'static str,
    threshold: Option<f64>,
    confusion: &BinaryConfusion,
    flagged: Vec<&str>,
) -> Result<EvaluateOutput> {
    let n_flagged = flagged.len();
    let evaluation = Evaluation {
        model,
        n_samples: confusion.total(),
        threshold,
        true_positives: confusion.true_positives(),
        false_positives: confusion.false_positives(),
        true_negatives: confusion.true_negatives(),
        false_negatives: confusion.false_negatives(),
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        specificity: confusion.specificity(),
        f1: confusion.f1(),
        flagged,
    };
    let output_path = writer.write_evaluation(&evaluation)?;

    Ok(EvaluateOutput {
        experiment: writer.experiment().to_string(),
        model,
        n_samples: evaluation.n_samples,
        threshold,
        accuracy: evaluation.accuracy,
        precision: evaluation.precision,
        recall: evaluation.recall,
        specificity: evaluation.specificity,
        f1: evaluation.f1,
        n_flagged,
        output_path: output_path.display().to_string(),
    })
}
