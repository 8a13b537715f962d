//! CLI interface for tirelearn

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::training::TrainingTask;

#[derive(Parser)]
#[command(name = "tirelearn")]
#[command(about = "Continuous-learning core for tire condition analysis", long_about = None)]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the analysis and learning API server
    Serve {
        /// Host to bind to (overrides configuration)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the full MLOps pipeline once
    Pipeline,
    /// Train a model (all tasks when no task is given)
    Train {
        /// Task to train: tread-depth, condition or wear-pattern
        task: Option<String>,
    },
    /// Evaluate all trained models against held-out samples
    Evaluate,
    /// Show learning store statistics
    Stats,
    /// Show or set configuration values
    Config {
        /// Set a value (usage: --set <section.field> <value>)
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // arg_required_else_help means clap exits before reaching this arm
        None => Ok(()),
        Some(Commands::Serve { host, port }) => {
            let config = Config::load()?;
            crate::server::start(config, host, port).await
        }
        Some(Commands::Pipeline) => {
            let config = Config::load()?;
            let state = crate::server::build_state(config)?;
            state.inference.reload_models().await?;

            println!("Running MLOps pipeline...");
            let results = state.pipeline.run_full_pipeline().await;
            if results.is_empty() {
                println!("⚠ Pipeline already running, nothing to do.");
                return Ok(());
            }
            for result in &results {
                match result {
                    Ok(outcome) => println!("✓ {}: {}", outcome.phase, outcome.detail),
                    Err(e) => println!("✗ {}: {}", e.phase, e.message),
                }
            }
            let failures = results.iter().filter(|r| r.is_err()).count();
            if failures == 0 {
                println!("Pipeline completed successfully.");
            } else {
                println!("Pipeline completed with {failures} failed phase(s).");
            }
            Ok(())
        }
        Some(Commands::Train { task }) => {
            let config = Config::load()?;
            let root = config.data_dir()?;
            let store = crate::samples::store::SampleStore::open(&root)?;
            let training = crate::training::TrainingPipeline::new(
                store,
                root.join("models"),
                config.training.clone(),
            );

            let tasks: Vec<TrainingTask> = match task {
                Some(name) => vec![name.parse().map_err(anyhow::Error::msg)?],
                None => TrainingTask::ALL.to_vec(),
            };
            for task in tasks {
                println!("Training {task}...");
                let report = training.train(task).await?;
                println!(
                    "✓ {} trained on {} {} samples, final loss {:.4}",
                    report.model_name, report.samples_used, report.data_source, report.final_loss
                );
            }
            Ok(())
        }
        Some(Commands::Evaluate) => {
            let config = Config::load()?;
            let root = config.data_dir()?;
            let store = crate::samples::store::SampleStore::open(&root)?;
            let evaluation = crate::evaluation::EvaluationService::new(
                store,
                root.join("models"),
                root.join("results"),
                config.evaluation.clone(),
            );

            let report = evaluation.evaluate_all().await?;
            for model in &report.models {
                println!(
                    "{}: {:?} ({} test samples)",
                    model.model, model.status, model.test_samples
                );
            }
            println!(
                "Average classifier accuracy: {:.1}%",
                report.summary.average_accuracy * 100.0
            );
            for rec in &report.recommendations {
                println!("  → {rec}");
            }
            Ok(())
        }
        Some(Commands::Stats) => {
            let config = Config::load()?;
            let state = crate::server::build_state(config)?;
            let stats = state.coordinator.get_learning_stats()?;

            println!("Learning store statistics:");
            println!("  Samples:            {}", stats.total_samples);
            println!("  Images:             {}", stats.total_images);
            println!("  User feedback:      {}", stats.user_feedback_count);
            println!("  Expert validations: {}", stats.expert_validations);
            println!("  Average rating:     {:.2}", stats.average_user_rating);
            println!("  Until next retrain: {} samples", stats.samples_until_retrain);
            match stats.last_retraining {
                Some(t) => println!("  Last retraining:    {}", t.to_rfc3339()),
                None => println!("  Last retraining:    never"),
            }
            Ok(())
        }
        Some(Commands::Config { set }) => match set.as_deref() {
            Some([key, value]) => crate::config::set_config(key, value),
            Some(_) => {
                eprintln!("Usage: --set <section.field> <value>");
                Ok(())
            }
            None => crate::config::show_config(),
        },
    }
}
