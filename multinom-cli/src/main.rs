use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use multinom::prelude::*;
use serde::Serialize;

/// MLE for the multinomial distribution over the most frequent words of a corpus.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// A file containing whitespace-delimited words
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// A file containing whitespace-delimited stopwords
    #[arg(value_name = "SW_FILE")]
    stopword_file: PathBuf,

    /// How many of the most frequent words to consider
    #[arg(short, default_value_t = DEFAULT_SUPPORT_SIZE)]
    k: usize,

    /// Observed counts as `word=count` pairs instead of prompting for them
    #[arg(long, value_name = "WORD=COUNT,...", conflicts_with = "simulate")]
    sample: Option<String>,

    /// Draw the observation from the estimated distribution with this many trials
    #[arg(long, value_name = "TRIALS")]
    simulate: Option<u64>,

    /// Random seed for reproducibility
    #[arg(long, default_value = None, requires = "simulate")]
    seed: Option<u64>,

    /// Write a JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Info
        }
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    input_file: &'a Path,
    stopword_file: &'a Path,
    k: usize,
    probabilities: &'a ProbabilityMapping,
    observation: &'a Observation,
    evaluation: &'a Evaluation,
}

fn read_words(path: &Path) -> anyhow::Result<Vec<Token>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(tokenize(&text))
}

/// Asks for one count per word of `probabilities`, re-prompting on invalid input.
fn prompt_observation(
    probabilities: &ProbabilityMapping,
    input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<Observation> {
    writeln!(output, "\nenter sample:")?;
    let mut lines = input.lines();
    let mut observation = Observation::new();
    for (i, token) in probabilities.tokens().enumerate() {
        loop {
            write!(output, "X_{}=", i + 1)?;
            output.flush()?;
            let line = lines
                .next()
                .with_context(|| format!("Input ended before a count for '{token}' was given"))??;
            match parse_count(token, &line) {
                Ok(count) => {
                    observation.insert(token.clone(), count);
                    break;
                }
                Err(err) => writeln!(output, "{err}")?,
            }
        }
    }
    Ok(observation)
}

fn simulate_observation(
    probabilities: &ProbabilityMapping,
    trials: u64,
    seed: Option<u64>,
) -> anyhow::Result<Observation> {
    let mut sampler = match seed {
        Some(seed) => Sampler::from_seed(seed),
        None => Sampler::new(),
    };
    log::info!("Drawing {trials} trials from the estimated distribution");
    let observation = sampler.sample(probabilities, trials)?;

    println!("\nsimulated sample:");
    for (i, (_, count)) in observation.iter().enumerate() {
        println!("X_{}={}", i + 1, count);
    }
    Ok(observation)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
    log::debug!("Starting with args: {:?}", args);

    let words = read_words(&args.input_file)?;
    let stopwords: StopwordSet = read_words(&args.stopword_file)?.into_iter().collect();
    log::info!(
        "Read {} words from {} and {} stopwords from {}",
        words.len(),
        args.input_file.display(),
        stopwords.len(),
        args.stopword_file.display()
    );

    let probabilities = estimate(&words, &stopwords, args.k)
        .with_context(|| format!("Failed to estimate the top {} words", args.k))?;
    probabilities.validate(args.k)?;

    println!("estimated probabilities:");
    print!("{probabilities}");

    let observation = match (&args.sample, args.simulate) {
        (Some(sample), _) => parse_sample(sample)?,
        (None, Some(trials)) => simulate_observation(&probabilities, trials, args.seed)?,
        (None, None) => {
            prompt_observation(&probabilities, std::io::stdin().lock(), std::io::stdout())?
        }
    };

    let evaluation = evaluate(&observation, &probabilities)?;
    println!("\nresult: {}", evaluation.probability);

    if let Some(path) = &args.output {
        let report = Report {
            generated_at: chrono::Utc::now(),
            input_file: &args.input_file,
            stopword_file: &args.stopword_file,
            k: args.k,
            probabilities: &probabilities,
            observation: &observation,
            evaluation: &evaluation,
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &report)?;
        log::info!("Report written to {}", path.display());
    }

    Ok(())
}
