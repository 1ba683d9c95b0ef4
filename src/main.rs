//! archetype-lens CLI
//!
//! Systemic archetype detection from organizational self-assessments.
//!
//! Run with: archetype-lens --help

use anyhow::{bail, Context, Result};
use archetype_lens::store::ArchetypeStore;
use archetype_lens::{
    questionnaire, Dimension, EngineConfig, ImpactLevel, LensEngine, QuickWinStatus,
    ResponseSubmission,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let json_output = args.iter().any(|a| a == "--json");
    let positional: Vec<&str> = args[1..]
        .iter()
        .skip(1)
        .filter(|a| !a.starts_with("--"))
        .map(|s| s.as_str())
        .collect();

    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "--catalog" => run_catalog(),
        "--questions" => run_questions(json_output),
        "--init" => run_init(),
        "--submit" => {
            let [user_id, path, ..] = positional.as_slice() else {
                bail!("Usage: --submit <user> <responses.json>");
            };
            run_submit(user_id, path)
        }
        "--detect" => {
            let Some(user_id) = positional.first() else {
                bail!("Usage: --detect <user> [--json]");
            };
            run_detect(user_id, json_output)
        }
        "--quick-wins" => {
            let Some(user_id) = positional.first() else {
                bail!("Usage: --quick-wins <user> [--json]");
            };
            run_quick_wins(user_id, json_output)
        }
        "--add-quick-win" => {
            let [user_id, dimension, title @ ..] = positional.as_slice() else {
                bail!("Usage: --add-quick-win <user> <dimension> <title...>");
            };
            if title.is_empty() {
                bail!("Usage: --add-quick-win <user> <dimension> <title...>");
            }
            run_add_quick_win(user_id, dimension, &title.join(" "))
        }
        "--set-status" => {
            let [id, status, ..] = positional.as_slice() else {
                bail!("Usage: --set-status <quick-win-id> <todo|in_progress|done>");
            };
            run_set_status(id, status)
        }
        "--summary" => {
            let Some(user_id) = positional.first() else {
                bail!("Usage: --summary <user>");
            };
            run_summary(user_id, json_output)
        }
        "--stats" => run_stats(),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("archetype-lens - systemic archetype detection");
    println!();
    println!("Commands:");
    println!("  --init                                   Create the database and seed the catalog");
    println!("  --catalog                                Print the active catalog as JSON");
    println!("  --questions [--json]                     List the questionnaire");
    println!("  --submit <user> <responses.json>         Record answers from a JSON array");
    println!("                                           of {{question_id, score, comment}}");
    println!("  --detect <user> [--json]                 Detect archetypes and refresh quick wins");
    println!("  --quick-wins <user> [--json]             List quick wins");
    println!("  --add-quick-win <user> <dim> <title...>  Add a user quick win");
    println!("  --set-status <id> <status>               Set todo, in_progress or done");
    println!("  --summary <user> [--json]                Scores and progress per dimension");
    println!("  --stats                                  Database statistics");
    println!();
    println!("Environment:");
    println!("  ARCHETYPE_LENS_DATA_DIR, ARCHETYPE_LENS_DB, ARCHETYPE_LENS_CATALOG, RUST_LOG");
}

fn open_engine() -> Result<LensEngine> {
    let config = EngineConfig::from_env();
    LensEngine::from_config(&config)
}

fn run_init() -> Result<()> {
    let config = EngineConfig::from_env();
    let engine = LensEngine::from_config(&config)?;
    println!("Database: {:?}", config.db_path);
    println!(
        "Catalog: {} archetypes, {} quick-win templates (fingerprint {})",
        engine.catalog().len(),
        engine.catalog().quick_wins().len(),
        engine.catalog().fingerprint()
    );
    Ok(())
}

fn run_catalog() -> Result<()> {
    let engine = open_engine()?;
    println!("{}", serde_json::to_string_pretty(engine.catalog())?);
    Ok(())
}

fn run_questions(json_output: bool) -> Result<()> {
    let questions = questionnaire::questions();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&questions)?);
        return Ok(());
    }

    for dimension in Dimension::ALL {
        println!("\n{}", dimension.name().to_uppercase());
        for q in questions.iter().filter(|q| q.dimension == dimension) {
            println!("  {:>2}. {}", q.id, q.text);
        }
    }
    println!("\nScale: 1 = strongly disagree ... 5 = strongly agree");
    Ok(())
}

fn run_submit(user_id: &str, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read responses from {}", path))?;
    let submissions: Vec<ResponseSubmission> =
        serde_json::from_str(&content).context("Responses must be a JSON array")?;

    let engine = open_engine()?;
    let stored = engine.submit(user_id, &submissions)?;
    println!("Recorded {} response(s) for {}", stored, user_id);
    Ok(())
}

fn run_detect(user_id: &str, json_output: bool) -> Result<()> {
    let engine = open_engine()?;
    let report = engine.detect(user_id)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nARCHETYPE DETECTION for {}", user_id);
    println!("{}\n", report.summary());

    if report.matches.is_empty() {
        println!("No archetype detected: no answer scored 3 or below.");
    }
    for (i, m) in report.matches.iter().enumerate() {
        println!(
            "{}. {} [{}] {:.0}%",
            i + 1,
            m.archetype_name,
            m.source_dimension,
            m.confidence * 100.0
        );
        println!("   {}", m.insight);
    }

    println!("\nQUICK WINS:");
    for qw in &report.quick_wins {
        println!(
            "  - [{}|{}] {}",
            qw.dimension,
            qw.impact_level.as_str(),
            qw.title
        );
    }
    Ok(())
}

fn run_quick_wins(user_id: &str, json_output: bool) -> Result<()> {
    let engine = open_engine()?;
    let quick_wins = engine.quick_wins(user_id)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&quick_wins)?);
        return Ok(());
    }

    if quick_wins.is_empty() {
        println!("No quick wins for {}. Run --detect first.", user_id);
        return Ok(());
    }
    for qw in &quick_wins {
        println!(
            "{} [{}] [{}] {} ({})",
            qw.id,
            qw.source.as_str(),
            qw.status.as_str(),
            qw.title,
            qw.archetype.as_deref().unwrap_or("general")
        );
    }
    Ok(())
}

fn run_add_quick_win(user_id: &str, dimension: &str, title: &str) -> Result<()> {
    let dimension: Dimension = dimension.parse().map_err(anyhow::Error::msg)?;
    let engine = open_engine()?;
    let qw = engine
        .store()
        .add_user_quick_win(user_id, title, "", dimension, ImpactLevel::Medium)?;
    println!("Added quick win {}", qw.id);
    Ok(())
}

fn run_set_status(id: &str, status: &str) -> Result<()> {
    let status: QuickWinStatus = status.parse().map_err(anyhow::Error::msg)?;
    let engine = open_engine()?;
    engine.store().set_quick_win_status(id, status)?;
    println!("Quick win {} is now {}", id, status.as_str());
    Ok(())
}

fn run_summary(user_id: &str, json_output: bool) -> Result<()> {
    let engine = open_engine()?;
    let dimensions = engine.dimension_summary(user_id)?;
    let progress = engine.progress(user_id)?;

    if json_output {
        let value = serde_json::json!({
            "dimensions": dimensions,
            "progress": progress,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("\nASSESSMENT SUMMARY for {}\n", user_id);
    for d in &dimensions {
        let average = d
            .average_score
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} answered {}/{} ({:.0}%), average {}, low scores {}",
            d.dimension.name(),
            d.answered,
            d.total,
            d.completion() * 100.0,
            average,
            d.low_scoring
        );
    }

    println!(
        "\nQuick wins: {} done / {} total ({:.0}%)",
        progress.overall.done,
        progress.overall.total(),
        progress.overall.percent_done()
    );
    Ok(())
}

fn run_stats() -> Result<()> {
    let engine = open_engine()?;
    let stats = engine.store().stats()?;

    println!("\nARCHETYPE-LENS STATISTICS\n");
    println!("Archetypes: {}", stats.archetypes);
    println!("Quick-win templates: {}", stats.templates);
    println!("Users with responses: {}", stats.users);
    println!("Responses recorded: {}", stats.responses);
    println!("Detection runs: {}", stats.detection_runs);
    println!("Quick wins: {} system, {} user", stats.system_quick_wins, stats.user_quick_wins);
    println!("Catalog fingerprint: {}", engine.catalog().fingerprint());
    Ok(())
}
