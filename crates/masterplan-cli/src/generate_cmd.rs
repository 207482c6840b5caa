//! `masterplan generate`, `regenerate`, `keywords` and `creatives` commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use masterplan_core::creative::{CreativeResult, generate_creative_concepts};
use masterplan_core::generate::GenerationError;
use masterplan_core::keywords::suggest_keywords;
use masterplan_core::pipeline::PlanPipeline;
use masterplan_core::plan::{PlanData, summarize_plan};
use masterplan_core::service::Language;

/// Cancel `cancel` on the first Ctrl+C; exit the process on the second.
fn install_ctrl_c(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCancelling generation (Ctrl+C again to force)...");
            cancel.cancel();
        }
    });
}

/// Human-readable digest of a plan.
pub fn render_plan_summary(plan: &PlanData) -> String {
    let summary = summarize_plan(plan);
    let mut out = String::new();

    out.push_str(&format!("{} ({})\n", plan.campaign_name, plan.id));
    out.push_str(&format!(
        "  Investment: {:.2} planned of {:.2}\n",
        summary.summary.budget, plan.total_investment
    ));
    for (month, campaigns) in &plan.months {
        let monthly = &summary.monthly[month];
        out.push_str(&format!(
            "  {month}: {:.2} across {} campaign(s), {} clicks, {} conversions\n",
            monthly.budget,
            campaigns.len(),
            monthly.clicks,
            monthly.conversions
        ));
    }
    for (channel, budget) in &summary.summary.channel_budgets {
        out.push_str(&format!("  {channel}: {budget:.2}\n"));
    }
    out
}

fn describe_failure(err: &GenerationError) -> String {
    format!("plan generation failed [{}]", err.category())
}

/// Run the generate command.
pub async fn run_generate(
    pipeline: &PlanPipeline,
    prompt: &str,
    owner: &str,
    output: Option<&Path>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    install_ctrl_c(&cancel);

    println!(
        "Generating plan with {} ({})...",
        pipeline.service().name(),
        pipeline.language()
    );

    let plan = finish_generation(pipeline.run(prompt, owner, Utc::now(), &cancel).await)?;
    emit_plan(&plan, output)
}

/// Read a plan previously written by `generate --output`.
pub fn load_plan(path: &Path) -> Result<PlanData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse plan in {}", path.display()))
}

/// Run the regenerate command. The plan file is rewritten unless `output` is given.
pub async fn run_regenerate(
    pipeline: &PlanPipeline,
    plan_path: &Path,
    prompt: &str,
    output: Option<&Path>,
) -> Result<()> {
    let existing = load_plan(plan_path)?;
    let cancel = CancellationToken::new();
    install_ctrl_c(&cancel);

    println!(
        "Regenerating {} with {} ({})...",
        existing.id,
        pipeline.service().name(),
        pipeline.language()
    );

    let plan = finish_generation(
        pipeline
            .regenerate(&existing, prompt, Utc::now(), &cancel)
            .await,
    )?;
    emit_plan(&plan, Some(output.unwrap_or(plan_path)))
}

fn finish_generation(result: Result<PlanData, GenerationError>) -> Result<PlanData> {
    match result {
        Ok(plan) => Ok(plan),
        Err(GenerationError::Cancelled) => {
            println!("\nGeneration cancelled.");
            std::process::exit(130);
        }
        Err(err) => {
            let context = describe_failure(&err);
            Err(anyhow::Error::new(err).context(context))
        }
    }
}

fn emit_plan(plan: &PlanData, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write plan to {}", path.display()))?;
            print!("{}", render_plan_summary(plan));
            println!("Plan written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Run the keywords command.
pub async fn run_keywords(
    pipeline: &PlanPipeline,
    prompt: &str,
    count: usize,
    language: Language,
) -> Result<()> {
    let cancel = CancellationToken::new();
    install_ctrl_c(&cancel);

    let keywords = suggest_keywords(
        pipeline.service(),
        prompt,
        count,
        language,
        pipeline.policy(),
        &cancel,
    )
    .await
    .map_err(|err| {
        let context = format!("keyword suggestion failed [{}]", err.category());
        anyhow::Error::new(err).context(context)
    })?;

    if keywords.is_empty() {
        anyhow::bail!("no keywords could be suggested");
    }
    for keyword in &keywords {
        println!("{keyword}");
    }
    Ok(())
}

/// Text report for creative results.
pub fn render_creatives(results: &[CreativeResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&format!("[{}]\n", result.aspect_ratio));
        match &result.concepts {
            Ok(concepts) if concepts.is_empty() => out.push_str("  (no concepts)\n"),
            Ok(concepts) => {
                for (i, concept) in concepts.iter().enumerate() {
                    out.push_str(&format!("  {}. {concept}\n", i + 1));
                }
            }
            Err(err) => out.push_str(&format!("  failed [{}]: {err}\n", err.category())),
        }
    }
    out
}

/// Run the creatives command.
pub async fn run_creatives(
    pipeline: &PlanPipeline,
    prompt: &str,
    ratios: &[String],
    language: Language,
) -> Result<()> {
    let cancel = CancellationToken::new();
    install_ctrl_c(&cancel);

    let ratios: Vec<&str> = ratios.iter().map(String::as_str).collect();
    let results = generate_creative_concepts(
        pipeline.service(),
        prompt,
        &ratios,
        language,
        pipeline.policy(),
        &cancel,
    )
    .await;

    print!("{}", render_creatives(&results));
    if results.iter().all(|r| r.concepts.is_err()) {
        anyhow::bail!("no creative concepts could be generated");
    }
    Ok(())
}
