//! Plain-text rendering of results for terminals and logs.

use std::fmt::Write;

use crate::{
    analysis::AnalysisReport,
    inference::{ModelOutcome, SecondaryOutcome},
    models::{ChatRole, InteractionReport, renderable_citations},
    transcript::Transcript,
};

pub fn render_analysis(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary\n  {}", report.summary);

    if !report.medications.is_empty() || !report.flagged.is_empty() {
        let _ = writeln!(out, "\nMedications");
    }
    for verified in &report.medications {
        let m = &verified.medication;
        let _ = writeln!(
            out,
            "  {} {} ({}) [{}]",
            m.name, m.dosage, m.frequency, verified.status
        );
        let _ = writeln!(out, "    {}", m.recommendation());
        if !m.alternatives.is_empty() {
            let _ = writeln!(out, "    Alternatives: {}", m.alternatives.join(", "));
        }
    }
    for flagged in &report.flagged {
        let m = &flagged.medication;
        let _ = writeln!(
            out,
            "  {} {} ({}) [UNVERIFIED]",
            m.name, m.dosage, m.frequency
        );
        let _ = writeln!(out, "    {}", flagged.reason);
    }
    if !report.is_fully_verified() {
        let _ = writeln!(
            out,
            "  Unverified dosages must be checked by a healthcare professional."
        );
    }

    if report.interactions.is_empty() {
        let _ = writeln!(out, "\nNo potential interactions reported.");
    } else {
        let _ = writeln!(out, "\nInteractions");
        for interaction in &report.interactions {
            let _ = writeln!(
                out,
                "  {} [{}]: {}",
                interaction.drugs.join(" + "),
                interaction.severity,
                interaction.description
            );
        }
    }
    out
}

pub fn render_interactions(report: &InteractionReport) -> String {
    let mut out = String::new();

    if report.interactions.is_empty() {
        let _ = writeln!(
            out,
            "No potential interactions were found among the specified drugs."
        );
    }
    for interaction in &report.interactions {
        let _ = writeln!(out, "Interaction Found");
        let _ = writeln!(out, "  Drugs: {}", interaction.drugs.join(", "));
        let _ = writeln!(out, "  Severity: {}", interaction.severity);
        let _ = writeln!(out, "  Description: {}", interaction.description);
    }

    let sources = renderable_citations(&report.sources);
    if !sources.is_empty() {
        let _ = writeln!(out, "\nSources");
        for source in &sources {
            if let (Some(label), Some(uri)) = (source.label(), source.uri.as_deref()) {
                if label == uri {
                    let _ = writeln!(out, "  - {uri}");
                } else {
                    let _ = writeln!(out, "  - {label} <{uri}>");
                }
            }
        }
    }
    out
}

pub fn render_secondary(outcome: &SecondaryOutcome) -> String {
    let mut out = String::new();
    for (label, result) in [("Granite", &outcome.granite), ("BioBERT", &outcome.biobert)] {
        match result {
            ModelOutcome::Ok { model, data } => {
                let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
                let _ = writeln!(out, "{label} Model Result ({model})\n{pretty}\n");
            }
            ModelOutcome::Error { .. } => {}
        }
    }
    if let Some(errors) = outcome.error_summary() {
        let _ = writeln!(out, "{errors}");
    }
    out
}

pub fn render_transcript(transcript: &Transcript) -> String {
    let mut out = String::new();
    for message in transcript.snapshot() {
        let speaker = match message.role {
            ChatRole::User => "you",
            ChatRole::Model => "assistant",
        };
        let _ = writeln!(out, "{speaker}> {}", message.text);
    }
    out
}
