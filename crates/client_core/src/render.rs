use std::fmt::Write;

use shared::catalog::{SafeWorkPractice, SafeWorkProcedure};

use crate::dialog::{DialogState, DialogView};

/// Plain-text body of the dialog currently on screen, if any.
pub fn render_dialog(state: &DialogState) -> Option<String> {
    match state {
        DialogState::Closed => None,
        DialogState::Viewing { review, view } => {
            let mut out = format!("{}\n\n", review.document_name);
            out.push_str(&render_view(view));
            Some(out)
        }
        DialogState::Signing { review, .. } => Some(format!(
            "Sign: {}\nDraw your signature to acknowledge you have read and understood this document.\n",
            review.document_name
        )),
    }
}

pub fn render_view(view: &DialogView) -> String {
    match view {
        DialogView::FileFrame(url) => format!("Document: {url}\n"),
        DialogView::Procedure(entry) => render_procedure(entry),
        DialogView::Practice(entry) => render_practice(entry),
    }
}

pub fn render_procedure(entry: &SafeWorkProcedure) -> String {
    let mut out = format!("Safe Work Procedure: {}\n{}\n", entry.title, entry.scope);
    section(&mut out, "Hazards", entry.hazards);
    section(&mut out, "Control Measures", entry.control_measures);
    section(&mut out, "PPE", entry.ppe);
    section(&mut out, "Equipment", entry.equipment);
    section(&mut out, "Pre-Work Checks", entry.pre_work_checks);
    numbered(&mut out, "Procedure", entry.procedure_steps);
    section(&mut out, "Emergency Procedures", entry.emergency_procedures);
    section(&mut out, "Competency Requirements", entry.competency_requirements);
    out
}

pub fn render_practice(entry: &SafeWorkPractice) -> String {
    let mut out = format!("Safe Work Practice: {}\n{}\n", entry.title, entry.summary);
    section(&mut out, "Key Principles", entry.key_principles);
    section(&mut out, "Requirements", entry.requirements);
    section(&mut out, "Do", entry.dos);
    section(&mut out, "Don't", entry.donts);
    section(&mut out, "Emergency Actions", entry.emergency_actions);
    out
}

fn section(out: &mut String, heading: &str, items: &[&str]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

fn numbered(out: &mut String, heading: &str, items: &[&str]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}");
    for (idx, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", idx + 1);
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
