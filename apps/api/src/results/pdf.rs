//! On-demand PDF rendering of the stored interview report.
//!
//! Built with printpdf's builtin Helvetica faces so no font assets ship
//! with the binary. Layout is a single column with naive word wrapping and
//! page breaks; US letter with 1" margins.

use anyhow::Result;
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use serde_json::Value;

use crate::analysis::aggregate::{AggregatedResult, InterviewAnalysis};
use crate::analysis::voice::VoiceAnalysis;
use crate::results::timeline::to_pairs;

const PAGE_WIDTH_MM: f64 = 215.9;
const PAGE_HEIGHT_MM: f64 = 279.4;
const MARGIN_MM: f64 = 25.4;
const BODY_SIZE_PT: f64 = 11.0;
const HEADING_SIZE_PT: f64 = 14.0;
const TITLE_SIZE_PT: f64 = 20.0;
const LINE_HEIGHT_MM: f64 = 5.2;
const WRAP_COLUMNS: usize = 92;

/// Renders the stored result (+ timelines) into PDF bytes.
pub fn render_report(result: &AggregatedResult, timelines: &Value) -> Result<Vec<u8>> {
    let mut page = ReportPage::new("Interview Performance Report")?;

    page.title("Interview Performance Report");
    page.line(&format!(
        "Generated {} · session {}",
        result.created_at.format("%Y-%m-%d %H:%M UTC"),
        result.session_id
    ));
    page.gap();

    page.heading("Question");
    page.paragraph(display_or(&result.prompt_text, "(no prompt text)"));
    page.line(&format!(
        "Type: {} · Difficulty: {}",
        display_or(&result.prompt_type, "general"),
        display_or(&result.prompt_difficulty, "unspecified"),
    ));
    page.gap();

    match &result.interview_analysis {
        InterviewAnalysis::Completed(record) => {
            page.heading("Scores");
            page.line(&format!(
                "Communication Clarity: {}/25",
                record.clarity_score
            ));
            page.line(&format!("Content & Substance: {}/25", record.content_score));
            page.line(&format!(
                "Professionalism: {}/20",
                record.professionalism_score
            ));
            page.line(&format!("Body Language: {}/15", record.body_language_score));
            page.line(&format!(
                "Vocal Delivery: {}/15",
                record.vocal_delivery_score
            ));
            page.line(&format!("Total: {}/100", record.total_score));
            page.gap();

            page.heading("Voice");
            match &record.voice_analysis {
                VoiceAnalysis::Metrics(m) => {
                    page.line(&format!(
                        "Average pitch: {} Hz (variation {}%)",
                        m.avg_pitch_hz, m.pitch_variation_pct
                    ));
                    page.paragraph(&m.pitch_feedback);
                    page.paragraph(&m.tone_feedback);
                    page.line(&format!("Speaking rate: {} onsets/s", m.speaking_rate));
                    page.paragraph(&m.rate_feedback);
                }
                VoiceAnalysis::Failed(f) => {
                    page.paragraph(&format!("Voice analysis unavailable: {}", f.error));
                }
            }
            page.gap();

            for (label, body) in [
                ("Doing well", &record.doing_well),
                ("Must improve", &record.must_improve),
                ("Habits to keep", &record.habits_to_keep),
                ("Action plan", &record.action_plan),
            ] {
                if !body.trim().is_empty() {
                    page.heading(label);
                    page.paragraph(body);
                    page.gap();
                }
            }

            if !record.transcript.trim().is_empty() {
                page.heading("Transcript");
                page.paragraph(&record.transcript);
                page.gap();
            }
        }
        InterviewAnalysis::Unavailable(failure) => {
            page.heading("Analysis");
            page.paragraph(&format!(
                "Analysis unavailable: {} ({})",
                failure.error, failure.detail
            ));
            page.gap();
        }
    }

    if !result.good_signals.is_empty() {
        page.heading("Positive signals");
        for signal in &result.good_signals {
            page.paragraph(&format!("- {signal}"));
        }
        page.gap();
    }
    if !result.red_flags.is_empty() {
        page.heading("Red flags");
        for flag in &result.red_flags {
            page.paragraph(&format!("- {flag}"));
        }
        page.gap();
    }

    page.heading("Posture & eye contact");
    page.line(&timeline_summary(
        "Posture",
        timelines.get("posture_timeline").unwrap_or(&Value::Null),
    ));
    page.line(&timeline_summary(
        "Eye contact",
        timelines.get("eye_timeline").unwrap_or(&Value::Null),
    ));

    page.finish()
}

/// Mean of the percentage column over the projected pairs.
fn timeline_summary(label: &str, timeline: &Value) -> String {
    let pairs = to_pairs(timeline);
    let percentages: Vec<f64> = pairs
        .iter()
        .filter_map(|pair| pair.get(1).and_then(Value::as_f64))
        .collect();

    if percentages.is_empty() {
        return format!("{label}: no timeline data");
    }
    let avg = percentages.iter().sum::<f64>() / percentages.len() as f64;
    format!(
        "{label}: {} readings, average {:.1}%",
        percentages.len(),
        avg
    )
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page writer
// ────────────────────────────────────────────────────────────────────────────

struct ReportPage {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    cursor_y: f64,
}

impl ReportPage {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "report");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor_y: PAGE_HEIGHT_MM - MARGIN_MM,
        })
    }

    fn title(&mut self, text: &str) {
        self.write(text, TITLE_SIZE_PT, true);
        self.gap();
    }

    fn heading(&mut self, text: &str) {
        self.write(text, HEADING_SIZE_PT, true);
    }

    fn line(&mut self, text: &str) {
        self.write(text, BODY_SIZE_PT, false);
    }

    /// Word-wrapped body text.
    fn paragraph(&mut self, text: &str) {
        for source_line in text.lines() {
            let source_line = source_line.trim();
            if source_line.is_empty() {
                continue;
            }
            for wrapped in wrap(source_line, WRAP_COLUMNS) {
                self.write(&wrapped, BODY_SIZE_PT, false);
            }
        }
    }

    fn gap(&mut self) {
        self.cursor_y -= LINE_HEIGHT_MM / 2.0;
    }

    fn write(&mut self, text: &str, size: f64, bold: bool) {
        let advance = LINE_HEIGHT_MM * (size / BODY_SIZE_PT).max(1.0);
        if self.cursor_y - advance < MARGIN_MM {
            let (page, layer) =
                self.doc
                    .add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "report");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.cursor_y = PAGE_HEIGHT_MM - MARGIN_MM;
        }

        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(sanitize(text), size as f32, Mm(MARGIN_MM as f32), Mm(self.cursor_y as f32), font);
        self.cursor_y -= advance;
    }

    fn finish(self) -> Result<Vec<u8>> {
        Ok(self.doc.save_to_bytes()?)
    }
}

/// The builtin fonts are WinAnsi-encoded; anything outside Latin-1 gets a
/// readable substitute instead of mojibake.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            c if (c as u32) < 256 => c,
            _ => '?',
        })
        .collect()
}

fn wrap(line: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
