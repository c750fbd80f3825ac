//! Tabular views of submissions: the CSV lead export and the spreadsheet mirror rows.
//! Field columns always follow the form's field order.

use anyhow::{Context, Result};

use crate::schema::FormDefinition;
use crate::submission::Submission;

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn field_cells(form: &FormDefinition, submission: &Submission) -> Vec<String> {
    form.fields
        .iter()
        .map(|f| submission.values.get(&f.id).map(|v| v.to_cell()).unwrap_or_default())
        .collect()
}

pub fn leads_csv_headers(form: &FormDefinition) -> Vec<String> {
    let mut headers: Vec<String> = [
        "Submission ID",
        "Created At",
        "UTM Source",
        "UTM Medium",
        "UTM Campaign",
        "Referrer",
        "Landing Page",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    headers.extend(form.fields.iter().map(|f| f.display_label().to_string()));
    headers
}

/// Writes the CSV download for a form's leads. Rows are written in the order given.
pub fn leads_csv(form: &FormDefinition, submissions: &[Submission]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(leads_csv_headers(form))?;
    for s in submissions {
        let a = &s.attribution;
        let mut row = vec![
            s.id.to_string(),
            s.created_at.to_rfc3339(),
            cell(&a.utm_source),
            cell(&a.utm_medium),
            cell(&a.utm_campaign),
            cell(&a.referrer),
            cell(&a.landing_page),
        ];
        row.extend(field_cells(form, s));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().context("flushing csv writer")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

pub fn sheet_headers(form: &FormDefinition) -> Vec<String> {
    let mut headers = vec!["Timestamp".to_string()];
    headers.extend(form.fields.iter().map(|f| f.display_label().to_string()));
    headers.extend(
        [
            "Form ID",
            "Form Name",
            "UTM Source",
            "UTM Medium",
            "UTM Campaign",
            "UTM Term",
            "UTM Content",
            "UTM ID",
            "Referrer",
            "Landing Page",
        ]
        .iter()
        .map(|h| h.to_string()),
    );
    headers
}

/// One spreadsheet row, aligned with [`sheet_headers`].
pub fn sheet_row(form: &FormDefinition, submission: &Submission) -> Vec<String> {
    let a = &submission.attribution;
    let mut row = vec![submission.created_at.to_rfc3339()];
    row.extend(field_cells(form, submission));
    row.extend([
        form.id.clone(),
        form.name.clone(),
        cell(&a.utm_source),
        cell(&a.utm_medium),
        cell(&a.utm_campaign),
        cell(&a.utm_term),
        cell(&a.utm_content),
        cell(&a.utm_id),
        cell(&a.referrer),
        cell(&a.landing_page),
    ]);
    row
}
