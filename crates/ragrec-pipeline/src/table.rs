//! CSV input and output for the batch pipelines.

use std::collections::BTreeMap;
use std::path::Path;

use ragrec_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Columns every ingestion table must have.
pub const SOURCE_COLUMNS: [&str; 4] = ["domain", "file_name", "url", "text"];

/// One source document from the ingestion table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub domain: String,
    pub file_name: String,
    pub url: String,
    /// Full document text, split into chunks during ingestion
    pub text: String,
    /// Every other column of the row
    pub extra: BTreeMap<String, String>,
}

impl SourceRow {
    pub fn new(
        domain: impl Into<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            file_name: file_name.into(),
            url: url.into(),
            text: text.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// One output row of an evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalRow {
    pub question: String,
    pub retrieved_context: String,
    pub answer: String,
}

fn table_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Table(format!("{}: {err}", path.display()))
}

/// Read an ingestion table.
///
/// The header must name every column in [`SOURCE_COLUMNS`]; any other column
/// is carried in [`SourceRow::extra`].
pub fn read_sources(path: &Path) -> Result<Vec<SourceRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| table_error(path, e))?;
    let headers = reader.headers().map_err(|e| table_error(path, e))?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let missing: Vec<&str> = SOURCE_COLUMNS
        .iter()
        .copied()
        .filter(|c| position(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(table_error(
            path,
            format!("missing required columns: {}", missing.join(", ")),
        ));
    }
    let [domain, file_name, url, text] = SOURCE_COLUMNS.map(|c| position(c).unwrap_or_default());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| table_error(path, e))?;
        let get = |i: usize| record.get(i).unwrap_or_default().to_string();
        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| ![domain, file_name, url, text].contains(i))
            .map(|(i, name)| (name.trim().to_string(), get(i)))
            .collect();
        rows.push(SourceRow {
            domain: get(domain),
            file_name: get(file_name),
            url: get(url),
            text: get(text),
            extra,
        });
    }

    debug!("Read {} source rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Read the `column` values of a question table, in order.
pub fn read_questions(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| table_error(path, e))?;
    let index = reader
        .headers()
        .map_err(|e| table_error(path, e))?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| table_error(path, format!("missing column '{column}'")))?;

    reader
        .records()
        .map(|record| {
            let record = record.map_err(|e| table_error(path, e))?;
            Ok(record.get(index).unwrap_or_default().to_string())
        })
        .collect()
}

/// Write evaluation rows with a `question,retrieved_context,answer` header.
pub fn write_eval_rows(path: &Path, rows: &[EvalRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| table_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| table_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_sources_with_extra_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(
            &path,
            "domain,file_name,url,text,lab_id\n\
             blood,ferritin.pdf,https://x/f,\"Ferritin, iron stores\",LAB-1\n\
             hormone,tsh.pdf,https://x/t,TSH screens thyroid,LAB-2\n",
        )
        .unwrap();

        let rows = read_sources(&path).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].domain, "blood");
        assert_eq!(rows[0].text, "Ferritin, iron stores");
        assert_eq!(rows[0].extra.get("lab_id").map(String::as_str), Some("LAB-1"));
        assert_eq!(rows[1].file_name, "tsh.pdf");
        assert_eq!(rows[1].extra.len(), 1);
    }

    #[test]
    fn test_read_sources_column_order_does_not_matter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(&path, "text,url,file_name,domain\nbody,u,f,d\n").unwrap();

        let rows = read_sources(&path).unwrap();
        assert_eq!(rows[0], SourceRow::new("d", "f", "u", "body"));
    }

    #[test]
    fn test_read_sources_missing_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(&path, "domain,file_name\nd,f\n").unwrap();

        let err = read_sources(&path).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::Table(_)));
        assert!(message.contains("url"));
        assert!(message.contains("text"));
    }

    #[test]
    fn test_read_sources_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_sources(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn test_read_questions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.csv");
        fs::write(&path, "id,question\n1,What is ferritin?\n2,Why test TSH?\n").unwrap();

        let questions = read_questions(&path, "question").unwrap();
        assert_eq!(questions, vec!["What is ferritin?", "Why test TSH?"]);

        assert!(read_questions(&path, "prompt").is_err());
    }

    #[test]
    fn test_write_eval_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/results.csv");
        let rows = vec![EvalRow {
            question: "What is ferritin?".to_string(),
            retrieved_context: "line one\nline two".to_string(),
            answer: "A protein".to_string(),
        }];

        write_eval_rows(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["question", "retrieved_context", "answer"]);
        let back: Vec<EvalRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, rows);
    }
}
