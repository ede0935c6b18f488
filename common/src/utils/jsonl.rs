use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Lazily reads one JSON value per line. Blank lines are skipped.
pub fn iter_jsonl<T>(path: &Path) -> Result<impl Iterator<Item = Result<T>>>
where
    T: DeserializeOwned,
{
    let file =
        File::open(path).with_context(|| format!("opening jsonl file {}", path.display()))?;
    let reader = BufReader::new(file);
    let display_path: PathBuf = path.to_path_buf();

    Ok(reader
        .lines()
        .enumerate()
        .filter_map(move |(line_idx, line)| {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    return Some(Err(anyhow::Error::new(err).context(format!(
                        "reading line {} from {}",
                        line_idx + 1,
                        display_path.display()
                    ))))
                }
            };
            if line.trim().is_empty() {
                return None;
            }
            Some(serde_json::from_str(&line).with_context(|| {
                format!(
                    "parsing JSON (line {}) at {}",
                    line_idx + 1,
                    display_path.display()
                )
            }))
        }))
}

pub fn save_jsonl<T, I>(items: I, path: &Path) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    try_save_jsonl(items.into_iter().map(Ok), path)
}

/// Writes items as they arrive and stops at the first `Err`, returning it.
///
/// Lines written before the failure stay in the file.
pub fn try_save_jsonl<T, I>(items: I, path: &Path) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = Result<T>>,
{
    let file =
        File::create(path).with_context(|| format!("creating jsonl file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0_usize;
    for item in items {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                writer.flush()?;
                return Err(err);
            }
        };
        serde_json::to_writer(&mut writer, &item)
            .with_context(|| format!("serializing record for {}", path.display()))?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        value: u32,
    }

    #[test]
    fn test_save_then_iter_preserves_order_and_skips_blank_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rows.jsonl");
        let rows = vec![
            Row { id: "a".into(), value: 1 },
            Row { id: "b".into(), value: 2 },
        ];
        assert_eq!(save_jsonl(&rows, &path).expect("save"), 2);

        let mut contents = std::fs::read_to_string(&path).expect("read");
        contents.push_str("\n\n");
        std::fs::write(&path, contents).expect("rewrite");

        let loaded: Vec<Row> = iter_jsonl(&path)
            .expect("open")
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_iter_reports_line_number_on_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"id\":\"a\",\"value\":1}\nnot json\n").expect("write");

        let results: Vec<Result<Row>> = iter_jsonl(&path).expect("open").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().expect_err("second line must fail");
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_try_save_stops_at_first_error_keeping_earlier_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.jsonl");
        let items = vec![
            Ok(Row { id: "a".into(), value: 1 }),
            Err(anyhow::anyhow!("upstream failed")),
            Ok(Row { id: "c".into(), value: 3 }),
        ];

        let err = try_save_jsonl(items, &path).expect_err("second item fails");
        assert_eq!(err.to_string(), "upstream failed");

        let loaded: Vec<Row> = iter_jsonl(&path)
            .expect("open")
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(loaded, vec![Row { id: "a".into(), value: 1 }]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = iter_jsonl::<Row>(Path::new("/definitely/not/here.jsonl"));
        assert!(result.is_err());
    }
}
