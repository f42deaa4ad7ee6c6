use crate::models::Review;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

const TEXT_COLUMNS: [&str; 3] = ["text", "review", "review_text"];
const RATING_COLUMNS: [&str; 3] = ["stars", "rating", "true_rating"];
const ID_COLUMNS: [&str; 2] = ["id", "review_id"];

/// Load labelled reviews from a CSV file with a header row.
///
/// Any problem here is fatal: the run must not start on a partial dataset.
pub fn load_reviews(path: &Path, limit: Option<usize>) -> Result<Vec<Review>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;
    read_reviews(file, limit).with_context(|| format!("Failed to load dataset: {}", path.display()))
}

/// Parse reviews from any CSV source
pub fn read_reviews<R: std::io::Read>(source: R, limit: Option<usize>) -> Result<Vec<Review>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let find_idx = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|name| h.trim().eq_ignore_ascii_case(name)))
    };

    let text_idx = find_idx(&TEXT_COLUMNS)
        .with_context(|| format!("No review text column (expected one of {:?})", TEXT_COLUMNS))?;
    let rating_idx = find_idx(&RATING_COLUMNS)
        .with_context(|| format!("No star rating column (expected one of {:?})", RATING_COLUMNS))?;
    let id_idx = find_idx(&ID_COLUMNS);

    let mut reviews = Vec::new();
    let mut seen_ids = HashSet::new();
    for (row, record) in reader.records().enumerate() {
        if limit.is_some_and(|limit| reviews.len() >= limit) {
            break;
        }

        let line = row + 2;
        let record = record.with_context(|| format!("Malformed CSV record on line {}", line))?;

        let text = record.get(text_idx).unwrap_or_default().trim();
        if text.is_empty() {
            warn!(line, "skipping review with empty text");
            continue;
        }

        let raw_rating = record.get(rating_idx).unwrap_or_default();
        let true_rating = parse_star_rating(raw_rating)
            .with_context(|| format!("Invalid star rating {:?} on line {}", raw_rating, line))?;

        let id = match id_idx.and_then(|idx| record.get(idx)).map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => (row + 1).to_string(),
        };
        if !seen_ids.insert(id.clone()) {
            anyhow::bail!("Duplicate review id {:?} on line {}", id, line);
        }

        reviews.push(Review {
            id,
            text: text.to_string(),
            true_rating,
        });
    }

    if reviews.is_empty() {
        anyhow::bail!("Dataset contains no usable reviews");
    }

    debug!(count = reviews.len(), "loaded reviews");
    Ok(reviews)
}

/// Accept `4` and `4.0`; anything else outside 1..=5 is rejected
fn parse_star_rating(raw: &str) -> Option<u8> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
        return None;
    }
    Some(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_reviews_with_yelp_headers() {
        let csv = "review_id,stars,text\nabc,5,\"Great food, great staff\"\ndef,1.0,Terrible\n";
        let reviews = read_reviews(csv.as_bytes(), None).unwrap();

        assert_eq!(reviews.len(), 2);
        assert_eq!(
            reviews[0],
            Review {
                id: "abc".to_string(),
                text: "Great food, great staff".to_string(),
                true_rating: 5,
            }
        );
        assert_eq!(reviews[1].true_rating, 1);
    }

    #[test]
    fn test_read_reviews_without_id_column_uses_row_number() {
        let csv = "Review,Rating\nFine,3\nGood,4\n";
        let reviews = read_reviews(csv.as_bytes(), None).unwrap();

        assert_eq!(reviews[0].id, "1");
        assert_eq!(reviews[1].id, "2");
        assert_eq!(reviews[1].text, "Good");
    }

    #[test]
    fn test_read_reviews_respects_limit() {
        let csv = "text,stars\na,1\nb,2\nc,3\nd,4\n";
        let reviews = read_reviews(csv.as_bytes(), Some(2)).unwrap();

        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[1].text, "b");
    }

    #[test]
    fn test_read_reviews_skips_blank_text() {
        let csv = "text,stars\n   ,2\nkept,4\n";
        let reviews = read_reviews(csv.as_bytes(), None).unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].text, "kept");
        assert_eq!(reviews[0].id, "2");
    }

    #[test]
    fn test_read_reviews_rejects_bad_rating() {
        for bad in ["0", "6", "3.5", "four", ""] {
            let csv = format!("text,stars\nsomething,{}\n", bad);
            let err = read_reviews(csv.as_bytes(), None).unwrap_err();
            assert!(err.to_string().contains("Invalid star rating"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_read_reviews_requires_columns() {
        let err = read_reviews("body,score\nx,1\n".as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("No review text column"));

        let err = read_reviews("text,score\nx,1\n".as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("No star rating column"));
    }

    #[test]
    fn test_read_reviews_rejects_duplicate_ids() {
        let csv = "review_id,text,stars\nx,Loved it,5\nx,Hated it,1\n";
        let err = read_reviews(csv.as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("Duplicate review id \"x\" on line 3"), "{err}");
    }

    #[test]
    fn test_read_reviews_rejects_row_number_colliding_with_id() {
        let csv = "id,text,stars\n2,A,5\n,B,1\n";
        let err = read_reviews(csv.as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("Duplicate review id \"2\""), "{err}");
    }

    #[test]
    fn test_read_reviews_empty_dataset() {
        let err = read_reviews("text,stars\n".as_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("no usable reviews"));
    }

    #[test]
    fn test_load_reviews_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "text,stars\nLovely brunch,5\n").unwrap();

        let reviews = load_reviews(file.path(), Some(200)).unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[test]
    fn test_load_demo_dataset() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/reviews.csv");
        let reviews = load_reviews(&path, None).unwrap();
        assert_eq!(reviews.len(), 5);
        assert_eq!(reviews[1].id, "d2");
        assert_eq!(reviews[1].true_rating, 1);
    }

    #[test]
    fn test_load_reviews_missing_file() {
        let err = load_reviews(Path::new("/nonexistent/reviews.csv"), None).unwrap_err();
        assert!(err.to_string().contains("Failed to open dataset"));
    }
}
