use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Renders a header line plus one line per row. Every field is quoted,
/// embedded quotes are doubled and lines are joined without a trailing newline.
pub fn to_csv<H, R, F>(headers: &[H], rows: &[R]) -> String
where
    H: AsRef<str>,
    R: AsRef<[F]>,
    F: AsRef<str>,
{
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(csv_line(headers));
    for row in rows {
        lines.push(csv_line(row.as_ref()));
    }
    lines.join("\n")
}

fn csv_line<F: AsRef<str>>(fields: &[F]) -> String {
    fields
        .iter()
        .map(|f| format!("\"{}\"", f.as_ref().replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// File download response for `<name>.csv`.
pub fn csv_attachment(name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.csv\"", name)),
        ],
        body,
    )
        .into_response()
}
