use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::{Map, Value};

use crate::CliError;

/// Resolves a CLI-supplied JSON argument to a top-level object.
///
/// The argument is either a path to a JSON file or a literal JSON string;
/// an existing file wins. Anything that parses to a non-object top-level
/// value is rejected, since every admin API body is an object.
pub fn resolve_json_argument(raw: &str) -> Result<Map<String, Value>, CliError> {
    let trimmed = raw.trim();
    let path = Path::new(trimmed);
    if path.is_file() {
        load_json_file(path)
    } else if looks_like_path(trimmed) {
        Err(CliError::Input(format!("No such file {trimmed}")))
    } else {
        load_json_literal(trimmed)
    }
}

// A JSON literal starts with an object, array or string delimiter, a
// digit or a keyword; an argument carrying a path separator or a file
// extension without one of those was meant to name a file.
fn looks_like_path(text: &str) -> bool {
    let literal_start = text.starts_with(['{', '[', '"', '-'])
        || text.chars().next().is_some_and(|c| c.is_ascii_digit());
    !literal_start
        && (text.contains(std::path::MAIN_SEPARATOR) || Path::new(text).extension().is_some())
}

fn load_json_literal(text: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Input("Unsupported JSON format".to_owned())),
        Err(error) => Err(CliError::Input(decode_error_message(&error, text))),
    }
}

fn load_json_file(path: &Path) -> Result<Map<String, Value>, CliError> {
    let text = fs::read_to_string(path).map_err(|error| {
        let message = match error.kind() {
            ErrorKind::NotFound => format!("No such file {}", path.display()),
            _ => format!("{error} {}", path.display()),
        };
        CliError::Input(message)
    })?;

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Input(format!(
            "Unsupported JSON format in {}",
            path.display()
        ))),
        Err(error) => Err(CliError::Input(format!(
            "{}. File {}",
            decode_error_message(&error, &text),
            path.display()
        ))),
    }
}

/// Formats a serde_json parse failure with its line, column and byte
/// offset into the source text.
pub(crate) fn decode_error_message(error: &serde_json::Error, source: &str) -> String {
    let rendered = error.to_string();
    let detail = rendered
        .split(" at line ")
        .next()
        .unwrap_or(rendered.as_str());
    let offset = byte_offset(source, error.line(), error.column());
    format!(
        "JSON decode error. {detail}: line {} column {} (char {offset})",
        error.line(),
        error.column()
    )
}

fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let preceding: usize = source
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    preceding + column.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::resolve_json_argument;
    use crate::CliError;

    fn input_message(raw: &str) -> String {
        match resolve_json_argument(raw) {
            Err(CliError::Input(message)) => message,
            other => panic!("expected input error, got {other:?}"),
        }
    }

    #[test]
    fn literal_object_is_resolved() {
        let map = resolve_json_argument("{\"test\":\"data\"}").expect("object literal");
        assert_eq!(map.get("test"), Some(&json!("data")));
    }

    #[test]
    fn literal_is_trimmed_before_parsing() {
        let map = resolve_json_argument("  {\"a\": 1}\n").expect("object literal");
        assert_eq!(map.get("a"), Some(&json!(1)));
    }

    #[test]
    fn scalar_literal_is_unsupported() {
        assert_eq!(input_message("12345"), "Unsupported JSON format");
    }

    #[test]
    fn array_literal_is_unsupported() {
        assert_eq!(input_message("[{\"a\":1}]"), "Unsupported JSON format");
    }

    #[test]
    fn malformed_literal_reports_position() {
        let message = input_message("{\"a\": }");
        assert!(message.starts_with("JSON decode error."), "{message}");
        assert!(message.contains("line 1 column 7 (char 6)"), "{message}");
    }

    #[test]
    fn file_argument_is_read_and_parsed() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{{\"test\":\"data\"}}").expect("write");
        let map =
            resolve_json_argument(&file.path().display().to_string()).expect("object from file");
        assert_eq!(map.get("test"), Some(&json!("data")));
    }

    #[test]
    fn non_object_file_names_the_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "[1, 2, 3]").expect("write");
        let path = file.path().display().to_string();
        let message = input_message(&path);
        assert_eq!(message, format!("Unsupported JSON format in {path}"));
    }

    #[test]
    fn malformed_file_names_the_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{{\"a\":\n!}}").expect("write");
        let path = file.path().display().to_string();
        let message = input_message(&path);
        assert!(message.starts_with("JSON decode error."), "{message}");
        assert!(message.contains("line 2 column 1 (char 6)"), "{message}");
        assert!(message.ends_with(&format!(". File {path}")), "{message}");
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let message = input_message("/no/such/file.json");
        assert_eq!(message, "No such file /no/such/file.json");
    }

    #[test]
    fn missing_relative_file_is_reported_by_path() {
        let message = input_message("missing-mapping.json");
        assert_eq!(message, "No such file missing-mapping.json");
    }

    #[test]
    fn brace_prefixed_argument_is_parsed_as_literal() {
        // Even with a path separator inside, a '{' prefix means literal.
        let message = input_message("{no/such/file.json");
        assert!(message.starts_with("JSON decode error."), "{message}");
    }
}
