//! CSV to record parser with encoding and delimiter auto-detection.
//!
//! Converts CSV rows into [`Record`]s keyed by header name. Every cell is kept
//! as a JSON string; interpretation of counts, dates and coordinates happens
//! downstream.

use serde_json::Value;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::Record;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    normalize_charset(&result.0)
}

/// Map a chardet charset name to a label `encoding_rs` understands.
///
/// chardet reports KOI8-U text as KOI8-R. KOI8-U only differs in cells that
/// KOI8-R uses for box drawing, so the Ukrainian table is used for both.
fn normalize_charset(charset: &str) -> String {
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "windows-1251" | "cp1251" => "windows-1251".to_string(),
        "koi8-r" | "koi8-u" => "koi8-u".to_string(),
        "maccyrillic" | "mac-cyrillic" => "x-mac-cyrillic".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding label.
///
/// Labels unknown to `encoding_rs` fall back to lossy UTF-8. A leading BOM is
/// dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding_rs::Encoding::for_label(encoding.trim().as_bytes()) {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into records with an explicit delimiter.
///
/// Cells are trimmed, short rows are padded with empty strings and extra
/// cells are ignored. Blank lines are skipped.
///
/// # Example
/// ```ignore
/// use flagload::csv_to_records;
///
/// let csv = "City;Value 1\nOdesa;3";
/// let rows = csv_to_records(csv, ';').unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0]["City"], "Odesa");
/// assert_eq!(rows[0]["Value 1"], "3");
/// ```
pub fn csv_to_records(content: &str, delimiter: char) -> CsvResult<Vec<Record>> {
    read_records(content, delimiter).map(|(_, records)| records)
}

fn read_records(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<Record>)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::ParseError {
        line: 0,
        message: format!("delimiter '{}' is not a single-byte character", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_parse_error)?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(csv_parse_error)?;

        if row.iter().all(str::is_empty) {
            continue;
        }

        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let raw_value = row.get(i).unwrap_or("");
            record.insert(header.clone(), Value::String(raw_value.to_string()));
        }

        records.push(record);
    }

    Ok((headers, records))
}

fn csv_parse_error(err: csv::Error) -> CsvError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    CsvError::ParseError {
        line,
        message: err.to_string(),
    }
}

/// Parse CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("data/input.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Records: {}", result.records.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV string with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    let (headers, records) = read_records(content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let csv = "City;Value 1\nOdesa;3\nLviv;0";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["City"], "Odesa");
        assert_eq!(rows[0]["Value 1"], "3");
        assert_eq!(rows[1]["City"], "Lviv");
        assert_eq!(rows[1]["Value 1"], "0");
    }

    #[test]
    fn test_comma_decimal_coordinates_survive_semicolon_split() {
        let csv = "long;lat\n30,7306393;46,4825";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows[0]["long"], "30,7306393");
        assert_eq!(rows[0]["lat"], "46,4825");
    }

    #[test]
    fn test_quoted_values() {
        let csv = "City,long\n\"Kyiv, center\",\"30,52\"";
        let rows = csv_to_records(csv, ',').unwrap();

        assert_eq!(rows[0]["City"], "Kyiv, center");
        assert_eq!(rows[0]["long"], "30,52");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a;b\n1;2\n\n3;4\n";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_values_padded() {
        let csv = "a;b;c\n1;;3\n4";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1]["a"], "4");
        assert_eq!(rows[1]["c"], "");
    }

    #[test]
    fn test_extra_columns_ignored() {
        let csv = "a;b\n1;2;3;4";
        let rows = csv_to_records(csv, ';').unwrap();

        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0]["b"], "2");
    }

    #[test]
    fn test_header_order_preserved() {
        let csv = "z;a;m\n1;2;3";
        let rows = csv_to_records(csv, ';').unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_header_only_is_valid() {
        let result = parse_string_with_metadata("a;b\n", ';', "utf-8".into()).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.headers, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_csv_error() {
        let result = csv_to_records("", ';');
        assert!(matches!(result, Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let csv = "City;Value 1\nOdesa;3\nLviv;1";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["City", "Value 1"]);
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = "\u{feff}Date;City\n01.02.2024;Odesa".as_bytes();
        let result = parse_bytes_auto(bytes).unwrap();

        assert_eq!(result.headers[0], "Date");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    const CYRILLIC_HEADER: &str = "Дата;Область;Район;Значення 1";

    #[test]
    fn test_cyrillic_single_byte_encodings() {
        for enc in [
            encoding_rs::WINDOWS_1251,
            encoding_rs::ISO_8859_5,
            encoding_rs::IBM866,
            encoding_rs::KOI8_U,
            encoding_rs::X_MAC_CYRILLIC,
        ] {
            let (bytes, _, unmappable) = enc.encode(CYRILLIC_HEADER);
            assert!(!unmappable, "{} cannot encode the header", enc.name());

            let decoded = decode_content(&bytes, enc.name());
            assert_eq!(decoded, CYRILLIC_HEADER, "decoding {}", enc.name());
        }
    }

    #[test]
    fn test_ukrainian_letters_decode() {
        for enc in [
            encoding_rs::WINDOWS_1251,
            encoding_rs::ISO_8859_5,
            encoding_rs::KOI8_U,
        ] {
            let (bytes, _, _) = enc.encode("Місто;Київ;Їжакевичі");
            assert_eq!(decode_content(&bytes, enc.name()), "Місто;Київ;Їжакевичі");
        }
    }

    #[test]
    fn test_chardet_names_resolve() {
        assert_eq!(normalize_charset("ISO-8859-5"), "iso-8859-5");
        assert_eq!(normalize_charset("IBM866"), "ibm866");
        assert_eq!(normalize_charset("MacCyrillic"), "x-mac-cyrillic");
        assert_eq!(normalize_charset("KOI8-R"), "koi8-u");
        assert_eq!(normalize_charset("ascii"), "utf-8");

        for name in ["ISO-8859-5", "IBM866", "MacCyrillic", "KOI8-R", "windows-1251"] {
            let label = normalize_charset(name);
            assert!(
                encoding_rs::Encoding::for_label(label.as_bytes()).is_some(),
                "no decoder for {}",
                name
            );
        }
    }

    #[test]
    fn test_koi8_r_label_keeps_ukrainian_i() {
        let (bytes, _, _) = encoding_rs::KOI8_U.encode("Місто");
        let decoded = decode_content(&bytes, &normalize_charset("koi8-r"));
        assert_eq!(decoded, "Місто");
    }

    #[test]
    fn test_unknown_label_falls_back_to_utf8() {
        let decoded = decode_content("Київ".as_bytes(), "no-such-charset");
        assert_eq!(decoded, "Київ");
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Date;City;Value 1\n01.03.2024;Kharkiv;2\n").unwrap();

        let result = parse_csv_file_auto(file.path()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0]["City"], "Kharkiv");
    }
}
