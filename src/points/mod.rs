//!
//! Point data sources, line classification and loading
//!

use std::path::PathBuf;

use tracing::{debug, warn};

use error::PointError;

pub mod error;

/// The minimum number of valid points required before a calibration is attempted.
pub const MIN_POINTS: usize = 6;

///
/// One set of arm measurements, with the height compensation already applied.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredPoint {
    arms: [f64; 3],
}

impl MeasuredPoint {
    ///
    /// Creates a point from already compensated arm measurements.
    ///
    pub fn new(arms: [f64; 3]) -> MeasuredPoint {
        MeasuredPoint { arms }
    }

    ///
    /// Creates a point from raw measurements, adding `compensation` to every component.
    ///
    /// # Parameters:
    /// - `raw`: The three raw measurements, in arm order
    /// - `compensation`: The height compensation offset, in millimetres
    ///
    /// # Returns:
    /// - A new `MeasuredPoint`
    ///
    pub fn from_raw(raw: [f64; 3], compensation: f64) -> MeasuredPoint {
        MeasuredPoint { arms: raw.map(|value| value + compensation) }
    }

    /// The three compensated measurements, in arm order.
    pub fn arms(&self) -> [f64; 3] {
        self.arms
    }
}

///
/// The classification of one line of a point file.
///
/// - `Blank`: An empty or whitespace-only line
/// - `Comment`: A line whose first non-whitespace character is `#` or `;`
/// - `Values`: A line holding exactly three numbers, uncompensated
/// - `Invalid`: Anything else
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineKind {
    Blank,
    Comment,
    Values([f64; 3]),
    Invalid,
}

///
/// Classifies a single line of a point file. Values may be separated by any run of whitespace
/// and/or commas.
///
/// # Parameters:
/// - `line`: The raw line, without its terminator
///
/// # Returns:
/// - The `LineKind` of the line
///
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return LineKind::Blank;
    }

    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return LineKind::Comment;
    }

    let mut values = [0.; 3];
    let mut count = 0;

    for token in trimmed.split(|c: char| c.is_whitespace() || c == ',').filter(|token| !token.is_empty()) {
        if count == 3 {
            return LineKind::Invalid;
        }

        match parse_decimal(token) {
            Some(value) => values[count] = value,
            None => return LineKind::Invalid,
        }
        count += 1;
    }

    if count != 3 {
        return LineKind::Invalid;
    }

    LineKind::Values(values)
}

///
/// Parses a plain decimal number: an optional sign, digits and at most one period.
/// Exponents, `inf` and `nan` are rejected, as are digit runs too long to fit an `f64`.
///
fn parse_decimal(token: &str) -> Option<f64> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);

    let mut seen_digit = false;
    let mut seen_period = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_period => seen_period = true,
            _ => return None,
        }
    }

    if !seen_digit {
        return None;
    }

    token.parse::<f64>().ok().filter(|value| value.is_finite())
}

///
/// A line which could not be parsed into a point.
///
/// # Fields:
/// - `line_number`: The one-indexed line number in the source
/// - `text`: The line as read
///
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidLine {
    pub line_number: usize,
    pub text: String,
}

///
/// The result of loading a point source.
///
/// # Fields:
/// - `lines`: Every line of the source, as read, for provenance in the output
/// - `points`: The valid, compensated points, in file order
/// - `invalid`: The lines which were reported and skipped
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    pub lines: Vec<String>,
    pub points: Vec<MeasuredPoint>,
    pub invalid: Vec<InvalidLine>,
}

impl PointSet {
    ///
    /// Parses the text of a point file.
    ///
    /// # Parameters:
    /// - `text`: The full contents of the point source
    /// - `compensation`: The height compensation added to every accepted component
    ///
    /// # Returns:
    /// - A new `PointSet`; invalid lines are logged and skipped, never fatal
    ///
    pub fn parse(text: &str, compensation: f64) -> PointSet {
        let mut set = PointSet::default();

        for (idx, line) in text.lines().enumerate() {
            set.lines.push(line.to_owned());

            match classify_line(line) {
                LineKind::Blank | LineKind::Comment => {}
                LineKind::Values(raw) => set.points.push(MeasuredPoint::from_raw(raw, compensation)),
                LineKind::Invalid => {
                    warn!("Invalid line {} in points file: {}", idx + 1, line.trim());
                    set.invalid.push(InvalidLine { line_number: idx + 1, text: line.to_owned() });
                }
            }
        }

        debug!(points = set.points.len(), invalid = set.invalid.len(), "parsed point data");
        set
    }

    /// Whether enough points were accepted to attempt a calibration.
    pub fn is_sufficient(&self) -> bool {
        self.points.len() >= MIN_POINTS
    }
}

///
/// A source of point file text. Implement this to supply points from somewhere other than a
/// file on disk, for example an interactive prompt.
///
pub trait PointSource {
    /// A human readable name for the source, used in errors and logs.
    fn name(&self) -> String;

    /// Reads the full text of the source.
    fn read_text(&self) -> Result<String, PointError>;
}

///
/// A point source backed by a file on disk.
///
pub struct FilePointSource {
    path: PathBuf,
}

impl FilePointSource {
    pub fn new(path: impl Into<PathBuf>) -> FilePointSource {
        FilePointSource { path: path.into() }
    }
}

impl PointSource for FilePointSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read_text(&self) -> Result<String, PointError> {
        std::fs::read_to_string(&self.path).map_err(|err| PointError::from_io(&self.name(), err))
    }
}

///
/// A point source holding its text in memory.
///
pub struct TextPointSource {
    name: String,
    text: String,
}

impl TextPointSource {
    pub fn new(name: &str, text: &str) -> TextPointSource {
        TextPointSource { name: name.to_owned(), text: text.to_owned() }
    }
}

impl PointSource for TextPointSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_text(&self) -> Result<String, PointError> {
        Ok(self.text.clone())
    }
}

///
/// Reads and parses a point source.
///
/// # Parameters:
/// - `source`: The source to read from
/// - `compensation`: The height compensation added to every accepted component
///
/// # Returns:
/// - The parsed `PointSet`
/// - A `PointError` if the source could not be read
///
pub fn load_points(source: &dyn PointSource, compensation: f64) -> Result<PointSet, PointError> {
    let text = source.read_text()?;
    Ok(PointSet::parse(&text, compensation))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_comments_and_blanks() {
        assert_eq!(classify_line("# comment"), LineKind::Comment);
        assert_eq!(classify_line(";note"), LineKind::Comment);
        assert_eq!(classify_line("   # indented"), LineKind::Comment);
        assert_eq!(classify_line(""), LineKind::Blank);
        assert_eq!(classify_line(" \t "), LineKind::Blank);
    }

    #[test]
    fn mixed_separators_are_valid() {
        assert_eq!(classify_line("137.1 137.2, 137.3"), LineKind::Values([137.1, 137.2, 137.3]));
        assert_eq!(classify_line("1,,2 ,\t3"), LineKind::Values([1., 2., 3.]));
        assert_eq!(classify_line("-1.5, +2, .5"), LineKind::Values([-1.5, 2., 0.5]));
    }

    #[test]
    fn bad_tokens_are_invalid() {
        assert_eq!(classify_line("137.1, bad, 137.3"), LineKind::Invalid);
        assert_eq!(classify_line("1, 2"), LineKind::Invalid);
        assert_eq!(classify_line("1, 2, 3, 4"), LineKind::Invalid);
        assert_eq!(classify_line("1e3, 2, 3"), LineKind::Invalid);
        assert_eq!(classify_line("inf, 2, 3"), LineKind::Invalid);
        assert_eq!(classify_line("1.2.3, 2, 3"), LineKind::Invalid);
        assert_eq!(classify_line("-, 2, 3"), LineKind::Invalid);
    }

    #[test]
    fn overflowing_values_are_invalid() {
        let huge = format!("1{}", "0".repeat(400));
        assert_eq!(classify_line(&format!("{huge}, 2, 3")), LineKind::Invalid);
        assert_eq!(classify_line(&format!("1, -{huge}.5, 3")), LineKind::Invalid);

        let set = PointSet::parse(&format!("{huge}, 2, 3\n1, 2, 3\n"), 0.1);
        assert_eq!(set.points.len(), 1);
        assert_eq!(set.invalid[0].line_number, 1);
    }

    #[test]
    fn compensation_is_added_to_each_component() {
        let set = PointSet::parse("10, 20, 30", 0.1);
        let [a, b, c] = set.points[0].arms();

        assert!((a - 10.1).abs() < 1e-12);
        assert!((b - 20.1).abs() < 1e-12);
        assert!((c - 30.1).abs() < 1e-12);
    }

    #[test]
    fn parse_keeps_every_line_and_reports_invalid() {
        let text = "# header\n;note\n\n137.1 137.2, 137.3\n137.1, bad, 137.3\n";
        let set = PointSet::parse(text, 0.);

        assert_eq!(set.lines.len(), 5);
        assert_eq!(set.points, vec![MeasuredPoint::new([137.1, 137.2, 137.3])]);
        assert_eq!(set.invalid, vec![InvalidLine { line_number: 5, text: "137.1, bad, 137.3".to_owned() }]);
        assert!(!set.is_sufficient());
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let set = PointSet::parse("1 2 3\r\n4 5 6\r\n", 0.);
        assert_eq!(set.points.len(), 2);
        assert_eq!(set.lines[0], "1 2 3");
    }

    #[test]
    fn missing_file_is_not_found() {
        let source = FilePointSource::new("/definitely/not/here/Points.GUS");
        assert!(matches!(load_points(&source, 0.1), Err(PointError::FileNotFound { .. })));
    }

    #[test]
    fn text_source_loads() {
        let source = TextPointSource::new("inline", "1 2 3\n4 5 6\n7 8 9\n1 2 3\n4 5 6\n7 8 9\n");
        let set = load_points(&source, 0.).unwrap();
        assert!(set.is_sufficient());
    }
}
