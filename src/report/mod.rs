//!
//! Calibration file output
//!

use std::io::{self, Write};

use crate::calibration::{CalibrationResult, ParameterVector};
use crate::points::PointSet;

/// The first line of every calibration file.
pub const HEADER: &str = "# Calibration data derived from the following points data";

///
/// Formats the two value lines of a calibration file.
///
/// # Parameters:
/// - `params`: The fitted parameters
///
/// # Returns:
/// - The shoulder heights line and the arm lengths line, respectively, without terminators
///
pub fn value_lines(params: &ParameterVector) -> (String, String) {
    let [z1, z2, z3] = params.shoulder_heights;
    let [l1, l2, l3] = params.arm_lengths;

    (format!("{}, {}, {}", z1, z2, z3), format!("{}, {}, {}", l1, l2, l3))
}

///
/// Writes a complete calibration file: the header, an echo of every input line, any diagnostics
/// and finally the shoulder heights and arm lengths.
///
/// # Parameters:
/// - `out`: The destination
/// - `points`: The loaded point set, echoed for provenance
/// - `result`: The calibration outcome
///
/// # Returns:
/// - Void if everything was written
/// - The io error which interrupted writing
///
pub fn write_calibration<W: Write>(out: &mut W, points: &PointSet, result: &CalibrationResult) -> io::Result<()> {
    write_echo(out, points)?;

    for diagnostic in result.diagnostics.iter() {
        writeln!(out, "# {}", diagnostic)?;
    }

    let (heights, lengths) = value_lines(&result.params);
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out, "{}", heights)?;
    writeln!(out, "{}", lengths)?;
    out.flush()
}

///
/// Writes the partial calibration file left behind when a run is aborted for lack of points.
///
pub fn write_aborted<W: Write>(out: &mut W, points: &PointSet) -> io::Result<()> {
    write_echo(out, points)?;
    writeln!(out, "#")?;
    writeln!(out, "#")?;
    writeln!(out, "# Calibration aborted")?;
    out.flush()
}

fn write_echo<W: Write>(out: &mut W, points: &PointSet) -> io::Result<()> {
    writeln!(out, "{}", HEADER)?;
    for line in points.lines.iter() {
        writeln!(out, "# {}", line)?;
    }
    Ok(())
}
