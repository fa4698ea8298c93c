use super::{FormatError, PackageStatus, ParsedHeader, ParsedLine, Report};

/// Protocol marker expected as the first header token
pub const PROTOCOL_TAG: &str = "popcorn";

const LINE_FIELDS: usize = 6;

/// Parse a decoded report payload.
///
/// One malformed line rejects the whole report.
pub fn parse_report(bytes: &[u8]) -> Result<Report, FormatError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidEncoding)?;
    if text.trim().is_empty() {
        return Err(FormatError::Empty);
    }

    let mut lines = text.lines();
    let header = match lines.next() {
        Some(line) => parse_header(line)?,
        None => return Err(FormatError::Empty),
    };

    let mut parsed = Vec::new();
    for (index, line) in lines.enumerate() {
        // Header is line 1, so the first package line is line 2
        let line_no = index + 2;
        if line.trim().is_empty() {
            continue;
        }
        parsed.push(parse_line(line, line_no)?);
    }

    Ok(Report {
        header,
        lines: parsed,
    })
}

fn parse_header(line: &str) -> Result<ParsedHeader, FormatError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [tag, version, arch, hw_uuid] = tokens.as_slice() else {
        return Err(FormatError::HeaderFieldCount {
            found: tokens.len(),
        });
    };

    if !tag.eq_ignore_ascii_case(PROTOCOL_TAG) {
        return Err(FormatError::ProtocolTag {
            tag: (*tag).to_string(),
        });
    }

    Ok(ParsedHeader {
        protocol_tag: (*tag).to_string(),
        protocol_version: (*version).to_string(),
        arch: (*arch).to_string(),
        hw_uuid: (*hw_uuid).to_string(),
    })
}

fn parse_line(line: &str, line_no: usize) -> Result<ParsedLine, FormatError> {
    let fields = split_fields(line, LINE_FIELDS);
    let [status, name, version, release, arch, vendor] = fields.as_slice() else {
        return Err(FormatError::LineFieldCount {
            line: line_no,
            found: fields.len(),
        });
    };

    let status = PackageStatus::from_code(status).ok_or_else(|| FormatError::UnknownStatus {
        line: line_no,
        status: (*status).to_string(),
    })?;

    Ok(ParsedLine {
        line: line_no,
        status,
        name: (*name).to_string(),
        version: (*version).to_string(),
        release: (*release).to_string(),
        arch: (*arch).to_string(),
        vendor: (*vendor).to_string(),
    })
}

/// Split `line` on whitespace into at most `max` fields. The last field is
/// the untouched remainder of the line with trailing whitespace removed.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim();

    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }

    fields
}
