//! Record splitting for the abbreviation table source.
//!
//! Only what the table format needs: comma separated fields, double-quoted
//! fields that may contain commas, and `""` as an escaped quote. A record
//! never spans lines.

/// Split one record into its fields.
///
/// Returns `None` when a quoted field is not closed before the end of the
/// line.
pub(crate) fn split_record(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            // Opening quote, possibly after padding: `Genesis, "Gen, Ge"`
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if quoted {
        return None;
    }
    fields.push(field);
    Some(fields)
}
