//! Content-line access to the parts of a calendar the typed model does not
//! interpret. Lines keep their wire form, so writing them back out changes
//! neither escaping nor parameter quoting.

use crate::event::{RawComponent, RawProperty};

/// Octet limit of one physical line (RFC 5545 3.1)
const FOLD_LIMIT: usize = 75;

/// Raw parts of one VEVENT.
#[derive(Debug, Default)]
pub(crate) struct RawEvent {
    pub properties: Vec<RawProperty>,
    pub components: Vec<RawComponent>,
}

#[derive(Debug, Default)]
pub(crate) struct RawCalendar {
    pub timezones: Vec<RawComponent>,
    /// Top-level VEVENTs in document order
    pub events: Vec<RawEvent>,
}

struct OpenComponent {
    component: RawComponent,
    depth: usize,
}

enum Boundary {
    Begin(String),
    End(String),
}

fn boundary(line: &str) -> Option<Boundary> {
    let (key, name) = line.split_once(':')?;
    let name = name.trim().to_ascii_uppercase();
    if key.eq_ignore_ascii_case("BEGIN") {
        Some(Boundary::Begin(name))
    } else if key.eq_ignore_ascii_case("END") {
        Some(Boundary::End(name))
    } else {
        None
    }
}

/// Scan unfolded ICS text for VEVENT properties and sub-components, and for
/// calendar-level VTIMEZONEs.
pub(crate) fn scan(unfolded: &str) -> RawCalendar {
    let mut calendar = RawCalendar::default();
    let mut event: Option<RawEvent> = None;
    let mut nested: Option<OpenComponent> = None;

    for line in unfolded.lines().filter(|l| !l.is_empty()) {
        if let Some(mut open) = nested.take() {
            open.component.lines.push(line.to_string());
            match boundary(line) {
                Some(Boundary::Begin(_)) => open.depth += 1,
                Some(Boundary::End(_)) => open.depth -= 1,
                None => {}
            }
            if open.depth > 0 {
                nested = Some(open);
            } else if let Some(ref mut event) = event {
                event.components.push(open.component);
            } else {
                calendar.timezones.push(open.component);
            }
            continue;
        }

        match boundary(line) {
            Some(Boundary::Begin(name)) if name == "VEVENT" && event.is_none() => {
                event = Some(RawEvent::default());
            }
            Some(Boundary::Begin(name)) if event.is_some() || name == "VTIMEZONE" => {
                nested = Some(OpenComponent {
                    component: RawComponent {
                        name,
                        lines: vec![line.to_string()],
                    },
                    depth: 1,
                });
            }
            Some(Boundary::End(name)) if name == "VEVENT" => {
                if let Some(done) = event.take() {
                    calendar.events.push(done);
                }
            }
            Some(_) => {}
            None => {
                if let Some(ref mut event) = event {
                    event.properties.extend(parse_content_line(line));
                }
            }
        }
    }

    calendar
}

/// Split `name;param=value...:value`. Separators inside quoted parameter
/// values are not split on.
pub(crate) fn parse_content_line(line: &str) -> Option<RawProperty> {
    let (head, value) = split_value(line)?;
    let mut parts = split_unquoted(head, ';').into_iter();
    let name = parts.next().filter(|n| !n.is_empty())?.to_string();
    let params = parts
        .map(|param| {
            let (key, val) = param.split_once('=').unwrap_or((param, ""));
            (key.to_string(), unquote(val).to_string())
        })
        .collect();

    Some(RawProperty {
        name,
        params,
        value: value.to_string(),
    })
}

/// Split at the first colon outside a quoted parameter value.
fn split_value(line: &str) -> Option<(&str, &str)> {
    let mut quoted = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ':' if !quoted => return Some((&line[..i], &line[i + 1..])),
            _ => {}
        }
    }
    None
}

fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == separator && !quoted {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .filter(|v| !v.contains('"'))
        .unwrap_or(value)
}

/// A parameter value ready for output: quoted when it holds `,` `;` or `:`.
pub(crate) fn quote_param(value: &str) -> String {
    // DQUOTE is not allowed inside a parameter value
    let value = value.replace('"', "");
    if value.contains([',', ';', ':']) {
        format!("\"{value}\"")
    } else {
        value
    }
}

/// The unfolded content line of `property`.
pub(crate) fn content_line(property: &RawProperty) -> String {
    let mut line = property.name.clone();
    for (key, val) in &property.params {
        line.push(';');
        line.push_str(key);
        line.push('=');
        line.push_str(&quote_param(val));
    }
    line.push(':');
    line.push_str(&property.value);
    line
}

/// Append `line` folded at 75 octets, CRLF terminated.
pub(crate) fn push_folded(out: &mut String, line: &str) {
    let mut octets = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if octets + len > FOLD_LIMIT {
            out.push_str("\r\n ");
            octets = 1;
        }
        out.push(ch);
        octets += len;
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_line_keeps_quoted_separators() {
        let prop =
            parse_content_line("X-ROOM;X-LABEL=\"Floor 2; East: Wing\";X-ID=7:Board\\, large")
                .unwrap();

        assert_eq!(prop.name, "X-ROOM");
        assert_eq!(
            prop.params,
            vec![
                ("X-LABEL".to_string(), "Floor 2; East: Wing".to_string()),
                ("X-ID".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(prop.value, "Board\\, large");
        assert_eq!(
            content_line(&prop),
            "X-ROOM;X-LABEL=\"Floor 2; East: Wing\";X-ID=7:Board\\, large"
        );
    }

    #[test]
    fn test_scan_collects_nested_and_timezones() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Berlin\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:E1\r\n\
CATEGORIES:Work,Meeting\r\n\
BEGIN:VALARM\r\n\
ACTION:EMAIL\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
BEGIN:VTODO\r\n\
UID:T1\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

        let raw = scan(ics);

        assert_eq!(raw.timezones.len(), 1);
        assert_eq!(raw.timezones[0].lines.len(), 7);
        assert_eq!(raw.events.len(), 1);
        let event = &raw.events[0];
        assert_eq!(event.properties.len(), 2);
        assert_eq!(event.properties[1].value, "Work,Meeting");
        assert_eq!(event.components.len(), 1);
        assert_eq!(event.components[0].name, "VALARM");
        assert_eq!(event.components[0].value("ACTION"), Some("EMAIL"));
    }

    #[test]
    fn test_fold_respects_octet_limit() {
        let line = format!("DESCRIPTION:{}", "é".repeat(60));
        let mut out = String::new();
        push_folded(&mut out, &line);

        for physical in out.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(physical.len() <= FOLD_LIMIT, "{} octets", physical.len());
        }
        assert_eq!(out.replace("\r\n ", ""), format!("{line}\r\n"));
    }
}
