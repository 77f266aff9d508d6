//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

/// Parse collected header lines. Unknown and malformed lines are ignored.
pub fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();
    for line in lines {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value == "bytes";
        } else if name.eq_ignore_ascii_case("content-disposition") {
            out.content_disposition = Some(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn content_length_and_ranges() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Accept-Ranges: bytes",
        ]));
        assert_eq!(r.content_length, Some(12345));
        assert!(r.accept_ranges);
    }

    #[test]
    fn ranges_must_be_exactly_bytes() {
        for v in ["none", "Bytes", "bytes, other", ""] {
            let r = parse_headers(&lines(&[&format!("Accept-Ranges: {v}")]));
            assert!(!r.accept_ranges, "{v:?} should not enable ranges");
        }
    }

    #[test]
    fn missing_length() {
        let r = parse_headers(&lines(&["HTTP/1.1 200 OK", "Content-Length: abc"]));
        assert_eq!(r.content_length, None);
        assert!(!r.accept_ranges);
    }

    #[test]
    fn disposition_kept_verbatim() {
        let r = parse_headers(&lines(&["Content-Disposition: attachment; filename=\"report.pdf\""]));
        assert_eq!(
            r.content_disposition.as_deref(),
            Some("attachment; filename=\"report.pdf\"")
        );
    }
}
