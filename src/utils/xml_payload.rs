use std::borrow::Cow;

/// Characters pruned from spec payloads before any XML parse.
///
/// Spec blobs frequently carry NUL padding and BOM/zero-width markers left
/// over from fixed-record storage.
const STRIPPED: [char; 3] = ['\u{0000}', '\u{FEFF}', '\u{200B}'];

/// Normalizes a spec XML payload prior to parsing.
///
/// Strips all NUL, BOM and zero-width-space characters, trims leading
/// whitespace, and drops any bytes preceding the first `<` (if one exists).
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize_xml_payload(payload: &str) -> Cow<'_, str> {
    let cleaned: Cow<'_, str> = if payload.contains(&STRIPPED[..]) {
        Cow::Owned(payload.chars().filter(|c| !STRIPPED.contains(c)).collect())
    } else {
        Cow::Borrowed(payload)
    };

    match cleaned {
        Cow::Borrowed(s) => Cow::Borrowed(cut_to_first_tag(s)),
        Cow::Owned(s) => Cow::Owned(cut_to_first_tag(&s).to_string()),
    }
}

fn cut_to_first_tag(payload: &str) -> &str {
    let trimmed = payload.trim_start();
    match trimmed.find('<') {
        Some(pos) if pos > 0 => &trimmed[pos..],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_payload_is_borrowed_unchanged() {
        let payload = "<Template/>";
        assert!(matches!(
            normalize_xml_payload(payload),
            Cow::Borrowed("<Template/>")
        ));
    }

    #[test]
    fn strips_nul_bom_and_zero_width() {
        let payload = "\u{FEFF}\u{0000}<T>\u{200B}a</T>\u{0000}";
        assert_eq!(normalize_xml_payload(payload), "<T>a</T>");
    }

    #[test]
    fn drops_garbage_before_first_tag() {
        assert_eq!(normalize_xml_payload("  xx yy<T/>"), "<T/>");
    }

    #[test]
    fn without_a_tag_only_trims() {
        assert_eq!(normalize_xml_payload("   plain text  "), "plain text  ");
    }

    #[test]
    fn is_idempotent() {
        let inputs = ["\u{FEFF}junk<T>x</T>", "  <a/>", "", "no tags \u{0000}here"];
        for input in inputs {
            let once = normalize_xml_payload(input).into_owned();
            let twice = normalize_xml_payload(&once).into_owned();
            assert_eq!(once, twice, "normalize not idempotent for {input:?}");
        }
    }
}
