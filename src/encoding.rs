pub const PLACEHOLDER: char = '?';

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sanitized {
    pub text: String,
    pub substituted: usize,
    pub replaced: usize,
}

pub fn sanitize(input: &str) -> Sanitized {
    let mut out = String::with_capacity(input.len());
    let mut substituted = 0usize;
    let mut replaced = 0usize;
    let mut pending_space = false;

    for ch in input.chars() {
        if ch.is_whitespace() || ch.is_control() {
            pending_space = !out.is_empty();
            continue;
        }
        // Zero-width characters carry nothing for search.
        if matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}') {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if let Some(spelling) = ascii_spelling(ch) {
            out.push_str(spelling);
            substituted += 1;
            continue;
        }
        if win_ansi_byte(ch).is_some() {
            out.push(ch);
        } else {
            out.push(PLACEHOLDER);
            replaced += 1;
        }
    }

    Sanitized {
        text: out,
        substituted,
        replaced,
    }
}

fn ascii_spelling(ch: char) -> Option<&'static str> {
    let s = match ch {
        '\u{2192}' | '\u{27F6}' | '\u{279C}' | '\u{2794}' => "->",
        '\u{2190}' | '\u{27F5}' => "<-",
        '\u{2194}' => "<->",
        '\u{21D2}' => "=>",
        '\u{21D0}' => "<=",
        '\u{2191}' => "^",
        '\u{2193}' => "v",
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => "\"",
        '\u{2039}' => "<",
        '\u{203A}' => ">",
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => {
            "-"
        }
        '\u{2026}' => "...",
        '\u{2265}' => ">=",
        '\u{2264}' => "<=",
        '\u{2260}' => "!=",
        '\u{2248}' => "~",
        '\u{2713}' | '\u{2714}' => "v",
        '\u{2717}' | '\u{2718}' => "x",
        '\u{25CF}' | '\u{25E6}' | '\u{2219}' | '\u{2023}' => "*",
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => " ",
        _ => return None,
    };
    Some(s)
}

pub fn win_ansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0020}'..='\u{007E}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

// Encodes already-sanitized text. Anything unencodable still becomes `?`.
pub fn to_win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| win_ansi_byte(ch).unwrap_or(PLACEHOLDER as u8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typographic_punctuation_becomes_ascii() {
        let out = sanitize("Rust \u{2192} WASM \u{2014} \u{201C}fast\u{201D}\u{2026}");
        assert_eq!(out.text, "Rust -> WASM - \"fast\"...");
        assert_eq!(out.substituted, 5);
        assert_eq!(out.replaced, 0);
    }

    #[test]
    fn latin1_is_kept() {
        let out = sanitize("Zürich, Málaga · Ørsted");
        assert_eq!(out.text, "Zürich, Málaga · Ørsted");
        assert_eq!(out.substituted + out.replaced, 0);
    }

    #[test]
    fn unknown_characters_get_placeholder() {
        let out = sanitize("日本 ok");
        assert_eq!(out.text, "?? ok");
        assert_eq!(out.replaced, 2);
    }

    #[test]
    fn whitespace_collapses_and_trims() {
        let out = sanitize("  Senior\n\t Engineer \u{00A0} ");
        assert_eq!(out.text, "Senior Engineer");
    }

    #[test]
    fn encodes_cp1252() {
        assert_eq!(to_win_ansi_bytes("a€é•"), vec![b'a', 0x80, 0xE9, 0x95]);
        assert_eq!(to_win_ansi_bytes("→"), vec![b'?']);
    }
}
