use crate::encoding::win_ansi_byte;
use crate::error::CvPdfError;
use crate::types::Pt;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFace {
    Helvetica,
    HelveticaBold,
}

impl OutputFace {
    pub fn base_font(self) -> &'static str {
        match self {
            OutputFace::Helvetica => "Helvetica",
            OutputFace::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn resource_name(self) -> &'static str {
        match self {
            OutputFace::Helvetica => "F1",
            OutputFace::HelveticaBold => "F2",
        }
    }

    pub fn for_weight(weight: u16, bold_threshold: u16) -> Self {
        if weight >= bold_threshold {
            OutputFace::HelveticaBold
        } else {
            OutputFace::Helvetica
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasureError {
    UnsupportedChar(char),
    InvalidSize,
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureError::UnsupportedChar(ch) => {
                write!(f, "no glyph for U+{:04X} in output font", *ch as u32)
            }
            MeasureError::InvalidSize => write!(f, "font size must be positive"),
        }
    }
}

impl std::error::Error for MeasureError {}

pub trait TextMeasure: Sync {
    fn measure(&self, face: OutputFace, font_size: Pt, text: &str) -> Result<Pt, MeasureError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFonts;

impl TextMeasure for StandardFonts {
    fn measure(&self, face: OutputFace, font_size: Pt, text: &str) -> Result<Pt, MeasureError> {
        if font_size <= Pt::ZERO {
            return Err(MeasureError::InvalidSize);
        }
        let mut total_units: i64 = 0;
        for ch in text.chars() {
            let units = advance_units(face, ch).ok_or(MeasureError::UnsupportedChar(ch))?;
            total_units += units as i64;
        }
        Ok(Pt::from_f32(font_size.to_f32() * total_units as f32 / 1000.0))
    }
}

fn advance_units(face: OutputFace, ch: char) -> Option<u16> {
    let table = match face {
        OutputFace::Helvetica => &HELVETICA_ASCII,
        OutputFace::HelveticaBold => &HELVETICA_BOLD_ASCII,
    };
    let ascii = |c: char| table[(c as u32 - 32) as usize];
    match ch {
        ' '..='~' => Some(ascii(ch)),
        _ => {
            if let Some(base) = fold_latin1(ch) {
                return Some(ascii(base));
            }
            if let Some(units) = latin1_symbol_width(ch) {
                return Some(units);
            }
            // Encodable but unlisted: use the average lowercase advance.
            win_ansi_byte(ch).map(|_| 556)
        }
    }
}

// Accented letters take the advance of their base letter.
fn fold_latin1(ch: char) -> Option<char> {
    let base = match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Ö' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'Š' => 'S',
        'Ž' => 'Z',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' => 's',
        'ž' => 'z',
        _ => return None,
    };
    Some(base)
}

fn latin1_symbol_width(ch: char) -> Option<u16> {
    let units = match ch {
        '\u{00A0}' => 278,
        '•' => 350,
        '·' => 278,
        '©' | '®' => 737,
        '°' => 400,
        '§' => 556,
        '×' | '÷' | '±' | '¬' => 584,
        '«' | '»' => 556,
        '€' | '£' | '¥' => 556,
        '™' => 1000,
        'ß' | 'ø' | 'þ' => 611,
        'Ø' => 778,
        'æ' => 889,
        'Æ' | 'Œ' => 1000,
        'œ' => 944,
        '¡' => 333,
        '¿' => 611,
        '†' | '‡' => 556,
        _ => return None,
    };
    Some(units)
}

const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

// Vertical metrics of the source webfont, as fractions of the font size.
// The defaults match the CV's typeface; other fonts can be measured with
// `BaselineMetrics::from_font_bytes`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineMetrics {
    pub ascent_ratio: f32,
    pub descent_ratio: f32,
}

impl Default for BaselineMetrics {
    fn default() -> Self {
        Self {
            ascent_ratio: 0.75,
            descent_ratio: 0.203,
        }
    }
}

impl BaselineMetrics {
    pub fn from_font_bytes(data: &[u8]) -> Result<Self, CvPdfError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|err| CvPdfError::InvalidConfiguration(format!("invalid font data: {err}")))?;
        let units = face.units_per_em().max(1) as f32;
        let ascent = face.ascender() as f32 / units;
        let descent = (face.descender() as f32).abs() / units;
        if !(ascent > 0.0) || !ascent.is_finite() || !descent.is_finite() {
            return Err(CvPdfError::InvalidConfiguration(
                "font reports no usable ascent".to_string(),
            ));
        }
        Ok(Self {
            ascent_ratio: ascent,
            descent_ratio: descent,
        })
    }
}
