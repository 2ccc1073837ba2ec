use crate::types::Rgb;
use std::sync::{Arc, OnceLock};

/// One row of the font lookup: index 0 is the contrast it was computed for, indexes 1..=9
/// are minimum font sizes (px) for weights 100..=900.
pub type FontLookupRow = [f64; 10];

/// Lookup sentinel: text is prohibited at this contrast.
pub const LOOKUP_PROHIBITED: f64 = 999.0;
/// Lookup sentinel: only non-content (spot) text may use this contrast.
pub const LOOKUP_NON_CONTENT_ONLY: f64 = 777.0;
/// Anything above this in a lookup cell is a sentinel, not a size.
pub const LOOKUP_SENTINEL_FLOOR: f64 = 400.0;

/// The numeric APCA building blocks the threshold logic needs. Implementations must be
/// pure; the default is [`ApcaW3`].
pub trait ApcaPrimitives: Send + Sync {
    /// Screen luminance of an sRGB color.
    fn srgb_to_y(&self, color: Rgb) -> f64;
    /// Signed lightness contrast (Lc). Positive for dark text on light backgrounds.
    fn apca_contrast(&self, text_y: f64, background_y: f64) -> f64;
    /// Minimum font size per weight for a given contrast.
    fn font_lookup(&self, contrast: f64) -> FontLookupRow;
}

// apca-w3 0.1.9 constants.
const MAIN_TRC: f64 = 2.4;
const S_RCO: f64 = 0.212_672_9;
const S_GCO: f64 = 0.715_152_2;
const S_BCO: f64 = 0.072_175_0;

const NORM_BG: f64 = 0.56;
const NORM_TXT: f64 = 0.57;
const REV_TXT: f64 = 0.62;
const REV_BG: f64 = 0.65;
const BLK_THRS: f64 = 0.022;
const BLK_CLMP: f64 = 1.414;
const SCALE_BOW: f64 = 1.14;
const SCALE_WOB: f64 = 1.14;
const LO_BOW_OFFSET: f64 = 0.027;
const LO_WOB_OFFSET: f64 = 0.027;
const DELTA_Y_MIN: f64 = 0.0005;
const LO_CLIP: f64 = 0.1;

const LOOKUP_ROWS: usize = 26;

// Row 0 is a header (weights); rows 1..=25 cover Lc 0..=125 in steps of 5, with
// Lc 0 and 10 sharing the prohibited row shape.
const FONT_MATRIX_ASCEND: [FontLookupRow; LOOKUP_ROWS] = [
    [0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0],
    [0.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0],
    [10.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0, 999.0],
    [15.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0],
    [20.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0, 777.0],
    [25.0, 777.0, 777.0, 777.0, 120.0, 120.0, 108.0, 96.0, 96.0, 96.0],
    [30.0, 777.0, 777.0, 120.0, 108.0, 108.0, 96.0, 72.0, 72.0, 72.0],
    [35.0, 777.0, 120.0, 108.0, 96.0, 72.0, 60.0, 48.0, 48.0, 48.0],
    [40.0, 120.0, 108.0, 96.0, 60.0, 48.0, 42.0, 32.0, 32.0, 32.0],
    [45.0, 108.0, 96.0, 72.0, 42.0, 32.0, 28.0, 24.0, 24.0, 24.0],
    [50.0, 96.0, 72.0, 60.0, 32.0, 28.0, 24.0, 21.0, 21.0, 21.0],
    [55.0, 80.0, 60.0, 48.0, 28.0, 24.0, 21.0, 18.0, 18.0, 18.0],
    [60.0, 72.0, 48.0, 42.0, 24.0, 21.0, 18.0, 16.0, 16.0, 18.0],
    [65.0, 68.0, 46.0, 32.0, 21.75, 19.0, 17.0, 15.0, 16.0, 18.0],
    [70.0, 64.0, 44.0, 28.0, 19.5, 18.0, 16.0, 14.5, 16.0, 18.0],
    [75.0, 60.0, 42.0, 24.0, 18.0, 16.0, 15.0, 14.0, 16.0, 18.0],
    [80.0, 56.0, 38.25, 23.0, 17.25, 15.81, 14.81, 14.0, 16.0, 18.0],
    [85.0, 52.0, 34.5, 22.0, 16.5, 15.625, 14.625, 14.0, 16.0, 18.0],
    [90.0, 48.0, 32.0, 21.0, 16.0, 15.5, 14.5, 14.0, 16.0, 18.0],
    [95.0, 45.0, 28.0, 19.5, 15.5, 15.0, 14.0, 13.5, 16.0, 18.0],
    [100.0, 42.0, 26.5, 18.5, 15.0, 14.5, 13.5, 13.0, 16.0, 18.0],
    [105.0, 39.0, 25.0, 18.0, 14.5, 14.0, 13.0, 12.0, 16.0, 18.0],
    [110.0, 36.0, 24.0, 18.0, 14.0, 13.0, 12.0, 11.0, 16.0, 18.0],
    [115.0, 34.0, 22.5, 17.5, 13.5, 12.5, 11.5, 10.0, 16.0, 18.0],
    [120.0, 32.0, 21.0, 17.0, 13.0, 12.0, 11.0, 10.0, 16.0, 18.0],
    [125.0, 30.0, 20.0, 16.5, 12.5, 11.5, 10.5, 10.0, 16.0, 18.0],
];

/// Reference APCA implementation (apca-w3 0.1.9 math and lookup table).
pub struct ApcaW3 {
    // Per-row difference to the next row, used for interpolation.
    deltas: [FontLookupRow; LOOKUP_ROWS],
}

static APCA_W3: OnceLock<Arc<ApcaW3>> = OnceLock::new();

impl ApcaW3 {
    /// Shared instance; the interpolation table is built once per process.
    pub fn load() -> Arc<ApcaW3> {
        APCA_W3.get_or_init(|| Arc::new(ApcaW3::build())).clone()
    }

    fn build() -> Self {
        let mut deltas = [[0.0; 10]; LOOKUP_ROWS];
        for row in 1..LOOKUP_ROWS - 1 {
            deltas[row][0] = FONT_MATRIX_ASCEND[row][0];
            for col in 1..10 {
                deltas[row][col] = FONT_MATRIX_ASCEND[row][col] - FONT_MATRIX_ASCEND[row + 1][col];
            }
        }
        deltas[LOOKUP_ROWS - 1][0] = FONT_MATRIX_ASCEND[LOOKUP_ROWS - 1][0];
        Self { deltas }
    }
}

impl ApcaPrimitives for ApcaW3 {
    fn srgb_to_y(&self, color: Rgb) -> f64 {
        let linear = |channel: u8| (channel as f64 / 255.0).powf(MAIN_TRC);
        S_RCO * linear(color.r) + S_GCO * linear(color.g) + S_BCO * linear(color.b)
    }

    fn apca_contrast(&self, text_y: f64, background_y: f64) -> f64 {
        if text_y.is_nan()
            || background_y.is_nan()
            || text_y.min(background_y) < 0.0
            || text_y.max(background_y) > 1.1
        {
            return 0.0;
        }
        let soft_clamp = |y: f64| {
            if y > BLK_THRS {
                y
            } else {
                y + (BLK_THRS - y).powf(BLK_CLMP)
            }
        };
        let text_y = soft_clamp(text_y);
        let background_y = soft_clamp(background_y);
        if (background_y - text_y).abs() < DELTA_Y_MIN {
            return 0.0;
        }
        let output = if background_y > text_y {
            let sapc = (background_y.powf(NORM_BG) - text_y.powf(NORM_TXT)) * SCALE_BOW;
            if sapc < LO_CLIP {
                0.0
            } else {
                sapc - LO_BOW_OFFSET
            }
        } else {
            let sapc = (background_y.powf(REV_BG) - text_y.powf(REV_TXT)) * SCALE_WOB;
            if sapc > -LO_CLIP {
                0.0
            } else {
                sapc + LO_WOB_OFFSET
            }
        };
        output * 100.0
    }

    fn font_lookup(&self, contrast: f64) -> FontLookupRow {
        let contrast = contrast.abs();
        let mut row = [0.0; 10];
        row[0] = (contrast * 100.0).round() / 100.0;
        if !contrast.is_finite() {
            row[1..].fill(LOOKUP_PROHIBITED);
            return row;
        }
        let index = if contrast == 0.0 {
            1
        } else {
            ((contrast * 0.2) as usize).clamp(1, LOOKUP_ROWS - 1)
        };
        let score_adj = (contrast - FONT_MATRIX_ASCEND[index][0]) * -0.2;
        for col in 1..10 {
            let cell = FONT_MATRIX_ASCEND[index][col];
            row[col] = if cell > LOOKUP_SENTINEL_FLOOR {
                cell
            } else if contrast < 14.5 {
                LOOKUP_PROHIBITED
            } else if contrast < 29.5 {
                LOOKUP_NON_CONTENT_ONLY
            } else {
                let interpolated = cell + self.deltas[index][col] * score_adj;
                if cell > 24.0 {
                    interpolated.round()
                } else {
                    interpolated
                }
            };
        }
        row
    }
}

/// Lc between two colors, text first.
pub fn lc_between(primitives: &dyn ApcaPrimitives, text: Rgb, background: Rgb) -> f64 {
    primitives.apca_contrast(primitives.srgb_to_y(text), primitives.srgb_to_y(background))
}

fn relative_luminance(color: Rgb) -> f64 {
    let linear = |channel: u8| {
        let v = channel as f64 / 255.0;
        if v <= 0.039_28 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(color.r) + 0.7152 * linear(color.g) + 0.0722 * linear(color.b)
}

/// WCAG 2.x contrast ratio, always `>= 1.0`.
pub fn wcag_contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}
