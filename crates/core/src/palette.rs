//! Palettes, their per-palette layout rules, and the built-in catalog.
//!
//! A [`Palette`] is a named pair of ordered light and dark color lists. Each
//! catalog entry pairs a palette with the [`PaletteRules`] that tune block
//! sizes and light/dark bias for it, so the probability tables are data
//! rather than branches on palette indices.

use serde::{Deserialize, Serialize};

use crate::color::Srgb;
use crate::composition::Mode;
use crate::error::GridError;
use crate::prng::Xorshift64;

/// How a palette answers color requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteKind {
    /// Colors of a single work: requests draw from the requested list.
    #[default]
    SingleWork,
    /// Pooled colors of several works: requests draw from the union.
    Merged,
}

/// A named pair of ordered light and dark color lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    name: String,
    #[serde(default)]
    kind: PaletteKind,
    light: Vec<Srgb>,
    dark: Vec<Srgb>,
}

impl Palette {
    /// Creates a palette. Either list may be empty; draws from an empty list
    /// fail with [`GridError::EmptyPalette`].
    pub fn new(
        name: impl Into<String>,
        kind: PaletteKind,
        light: Vec<Srgb>,
        dark: Vec<Srgb>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            light,
            dark,
        }
    }

    /// Parses light and dark hex lists.
    pub fn from_hex(
        name: impl Into<String>,
        kind: PaletteKind,
        light: &[&str],
        dark: &[&str],
    ) -> Result<Self, GridError> {
        let parse = |hexes: &[&str]| -> Result<Vec<Srgb>, GridError> {
            hexes.iter().map(|h| Srgb::from_hex(h)).collect()
        };
        Ok(Self::new(name, kind, parse(light)?, parse(dark)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PaletteKind {
        self.kind
    }

    pub fn light(&self) -> &[Srgb] {
        &self.light
    }

    pub fn dark(&self) -> &[Srgb] {
        &self.dark
    }

    /// The list backing `mode`.
    pub fn colors(&self, mode: Mode) -> &[Srgb] {
        match mode {
            Mode::Light => &self.light,
            Mode::Dark => &self.dark,
        }
    }

    /// Light colors followed by dark colors.
    pub fn all_colors(&self) -> Vec<Srgb> {
        self.light.iter().chain(self.dark.iter()).copied().collect()
    }

    /// Whether `color` belongs to the light list.
    pub fn is_light(&self, color: Srgb) -> bool {
        self.light.contains(&color)
    }

    /// Draws one color.
    ///
    /// A merged palette draws uniformly from the union of both lists; a
    /// single-work palette draws from the requested list, or flips an
    /// unbiased coin between the lists when `mode` is `None`. Requesting a
    /// mode whose list is empty is a configuration error for either kind.
    pub fn draw_color(&self, mode: Option<Mode>, rng: &mut Xorshift64) -> Result<Srgb, GridError> {
        if let Some(mode) = mode {
            if self.colors(mode).is_empty() {
                return Err(self.empty(mode));
            }
        }
        match (self.kind, mode) {
            (PaletteKind::Merged, _) => {
                let total = self.light.len() + self.dark.len();
                if total == 0 {
                    return Err(self.empty(Mode::Light));
                }
                let idx = rng.next_usize(total);
                Ok(if idx < self.light.len() {
                    self.light[idx]
                } else {
                    self.dark[idx - self.light.len()]
                })
            }
            (PaletteKind::SingleWork, Some(mode)) => self.pick(mode, rng),
            (PaletteKind::SingleWork, None) => {
                let mode = if rng.chance(0.5) {
                    Mode::Dark
                } else {
                    Mode::Light
                };
                self.pick(mode, rng)
            }
        }
    }

    fn pick(&self, mode: Mode, rng: &mut Xorshift64) -> Result<Srgb, GridError> {
        rng.pick(self.colors(mode))
            .copied()
            .ok_or_else(|| self.empty(mode))
    }

    fn empty(&self, mode: Mode) -> GridError {
        GridError::EmptyPalette {
            palette: self.name.clone(),
            mode,
        }
    }

    /// The lightest light color and the darkest dark color.
    fn extremes(&self) -> impl Iterator<Item = Srgb> {
        let lightest = by_luma_desc(self.light.clone()).into_iter().next();
        let darkest = by_luma_desc(self.dark.clone()).into_iter().last();
        lightest.into_iter().chain(darkest)
    }
}

/// Probability and light bias for one block size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockRule {
    /// Chance that a free origin becomes a block.
    pub probability: f64,
    /// Chance that a placed block is light rather than dark.
    pub light_probability: f64,
}

/// Layout tuning for one palette.
///
/// `None` block rules mean the palette is not in that size's allow-set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteRules {
    pub block3: Option<BlockRule>,
    pub block2: Option<BlockRule>,
    /// Chance an individually filled cell is light.
    pub cell_light_probability: f64,
    /// Chance a dynamic 3x3 attempt fires, if allowed.
    pub dynamic3: Option<f64>,
    /// Chance a dynamic 2x2 attempt fires, if allowed.
    pub dynamic2: Option<f64>,
    /// Chance a dynamic block is light.
    #[serde(default = "default_dynamic_light")]
    pub dynamic_light_probability: f64,
    /// Chance a light cell reuses an up/left neighbor's color.
    #[serde(default = "default_neighbor_reuse")]
    pub neighbor_reuse_probability: f64,
}

fn default_dynamic_light() -> f64 {
    0.5
}

fn default_neighbor_reuse() -> f64 {
    0.8
}

impl Default for PaletteRules {
    fn default() -> Self {
        Self {
            block3: None,
            block2: None,
            cell_light_probability: 0.5,
            dynamic3: None,
            dynamic2: None,
            dynamic_light_probability: default_dynamic_light(),
            neighbor_reuse_probability: default_neighbor_reuse(),
        }
    }
}

/// A catalog slot: a palette and its layout rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub palette: Palette,
    pub rules: PaletteRules,
}

/// The fixed, index-addressed set of palettes an operator can select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteCatalog {
    entries: Vec<PaletteEntry>,
}

const OBRA1_LIGHT: &[&str] = &[
    "#D9BA5F", "#D9BF3D", "#D98014", "#BF712C", "#c6a74c", "#e9d76c", "#c98313", "#b16a26",
    "#a64c12",
];
const OBRA1_DARK: &[&str] = &[
    "#402E1E", "#735A2D", "#6C733C", "#585936", "#26261C", "#592C1C", "#0D0000", "#5d4d2c",
    "#415034", "#0a0905", "#463923", "#363f29", "#372d1b", "#292e1e", "#140b08", "#17170f",
    "#32332c", "#242116", "#2c2113", "#43443c", "#1b2417", "#191504",
];
const OBRA2_LIGHT: &[&str] = &["#F2CB07", "#F2E750", "#F2DCB3", "#f3e395", "#f9f0c2"];
const OBRA2_DARK: &[&str] = &[
    "#025E73", "#0D0000", "#0b4b63", "#0c0f08", "#0e2e36", "#13481d", "#214001", "#260101",
    "#330c06", "#38270e", "#383632", "#400101", "#43370f", "#4a4a22", "#4f1e06", "#593B02",
    "#5f2f0b", "#62645b", "#6c6438", "#6d9695", "#6e855b", "#732C02", "#744622", "#948037",
    "#987560", "#9b4a38", "#9b7111", "#a91d18", "#da6b61", "#D93B3B", "#D93232",
];
const OBRA3_LIGHT: &[&str] = &[
    "#cdccd5", "#eae695", "#efb69d", "#a7dda5", "#d0bb9b", "#ec968d", "#e7cabe", "#edcfa3",
];
const OBRA3_DARK: &[&str] = &["#c04a34", "#53577a", "#965656", "#262828"];
const OBRA4_LIGHT: &[&str] = &["#BF9B30", "#BF9924", "#BF9E39", "#D91828"];
const OBRA4_DARK: &[&str] = &[
    "#401A1D", "#232226", "#592C30", "#3A3B40", "#733B2F", "#131226", "#594A2D",
];

impl PaletteCatalog {
    /// Creates a catalog. Requires at least one entry.
    pub fn new(entries: Vec<PaletteEntry>) -> Result<Self, GridError> {
        if entries.is_empty() {
            return Err(GridError::InvalidPalette(
                "catalog requires at least 1 palette".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// The five built-in palettes: the merged "Todas" palette
    /// at index 0, then one palette per work.
    pub fn builtin() -> Self {
        let single = |name: &str, light: &[&str], dark: &[&str]| {
            Palette::from_hex(name, PaletteKind::SingleWork, light, dark)
                .expect("built-in palette hex values are valid")
        };
        let merged_light: Vec<&str> = OBRA2_LIGHT.iter().chain(OBRA3_LIGHT).copied().collect();
        let merged_dark: Vec<&str> = OBRA1_DARK.iter().chain(OBRA4_DARK).copied().collect();
        let merged = Palette::from_hex("Todas", PaletteKind::Merged, &merged_light, &merged_dark)
            .expect("built-in palette hex values are valid");

        let entries = vec![
            PaletteEntry {
                palette: merged,
                rules: PaletteRules {
                    block3: Some(BlockRule {
                        probability: 0.06,
                        light_probability: 0.25,
                    }),
                    block2: Some(BlockRule {
                        probability: 0.06,
                        light_probability: 0.2,
                    }),
                    cell_light_probability: 0.5,
                    dynamic3: Some(0.10),
                    dynamic2: Some(0.30),
                    ..PaletteRules::default()
                },
            },
            PaletteEntry {
                palette: single("Obra 1", OBRA1_LIGHT, OBRA1_DARK),
                rules: PaletteRules {
                    cell_light_probability: 0.3,
                    ..PaletteRules::default()
                },
            },
            PaletteEntry {
                palette: single("Obra 2", OBRA2_LIGHT, OBRA2_DARK),
                rules: PaletteRules {
                    cell_light_probability: 0.7,
                    dynamic3: Some(0.10),
                    dynamic2: Some(0.30),
                    ..PaletteRules::default()
                },
            },
            PaletteEntry {
                palette: single("Obra 3", OBRA3_LIGHT, OBRA3_DARK),
                rules: PaletteRules {
                    block3: Some(BlockRule {
                        probability: 0.18,
                        light_probability: 0.25,
                    }),
                    block2: Some(BlockRule {
                        probability: 0.18,
                        light_probability: 0.2,
                    }),
                    cell_light_probability: 0.7,
                    dynamic2: Some(0.25),
                    ..PaletteRules::default()
                },
            },
            PaletteEntry {
                palette: single("Obra 4", OBRA4_LIGHT, OBRA4_DARK),
                rules: PaletteRules {
                    block2: Some(BlockRule {
                        probability: 0.18,
                        light_probability: 0.2,
                    }),
                    cell_light_probability: 0.3,
                    ..PaletteRules::default()
                },
            },
        ];
        Self { entries }
    }

    /// Parses a catalog from JSON (`{"entries": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, GridError> {
        let catalog: PaletteCatalog =
            serde_json::from_str(json).map_err(|e| GridError::InvalidPalette(e.to_string()))?;
        Self::new(catalog.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `index`.
    pub fn get(&self, index: usize) -> Result<&PaletteEntry, GridError> {
        self.entries.get(index).ok_or(GridError::UnknownPalette {
            index,
            len: self.entries.len(),
        })
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Palette names in index order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.palette.name()).collect()
    }

    /// Up to 8 representative colors for previewing the palette at `index`.
    ///
    /// Merged palettes show the lightest light and darkest dark color of every
    /// single-work palette in the catalog. Single-work palettes show their
    /// first 4 light and first 4 dark colors, each group ordered light to dark.
    pub fn preview_swatches(&self, index: usize) -> Result<Vec<Srgb>, GridError> {
        let palette = &self.get(index)?.palette;
        let swatches: Vec<Srgb> = match palette.kind() {
            PaletteKind::Merged => self
                .entries
                .iter()
                .filter(|e| e.palette.kind() == PaletteKind::SingleWork)
                .flat_map(|e| e.palette.extremes())
                .collect(),
            PaletteKind::SingleWork => {
                let light = by_luma_desc(palette.light.iter().take(4).copied().collect());
                let dark = by_luma_desc(palette.dark.iter().take(4).copied().collect());
                light.into_iter().chain(dark).collect()
            }
        };
        Ok(swatches.into_iter().take(8).collect())
    }
}

/// Sorts colors from lightest to darkest.
fn by_luma_desc(mut colors: Vec<Srgb>) -> Vec<Srgb> {
    colors.sort_by(|a, b| b.luma().total_cmp(&a.luma()));
    colors
}
