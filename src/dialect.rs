//! Per-file-kind rules for reading and writing card files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File kinds understood by the transcoder.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Project descriptor (`.prj`), the root of a model.
    Project,
    /// Index map to parameter mapping table (`.cmt`).
    MappingTable,
    /// Channel input / stream network file (`.cif`).
    StreamNetwork,
    /// Any other card-structured file. Never carries replacement parameters.
    #[default]
    Generic,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "prj" => FileKind::Project,
            "cmt" => FileKind::MappingTable,
            "cif" => FileKind::StreamNetwork,
            _ => FileKind::Generic,
        }
    }

    /// Built-in rules for this kind.
    pub fn rules(&self) -> &'static DialectRules {
        match self {
            FileKind::Project => &PROJECT,
            FileKind::MappingTable => &MAPPING_TABLE,
            FileKind::StreamNetwork => &STREAM_NETWORK,
            FileKind::Generic => &GENERIC,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Project => write!(f, "project"),
            FileKind::MappingTable => write!(f, "mapping-table"),
            FileKind::StreamNetwork => write!(f, "stream-network"),
            FileKind::Generic => write!(f, "generic"),
        }
    }
}

/// How new cards line their values up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Pad the name so the value starts at this column, with at least two spaces.
    Column(usize),
    /// One space between name and value.
    Single,
}

impl Alignment {
    pub fn spacing(&self, name: &str) -> String {
        match self {
            Alignment::Column(col) => " ".repeat(col.saturating_sub(name.len()).max(2)),
            Alignment::Single => " ".to_string(),
        }
    }
}

/// What a card that names another file points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// A card file that is parsed along with the project.
    Cards(FileKind),
    /// The replacement parameters file.
    ReplaceParams,
    /// The replacement values file.
    ReplaceVals,
    /// A file the transcoder does not parse; it is only checked and copied.
    Opaque,
}

#[derive(Debug, Clone, Copy)]
pub struct IncludeRule {
    pub card: &'static str,
    pub kind: IncludeKind,
}

/// Capabilities shared by every file kind.
pub trait CardDialect {
    fn kind(&self) -> FileKind;

    /// Whether values in this kind of file may be replacement references.
    fn supports_replacement(&self) -> bool;

    /// Cards whose value is an item count for a following block.
    fn is_count_card(&self, name: &str) -> bool;

    /// Cards whose values are always literal, e.g. signed offsets or identifiers.
    fn is_literal_card(&self, name: &str) -> bool;

    /// `#`-prefixed names that are cards rather than comments.
    fn is_hash_card(&self, name: &str) -> bool;

    fn include(&self, name: &str) -> Option<IncludeKind>;

    /// Cards holding the absolute project location; written back as `""`.
    fn is_location_card(&self, name: &str) -> bool;

    fn alignment(&self) -> Alignment;

    /// Whether path values are made relative and renamed on write.
    fn rewrites_paths(&self) -> bool;

    fn is_replaceable(&self, name: &str) -> bool {
        self.supports_replacement() && !self.is_count_card(name) && !self.is_literal_card(name)
    }

    fn is_comment(&self, line: &str) -> bool {
        let token = line.split_whitespace().next().unwrap_or("");
        token.starts_with('#') && !self.is_hash_card(token)
    }
}

/// Static rule table for one file kind.
#[derive(Debug)]
pub struct DialectRules {
    pub kind: FileKind,
    pub replacement: bool,
    pub count_cards: &'static [&'static str],
    pub literal_cards: &'static [&'static str],
    pub hash_cards: &'static [&'static str],
    pub location_cards: &'static [&'static str],
    pub includes: &'static [IncludeRule],
    pub alignment: Alignment,
    pub rewrite_paths: bool,
}

fn listed(list: &[&str], name: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(name))
}

impl CardDialect for DialectRules {
    fn kind(&self) -> FileKind {
        self.kind
    }

    fn supports_replacement(&self) -> bool {
        self.replacement
    }

    fn is_count_card(&self, name: &str) -> bool {
        listed(self.count_cards, name)
    }

    fn is_literal_card(&self, name: &str) -> bool {
        listed(self.literal_cards, name)
    }

    fn is_hash_card(&self, name: &str) -> bool {
        listed(self.hash_cards, name)
    }

    fn include(&self, name: &str) -> Option<IncludeKind> {
        self.includes
            .iter()
            .find(|rule| rule.card.eq_ignore_ascii_case(name))
            .map(|rule| rule.kind)
    }

    fn is_location_card(&self, name: &str) -> bool {
        listed(self.location_cards, name)
    }

    fn alignment(&self) -> Alignment {
        self.alignment
    }

    fn rewrites_paths(&self) -> bool {
        self.rewrite_paths
    }
}

/// Built-in rules extended with settings-provided count cards.
#[derive(Debug, Clone)]
pub struct ConfiguredDialect {
    base: &'static DialectRules,
    extra_count_cards: Vec<String>,
}

impl ConfiguredDialect {
    pub fn new(kind: FileKind, extra_count_cards: Vec<String>) -> Self {
        Self {
            base: kind.rules(),
            extra_count_cards,
        }
    }
}

impl From<FileKind> for ConfiguredDialect {
    fn from(kind: FileKind) -> Self {
        Self::new(kind, Vec::new())
    }
}

impl CardDialect for ConfiguredDialect {
    fn kind(&self) -> FileKind {
        self.base.kind
    }

    fn supports_replacement(&self) -> bool {
        self.base.replacement
    }

    fn is_count_card(&self, name: &str) -> bool {
        self.base.is_count_card(name)
            || self
                .extra_count_cards
                .iter()
                .any(|card| card.eq_ignore_ascii_case(name))
    }

    fn is_literal_card(&self, name: &str) -> bool {
        self.base.is_literal_card(name)
    }

    fn is_hash_card(&self, name: &str) -> bool {
        self.base.is_hash_card(name)
    }

    fn include(&self, name: &str) -> Option<IncludeKind> {
        self.base.include(name)
    }

    fn is_location_card(&self, name: &str) -> bool {
        self.base.is_location_card(name)
    }

    fn alignment(&self) -> Alignment {
        self.base.alignment
    }

    fn rewrites_paths(&self) -> bool {
        self.base.rewrite_paths
    }
}

macro_rules! inc {
    ($card:expr, $kind:expr) => {
        IncludeRule {
            card: $card,
            kind: $kind,
        }
    };
}

static PROJECT_INCLUDES: &[IncludeRule] = &[
    inc!("REPLACE_PARAMS", IncludeKind::ReplaceParams),
    inc!("REPLACE_VALS", IncludeKind::ReplaceVals),
    inc!("MAPPING_TABLE", IncludeKind::Cards(FileKind::MappingTable)),
    inc!("CHANNEL_INPUT", IncludeKind::Cards(FileKind::StreamNetwork)),
    inc!("#PROJECTION_FILE", IncludeKind::Opaque),
    inc!("#CHANNEL_POINT_INPUT_WMS", IncludeKind::Opaque),
    inc!("ST_MAPPING_TABLE", IncludeKind::Opaque),
    inc!("PRECIP_FILE", IncludeKind::Opaque),
    inc!("STREAM_CELL", IncludeKind::Opaque),
    inc!("SECTION_TABLE", IncludeKind::Opaque),
    inc!("SOIL_LAYER_INPUT_FILE", IncludeKind::Opaque),
    inc!("IN_THETA_LOCATION", IncludeKind::Opaque),
    inc!("IN_HYD_LOCATION", IncludeKind::Opaque),
    inc!("IN_SED_LOC", IncludeKind::Opaque),
    inc!("IN_GWFLUX_LOCATION", IncludeKind::Opaque),
    inc!("HMET_WES", IncludeKind::Opaque),
    inc!("HMET_ASCII", IncludeKind::Opaque),
    inc!("NWSRFS_ELEV_SNOW", IncludeKind::Opaque),
    inc!("HMET_OROG_GAGES", IncludeKind::Opaque),
    inc!("GW_FLUXBOUNDTABLE", IncludeKind::Opaque),
    inc!("STORM_SEWER", IncludeKind::Opaque),
    inc!("GRID_PIPE", IncludeKind::Opaque),
    inc!("OVERLAND_DEPTH_LOCATION", IncludeKind::Opaque),
    inc!("OVERLAND_WSE_LOCATION", IncludeKind::Opaque),
    inc!("OUT_WELL_LOCATION", IncludeKind::Opaque),
    inc!("ELEVATION", IncludeKind::Opaque),
    inc!("WATERSHED_MASK", IncludeKind::Opaque),
    inc!("ROUGHNESS", IncludeKind::Opaque),
    inc!("RETEN_DEPTH", IncludeKind::Opaque),
    inc!("STORAGE_CAPACITY", IncludeKind::Opaque),
    inc!("INTERCEPTION_COEFF", IncludeKind::Opaque),
    inc!("CONDUCTIVITY", IncludeKind::Opaque),
    inc!("CAPILLARY", IncludeKind::Opaque),
    inc!("POROSITY", IncludeKind::Opaque),
    inc!("MOISTURE", IncludeKind::Opaque),
    inc!("PORE_INDEX", IncludeKind::Opaque),
    inc!("RESIDUAL_SAT", IncludeKind::Opaque),
    inc!("FIELD_CAPACITY", IncludeKind::Opaque),
    inc!("SOIL_TYPE_MAP", IncludeKind::Opaque),
    inc!("WATER_TABLE", IncludeKind::Opaque),
    inc!("ALBEDO", IncludeKind::Opaque),
    inc!("WILTING_POINT", IncludeKind::Opaque),
    inc!("TCOEFF", IncludeKind::Opaque),
    inc!("VHEIGHT", IncludeKind::Opaque),
    inc!("CANOPY", IncludeKind::Opaque),
    inc!("INIT_SWE_DEPTH", IncludeKind::Opaque),
    inc!("AQUIFER_BOTTOM", IncludeKind::Opaque),
    inc!("GW_BOUNDFILE", IncludeKind::Opaque),
    inc!("GW_POROSITY_MAP", IncludeKind::Opaque),
    inc!("GW_HYCOND_MAP", IncludeKind::Opaque),
    inc!("EMBANKMENT", IncludeKind::Opaque),
    inc!("DIKE_MASK", IncludeKind::Opaque),
    inc!("WETLAND", IncludeKind::Opaque),
    inc!("CONTAM_MAP", IncludeKind::Opaque),
];

static MAPPING_TABLE_INCLUDES: &[IncludeRule] = &[inc!("INDEX_MAP", IncludeKind::Opaque)];

pub static PROJECT: DialectRules = DialectRules {
    kind: FileKind::Project,
    replacement: true,
    count_cards: &[],
    literal_cards: &["GMT", "REPLACE_LINE"],
    hash_cards: &[
        "#INDEXGRID_GUID",
        "#PROJECTION_FILE",
        "#LandSoil",
        "#CHANNEL_POINT_INPUT_WMS",
        "#GSSHAPY_EVENT_YML",
    ],
    location_cards: &["PROJECT_PATH"],
    includes: PROJECT_INCLUDES,
    alignment: Alignment::Column(25),
    rewrite_paths: true,
};

pub static MAPPING_TABLE: DialectRules = DialectRules {
    kind: FileKind::MappingTable,
    replacement: true,
    count_cards: &["NUM_IDS", "NUM_SED", "NUM_CONTAM"],
    literal_cards: &[],
    hash_cards: &[],
    location_cards: &[],
    includes: MAPPING_TABLE_INCLUDES,
    alignment: Alignment::Single,
    rewrite_paths: true,
};

pub static STREAM_NETWORK: DialectRules = DialectRules {
    kind: FileKind::StreamNetwork,
    replacement: true,
    count_cards: &[
        "LINKS",
        "MAXNODES",
        "NODES",
        "NUMPTS",
        "RES_NUMPTS",
        "NUMSTRUCTS",
        "NUM_INTERP",
    ],
    literal_cards: &["LINK", "NODE", "CONNECT"],
    hash_cards: &[],
    location_cards: &[],
    includes: &[],
    alignment: Alignment::Single,
    rewrite_paths: false,
};

pub static GENERIC: DialectRules = DialectRules {
    kind: FileKind::Generic,
    replacement: false,
    count_cards: &[],
    literal_cards: &[],
    hash_cards: &[],
    location_cards: &[],
    includes: &[],
    alignment: Alignment::Single,
    rewrite_paths: false,
};
