//! Pipeline configuration.
//!
//! Everything here is plain data loaded once per invocation and passed by
//! reference into the components that need it. The class table in
//! particular is never global: the reader, writer, checker and board rule
//! all take a `&ClassTable`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::BoardlabelError;
use crate::ir::ClassId;

/// Class names of this deployment, in class-id order.
pub const DEFAULT_CLASSES: [&str; 4] = [
    "fiducial-marker",
    "missing-fastener",
    "present-fastener",
    "board-body",
];

/// Image extensions recognized when scanning image stores.
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Smallest box area, in square pixels, that survives validation.
pub const DEFAULT_MIN_BOX_AREA: f64 = 4.0;

/// Seed for ratio-based split assignment.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Top-level configuration file layout.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Class names; the position of a name is its class id.
    pub classes: Vec<String>,
    /// Image extensions, without the leading dot. Matched case-insensitively.
    pub image_extensions: Vec<String>,
    /// Minimum box area in square pixels.
    pub min_box_area: f64,
    pub split: SplitConfig,
    pub board_rule: BoardRuleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classes: DEFAULT_CLASSES.iter().map(|name| name.to_string()).collect(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            min_box_area: DEFAULT_MIN_BOX_AREA,
            split: SplitConfig::default(),
            board_rule: BoardRuleConfig::default(),
        }
    }
}

/// Default ratios and seed for random split assignment.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub seed: u64,
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SPLIT_SEED,
            train: 0.7,
            val: 0.15,
            test: 0.15,
        }
    }
}

/// Class names the normal/abnormal rule keys on.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardRuleConfig {
    pub missing_class: String,
    pub board_class: String,
}

impl Default for BoardRuleConfig {
    fn default() -> Self {
        Self {
            missing_class: DEFAULT_CLASSES[1].to_string(),
            board_class: DEFAULT_CLASSES[3].to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config file. Missing keys take their default values.
    pub fn load(path: &Path) -> Result<Self, BoardlabelError> {
        let raw = fs::read_to_string(path).map_err(BoardlabelError::Io)?;
        let config: PipelineConfig =
            serde_yaml::from_str(&raw).map_err(|source| BoardlabelError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the compiled-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, BoardlabelError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), BoardlabelError> {
        ClassTable::new(self.classes.clone())?;

        if self.image_extensions.is_empty() {
            return Err(BoardlabelError::ConfigInvalid {
                message: "image_extensions must not be empty".to_string(),
            });
        }
        if let Some(ext) = self
            .image_extensions
            .iter()
            .find(|ext| ext.trim().is_empty() || ext.starts_with('.'))
        {
            return Err(BoardlabelError::ConfigInvalid {
                message: format!(
                    "image extension '{ext}' must be non-empty and given without a leading dot"
                ),
            });
        }

        if !self.min_box_area.is_finite() || self.min_box_area < 0.0 {
            return Err(BoardlabelError::ConfigInvalid {
                message: format!(
                    "min_box_area must be a finite non-negative number, got {}",
                    self.min_box_area
                ),
            });
        }

        Ok(())
    }

    /// Build the class table for this config.
    pub fn class_table(&self) -> Result<ClassTable, BoardlabelError> {
        ClassTable::new(self.classes.clone())
    }
}

/// Closed mapping between class ids and class names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
}

impl ClassTable {
    /// Creates a table from names in id order. Names must be non-empty
    /// and unique.
    pub fn new(names: Vec<String>) -> Result<Self, BoardlabelError> {
        if names.is_empty() {
            return Err(BoardlabelError::ConfigInvalid {
                message: "class table must contain at least one class".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (idx, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(BoardlabelError::ConfigInvalid {
                    message: format!("class {idx} has an empty name"),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(BoardlabelError::ConfigInvalid {
                    message: format!("class name '{name}' appears more than once"),
                });
            }
        }

        Ok(Self { names })
    }

    /// Number of classes in the table.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve a class name to its id. Exact match only.
    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|idx| ClassId::new(idx as u32))
    }

    /// Resolve an id to its name, if the id is a member of the table.
    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Check a raw integer (as read from a label line) for membership.
    pub fn lookup_raw(&self, raw: i64) -> Option<ClassId> {
        u32::try_from(raw)
            .ok()
            .map(ClassId::new)
            .filter(|id| id.index() < self.names.len())
    }

    /// Resolve a name, failing with a descriptive error.
    pub fn require(&self, name: &str) -> Result<ClassId, BoardlabelError> {
        self.id_of(name).ok_or_else(|| BoardlabelError::UnknownClass {
            name: name.to_string(),
            known: self.names.join(", "),
        })
    }

    /// Iterate `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (ClassId::new(idx as u32), name.as_str()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self {
            names: DEFAULT_CLASSES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// Returns true if `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    extensions
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}
