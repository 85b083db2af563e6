use crate::scene::model::LayerId;

/// Crate-wide result alias.
pub type MockupResult<T> = Result<T, MockupError>;

/// Fatal errors surfaced by the importer and renderer.
///
/// Only conditions that make the whole stage unusable are errors; everything that degrades a
/// single layer or region is reported as a [`Warning`] instead.
#[derive(thiserror::Error, Debug)]
pub enum MockupError {
    /// The layered scene cannot be imported at all (no canvas, bad signature, truncated header).
    #[error("import error: {0}")]
    Import(String),

    /// An image could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The render pipeline could not proceed.
    #[error("render error: {0}")]
    Render(String),

    /// Caller-supplied input is invalid.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Error from a third-party boundary.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MockupError {
    /// Build an [`MockupError::Import`].
    pub fn import(msg: impl Into<String>) -> Self {
        Self::Import(msg.into())
    }

    /// Build an [`MockupError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build an [`MockupError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build an [`MockupError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`MockupError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Geometry that cannot be solved (collinear corners, singular matrix, zero divisor).
///
/// Returned as the error side of `Result` so every caller handles it where it happens.
#[derive(thiserror::Error, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[error("degenerate geometry")]
pub struct Degenerate;

/// Category of a non-fatal condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The imported scene contains no smart objects; it can only render as a static image.
    NoSmartObjects,
    /// Embedded pixel data of one layer (or mask) could not be read.
    LayerImageUnreadable,
    /// The scene uses a feature this crate does not render (recorded, then approximated).
    UnsupportedFeature,
    /// A quad or a per-triangle solve was degenerate; that draw was skipped.
    GeometryDegenerate,
    /// No design matched an insertion area; the area was left untouched.
    DesignUnresolved,
    /// A referenced image could not be decoded; that layer or area was skipped.
    DecodeFailure,
}

/// A non-fatal diagnostic collected alongside a successful result.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    /// Warning category.
    pub kind: WarningKind,
    /// Layer the warning refers to, when there is one.
    pub layer: Option<LayerId>,
    /// Human-readable detail.
    pub message: String,
}

impl Warning {
    /// Build a warning not tied to a layer.
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            layer: None,
            message: message.into(),
        }
    }

    /// Build a warning for one layer.
    pub fn for_layer(kind: WarningKind, layer: LayerId, message: impl Into<String>) -> Self {
        Self {
            kind,
            layer: Some(layer),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.layer {
            Some(id) => write!(f, "{:?} (layer {id}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Collector that logs every warning as it is recorded.
#[derive(Debug, Default)]
pub(crate) struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, layer = ?warning.layer, "{}", warning.message);
        self.items.push(warning);
    }

    pub(crate) fn extend(&mut self, items: impl IntoIterator<Item = Warning>) {
        for w in items {
            self.push(w);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
