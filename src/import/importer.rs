use crate::foundation::core::{Bounds, Canvas};
use crate::foundation::error::{MockupResult, Warning, WarningKind, Warnings};
use crate::import::channels::merged_image;
use crate::import::hints::detect_render_layers;
use crate::import::psd::parse_document;
use crate::import::tree::build_tree;
use crate::scene::model::{LayerCommon, LayerId, MockupTemplate, RenderLayer};
use crate::scene::snapshot::RasterSnapshots;

/// Options for [`parse_layered_scene`].
#[derive(Clone, Debug)]
pub struct ImportOpts {
    /// Template name.
    pub name: String,
    /// Template category.
    pub category: String,
    /// Decode per-layer pixels. Masks are always decoded.
    pub extract_raster_snapshots: bool,
}

impl Default for ImportOpts {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            category: String::new(),
            extract_raster_snapshots: true,
        }
    }
}

impl ImportOpts {
    /// Set the template name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the template category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Toggle per-layer pixel extraction.
    pub fn with_extract_raster_snapshots(mut self, extract: bool) -> Self {
        self.extract_raster_snapshots = extract;
        self
    }
}

/// Outcome of [`parse_layered_scene`].
#[derive(Clone, Debug)]
pub struct ImportResult {
    /// `false` only when the scene has no usable canvas.
    pub success: bool,
    /// Imported template.
    pub template: Option<MockupTemplate>,
    /// Decoded layer and mask pixels.
    pub raster_snapshots: Option<RasterSnapshots>,
    /// Non-fatal conditions.
    pub warnings: Vec<Warning>,
    /// Fatal error messages (non-empty iff `success` is false).
    pub errors: Vec<String>,
}

/// Import a layered scene file into a template plus raster snapshots.
#[tracing::instrument(skip(bytes, opts), fields(bytes = bytes.len(), name = %opts.name))]
pub fn parse_layered_scene(bytes: &[u8], opts: &ImportOpts) -> ImportResult {
    let mut warnings = Warnings::new();
    match import_scene(bytes, opts, &mut warnings) {
        Ok((template, snapshots)) => {
            tracing::debug!(
                layers = template.layers.len(),
                insert_areas = template.insert_areas.len(),
                snapshots = snapshots.layers.len(),
                warnings = warnings.len(),
                "scene imported"
            );
            ImportResult {
                success: true,
                template: Some(template),
                raster_snapshots: Some(snapshots),
                warnings: warnings.into_vec(),
                errors: Vec::new(),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "scene import failed");
            ImportResult {
                success: false,
                template: None,
                raster_snapshots: None,
                warnings: warnings.into_vec(),
                errors: vec![e.to_string()],
            }
        }
    }
}

fn import_scene(
    bytes: &[u8],
    opts: &ImportOpts,
    warnings: &mut Warnings,
) -> MockupResult<(MockupTemplate, RasterSnapshots)> {
    let (doc, doc_warnings) = parse_document(bytes)?;
    warnings.extend(doc_warnings);
    let canvas = Canvas::new(doc.header.width, doc.header.height)?;

    let mut snapshots = RasterSnapshots::new();
    let mut layers = build_tree(
        &doc.layers,
        &doc.header,
        opts.extract_raster_snapshots,
        &mut snapshots,
        warnings,
    );

    if layers.is_empty() {
        let id = LayerId(1);
        layers.push(RenderLayer::RasterImage {
            common: LayerCommon::new(
                id,
                "Background",
                Bounds::new(0, 0, canvas.width as i32, canvas.height as i32),
                0,
            ),
        });
        if opts.extract_raster_snapshots {
            match doc.merged {
                Some(data) if doc.header.pixels_supported() => {
                    match merged_image(data, &doc.header) {
                        Ok(img) => {
                            snapshots.layers.insert(id, img);
                        }
                        Err(e) => warnings.push(Warning::for_layer(
                            WarningKind::LayerImageUnreadable,
                            id,
                            format!("merged image unreadable: {e}"),
                        )),
                    }
                }
                Some(_) => {}
                None => warnings.push(Warning::for_layer(
                    WarningKind::LayerImageUnreadable,
                    id,
                    "scene has neither layers nor a merged image",
                )),
            }
        }
    }

    let hints = detect_render_layers(&layers);
    let template = MockupTemplate::new(opts.name.clone(), opts.category.clone(), canvas, layers)
        .with_render_layers(hints);
    if template.insert_areas.is_empty() {
        warnings.push(Warning::new(
            WarningKind::NoSmartObjects,
            "scene has no smart objects; it renders as a static image",
        ));
    }
    Ok((template, snapshots))
}

#[cfg(test)]
#[path = "../../tests/unit/import/importer.rs"]
mod tests;
