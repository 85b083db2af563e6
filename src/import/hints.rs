use crate::scene::model::{RenderLayer, RenderLayerHints};

const BASE_TOKENS: [&str; 2] = ["base", "background"];
const OVERLAY_TOKENS: [&str; 6] = ["overlay", "hand", "shadow", "reflection", "light", "glass"];

/// Tag the first bottom-to-top pixel layer whose name suggests each sandwich role.
///
/// Groups and smart objects never qualify; base tokens are tested before overlay tokens.
pub(crate) fn detect_render_layers(layers: &[RenderLayer]) -> RenderLayerHints {
    fn walk(layers: &[RenderLayer], hints: &mut RenderLayerHints) {
        for layer in layers {
            match layer {
                RenderLayer::Group { children, .. } => walk(children, hints),
                RenderLayer::SmartObject { .. } => {}
                _ => {
                    let name = layer.name().to_lowercase();
                    let has = |tokens: &[&str]| tokens.iter().any(|t| name.contains(t));
                    if hints.base_layer_id.is_none() && has(&BASE_TOKENS) {
                        hints.base_layer_id = Some(layer.id());
                    } else if hints.overlay_layer_id.is_none() && has(&OVERLAY_TOKENS) {
                        hints.overlay_layer_id = Some(layer.id());
                    }
                }
            }
        }
    }

    let mut hints = RenderLayerHints::default();
    walk(layers, &mut hints);
    hints
}

#[cfg(test)]
#[path = "../../tests/unit/import/hints.rs"]
mod tests;
