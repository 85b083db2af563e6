use super::*;

#[test]
fn error_display_carries_stage_prefix() {
    assert_eq!(
        MockupError::import("bad signature").to_string(),
        "import error: bad signature"
    );
    assert_eq!(
        MockupError::validation("scale").to_string(),
        "validation error: scale"
    );
    assert_eq!(MockupError::decode("x").to_string(), "decode error: x");
    assert_eq!(MockupError::render("x").to_string(), "render error: x");
    assert_eq!(
        MockupError::serde("x").to_string(),
        "serialization error: x"
    );
}

#[test]
fn anyhow_errors_convert_transparently() {
    let err: MockupError = anyhow::anyhow!("boom").into();
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn warnings_collector_keeps_order() {
    let mut w = Warnings::new();
    w.push(Warning::new(WarningKind::NoSmartObjects, "none"));
    w.push(Warning::for_layer(
        WarningKind::DecodeFailure,
        LayerId(7),
        "bad",
    ));
    assert_eq!(w.len(), 2);
    let v = w.into_vec();
    assert_eq!(v[0].kind, WarningKind::NoSmartObjects);
    assert_eq!(v[1].layer, Some(LayerId(7)));
    assert_eq!(v[1].to_string(), "DecodeFailure (layer 7): bad");
}

#[test]
fn warning_kind_serializes_snake_case() {
    let s = serde_json::to_string(&WarningKind::GeometryDegenerate).unwrap();
    assert_eq!(s, "\"geometry_degenerate\"");
}

#[test]
fn warnings_collector_extends_after_pushes() {
    let mut w = Warnings::new();
    w.push(Warning::new(WarningKind::NoSmartObjects, "first"));
    w.extend([
        Warning::new(WarningKind::UnsupportedFeature, "second"),
        Warning::for_layer(WarningKind::LayerImageUnreadable, LayerId(3), "third"),
    ]);
    assert_eq!(w.len(), 3);
    let v = w.into_vec();
    assert_eq!(v[1].kind, WarningKind::UnsupportedFeature);
    assert_eq!(v[2].layer, Some(LayerId(3)));
}
