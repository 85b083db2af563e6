use super::*;

fn close(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
}

fn unit_corners() -> [Point; 4] {
    [
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(0.0, 1.0),
    ]
}

fn sample_quads() -> Vec<Quad> {
    vec![
        Quad::from_corners([
            Point::new(100.0, 100.0),
            Point::new(700.0, 100.0),
            Point::new(700.0, 500.0),
            Point::new(100.0, 500.0),
        ]),
        Quad::from_corners([
            Point::new(300.0, 100.0),
            Point::new(500.0, 100.0),
            Point::new(700.0, 500.0),
            Point::new(100.0, 500.0),
        ]),
        Quad::from_corners([
            Point::new(12.5, 40.0),
            Point::new(310.0, 5.0),
            Point::new(290.0, 260.0),
            Point::new(30.0, 200.0),
        ]),
        Quad::from_corners([
            Point::new(0.0, 0.0),
            Point::new(10.0, 2.0),
            Point::new(12.0, 12.0),
            Point::new(2.0, 10.0),
        ]),
    ]
}

#[test]
fn unit_square_maps_onto_every_corner() {
    for q in sample_quads() {
        let m = unit_square_to_quad(&q).unwrap();
        for (u, c) in unit_corners().into_iter().zip(q.corners()) {
            assert!(close(m.transform_point(u), c), "{u:?} -> {c:?}");
        }
    }
}

#[test]
fn parallelogram_yields_affine_matrix() {
    let q = sample_quads().pop().unwrap();
    let m = unit_square_to_quad(&q).unwrap();
    assert_eq!(m.0[6], 0.0);
    assert_eq!(m.0[7], 0.0);
}

#[test]
fn invert_round_trips_and_rejects_singular() {
    let q = sample_quads()[2];
    let m = unit_square_to_quad(&q).unwrap();
    let inv = m.invert().unwrap();
    let id = m.multiply(&inv);
    for (a, b) in id.0.iter().zip(Matrix3::IDENTITY.0.iter()) {
        assert!((a - b).abs() < 1e-9);
    }

    let singular = Matrix3([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
    assert_eq!(singular.invert(), Err(Degenerate));
}

#[test]
fn quad_to_quad_maps_corners() {
    let qs = sample_quads();
    let m = quad_to_quad_matrix(&qs[0], &qs[2]).unwrap();
    for (s, d) in qs[0].corners().into_iter().zip(qs[2].corners()) {
        assert!(close(m.transform_point(s), d));
    }
}

#[test]
fn collinear_quad_is_degenerate_never_nan() {
    let good = sample_quads()[1];
    let collinear = Quad::from_corners([
        Point::new(0.0, 0.0),
        Point::new(100.0, 100.0),
        Point::new(200.0, 200.0),
        Point::new(0.0, 300.0),
    ]);
    assert_eq!(quad_to_quad_matrix(&collinear, &good), Err(Degenerate));
    assert_eq!(quad_to_quad_matrix(&good, &collinear), Err(Degenerate));
    assert_eq!(rect_to_quad_matrix(10.0, 10.0, &collinear), Err(Degenerate));
}

#[test]
fn rect_to_quad_round_trips_rect_corners() {
    let (w, h) = (600.0, 400.0);
    let rect = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    for q in sample_quads() {
        let m = rect_to_quad_matrix(w, h, &q).unwrap();
        let inv = m.invert().unwrap();
        for (r, c) in rect.into_iter().zip(q.corners()) {
            let mapped = m.transform_point(r);
            assert!(close(mapped, c));
            assert!(close(inv.transform_point(mapped), r));
        }
    }
    assert_eq!(
        rect_to_quad_matrix(0.0, 10.0, &sample_quads()[0]),
        Err(Degenerate)
    );
}

#[test]
fn zero_divisor_returns_input_point() {
    let m = Matrix3([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
    let p = Point::new(0.0, 5.0);
    assert_eq!(m.transform_point(p), p);
}
