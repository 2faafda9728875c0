mod common;

use common::{Circle, Point, Polygon};
use factoria::{StreamSerializable, TreeSerializable};
use proptest::prelude::*;

fn point() -> impl Strategy<Value = Point> {
    (any::<i32>(), any::<i32>()).prop_map(|(x, y)| Point { x, y })
}

// Element text is trimmed on parse, so labels carry no outer whitespace.
fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9<>&'\" _.-]{0,24}".prop_map(|s| s.trim().to_owned())
}

fn circle() -> impl Strategy<Value = Circle> {
    (
        any::<f64>().prop_filter("finite", |r| r.is_finite()),
        label(),
    )
        .prop_map(|(radius, label)| Circle { radius, label })
}

fn polygon() -> impl Strategy<Value = Polygon> {
    (0usize..32).prop_flat_map(|n| {
        (
            proptest::collection::vec(any::<i32>(), n),
            proptest::collection::vec(any::<i32>(), n),
        )
            .prop_map(|(xs, ys)| Polygon { xs, ys })
    })
}

fn tree_round_trip<T: TreeSerializable + Default>(value: &T) -> T {
    let mut back = T::default();
    back.from_tagged_text(&value.to_tagged_text())
        .expect("decode tagged text");
    back
}

/// Returns the decoded value, the bytes written and the bytes consumed.
fn stream_round_trip<T: StreamSerializable + Default>(value: &T) -> (T, usize, usize) {
    let mut bytes = Vec::new();
    let written = value.encode_payload(&mut bytes).expect("encode");
    assert_eq!(written, bytes.len());

    let mut back = T::default();
    let mut source = bytes.as_slice();
    let read = back.decode_payload(&mut source).expect("decode");
    assert!(source.is_empty());
    (back, written, read)
}

proptest! {
    #[test]
    fn prop_point_round_trips(p in point()) {
        prop_assert_eq!(tree_round_trip(&p), p.clone());

        let (back, written, read) = stream_round_trip(&p);
        prop_assert_eq!(back, p);
        prop_assert_eq!(written, 8);
        prop_assert_eq!(read, written);
    }

    #[test]
    fn prop_circle_round_trips(c in circle()) {
        prop_assert_eq!(tree_round_trip(&c), c.clone());

        let (back, written, read) = stream_round_trip(&c);
        prop_assert_eq!(written, 8 + 4 + c.label.len());
        prop_assert_eq!(read, written);
        prop_assert_eq!(back, c);
    }

    #[test]
    fn prop_polygon_round_trips(poly in polygon()) {
        prop_assert_eq!(tree_round_trip(&poly), poly.clone());

        let (back, written, read) = stream_round_trip(&poly);
        prop_assert_eq!(written, 2 * (4 + 4 * poly.xs.len()));
        prop_assert_eq!(read, written);
        prop_assert_eq!(back, poly);
    }
}
