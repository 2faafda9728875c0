mod common;

use std::collections::BTreeMap;

use common::{Circle, Point, Polygon, Shape};
use factoria::serializable::{self, read_object, try_read_object};
use factoria::tree::{self, ReadOutcome};
use factoria::{FactoriaError, TextConfig, TreeObject, TreeSerializable};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, TreeObject)]
#[factoria(class = "Settings")]
struct Settings {
    name: String,
    #[factoria(optional)]
    retries: u32,
    #[factoria(precision = 3)]
    ratio: f64,
    #[factoria(rename = "on")]
    enabled: bool,
    #[factoria(vector, optional)]
    tags: Vec<String>,
    #[factoria(skip)]
    cache: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            retries: 4,
            ratio: 0.5,
            enabled: false,
            tags: vec!["keep".into()],
            cache: 0,
        }
    }
}

#[test]
fn test_tagged_text_round_trip() {
    let p = Point { x: 3, y: 4 };
    let text = p.to_tagged_text();
    assert_eq!(text, "<Point><x>3</x><y>4</y></Point>");

    let mut back = Point::default();
    back.from_tagged_text(&text).expect("decode");
    assert_eq!(back, p);
}

#[test]
fn test_from_tagged_text_reports_missing_field() {
    let mut p = Point::default();
    let err = p.from_tagged_text("<Point><x>3</x></Point>").unwrap_err();
    assert!(matches!(err, FactoriaError::Parse(_)), "{err}");
}

#[test]
fn test_derived_attributes() {
    let settings = Settings {
        name: "db".into(),
        retries: 3,
        ratio: 0.125,
        enabled: true,
        tags: vec!["a".into(), "b".into()],
        cache: 9,
    };
    assert_eq!(
        settings.to_tagged_text(),
        "<Settings><name>db</name><retries>3</retries><ratio>0.125</ratio>\
         <on>true</on><tags><v>a</v><v>b</v></tags></Settings>"
    );

    let mut back = Settings::default();
    back.from_tagged_text(&settings.to_tagged_text()).expect("decode");
    assert_eq!(back.tags, settings.tags);
    assert_eq!(back.retries, 3);
    assert_eq!(back.cache, 0);
}

#[test]
fn test_derived_optional_fields_keep_defaults() {
    let mut s = Settings::default();
    s.from_tagged_text("<Settings><name>x</name><ratio>1</ratio><on>false</on></Settings>")
        .expect("decode");
    assert_eq!(s.name, "x");
    assert_eq!(s.retries, 4);
    assert_eq!(s.tags, vec!["keep".to_string()]);
    assert_eq!(s.ratio, 1.0);
}

#[test]
fn test_derived_vector_fields() {
    let poly = Polygon {
        xs: vec![0, 4, 4],
        ys: vec![0, 0, 3],
    };
    let text = poly.to_tagged_text();
    assert_eq!(
        text,
        "<Polygon><xs><v>0</v><v>4</v><v>4</v></xs><ys><v>0</v><v>0</v><v>3</v></ys></Polygon>"
    );

    let mut back = Polygon::default();
    back.from_tagged_text(&text).expect("decode");
    assert_eq!(back, poly);
}

#[test]
fn test_hand_written_optional_field() {
    let mut c = Circle::default();
    c.from_tagged_text("<Circle><radius>2.5</radius></Circle>").expect("decode");
    assert_eq!(c.radius, 2.5);
    assert_eq!(c.label, "unit");

    c.from_tagged_text("<Circle><radius>1</radius><label>big &amp; round</label></Circle>")
        .expect("decode");
    assert_eq!(c.label, "big & round");
}

#[test]
fn test_pretty_text() {
    let pretty = Point { x: 3, y: 4 }.to_pretty_text().expect("pretty");
    assert_eq!(pretty, "<Point>\n  <x>3</x>\n  <y>4</y>\n</Point>");
}

#[test]
fn test_save_and_load_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("point.xml");

    Point { x: -1, y: 12 }.save_to_file(&path).expect("save");
    let raw = std::fs::read_to_string(&path).expect("raw");
    assert!(raw.starts_with("<?xml"));

    let mut back = Point::default();
    back.load_from_file(&path).expect("load");
    assert_eq!(back, Point { x: -1, y: 12 });

    // the top-level element must carry the class tag
    let mut circle = Circle::default();
    let err = circle.load_from_file(&path).unwrap_err();
    assert!(matches!(err, FactoriaError::Parse(_)));
    assert_eq!(circle, Circle::default());
}

#[test]
fn test_save_with_pretty_config() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("poly.xml");

    let poly = Polygon {
        xs: vec![1],
        ys: vec![2],
    };
    poly.save_to_file_with(&path, &TextConfig::pretty()).expect("save");
    let raw = std::fs::read_to_string(&path).expect("raw");
    assert!(raw.contains("\n  <xs>\n    <v>1</v>\n  </xs>\n"), "{raw}");

    let mut back = Polygon::default();
    back.load_from_file(&path).expect("load");
    assert_eq!(back, poly);
}

#[test]
fn test_default_file_uses_class_tag() {
    let dir = tempdir().expect("tempdir");
    let previous = std::env::current_dir().expect("cwd");
    std::env::set_current_dir(dir.path()).expect("chdir");

    let result = (|| -> factoria::Result<Point> {
        Point { x: 8, y: 9 }.save_default_file()?;
        let mut back = Point::default();
        back.load_default_file()?;
        Ok(back)
    })();
    let exists = dir.path().join("Point.xml").exists();

    std::env::set_current_dir(previous).expect("restore cwd");
    assert_eq!(result.expect("default file"), Point { x: 8, y: 9 });
    assert!(exists);
}

#[test]
fn test_read_object_of_known_type() {
    let mut out = String::from("<root>");
    serializable::write_object("origin", &Point { x: 1, y: 2 }, &mut out);
    out.push_str("</root>");
    assert_eq!(out, "<root><origin><Point><x>1</x><y>2</y></Point></origin></root>");

    let doc = tree::parse_string(&out).expect("parse");
    let root = doc.first_child().expect("root");

    let mut p = Point::default();
    read_object(root, "origin", &mut p).expect("read");
    assert_eq!(p, Point { x: 1, y: 2 });

    let mut c = Circle::default();
    let err = read_object(root, "origin", &mut c).unwrap_err();
    assert!(matches!(err, FactoriaError::MalformedNode(_)), "{err}");
}

#[test]
fn test_try_read_object_is_all_or_nothing() {
    let text = "<root><origin><Point><x>1</x><y>bad</y></Point></origin></root>";
    let doc = tree::parse_string(text).expect("parse");
    let root = doc.first_child().expect("root");

    let mut slot = Point { x: 7, y: 7 };
    assert!(try_read_object(Some(root), "origin", &mut slot).is_err());
    assert_eq!(slot, Point { x: 7, y: 7 });

    // a plain decode stops halfway
    let mut partial = Point { x: 7, y: 7 };
    assert!(read_object(root, "origin", &mut partial).is_err());
    assert_eq!(partial.x, 1);

    let outcome = try_read_object(Some(root), "elsewhere", &mut slot).expect("absent");
    assert_eq!(outcome, ReadOutcome::Absent);
    let outcome = try_read_object(None, "origin", &mut slot).expect("no node");
    assert_eq!(outcome, ReadOutcome::Absent);
    assert_eq!(slot, Point { x: 7, y: 7 });
}

#[test]
fn test_object_collections_text_layout() {
    let mut out = String::new();
    serializable::write_object_vector("pts", &[Point { x: 1, y: 1 }, Point { x: 2, y: 2 }], &mut out);
    assert_eq!(
        out,
        "<pts><v><Point><x>1</x><y>1</y></Point></v><v><Point><x>2</x><y>2</y></Point></v></pts>"
    );

    let mut shapes: BTreeMap<String, Box<dyn Shape>> = BTreeMap::new();
    shapes.insert("b".into(), Box::new(Circle::default()));
    shapes.insert("a".into(), Box::new(Point { x: 0, y: 5 }));

    out.clear();
    serializable::write_object_map("m", &shapes, &mut out);
    assert_eq!(
        out,
        "<m><entry><key>a</key><val><Point><x>0</x><y>5</y></Point></val></entry>\
         <entry><key>b</key><val><Circle><radius>1</radius><label>unit</label></Circle></val></entry></m>"
    );
}
