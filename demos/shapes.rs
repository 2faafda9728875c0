//! Builds shapes from a tree document, writes them to a binary stream and reads
//! them back. Run with `RUST_LOG=factoria=trace` to see the registry at work.

use factoria::{Factory, StreamObject, StreamSerializable, TreeObject, TreeSerializable, tree};

trait Shape: TreeSerializable + StreamSerializable + Send + Sync {}

#[derive(Default, TreeObject, StreamObject)]
#[factoria(class = "Point", id = 1)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Default, TreeObject, StreamObject)]
#[factoria(class = "Segment", id = 2)]
struct Segment {
    length: f64,
    #[factoria(optional, precision = 4)]
    width: f64,
}

impl Shape for Point {}
impl Shape for Segment {}

const SCENE: &str = r#"<?xml version="1.0"?>
<scene>
  <shapes>
    <v><Point><x>3</x><y>4</y></Point></v>
    <v><Point><x>-1</x><y>0</y></Point></v>
  </shapes>
</scene>"#;

fn main() -> factoria::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut factory: Factory<dyn Shape> = Factory::new();
    factory.register_builder("Point", || Box::new(Point::default()), true)?;
    factory.register_builder_by_id(1, || Box::new(Point::default()), true)?;
    factory.register_builder_by_id(2, || Box::new(Segment::default()), true)?;
    print!("{}", factory.list_builders());

    let doc = tree::parse_string(SCENE)?;
    let scene = doc
        .first_child_named("scene")
        .ok_or_else(|| factoria::FactoriaError::Parse("missing scene".into()))?;
    let shapes = factory.read_vector(scene, "shapes")?;

    let mut bytes = Vec::new();
    for shape in &shapes {
        println!("{}", shape.to_tagged_text());
        shape.write_tagged(&mut bytes)?;
    }
    Segment {
        length: 1.5,
        width: 0.25,
    }
    .write_tagged(&mut bytes)?;
    println!("wrote {} bytes", bytes.len());

    let mut source = bytes.as_slice();
    while !source.is_empty() {
        let (shape, read) = factory.read_tagged(&mut source)?;
        println!("read class {} ({read} bytes)", shape.class_id());
    }
    Ok(())
}
