#![allow(dead_code)]

use std::any::Any;
use std::io::{Read, Write};

use factoria::codec::BinaryValue;
use factoria::tree::{self, Node};
use factoria::{Factory, Result, StreamObject, StreamSerializable, TreeObject, TreeSerializable};

/// The hierarchy every test factory builds.
pub trait Shape: TreeSerializable + StreamSerializable + Send + Sync + std::fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default, Clone, PartialEq, TreeObject, StreamObject)]
#[factoria(class = "Point", id = 1)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Implemented by hand to exercise the contracts without the derives.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub radius: f64,
    pub label: String,
}

impl Default for Circle {
    fn default() -> Self {
        Self {
            radius: 1.0,
            label: "unit".into(),
        }
    }
}

impl TreeSerializable for Circle {
    fn class_tag(&self) -> &str {
        "Circle"
    }

    fn encode_to(&self, out: &mut String) {
        tree::write("radius", &self.radius, out);
        tree::write("label", &self.label, out);
    }

    fn decode_from(&mut self, node: Node<'_>) -> Result<()> {
        self.radius = tree::read(node, "radius")?;
        tree::try_read(Some(node), "label", &mut self.label)?;
        Ok(())
    }
}

impl StreamSerializable for Circle {
    fn class_id(&self) -> i32 {
        2
    }

    fn encode_payload(&self, sink: &mut dyn Write) -> Result<usize> {
        let mut written = self.radius.write_binary(sink)?;
        written += (self.label.len() as i32).write_binary(sink)?;
        sink.write_all(self.label.as_bytes())?;
        Ok(written + self.label.len())
    }

    fn decode_payload(&mut self, source: &mut dyn Read) -> Result<usize> {
        let (radius, mut read) = f64::read_binary(source)?;
        let (len, bytes) = i32::read_binary(source)?;
        read += bytes;
        let mut label = vec![0u8; len as usize];
        source.read_exact(&mut label)?;
        self.radius = radius;
        self.label = String::from_utf8_lossy(&label).into_owned();
        Ok(read + label.len())
    }
}

#[derive(Debug, Default, Clone, PartialEq, TreeObject, StreamObject)]
#[factoria(class = "Polygon", id = 3)]
pub struct Polygon {
    #[factoria(vector)]
    pub xs: Vec<i32>,
    #[factoria(vector)]
    pub ys: Vec<i32>,
}

impl Shape for Point {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Shape for Circle {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Shape for Polygon {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A factory knowing the three shapes by name and by id.
pub fn shape_factory() -> Factory<dyn Shape> {
    let mut factory: Factory<dyn Shape> = Factory::new();
    factory
        .register_builder("Point", || Box::new(Point::default()), true)
        .expect("register Point");
    factory
        .register_builder("Circle", || Box::new(Circle::default()), true)
        .expect("register Circle");
    factory
        .register_builder("Polygon", || Box::new(Polygon::default()), true)
        .expect("register Polygon");
    factory
        .register_builder_by_id(1, || Box::new(Point::default()), true)
        .expect("register 1");
    factory
        .register_builder_by_id(2, || Box::new(Circle::default()), true)
        .expect("register 2");
    factory
        .register_builder_by_id(3, || Box::new(Polygon::default()), true)
        .expect("register 3");
    factory
}

pub fn downcast<S: 'static>(shape: &dyn Shape) -> &S {
    shape
        .as_any()
        .downcast_ref::<S>()
        .expect("shape has the expected concrete type")
}
