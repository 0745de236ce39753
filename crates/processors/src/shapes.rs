//! Shapes join processor
//!
//! Square is the leading input. Each new Square sample picks up the `y` of
//! the Circle instance with the same handle as its `shapesize` and is written
//! to Triangle. Dispose/unregister samples on Square are passed to Triangle
//! unchanged and the instance is cleared from the Square cache.

use contracts::{
    CallbackResult, ContractError, Processor, Properties, Route, SampleState, Selector,
};
use tracing::trace;

pub const PLUGIN_NAME: &str = "shapes";

pub const SQUARE: &str = "Square";
pub const CIRCLE: &str = "Circle";
pub const TRIANGLE: &str = "Triangle";

#[derive(Debug, Default)]
pub struct ShapesProcessor;

impl Processor for ShapesProcessor {
    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult {
        let squares = route.require_input(SQUARE)?;
        let circles = route.require_input(CIRCLE)?;
        let triangles = route.require_output(TRIANGLE)?;

        let batch = squares.read(&Selector::all().with_sample_state(SampleState::NotRead))?;
        for shape in &batch {
            let instance = Selector::instance(shape.instance_handle());

            let Some(data) = shape.data.as_ref().filter(|_| shape.valid_data()) else {
                triangles.write(shape.into())?;
                squares.take(&instance)?;
                continue;
            };

            let mut joined = data.clone();
            let same_instance = circles.read(&instance)?;
            let size = same_instance
                .iter()
                .rev()
                .filter(|c| c.valid_data())
                .find_map(|c| c.get("y"));
            if let Some(size) = size {
                joined.insert("shapesize".to_string(), size.clone());
            }
            trace!(instance = ?shape.instance_handle(), joined = size.is_some(), "Square forwarded");
            triangles.write(joined.into())?;
        }
        Ok(())
    }
}

pub fn create_processor(
    _route: &dyn Route,
    _properties: &Properties,
) -> Result<Box<dyn Processor>, ContractError> {
    Ok(Box::new(ShapesProcessor))
}
