//! Declarative image-composition graphs.
//!
//! The imagery service evaluates expression graphs remotely; nothing
//! here computes pixels. Every builder call produces a new node, so
//! graphs are cheap immutable values that serialize into the vendor's
//! JSON expression shape.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// One node of an expression graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    /// A literal value.
    Constant {
        /// The literal, encoded as vendor JSON.
        #[serde(rename = "constantValue")]
        value: Value,
    },
    /// A reference to an argument of the enclosing function definition.
    Argument {
        /// Name of the referenced argument.
        #[serde(rename = "argumentReference")]
        reference: String,
    },
    /// An anonymous server-side function (used by collection mapping).
    Function {
        /// The function definition.
        #[serde(rename = "functionDefinitionValue")]
        definition: FunctionDefinition,
    },
    /// A call of a named server-side operation.
    Invocation {
        /// The invocation.
        #[serde(rename = "functionInvocationValue")]
        invocation: Invocation,
    },
}

/// An anonymous function mapped over a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    /// Names of the function's arguments.
    pub argument_names: Vec<String>,
    /// The function body.
    pub body: Box<Expr>,
}

/// A call of a named server-side operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Name of the operation.
    pub function_name: String,
    /// Named arguments, each itself an expression node.
    pub arguments: BTreeMap<String, Expr>,
}

impl Expr {
    /// Creates a literal node.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant {
            value: value.into(),
        }
    }

    /// Creates an argument reference node.
    pub fn argument(name: impl Into<String>) -> Self {
        Self::Argument {
            reference: name.into(),
        }
    }

    /// Creates an anonymous function node.
    pub fn function(argument_names: &[&str], body: Expr) -> Self {
        Self::Function {
            definition: FunctionDefinition {
                argument_names: argument_names.iter().map(|name| (*name).to_owned()).collect(),
                body: Box::new(body),
            },
        }
    }

    /// Creates an invocation node.
    pub fn invoke(
        function_name: impl Into<String>,
        arguments: impl IntoIterator<Item = (&'static str, Expr)>,
    ) -> Self {
        Self::Invocation {
            invocation: Invocation {
                function_name: function_name.into(),
                arguments: arguments
                    .into_iter()
                    .map(|(name, expr)| (name.to_owned(), expr))
                    .collect(),
            },
        }
    }
}

/// An image-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Image(Expr);

impl Image {
    /// Loads an image asset by identifier.
    pub fn asset(id: impl Into<String>) -> Self {
        Self(Expr::invoke(
            "Image.load",
            [("id", Expr::constant(id.into()))],
        ))
    }

    /// A constant-valued image.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self(Expr::invoke(
            "Image.constant",
            [("value", Expr::constant(value))],
        ))
    }

    /// An image standing for the argument of a mapped function.
    pub(crate) fn argument(name: &str) -> Self {
        Self(Expr::argument(name))
    }

    /// Returns the underlying expression node.
    pub fn expr(&self) -> &Expr {
        &self.0
    }

    /// Consumes the image into its expression node.
    pub fn into_expr(self) -> Expr {
        self.0
    }

    /// Selects bands by name.
    pub fn select(&self, bands: &[&str]) -> Self {
        Self(Expr::invoke(
            "Image.select",
            [
                ("input", self.0.clone()),
                ("bandSelectors", Expr::constant(bands.to_vec())),
            ],
        ))
    }

    /// Selects bands and renames them in one step.
    pub fn select_renamed(&self, bands: &[&str], new_names: &[&str]) -> Self {
        Self(Expr::invoke(
            "Image.select",
            [
                ("input", self.0.clone()),
                ("bandSelectors", Expr::constant(bands.to_vec())),
                ("newNames", Expr::constant(new_names.to_vec())),
            ],
        ))
    }

    /// Replaces masked pixels with a constant value.
    pub fn unmask(&self, value: i64) -> Self {
        Self(Expr::invoke(
            "Image.unmask",
            [("input", self.0.clone()), ("value", Expr::constant(value))],
        ))
    }

    fn binary(&self, function: &'static str, other: &Image) -> Self {
        Self(Expr::invoke(
            function,
            [("image1", self.0.clone()), ("image2", other.0.clone())],
        ))
    }

    /// Per-pixel equality test.
    pub fn eq(&self, other: &Image) -> Self {
        self.binary("Image.eq", other)
    }

    /// Per-pixel inequality test.
    pub fn neq(&self, other: &Image) -> Self {
        self.binary("Image.neq", other)
    }

    /// Per-pixel logical and.
    pub fn and(&self, other: &Image) -> Self {
        self.binary("Image.and", other)
    }

    /// Per-pixel addition.
    pub fn add(&self, other: &Image) -> Self {
        self.binary("Image.add", other)
    }

    /// Per-pixel subtraction.
    pub fn subtract(&self, other: &Image) -> Self {
        self.binary("Image.subtract", other)
    }

    /// Per-pixel multiplication.
    pub fn multiply(&self, other: &Image) -> Self {
        self.binary("Image.multiply", other)
    }

    /// Per-pixel division.
    pub fn divide(&self, other: &Image) -> Self {
        self.binary("Image.divide", other)
    }

    /// Per-pixel bitwise and.
    pub fn bitwise_and(&self, other: &Image) -> Self {
        self.binary("Image.bitwiseAnd", other)
    }

    /// Appends all bands of another image.
    pub fn add_bands(&self, other: &Image) -> Self {
        Self(Expr::invoke(
            "Image.addBands",
            [("dstImg", self.0.clone()), ("srcImg", other.0.clone())],
        ))
    }

    /// Appends bands of another image under new names.
    pub fn add_bands_renamed(&self, other: &Image, names: &[&str]) -> Self {
        Self(Expr::invoke(
            "Image.addBands",
            [
                ("dstImg", self.0.clone()),
                ("srcImg", other.0.clone()),
                ("names", Expr::constant(names.to_vec())),
            ],
        ))
    }

    /// Masks this image with another image's non-zero pixels.
    pub fn update_mask(&self, mask: &Image) -> Self {
        Self(Expr::invoke(
            "Image.updateMask",
            [("image", self.0.clone()), ("mask", mask.0.clone())],
        ))
    }

    /// Casts every band to floating point.
    pub fn to_float(&self) -> Self {
        Self(Expr::invoke("Image.float", [("input", self.0.clone())]))
    }
}

/// An image-collection-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection(Expr);

impl ImageCollection {
    /// Loads a collection asset by identifier.
    pub fn asset(id: impl Into<String>) -> Self {
        Self(Expr::invoke(
            "ImageCollection.load",
            [("id", Expr::constant(id.into()))],
        ))
    }

    /// Returns the underlying expression node.
    pub fn expr(&self) -> &Expr {
        &self.0
    }

    /// Consumes the collection into its expression node.
    pub fn into_expr(self) -> Expr {
        self.0
    }

    /// Keeps images whose timestamp falls in `[start, end)`.
    pub fn filter_date(&self, start: &str, end: &str) -> Self {
        Self(Expr::invoke(
            "ImageCollection.filterDate",
            [
                ("collection", self.0.clone()),
                ("start", Expr::constant(start)),
                ("end", Expr::constant(end)),
            ],
        ))
    }

    /// Keeps images intersecting the region.
    pub fn filter_bounds(&self, region: &Geometry) -> Self {
        Self(Expr::invoke(
            "ImageCollection.filterBounds",
            [
                ("collection", self.0.clone()),
                ("geometry", region.0.clone()),
            ],
        ))
    }

    /// Keeps images whose metadata property is below the value.
    pub fn filter_lt(&self, property: &str, value: f64) -> Self {
        Self(Expr::invoke(
            "ImageCollection.filterMetadata",
            [
                ("collection", self.0.clone()),
                ("property", Expr::constant(property)),
                ("operator", Expr::constant("less_than")),
                ("value", Expr::constant(value)),
            ],
        ))
    }

    /// Maps a per-image operation over the collection.
    ///
    /// The operation is serialized as an anonymous server-side function
    /// over a single `image` argument.
    pub fn map(&self, op: impl FnOnce(Image) -> Image) -> Self {
        let body = op(Image::argument("image")).into_expr();
        Self(Expr::invoke(
            "ImageCollection.map",
            [
                ("collection", self.0.clone()),
                ("baseAlgorithm", Expr::function(&["image"], body)),
            ],
        ))
    }

    /// Reduces the collection to its per-pixel median image.
    pub fn median(&self) -> Image {
        Image(Expr::invoke(
            "ImageCollection.median",
            [("collection", self.0.clone())],
        ))
    }
}

/// A geometry-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(Expr);

impl Geometry {
    /// A polygon from linear rings of `[longitude, latitude]` points.
    pub fn polygon(rings: &[Vec<[f64; 2]>]) -> Self {
        let coordinates = Value::Array(
            rings
                .iter()
                .map(|ring| {
                    Value::Array(
                        ring.iter()
                            .map(|point| Value::Array(vec![point[0].into(), point[1].into()]))
                            .collect(),
                    )
                })
                .collect(),
        );

        Self(Expr::invoke(
            "GeometryConstructors.Polygon",
            [("coordinates", Expr::constant(coordinates))],
        ))
    }

    /// Returns the underlying expression node.
    pub fn expr(&self) -> &Expr {
        &self.0
    }

    /// Consumes the geometry into its expression node.
    pub fn into_expr(self) -> Expr {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(expr: &Expr) -> Value {
        serde_json::to_value(expr).unwrap()
    }

    #[test]
    fn test_constant_serialization() {
        let json = to_json(&Expr::constant(42));
        assert_eq!(json, serde_json::json!({"constantValue": 42}));
    }

    #[test]
    fn test_asset_invocation_shape() {
        let json = to_json(Image::asset("UMD/hansen/global_forest_change_2021_v1_9").expr());
        assert_eq!(
            json["functionInvocationValue"]["functionName"],
            "Image.load"
        );
        assert_eq!(
            json["functionInvocationValue"]["arguments"]["id"]["constantValue"],
            "UMD/hansen/global_forest_change_2021_v1_9"
        );
    }

    #[test]
    fn test_select_carries_band_list() {
        let json = to_json(Image::asset("a").select(&["B4", "B3", "B2"]).expr());
        let bands =
            &json["functionInvocationValue"]["arguments"]["bandSelectors"]["constantValue"];
        assert_eq!(bands, &serde_json::json!(["B4", "B3", "B2"]));
    }

    #[test]
    fn test_binary_ops_nest() {
        let a = Image::asset("a");
        let sum = a.add(&Image::constant(2));
        let json = to_json(sum.expr());
        assert_eq!(json["functionInvocationValue"]["functionName"], "Image.add");
        assert_eq!(
            json["functionInvocationValue"]["arguments"]["image1"]["functionInvocationValue"]
                ["functionName"],
            "Image.load"
        );
    }

    #[test]
    fn test_map_builds_function_definition() {
        let masked = ImageCollection::asset("c").map(|image| image.unmask(0));
        let json = to_json(masked.expr());
        let algorithm = &json["functionInvocationValue"]["arguments"]["baseAlgorithm"];
        assert_eq!(
            algorithm["functionDefinitionValue"]["argumentNames"],
            serde_json::json!(["image"])
        );
        let body = &algorithm["functionDefinitionValue"]["body"];
        assert_eq!(
            body["functionInvocationValue"]["arguments"]["input"]["argumentReference"],
            "image"
        );
    }

    #[test]
    fn test_polygon_coordinates() {
        let region = Geometry::polygon(&[vec![[-125.0, 41.0], [-121.5, 35.1], [-117.7, 32.4]]]);
        let json = to_json(region.expr());
        let coords =
            &json["functionInvocationValue"]["arguments"]["coordinates"]["constantValue"];
        assert_eq!(coords[0][0], serde_json::json!([-125.0, 41.0]));
    }

    #[test]
    fn test_median_returns_image_node() {
        let median = ImageCollection::asset("c").median();
        let json = to_json(median.expr());
        assert_eq!(
            json["functionInvocationValue"]["functionName"],
            "ImageCollection.median"
        );
    }
}
